//! Sudo launcher for privilege escalation
//!
//! The launcher never answers password prompts: it runs `sudo -n`, so a host
//! that requires a password fails fast instead of hanging. Test images are
//! expected to grant the login user passwordless sudo (or to log in as root).
//!
//! Wrap an [`SshLauncher`](crate::backends::ssh::SshLauncher) to escalate on
//! the remote host:
//!
//! ```no_run
//! use command_executor::{Command, Executor};
//! use command_executor::backends::{LocalLauncher, SshConfig, SshLauncher, SudoLauncher};
//!
//! # async fn example() -> command_executor::Result<()> {
//! let ssh = SshLauncher::new(LocalLauncher, SshConfig::new("localhost").with_port(8822));
//! let executor = Executor::new("remote-root".to_string(), SudoLauncher::new(ssh));
//!
//! // Runs: ssh -p 8822 localhost 'sudo -n -E mkdir -p /var/lib/mender'
//! let cmd = Command::builder("mkdir").arg("-p").arg("/var/lib/mender").build();
//! let result = executor.execute(cmd).await?;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

use crate::{Command, error::Result, launcher::Launcher};
use async_trait::async_trait;

/// Launcher that wraps another launcher to execute commands with sudo
#[derive(Debug, Clone)]
pub struct SudoLauncher<L> {
    inner: L,
}

impl<L> SudoLauncher<L> {
    /// Create a new sudo launcher wrapping the given launcher
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    /// Build the `sudo` invocation for `command`
    pub fn wrap(&self, command: &Command) -> Command {
        let mut builder = Command::builder("sudo")
            // Fail instead of prompting for a password
            .arg("-n")
            // Preserve environment variables set on the command
            .arg("-E")
            .arg(command.get_program())
            .args(command.get_args());

        for (key, val) in command.get_envs() {
            builder = builder.env(key, val);
        }

        if let Some(dir) = command.get_current_dir() {
            builder = builder.current_dir(dir);
        }

        builder.build()
    }
}

#[async_trait]
impl<L> Launcher for SudoLauncher<L>
where
    L: Launcher,
{
    type EventStream = L::EventStream;
    type Handle = L::Handle;

    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)> {
        self.inner
            .launch(self.wrap(&command))
            .await
            .map_err(|e| e.with_layer_context("Sudo"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::local::LocalLauncher;

    #[test]
    fn test_sudo_wrap() {
        let sudo = SudoLauncher::new(LocalLauncher);
        let wrapped = sudo.wrap(&Command::shell("dpkg -i client.deb"));

        assert_eq!(wrapped.to_shell_string(), "sudo -n -E sh -c 'dpkg -i client.deb'");
    }

    #[cfg(feature = "ssh")]
    #[test]
    fn test_sudo_over_ssh_escalates_remotely() {
        use crate::backends::ssh::{SshConfig, SshLauncher};

        let ssh = SshLauncher::new(LocalLauncher, SshConfig::new("localhost"));
        let sudo = SudoLauncher::new(ssh.clone());

        let cmd = Command::builder("mkdir").arg("-p").arg("/var/lib/mender").build();
        let remote = ssh.wrap(&sudo.wrap(&cmd));

        let last = remote.get_args().last().map(|a| a.to_string_lossy().into_owned());
        assert_eq!(last.as_deref(), Some("sudo -n -E mkdir -p /var/lib/mender"));
    }
}
