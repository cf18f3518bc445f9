//! SSH connection to the test container.

use crate::container::{ContainerProps, ContainerRuntime, TestContainer};
use crate::error::{Error, Result};
use crate::poll::Poller;
use async_trait::async_trait;
use command_executor::backends::ssh::SSH_TRANSPORT_EXIT_CODE;
use command_executor::backends::{LocalLauncher, SshConfig, SshLauncher, SudoLauncher};
use command_executor::{Command, ExitResult, Executor, Launcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Connect, banner and authentication timeout used by the fixtures
pub const DEFAULT_SSH_TIMEOUT: Duration = Duration::from_secs(60);

/// How to reach the container over SSH
///
/// Authentication is by key only; the client never prompts, which is the CLI
/// equivalent of an empty password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Host to connect to
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Login user
    pub user: String,
    /// Private key file
    pub key_filename: PathBuf,
    /// Bound on connection establishment
    pub timeout: Duration,
}

impl ConnectionParams {
    /// Parameters for a container running on the local host network
    pub fn for_container(props: &ContainerProps, timeout: Duration) -> Self {
        Self {
            host: "localhost".to_string(),
            port: props.port,
            user: props.user.clone(),
            key_filename: props.key_filename.clone(),
            timeout,
        }
    }

    /// Client configuration for these parameters
    pub fn ssh_config(&self) -> SshConfig {
        SshConfig::new(&self.host)
            .with_user(&self.user)
            .with_port(self.port)
            .with_identity_file(&self.key_filename)
            .with_connect_timeout(self.timeout)
            .non_interactive()
    }
}

/// Run commands on, and copy files to, a remote host
///
/// `run` and `sudo` report non-zero exits as a normal result; the `_checked`
/// variants turn them into [`Error::CommandFailed`]. Transport failures are
/// always errors.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a shell snippet as the login user
    async fn run(&self, script: &str) -> Result<ExitResult>;

    /// Run a shell snippet as root
    async fn sudo(&self, script: &str) -> Result<ExitResult>;

    /// Copy a local file to `remote` (relative paths land in the login user's home)
    async fn put(&self, local: &Path, remote: &str) -> Result<()>;

    /// Like [`run`](RemoteShell::run), failing on a non-zero exit
    async fn run_checked(&self, script: &str) -> Result<ExitResult> {
        ensure_success(script, self.run(script).await?)
    }

    /// Like [`sudo`](RemoteShell::sudo), failing on a non-zero exit
    async fn sudo_checked(&self, script: &str) -> Result<ExitResult> {
        ensure_success(&format!("sudo {}", script), self.sudo(script).await?)
    }
}

/// Turn a non-zero exit into [`Error::CommandFailed`]
pub fn ensure_success(command: &str, result: ExitResult) -> Result<ExitResult> {
    if result.success() {
        Ok(result)
    } else {
        Err(Error::CommandFailed {
            command: command.to_string(),
            code: result.status.code,
            stderr: result.stderr,
        })
    }
}

/// Separate the SSH client's own failures from the remote command's exit
fn check_transport(result: ExitResult) -> Result<ExitResult> {
    if result.status.code != Some(SSH_TRANSPORT_EXIT_CODE) {
        return Ok(result);
    }
    let message = result
        .stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("ssh exited with status 255")
        .to_string();
    Err(Error::Transport { message })
}

/// [`RemoteShell`] over the OpenSSH command line clients
pub struct SshConnection<L: Launcher + Clone = LocalLauncher> {
    params: ConnectionParams,
    shell: Executor<SshLauncher<L>>,
    root: Executor<SudoLauncher<SshLauncher<L>>>,
    local: Executor<L>,
}

impl SshConnection<LocalLauncher> {
    /// Connection that spawns `ssh`/`scp` locally
    pub fn new(params: ConnectionParams) -> Self {
        Self::with_launcher(params, LocalLauncher)
    }
}

impl<L: Launcher + Clone> SshConnection<L> {
    /// Connection that spawns `ssh`/`scp` through `launcher`
    pub fn with_launcher(params: ConnectionParams, launcher: L) -> Self {
        let ssh = SshLauncher::new(launcher.clone(), params.ssh_config());
        Self {
            shell: Executor::new(format!("ssh:{}", params.user), ssh.clone()),
            root: Executor::new("ssh:sudo".to_string(), SudoLauncher::new(ssh)),
            local: Executor::new("scp".to_string(), launcher),
            params,
        }
    }

    /// Parameters this connection was built from
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }
}

#[async_trait]
impl<L: Launcher + Clone> RemoteShell for SshConnection<L> {
    async fn run(&self, script: &str) -> Result<ExitResult> {
        check_transport(self.shell.execute(Command::shell(script)).await?)
    }

    async fn sudo(&self, script: &str) -> Result<ExitResult> {
        check_transport(self.root.execute(Command::shell(script)).await?)
    }

    async fn put(&self, local: &Path, remote: &str) -> Result<()> {
        debug!("Uploading {} to {}", local.display(), remote);
        let cmd = self.params.ssh_config().scp_command(local, remote);
        let command = cmd.to_shell_string();
        let result = check_transport(self.local.execute(cmd).await?)?;
        ensure_success(&command, result)?;
        Ok(())
    }
}

/// Poll a no-op remote command until it succeeds
///
/// Transient transport errors (sshd still starting) are retried; any other
/// transport error is returned immediately. Returns `Ok(false)` on timeout.
pub async fn probe_ssh_connection<S>(shell: &S, poller: &Poller) -> Result<bool>
where
    S: RemoteShell + ?Sized,
{
    poller
        .poll(
            "ssh connection",
            move || async move { Ok(shell.run("true").await?.success().into()) },
            Error::is_transient_transport,
        )
        .await
}

/// Open a new, probed connection to a container described by `props`
pub async fn new_tester_ssh_connection(
    props: &ContainerProps,
    timeout: Duration,
    poller: &Poller,
) -> Result<SshConnection> {
    let params = ConnectionParams::for_container(props, timeout);
    info!(
        "Connecting to {}@{}:{}",
        params.user, params.host, params.port
    );
    let conn = SshConnection::new(params);

    if !probe_ssh_connection(&conn, poller).await? {
        return Err(Error::ConnectionTimeout);
    }
    Ok(conn)
}

/// Connection fixture for a booted container
pub async fn setup_ssh_connection<R: ContainerRuntime>(
    container: &TestContainer<R>,
    timeout: Duration,
    poller: &Poller,
) -> Result<SshConnection> {
    new_tester_ssh_connection(container.props(), timeout, poller).await
}
