//! SSH remote execution backend using the `ssh` and `scp` CLIs

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::{Command, shell_escape};
use crate::error::Result;
use crate::executor::Executor;
use crate::launcher::Launcher;

/// Exit code the OpenSSH clients use for their own (transport) failures
pub const SSH_TRANSPORT_EXIT_CODE: i32 = 255;

/// SSH connection configuration
#[derive(Debug, Clone)]
pub struct SshConfig {
    host: String,
    user: Option<String>,
    port: Option<u16>,
    identity_file: Option<PathBuf>,
    /// `-o Key=Value` client options, in insertion order
    options: Vec<(String, String)>,
}

impl SshConfig {
    /// Create a new SSH configuration for the given host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            identity_file: None,
            options: Vec::new(),
        }
    }

    /// Set the SSH user
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the identity file (private key)
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Set a client option, replacing an earlier value for the same key
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.options.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.options.push((key, value)),
        }
        self
    }

    /// Bound the TCP connect and protocol banner exchange
    pub fn with_connect_timeout(self, timeout: Duration) -> Self {
        self.with_option("ConnectTimeout", timeout.as_secs().max(1).to_string())
    }

    /// Never prompt: no passwords, no host key confirmation, no known_hosts churn
    pub fn non_interactive(self) -> Self {
        self.with_option("BatchMode", "yes")
            .with_option("StrictHostKeyChecking", "no")
            .with_option("UserKnownHostsFile", "/dev/null")
            .with_option("LogLevel", "ERROR")
    }

    /// Remote host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Configured port, if any
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Get the host string (user@host if user is specified)
    pub fn host_string(&self) -> String {
        if let Some(user) = &self.user {
            format!("{}@{}", user, self.host)
        } else {
            self.host.clone()
        }
    }

    /// Arguments shared by `ssh` and `scp`, which differ only in the port flag
    fn push_common_args(&self, cmd: &mut Command, port_flag: &str) {
        if let Some(port) = self.port {
            cmd.arg(port_flag).arg(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            cmd.arg("-i").arg(identity);
        }
        for (key, value) in &self.options {
            cmd.arg("-o").arg(format!("{}={}", key, value));
        }
    }

    /// Build an `scp` command copying `local` to `remote` on this host
    ///
    /// A relative `remote` path lands in the login user's home directory.
    pub fn scp_command(&self, local: &Path, remote: &str) -> Command {
        let mut cmd = Command::new("scp");
        self.push_common_args(&mut cmd, "-P");
        cmd.arg(local);
        cmd.arg(format!("{}:{}", self.host_string(), remote));
        cmd
    }
}

/// SSH launcher that wraps another launcher for remote execution
#[derive(Debug, Clone)]
pub struct SshLauncher<L> {
    inner: L,
    config: SshConfig,
}

impl<L> SshLauncher<L> {
    /// Create a new SSH launcher wrapping the given inner launcher
    pub fn new(inner: L, config: SshConfig) -> Self {
        Self { inner, config }
    }

    /// The connection configuration
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Build the `ssh` invocation that runs `command` on the remote host
    pub fn wrap(&self, command: &Command) -> Command {
        let mut ssh_cmd = Command::new("ssh");
        self.config.push_common_args(&mut ssh_cmd, "-p");
        ssh_cmd.arg(self.config.host_string());
        ssh_cmd.arg(format_remote_command(command));
        ssh_cmd
    }
}

#[async_trait]
impl<L> Launcher for SshLauncher<L>
where
    L: Launcher,
{
    type EventStream = L::EventStream;
    type Handle = L::Handle;

    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)> {
        let ssh_cmd = self.wrap(&command);
        self.inner
            .launch(ssh_cmd)
            .await
            .map_err(|e| e.with_layer_context("SSH"))
    }
}

/// Format a command for remote execution via SSH
///
/// The remote side only receives a command line, so environment and working
/// directory are folded into it.
fn format_remote_command(cmd: &Command) -> String {
    let mut line = String::new();

    if let Some(dir) = cmd.get_current_dir() {
        line.push_str("cd ");
        line.push_str(&shell_escape(&dir.to_string_lossy()));
        line.push_str(" && ");
    }

    if !cmd.get_envs().is_empty() {
        let mut vars: Vec<String> = cmd
            .get_envs()
            .iter()
            .map(|(k, v)| {
                shell_escape(&format!("{}={}", k.to_string_lossy(), v.to_string_lossy()))
            })
            .collect();
        vars.sort();
        line.push_str("env ");
        line.push_str(&vars.join(" "));
        line.push(' ');
    }

    line.push_str(&cmd.to_shell_string());
    line
}

impl<L> Executor<SshLauncher<L>>
where
    L: Launcher,
{
    /// Create an executor for SSH remote execution
    pub fn ssh(service_name: impl Into<String>, inner: L, config: SshConfig) -> Self {
        Self::new(service_name.into(), SshLauncher::new(inner, config))
    }
}
