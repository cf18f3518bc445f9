//! Error types for test environment setup

use thiserror::Error;

/// Transport failures that mean "the SSH server is not up yet", matched as
/// message suffixes
///
/// The OpenSSH client reports a server that accepts the TCP connection but
/// drops it, or never sends its banner, as a closed connection or a banner
/// exchange timeout.
pub const TRANSIENT_TRANSPORT_ERRORS: &[&str] = &[
    "Connection reset by peer",
    "Error reading SSH protocol banner",
    "Connection closed by remote host",
    "Connection timed out during banner exchange",
];

/// Errors raised while setting up the environment
#[derive(Error, Debug)]
pub enum Error {
    /// The boot banner never appeared in the container logs
    #[error("Image did not boot. Aborting")]
    BootTimeout,

    /// The SSH probe never succeeded
    #[error("SSH connection can not be established. Aborting")]
    ConnectionTimeout,

    /// The SSH client failed before running the remote command
    #[error("SSH transport error: {message}")]
    Transport {
        /// Last line the SSH client printed
        message: String,
    },

    /// `uname -m` reported a machine the client has no device type for
    #[error("{machine} is not a recognized machine type")]
    UnknownMachine {
        /// Machine string reported by the device
        machine: String,
    },

    /// A command that has to succeed exited non-zero
    #[error("command `{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        /// The command line
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// Downloading the client package failed
    #[error("failed to download {url}: {source}")]
    Download {
        /// URL that was requested
        url: String,
        /// Underlying HTTP error
        #[source]
        source: reqwest::Error,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Spawning or waiting on a local process failed
    #[error(transparent)]
    Executor(#[from] command_executor::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for transport errors that are expected while sshd starts
    pub fn is_transient_transport(&self) -> bool {
        match self {
            Error::Transport { message } => TRANSIENT_TRANSPORT_ERRORS
                .iter()
                .any(|suffix| message.ends_with(suffix)),
            _ => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
