//! Error types for command execution

use thiserror::Error;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// Failed to wait for a spawned process
    #[error("failed to wait for process: {reason}")]
    WaitFailed {
        /// The reason the wait failed
        reason: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a wait failed error
    pub fn wait_failed(reason: impl Into<String>) -> Self {
        Self::WaitFailed {
            reason: reason.into(),
        }
    }

    /// Prefix a spawn failure with the name of the launcher layer it came through
    pub fn with_layer_context(self, layer: impl Into<String>) -> Self {
        match self {
            Error::SpawnFailed { reason } => Error::SpawnFailed {
                reason: format!("{} layer: {}", layer.into(), reason),
            },
            other => other,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
