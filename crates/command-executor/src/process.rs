//! Process management traits and types

use async_trait::async_trait;
use crate::error::Result;

/// A handle to a running process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID
    fn pid(&self) -> Option<u32>;

    /// Wait for the process to complete and return its exit status
    async fn wait(&mut self) -> Result<ExitStatus>;
}

/// Process exit status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    #[cfg(unix)]
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Status of a process that exited normally with `code`
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            #[cfg(unix)]
            signal: None,
        }
    }

    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Captured result of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitResult {
    /// How the process exited
    pub status: ExitStatus,
    /// Stdout and stderr lines interleaved in arrival order
    pub output: String,
    /// Stdout lines only
    pub stdout: String,
    /// Stderr lines only
    pub stderr: String,
}

impl ExitResult {
    /// Result of a process that exited with `code` and printed `stdout`
    pub fn new(code: i32, stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        Self {
            status: ExitStatus::from_code(code),
            output: stdout.clone(),
            stdout,
            stderr: String::new(),
        }
    }

    /// Attach stderr text, appending it to the combined output as well
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        self.output.push_str(&stderr);
        self.stderr = stderr;
        self
    }

    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.status.success()
    }
}
