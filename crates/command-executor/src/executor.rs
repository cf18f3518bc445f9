//! Main executor type that wraps different launchers

use crate::command::Command;
use crate::error::Result;
use crate::launcher::Launcher;
use crate::process::ExitResult;
use tracing::debug;

/// An executor that runs commands via a specific launcher
#[derive(Debug, Clone)]
pub struct Executor<L: Launcher> {
    /// Name used to identify this executor in logs
    service_name: String,
    launcher: L,
}

impl<L: Launcher> Executor<L> {
    /// Create a new executor with the given launcher
    pub fn new(service_name: String, launcher: L) -> Self {
        Self {
            service_name,
            launcher,
        }
    }

    /// Get the service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Launch a command and return event stream and process handle
    pub async fn launch(&self, command: Command) -> Result<(L::EventStream, L::Handle)> {
        self.launcher.launch(command).await
    }

    /// Execute a command and wait for it to complete
    pub async fn execute(&self, command: Command) -> Result<ExitResult> {
        debug!(executor = %self.service_name, "Executing: {}", command);
        let result = self.launcher.execute(command).await?;
        debug!(
            executor = %self.service_name,
            "Command exited with {:?}",
            result.status.code
        );
        Ok(result)
    }

    /// Get a reference to the launcher
    pub fn launcher(&self) -> &L {
        &self.launcher
    }
}
