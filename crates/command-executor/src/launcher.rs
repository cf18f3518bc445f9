//! Launcher trait for executing commands in different contexts

use crate::command::Command;
use crate::error::Result;
use crate::event::{ProcessEvent, ProcessEventType};
use crate::process::{ExitResult, ProcessHandle};
use async_trait::async_trait;
use futures::stream::Stream;
use tracing::trace;

/// A launcher that can execute commands in a specific context
///
/// Wrapping launchers rewrite the command and delegate to an inner launcher,
/// so contexts nest: sudo inside SSH inside a local process.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// The event stream type this launcher produces
    type EventStream: Stream<Item = ProcessEvent> + Send + Unpin;

    /// The process handle type this launcher produces
    type Handle: ProcessHandle;

    /// Launch a command, returning event stream and control handle
    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)>;

    /// Execute a command and wait for it to complete, capturing output
    ///
    /// Output is captured rather than echoed; each line is logged at trace level.
    async fn execute(&self, command: Command) -> Result<ExitResult> {
        use futures::StreamExt;

        let (mut events, mut handle) = self.launch(command).await?;
        let mut output = String::new();
        let mut stdout = String::new();
        let mut stderr = String::new();

        while let Some(event) = events.next().await {
            let Some(line) = &event.data else { continue };
            trace!(event = ?event.event_type, "{}", line);
            match event.event_type {
                ProcessEventType::Stdout => {
                    stdout.push_str(line);
                    stdout.push('\n');
                }
                ProcessEventType::Stderr => {
                    stderr.push_str(line);
                    stderr.push('\n');
                }
                ProcessEventType::Started { .. } => {}
            }
            output.push_str(line);
            output.push('\n');
        }

        let status = handle.wait().await?;
        Ok(ExitResult {
            status,
            output,
            stdout,
            stderr,
        })
    }
}
