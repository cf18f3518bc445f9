//! Local process execution backend

use async_process::{Child, Stdio};
use async_trait::async_trait;
use futures::stream::Stream;
use futures_lite::io::{AsyncBufReadExt, BufReader, Split};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::warn;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::event::{ProcessEvent, ProcessEventType};
use crate::executor::Executor;
use crate::launcher::Launcher;
use crate::process::{ExitStatus, ProcessHandle};

/// Launcher for executing processes locally
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

/// A handle to control a local process
pub struct LocalProcessHandle {
    child: Child,
    /// Whether to kill the process on drop
    kill_on_drop: bool,
}

/// Stream of process events
pub struct ProcessEventStream {
    stdout: Option<Split<BufReader<async_process::ChildStdout>>>,
    stderr: Option<Split<BufReader<async_process::ChildStderr>>>,
    started_sent: bool,
    child_id: u32,
}

#[async_trait]
impl Launcher for LocalLauncher {
    type EventStream = ProcessEventStream;
    type Handle = LocalProcessHandle;

    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)> {
        let mut async_cmd = command.prepare();

        // Nothing we run reads stdin; ssh in particular would otherwise hold the terminal
        async_cmd.stdin(Stdio::null());
        async_cmd.stdout(Stdio::piped());
        async_cmd.stderr(Stdio::piped());

        let mut child = async_cmd.spawn().map_err(|e| {
            Error::spawn_failed(format!(
                "{}: {}",
                command.get_program().to_string_lossy(),
                e
            ))
        })?;

        let child_id = child.id();
        let stdout = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));
        let stderr = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));

        let events = ProcessEventStream {
            stdout,
            stderr,
            started_sent: false,
            child_id,
        };

        let handle = LocalProcessHandle {
            child,
            kill_on_drop: true,
        };

        Ok((events, handle))
    }
}

#[async_trait]
impl ProcessHandle for LocalProcessHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self
            .child
            .status()
            .await
            .map_err(|e| Error::wait_failed(e.to_string()))?;

        // Reaped; nothing left to kill
        self.kill_on_drop = false;

        Ok(ExitStatus {
            code: status.code(),
            #[cfg(unix)]
            signal: {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            },
        })
    }
}

impl Drop for LocalProcessHandle {
    fn drop(&mut self) {
        if self.kill_on_drop {
            let _ = self.child.kill();
        }
    }
}

impl Stream for ProcessEventStream {
    type Item = ProcessEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if !self.started_sent {
            self.started_sent = true;
            let event = ProcessEvent::new(ProcessEventType::Started { pid: self.child_id });
            return Poll::Ready(Some(event));
        }

        if let Some(stdout) = &mut self.stdout {
            match Pin::new(stdout).poll_next(cx) {
                Poll::Ready(Some(Ok(line))) => {
                    let event =
                        ProcessEvent::new_with_data(ProcessEventType::Stdout, decode(line));
                    return Poll::Ready(Some(event));
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(pid = self.child_id, "stdout read failed: {}", e);
                    self.stdout = None;
                }
                Poll::Ready(None) => {
                    self.stdout = None;
                }
                Poll::Pending => {}
            }
        }

        if let Some(stderr) = &mut self.stderr {
            match Pin::new(stderr).poll_next(cx) {
                Poll::Ready(Some(Ok(line))) => {
                    let event =
                        ProcessEvent::new_with_data(ProcessEventType::Stderr, decode(line));
                    return Poll::Ready(Some(event));
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(pid = self.child_id, "stderr read failed: {}", e);
                    self.stderr = None;
                }
                Poll::Ready(None) => {
                    self.stderr = None;
                }
                Poll::Pending => {}
            }
        }

        if self.stdout.is_none() && self.stderr.is_none() {
            return Poll::Ready(None);
        }

        // Every still-open stream returned Pending and registered the waker
        Poll::Pending
    }
}

/// Decode one output line, replacing invalid UTF-8
///
/// A trailing `\r` is kept, so TTY output keeps its original length.
fn decode(line: Vec<u8>) -> String {
    match String::from_utf8(line) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

impl Executor<LocalLauncher> {
    /// Create an executor for local process execution
    pub fn local(service_name: impl Into<String>) -> Self {
        Self::new(service_name.into(), LocalLauncher)
    }
}
