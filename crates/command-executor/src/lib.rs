//! Runtime-agnostic command execution library
//!
//! This crate provides a unified interface for running commands either as local
//! child processes or on a remote host through the `ssh` CLI, optionally with
//! privilege escalation via `sudo`. Launchers compose: `SudoLauncher<SshLauncher<LocalLauncher>>`
//! runs `sudo` on the remote host.

#![warn(missing_docs)]

pub mod backends;
pub mod command;
pub mod error;
pub mod event;
pub mod executor;
pub mod launcher;
pub mod process;

pub use command::Command;
pub use error::{Error, Result};
pub use event::{ProcessEvent, ProcessEventType};
pub use executor::Executor;
pub use launcher::Launcher;
pub use process::{ExitResult, ExitStatus, ProcessHandle};
