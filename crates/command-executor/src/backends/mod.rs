//! Launcher implementations for different execution contexts
//!
//! [`LocalLauncher`] spawns child processes. [`SshLauncher`] and
//! [`SudoLauncher`] wrap another launcher and rewrite the command before
//! delegating to it.

pub mod local;
pub use local::LocalLauncher;

#[cfg(feature = "ssh")]
pub mod ssh;
#[cfg(feature = "ssh")]
pub use ssh::{SshConfig, SshLauncher};

pub mod sudo;
pub use sudo::SudoLauncher;
