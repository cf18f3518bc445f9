//! Scripted stand-ins for the container runtime, the remote shell and the
//! package fetcher

#![allow(dead_code)]

use async_trait::async_trait;
use mender_test_env::{
    ArtifactFetcher, ContainerId, ContainerProps, ContainerRuntime, Error, ExitResult, Poller,
    RemoteShell, Result,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const BANNER_LOGS: &str =
    "[  OK  ] Started Mender.\n\nPoky (Yocto Project Reference Distro) 2.6 qemux86-64 ttyS0\n";

/// Short deadline for tests that expect readiness
pub fn quick_poller() -> Poller {
    Poller::new(Duration::from_secs(5), Duration::from_millis(10))
}

/// Deadline that expires after a handful of attempts
pub fn expiring_poller() -> Poller {
    Poller::new(Duration::from_millis(100), Duration::from_millis(10))
}

pub fn test_props() -> ContainerProps {
    ContainerProps {
        image_name: "mendersoftware/mender-client-qemu".to_string(),
        append_client_version: true,
        user: "root".to_string(),
        port: 8822,
        key_filename: PathBuf::from("/keys/id_rsa"),
        container_id: None,
    }
}

/// Runtime whose log output follows a script; the last entry repeats
pub struct FakeRuntime {
    logs: Mutex<VecDeque<String>>,
    log_calls: AtomicUsize,
    pub started: Mutex<Vec<String>>,
    pub stopped: Mutex<Vec<ContainerId>>,
}

impl FakeRuntime {
    pub fn with_logs(logs: &[&str]) -> Self {
        Self {
            logs: Mutex::new(logs.iter().map(|s| s.to_string()).collect()),
            log_calls: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
        }
    }

    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> Vec<ContainerId> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn run(&self, image: &str) -> Result<ContainerId> {
        self.started.lock().unwrap().push(image.to_string());
        Ok(ContainerId::new("c0ffee"))
    }

    async fn logs(&self, _id: &ContainerId) -> Result<String> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        let mut logs = self.logs.lock().unwrap();
        let current = logs.front().cloned().unwrap_or_default();
        if logs.len() > 1 {
            logs.pop_front();
        }
        Ok(current)
    }

    async fn stop(&self, id: &ContainerId) -> Result<()> {
        self.stopped.lock().unwrap().push(id.clone());
        Ok(())
    }
}

/// One recorded remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run(String),
    Sudo(String),
    Put {
        local: PathBuf,
        remote: String,
        local_existed: bool,
    },
}

/// Remote shell answering a fixed set of commands
pub struct FakeShell {
    pub installed: bool,
    pub machine: String,
    pub dpkg_exit: i32,
    /// Errors returned by `run("true")` before it starts succeeding
    pub probe_errors: Mutex<VecDeque<String>>,
    /// Exit code of `run("true")` once the errors are used up
    pub probe_exit: i32,
    pub calls: Mutex<Vec<Call>>,
}

impl Default for FakeShell {
    fn default() -> Self {
        Self {
            installed: false,
            machine: "x86_64".to_string(),
            dpkg_exit: 0,
            probe_errors: Mutex::new(VecDeque::new()),
            probe_exit: 0,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeShell {
    pub fn with_probe_errors(errors: &[&str]) -> Self {
        Self {
            probe_errors: Mutex::new(errors.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Run(s) | Call::Sudo(s) => Some(s),
                Call::Put { .. } => None,
            })
            .collect()
    }

    pub fn probe_attempts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Run(s) if s == "true"))
            .count()
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn run(&self, script: &str) -> Result<ExitResult> {
        self.calls.lock().unwrap().push(Call::Run(script.to_string()));
        match script {
            "true" => {
                if let Some(message) = self.probe_errors.lock().unwrap().pop_front() {
                    return Err(Error::Transport { message });
                }
                Ok(ExitResult::new(self.probe_exit, ""))
            }
            "test -x /usr/bin/mender" => {
                Ok(ExitResult::new(if self.installed { 0 } else { 1 }, ""))
            }
            "uname -m" => Ok(ExitResult::new(0, format!("{}\n", self.machine))),
            _ => Ok(ExitResult::new(0, "")),
        }
    }

    async fn sudo(&self, script: &str) -> Result<ExitResult> {
        self.calls.lock().unwrap().push(Call::Sudo(script.to_string()));
        if script.starts_with("dpkg -i") {
            let stderr = if self.dpkg_exit == 0 {
                ""
            } else {
                "dpkg: error processing archive"
            };
            return Ok(ExitResult::new(self.dpkg_exit, "").with_stderr(stderr));
        }
        Ok(ExitResult::new(0, ""))
    }

    async fn put(&self, local: &Path, remote: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Put {
            local: local.to_path_buf(),
            remote: remote.to_string(),
            local_existed: local.exists(),
        });
        Ok(())
    }
}

/// Fetcher that writes a placeholder package, or fails
#[derive(Default)]
pub struct FakeFetcher {
    pub fail: bool,
    pub fetched: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeFetcher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn fetched(&self) -> Vec<(String, PathBuf)> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        self.fetched
            .lock()
            .unwrap()
            .push((url.to_string(), dest.to_path_buf()));
        if self.fail {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "package mirror unreachable",
            )));
        }
        std::fs::write(dest, b"!<arch>\ndebian-binary")?;
        Ok(())
    }
}
