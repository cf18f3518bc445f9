//! Container lifecycle: start, wait for the boot banner, stop.

use crate::error::{Error, Result};
use crate::poll::{Poller, never_retry};
use async_trait::async_trait;
use command_executor::backends::LocalLauncher;
use command_executor::{Command, ExitResult, Executor, Launcher};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, info, warn};

/// Login prompt printed by the test images once boot completes
pub const BOOT_BANNER_PATTERN: &str = r"(?m)(Poky|GNU/Linux).* tty";

/// Number of trailing log characters searched for the banner
///
/// Only the tail is checked so a reboot, which prints a fresh boot log after
/// the old banner, is not mistaken for a finished boot.
pub const BOOT_BANNER_WINDOW: usize = 100;

static DEFAULT_BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(BOOT_BANNER_PATTERN).expect("boot banner pattern is valid"));

/// Identifier of a running container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wrap a runtime-assigned id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detects the boot banner at the end of accumulated container logs
#[derive(Debug, Clone)]
pub struct BootBanner {
    pattern: Regex,
    window: usize,
}

impl BootBanner {
    /// Banner matching `pattern` within the last `window` characters
    pub fn new(pattern: &str, window: usize) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid boot banner pattern: {}", e)))?;
        Ok(Self { pattern, window })
    }

    /// True if the trailing window of `logs` contains the banner
    pub fn matches_tail(&self, logs: &str) -> bool {
        self.pattern.is_match(tail_chars(logs, self.window))
    }
}

impl Default for BootBanner {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_BANNER.clone(),
            window: BOOT_BANNER_WINDOW,
        }
    }
}

/// The last `n` characters of `s`
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// A container engine that can run, inspect and stop test images
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Start `image` detached on the host network, removed once stopped
    async fn run(&self, image: &str) -> Result<ContainerId>;

    /// Everything the container has printed so far, stdout and stderr combined
    async fn logs(&self, id: &ContainerId) -> Result<String>;

    /// Stop the container
    async fn stop(&self, id: &ContainerId) -> Result<()>;
}

/// [`ContainerRuntime`] backed by the docker CLI (or a compatible one such as podman)
#[derive(Debug, Clone)]
pub struct DockerCli<L: Launcher = LocalLauncher> {
    binary: String,
    executor: Executor<L>,
}

impl DockerCli<LocalLauncher> {
    /// Use `docker` from `PATH`
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use a different docker-compatible binary
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self::with_launcher(binary, LocalLauncher)
    }
}

impl Default for DockerCli<LocalLauncher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Launcher> DockerCli<L> {
    /// Run the CLI through `launcher`, for example over SSH on a docker host
    pub fn with_launcher(binary: impl Into<String>, launcher: L) -> Self {
        Self {
            binary: binary.into(),
            executor: Executor::new("container-runtime".to_string(), launcher),
        }
    }

    async fn checked(&self, args: &[&str]) -> Result<ExitResult> {
        let cmd = Command::builder(&self.binary).args(args).build();
        let command = cmd.to_shell_string();
        let result = self.executor.execute(cmd).await?;
        if !result.success() {
            return Err(Error::CommandFailed {
                command,
                code: result.status.code,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}

#[async_trait]
impl<L: Launcher> ContainerRuntime for DockerCli<L> {
    async fn run(&self, image: &str) -> Result<ContainerId> {
        let result = self
            .checked(&["run", "--rm", "--network", "host", "-tid", image])
            .await?;
        let id = result.stdout.lines().next().unwrap_or_default().trim();
        if id.is_empty() {
            return Err(Error::CommandFailed {
                command: format!("{} run {}", self.binary, image),
                code: result.status.code,
                stderr: "no container id in output".to_string(),
            });
        }
        Ok(ContainerId::new(id))
    }

    async fn logs(&self, id: &ContainerId) -> Result<String> {
        Ok(self.checked(&["logs", id.as_str()]).await?.output)
    }

    async fn stop(&self, id: &ContainerId) -> Result<()> {
        self.checked(&["stop", id.as_str()]).await?;
        Ok(())
    }
}

/// Where and how a test container is reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerProps {
    /// Image to run, without tag when `append_client_version` is set
    pub image_name: String,
    /// Run `<image_name>:<client version>` instead of `image_name`
    pub append_client_version: bool,
    /// SSH login user
    pub user: String,
    /// SSH port on the host network
    pub port: u16,
    /// Private key accepted by the image
    pub key_filename: PathBuf,
    /// Set once the container is running
    #[serde(skip)]
    pub container_id: Option<ContainerId>,
}

impl ContainerProps {
    /// Image reference to run for `client_version`
    pub fn image(&self, client_version: &str) -> String {
        if self.append_client_version {
            format!("{}:{}", self.image_name, client_version)
        } else {
            self.image_name.clone()
        }
    }
}

/// Stops its container when torn down or dropped
pub struct ContainerGuard<R: ContainerRuntime> {
    runtime: Arc<R>,
    id: ContainerId,
    stopped: bool,
}

impl<R: ContainerRuntime> ContainerGuard<R> {
    /// Take responsibility for stopping `id`
    pub fn new(runtime: Arc<R>, id: ContainerId) -> Self {
        Self {
            runtime,
            id,
            stopped: false,
        }
    }

    /// The guarded container
    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    /// The runtime the container runs on
    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    /// Stop the container now
    pub async fn stop(mut self) -> Result<()> {
        self.stopped = true;
        info!("Stopping container {}", self.id);
        self.runtime.stop(&self.id).await
    }
}

impl<R: ContainerRuntime> Drop for ContainerGuard<R> {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        warn!("Container {} was not torn down, stopping it on drop", self.id);
        if let Err(e) = smol::block_on(self.runtime.stop(&self.id)) {
            error!("Failed to stop container {}: {}", self.id, e);
        }
    }
}

/// A booted container, ready for SSH connections
pub struct TestContainer<R: ContainerRuntime> {
    props: ContainerProps,
    guard: ContainerGuard<R>,
}

impl<R: ContainerRuntime> TestContainer<R> {
    /// Connection properties, with `container_id` filled in
    pub fn props(&self) -> &ContainerProps {
        &self.props
    }

    /// The running container
    pub fn id(&self) -> &ContainerId {
        self.guard.id()
    }

    /// Current container logs
    pub async fn logs(&self) -> Result<String> {
        self.guard.runtime().logs(self.guard.id()).await
    }

    /// Stop the container
    pub async fn teardown(self) -> Result<()> {
        self.guard.stop().await
    }
}

/// Poll the container logs until the boot banner shows up
///
/// Returns `Ok(false)` if the poller's deadline passes first.
pub async fn wait_for_container_boot<R>(
    runtime: &R,
    id: &ContainerId,
    banner: &BootBanner,
    poller: &Poller,
) -> Result<bool>
where
    R: ContainerRuntime + ?Sized,
{
    poller
        .poll(
            "container boot",
            move || async move {
                let logs = runtime.logs(id).await?;
                Ok(banner.matches_tail(&logs).into())
            },
            never_retry,
        )
        .await
}

/// Start the test container and wait for it to boot
///
/// The container is stopped again if it fails to boot in time, and otherwise
/// when the returned [`TestContainer`] is torn down or dropped.
pub async fn setup_test_container<R: ContainerRuntime>(
    runtime: Arc<R>,
    mut props: ContainerProps,
    client_version: &str,
    banner: &BootBanner,
    poller: &Poller,
) -> Result<TestContainer<R>> {
    let image = props.image(client_version);
    info!("Starting test container from {}", image);

    let id = runtime.run(&image).await?;
    debug!("Container {} started", id);
    props.container_id = Some(id.clone());
    let guard = ContainerGuard::new(runtime, id);

    let ready = wait_for_container_boot(&*guard.runtime, guard.id(), banner, poller).await?;
    if !ready {
        return Err(Error::BootTimeout);
    }

    info!("Container {} booted", guard.id());
    Ok(TestContainer { props, guard })
}
