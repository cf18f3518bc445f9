//! Test environment configuration.
//!
//! Loaded from YAML. Every field has a default, so an empty document is a
//! valid configuration. String values may reference environment variables as
//! `${VAR}` or `${VAR:-default}`.
//!
//! ```yaml
//! container:
//!   image_name: mendersoftware/mender-client-qemu
//!   append_client_version: true
//! ssh:
//!   port: 8822
//!   key_filename: ${HOME}/.ssh/id_rsa
//! client:
//!   version: ${MENDER_CLIENT_VERSION:-master}
//! readiness:
//!   boot_timeout_secs: 180
//! ```

use crate::artifact::DEFAULT_ARTIFACT_URL_TEMPLATE;
use crate::container::{BOOT_BANNER_PATTERN, BOOT_BANNER_WINDOW, BootBanner, ContainerProps};
use crate::connection::DEFAULT_SSH_TIMEOUT;
use crate::error::{Error, Result};
use crate::poll::Poller;
use crate::provision::ProvisionOptions;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Environment variable overriding `client.version`
pub const CLIENT_VERSION_ENV: &str = "MENDER_CLIENT_VERSION";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Complete test environment configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestEnvConfig {
    /// Image and runtime
    pub container: ContainerConfig,
    /// SSH login
    pub ssh: SshSettings,
    /// Client package
    pub client: ClientConfig,
    /// Polling deadlines
    pub readiness: ReadinessConfig,
}

/// Image and runtime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Image to boot
    pub image_name: String,
    /// Tag the image with the client version
    pub append_client_version: bool,
    /// docker-compatible CLI binary
    pub runtime: String,
    /// Regex marking a finished boot
    pub boot_banner: String,
    /// Trailing log characters searched for the banner
    pub boot_banner_window: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image_name: "mendersoftware/mender-client-qemu".to_string(),
            append_client_version: true,
            runtime: "docker".to_string(),
            boot_banner: BOOT_BANNER_PATTERN.to_string(),
            boot_banner_window: BOOT_BANNER_WINDOW,
        }
    }
}

/// SSH login settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Login user
    pub user: String,
    /// Port the image's sshd listens on
    pub port: u16,
    /// Private key accepted by the image
    pub key_filename: PathBuf,
    /// Connect, banner and authentication timeout
    pub timeout_secs: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        let key_filename = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".ssh").join("id_rsa"))
            .unwrap_or_else(|| PathBuf::from(".ssh/id_rsa"));
        Self {
            user: "root".to_string(),
            port: 8822,
            key_filename,
            timeout_secs: DEFAULT_SSH_TIMEOUT.as_secs(),
        }
    }
}

/// Client package settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client version to install and to tag the image with
    pub version: String,
    /// Package URL with `{version}` placeholders
    pub artifact_url_template: String,
    /// Install and configure the client after connecting
    pub provision: bool,
    /// Where the package is staged locally; the system temp dir if unset
    pub download_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: "master".to_string(),
            artifact_url_template: DEFAULT_ARTIFACT_URL_TEMPLATE.to_string(),
            provision: true,
            download_dir: None,
        }
    }
}

/// Polling deadlines and interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// How long to wait for the boot banner
    pub boot_timeout_secs: u64,
    /// How long to wait for the SSH probe to succeed
    pub probe_timeout_secs: u64,
    /// Pause between checks
    pub interval_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            boot_timeout_secs: 180,
            probe_timeout_secs: 60,
            interval_secs: 5,
        }
    }
}

impl TestEnvConfig {
    /// Parse a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML, substituting environment variables first
    pub fn from_yaml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(version) = std::env::var(CLIENT_VERSION_ENV) {
            if !version.is_empty() {
                self.client.version = version;
            }
        }
    }

    /// Reject configurations the fixtures cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.container.image_name.is_empty() {
            return Err(Error::Config("container.image_name must not be empty".to_string()));
        }
        if self.container.runtime.is_empty() {
            return Err(Error::Config("container.runtime must not be empty".to_string()));
        }
        if self.client.version.is_empty() {
            return Err(Error::Config("client.version must not be empty".to_string()));
        }
        if self.ssh.port == 0 {
            return Err(Error::Config("ssh.port must not be 0".to_string()));
        }
        if self.readiness.interval_secs == 0 {
            return Err(Error::Config("readiness.interval_secs must be positive".to_string()));
        }
        BootBanner::new(&self.container.boot_banner, self.container.boot_banner_window)?;
        Ok(())
    }

    /// Container properties for the container fixture
    pub fn container_props(&self) -> ContainerProps {
        ContainerProps {
            image_name: self.container.image_name.clone(),
            append_client_version: self.container.append_client_version,
            user: self.ssh.user.clone(),
            port: self.ssh.port,
            key_filename: self.ssh.key_filename.clone(),
            container_id: None,
        }
    }

    /// Boot banner detector
    pub fn boot_banner(&self) -> Result<BootBanner> {
        BootBanner::new(&self.container.boot_banner, self.container.boot_banner_window)
    }

    /// Poller for the boot wait: sleeps before every log check
    pub fn boot_poller(&self) -> Poller {
        Poller::new(
            Duration::from_secs(self.readiness.boot_timeout_secs),
            Duration::from_secs(self.readiness.interval_secs),
        )
        .sleep_before_each_check()
    }

    /// Poller for the SSH probe: first attempt is immediate
    pub fn probe_poller(&self) -> Poller {
        Poller::new(
            Duration::from_secs(self.readiness.probe_timeout_secs),
            Duration::from_secs(self.readiness.interval_secs),
        )
    }

    /// SSH connection timeout
    pub fn ssh_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.timeout_secs)
    }

    /// Provisioning options for the client fixture
    pub fn provision_options(&self) -> ProvisionOptions {
        ProvisionOptions {
            version: self.client.version.clone(),
            url_template: self.client.artifact_url_template.clone(),
            download_dir: self
                .client
                .download_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        }
    }
}

/// Substitute `${VAR}` and `${VAR:-default}` references
///
/// Fails listing every referenced variable that is unset and has no default.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();

    let output = ENV_VAR.replace_all(input, |caps: &regex::Captures<'_>| {
        let expr = &caps[1];
        let (name, default) = match expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (expr, None),
        };
        match (std::env::var(name), default) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(Error::Config(format!(
            "undefined environment variables: {}",
            missing.join(", ")
        )));
    }
    Ok(output.into_owned())
}
