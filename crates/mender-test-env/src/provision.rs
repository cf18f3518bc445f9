//! Installing and configuring the client inside the test container.

use crate::artifact::{ArtifactFetcher, LocalArtifact, artifact_file_name, artifact_url};
use crate::connection::RemoteShell;
use crate::device::{DEVICE_TYPE_PATH, DeviceType};
use crate::error::Result;
use command_executor::command::shell_escape;
use std::path::PathBuf;
use tracing::info;

/// Present once the client is installed
pub const CLIENT_BINARY: &str = "/usr/bin/mender";

/// Client state directory holding the device_type file
pub const CLIENT_STATE_DIR: &str = "/var/lib/mender";

/// Which client package to install and where to stage it locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Client version, substituted into the URL template
    pub version: String,
    /// Package URL with `{version}` placeholders
    pub url_template: String,
    /// Local directory the package is downloaded into
    pub download_dir: PathBuf,
}

/// What provisioning did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// The client binary was already on the device; nothing was changed
    AlreadyInstalled,
    /// The package was installed and the device type written
    Installed(DeviceType),
}

/// Make sure the client is installed and knows its device type
///
/// Skips everything if the client binary is already present. Otherwise
/// downloads the package, uploads and installs it, then writes the device
/// type for the machine's architecture. The local download is removed
/// whether or not installation succeeds.
pub async fn setup_client_configured<S, F>(
    shell: &S,
    fetcher: &F,
    options: &ProvisionOptions,
) -> Result<Provisioned>
where
    S: RemoteShell + ?Sized,
    F: ArtifactFetcher + ?Sized,
{
    if shell
        .run(&format!("test -x {}", CLIENT_BINARY))
        .await?
        .success()
    {
        info!("Client already installed, skipping provisioning");
        return Ok(Provisioned::AlreadyInstalled);
    }

    let url = artifact_url(&options.url_template, &options.version);
    let artifact = LocalArtifact::new(options.download_dir.join(artifact_file_name(&url)));

    let installed = install_package(shell, fetcher, &url, &artifact).await;
    drop(artifact);
    installed?;

    let machine = shell.run_checked("uname -m").await?.stdout;
    let device_type = DeviceType::from_machine(machine.trim())?;
    info!("Configuring device type {}", device_type);

    shell
        .sudo_checked(&format!("mkdir -p {}", CLIENT_STATE_DIR))
        .await?;
    shell
        .run_checked(&format!(
            "echo {} | sudo tee {}",
            device_type.config_line(),
            DEVICE_TYPE_PATH
        ))
        .await?;

    Ok(Provisioned::Installed(device_type))
}

async fn install_package<S, F>(
    shell: &S,
    fetcher: &F,
    url: &str,
    artifact: &LocalArtifact,
) -> Result<()>
where
    S: RemoteShell + ?Sized,
    F: ArtifactFetcher + ?Sized,
{
    info!("Installing client from {}", url);
    fetcher.fetch(url, artifact.path()).await?;

    let remote = artifact.file_name();
    shell.put(artifact.path(), &remote).await?;
    shell
        .sudo_checked(&format!("dpkg -i {}", shell_escape(&remote)))
        .await?;
    Ok(())
}
