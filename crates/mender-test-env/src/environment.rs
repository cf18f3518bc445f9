//! The full fixture chain: container, connection, client.

use crate::artifact::{ArtifactFetcher, HttpFetcher};
use crate::config::TestEnvConfig;
use crate::connection::{SshConnection, setup_ssh_connection};
use crate::container::{ContainerRuntime, DockerCli, TestContainer, setup_test_container};
use crate::error::Result;
use crate::provision::{Provisioned, setup_client_configured};
use std::sync::Arc;
use tracing::info;

/// A booted container with a live SSH connection and, optionally, the client installed
///
/// Call [`teardown`](TestEnvironment::teardown) when done; dropping the
/// environment also stops the container.
pub struct TestEnvironment<R: ContainerRuntime = DockerCli> {
    container: TestContainer<R>,
    connection: SshConnection,
    provisioned: Option<Provisioned>,
}

impl TestEnvironment<DockerCli> {
    /// Set up with the configured docker CLI and package downloads over HTTP
    pub async fn from_config(config: &TestEnvConfig) -> Result<Self> {
        let runtime = Arc::new(DockerCli::with_binary(&config.container.runtime));
        Self::setup(config, runtime, &HttpFetcher::new()).await
    }
}

impl<R: ContainerRuntime> TestEnvironment<R> {
    /// Boot the container, connect, and provision the client if configured
    ///
    /// On failure at any step the container is stopped before returning.
    pub async fn setup<F>(config: &TestEnvConfig, runtime: Arc<R>, fetcher: &F) -> Result<Self>
    where
        F: ArtifactFetcher + ?Sized,
    {
        let container = setup_test_container(
            runtime,
            config.container_props(),
            &config.client.version,
            &config.boot_banner()?,
            &config.boot_poller(),
        )
        .await?;

        let connection =
            setup_ssh_connection(&container, config.ssh_timeout(), &config.probe_poller()).await?;

        let provisioned = if config.client.provision {
            Some(setup_client_configured(&connection, fetcher, &config.provision_options()).await?)
        } else {
            None
        };

        info!("Test environment ready in container {}", container.id());
        Ok(Self {
            container,
            connection,
            provisioned,
        })
    }

    /// The booted container
    pub fn container(&self) -> &TestContainer<R> {
        &self.container
    }

    /// The probed SSH connection
    pub fn connection(&self) -> &SshConnection {
        &self.connection
    }

    /// Provisioning outcome, `None` if provisioning was disabled
    pub fn provisioned(&self) -> Option<Provisioned> {
        self.provisioned
    }

    /// Stop the container
    pub async fn teardown(self) -> Result<()> {
        self.container.teardown().await
    }
}
