//! Integration-test environment for the Mender client.
//!
//! Boots a client image in a container, waits for its login prompt, opens an
//! SSH connection once sshd answers, and installs and configures the client
//! package when the image does not ship it.
//!
//! The steps are exposed individually ([`setup_test_container`],
//! [`setup_ssh_connection`], [`setup_client_configured`]) and bundled in
//! [`TestEnvironment`]:
//!
//! ```no_run
//! use mender_test_env::{RemoteShell, TestEnvConfig, TestEnvironment, logging};
//!
//! # fn main() -> mender_test_env::Result<()> {
//! logging::init_test_logging();
//! smol::block_on(async {
//!     let config = TestEnvConfig::from_env()?;
//!     let env = TestEnvironment::from_config(&config).await?;
//!
//!     let result = env.connection().run_checked("mender -version").await?;
//!     println!("{}", result.stdout);
//!
//!     env.teardown().await
//! })
//! # }
//! ```

#![warn(missing_docs)]

pub mod artifact;
pub mod config;
pub mod connection;
pub mod container;
pub mod device;
pub mod environment;
pub mod error;
pub mod logging;
pub mod poll;
pub mod provision;

pub use artifact::{ArtifactFetcher, HttpFetcher, LocalArtifact};
pub use config::TestEnvConfig;
pub use connection::{
    ConnectionParams, RemoteShell, SshConnection, new_tester_ssh_connection,
    probe_ssh_connection, setup_ssh_connection,
};
pub use container::{
    BootBanner, ContainerGuard, ContainerId, ContainerProps, ContainerRuntime, DockerCli,
    TestContainer, setup_test_container, wait_for_container_boot,
};
pub use device::DeviceType;
pub use environment::TestEnvironment;
pub use error::{Error, Result};
pub use poll::{Poller, Readiness};
pub use provision::{ProvisionOptions, Provisioned, setup_client_configured};

pub use command_executor::ExitResult;
