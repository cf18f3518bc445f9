//! Client package download.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where released client packages are published
pub const DEFAULT_ARTIFACT_URL_TEMPLATE: &str = "https://d1b0l86ne08fsf.cloudfront.net/{version}/dist-packages/debian/armhf/mender-client_{version}-1_armhf.deb";

/// Fill `{version}` in an artifact URL template
pub fn artifact_url(template: &str, version: &str) -> String {
    template.replace("{version}", version)
}

/// Last path segment of `url`, used as the local and remote file name
pub fn artifact_file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Fetches a package to a local file
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Download `url` into `dest`, creating or truncating it
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// [`ArtifactFetcher`] over HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Fetcher with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher using a preconfigured client (proxies, timeouts)
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        debug!("Downloading {} to {}", url, dest.display());
        let client = self.client.clone();
        let url = url.to_string();
        let dest = dest.to_path_buf();

        // The blocking client must stay off the async executor threads
        smol::unblock(move || {
            let download_error = |source| Error::Download {
                url: url.clone(),
                source,
            };
            let mut response = client
                .get(&url)
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(download_error)?;
            let mut file = File::create(&dest)?;
            let bytes = response.copy_to(&mut file).map_err(download_error)?;
            debug!("Downloaded {} bytes from {}", bytes, url);
            Ok(())
        })
        .await
    }
}

/// A downloaded package on local disk, deleted when dropped
#[derive(Debug)]
pub struct LocalArtifact {
    path: PathBuf,
}

impl LocalArtifact {
    /// Take ownership of `path`; the file need not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Drop for LocalArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Answer a single HTTP request with `response`, returning the package URL
    fn serve_once(response: &'static str) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            stream.write_all(response.as_bytes()).unwrap();
        });
        (format!("http://{}/2.1.0/mender-client_2.1.0-1_armhf.deb", addr), server)
    }

    fn fetcher() -> HttpFetcher {
        let client = reqwest::blocking::Client::builder().no_proxy().build().unwrap();
        HttpFetcher::with_client(client)
    }

    #[test]
    fn test_http_fetch_writes_body() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nclient-data",
        );
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(artifact_file_name(&url));

        smol::block_on(fetcher().fetch(&url, &dest)).unwrap();
        server.join().unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"client-data");
    }

    #[test]
    fn test_http_error_status_is_a_download_error() {
        let (url, server) = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found",
        );
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("client.deb");

        let err = smol::block_on(fetcher().fetch(&url, &dest)).unwrap_err();
        server.join().unwrap();

        match err {
            Error::Download { url: failed, source } => {
                assert_eq!(failed, url);
                assert_eq!(source.status(), Some(reqwest::StatusCode::NOT_FOUND));
            }
            other => panic!("expected download error, got {:?}", other),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn test_unreachable_server_is_a_download_error() {
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let url = format!("http://{}/client.deb", addr);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("client.deb");

        let err = smol::block_on(fetcher().fetch(&url, &dest)).unwrap_err();

        assert!(matches!(err, Error::Download { .. }));
    }

    #[test]
    fn test_default_artifact_url() {
        let url = artifact_url(DEFAULT_ARTIFACT_URL_TEMPLATE, "2.1.0");
        assert_eq!(
            url,
            "https://d1b0l86ne08fsf.cloudfront.net/2.1.0/dist-packages/debian/armhf/mender-client_2.1.0-1_armhf.deb"
        );
        assert_eq!(artifact_file_name(&url), "mender-client_2.1.0-1_armhf.deb");
    }

    #[test]
    fn test_file_name_ignores_query() {
        assert_eq!(
            artifact_file_name("https://example.com/pkgs/client.deb?token=abc"),
            "client.deb"
        );
    }

    #[test]
    fn test_local_artifact_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.deb");
        std::fs::write(&path, b"deb").unwrap();

        let artifact = LocalArtifact::new(&path);
        assert_eq!(artifact.file_name(), "client.deb");
        drop(artifact);

        assert!(!path.exists());
    }

    #[test]
    fn test_local_artifact_missing_file_is_fine() {
        let artifact = LocalArtifact::new("/nonexistent/never-downloaded.deb");
        drop(artifact);
    }
}
