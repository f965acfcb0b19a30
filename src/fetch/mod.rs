//! Content-addressed artifact download through a public gateway.

use log::info;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Public IPFS gateway used when none is configured.
pub const DEFAULT_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs";

/// Download failures and local write failures are kept apart so the caller
/// can tell a network problem from a filesystem one.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to download {cid}: {source}")]
    Download { cid: String, source: reqwest::Error },

    #[error("gateway answered HTTP {status} for {cid}")]
    Status { cid: String, status: u16 },

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone)]
pub struct ContentFetcher {
    http: reqwest::Client,
    gateway: String,
}

impl ContentFetcher {
    pub fn new(gateway: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            gateway: gateway.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, cid: &str) -> String {
        format!("{}/{}", self.gateway, cid)
    }

    /// Fetch the bytes behind `cid` and write them to `dest`. Returns the
    /// number of bytes written.
    pub async fn fetch(&self, cid: &str, dest: &Path) -> Result<u64, FetchError> {
        let resp = self
            .http
            .get(self.url_for(cid))
            .send()
            .await
            .map_err(|source| FetchError::Download {
                cid: cid.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                cid: cid.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|source| FetchError::Download {
            cid: cid.to_string(),
            source,
        })?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|source| FetchError::Write {
                path: dest.to_path_buf(),
                source,
            })?;

        info!("downloaded {cid} to {} ({} bytes)", dest.display(), bytes.len());
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentFetcher, FetchError};

    #[test]
    fn builds_gateway_urls() {
        let f = ContentFetcher::new("https://gateway.example/ipfs/").unwrap();
        assert_eq!(f.url_for("bafy123"), "https://gateway.example/ipfs/bafy123");
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let f = ContentFetcher::new("http://127.0.0.1:1").unwrap();
        let err = f.fetch("bafy123", &dir.path().join("out")).await.unwrap_err();
        assert!(matches!(err, FetchError::Download { .. }), "{err}");
        assert!(!dir.path().join("out").exists());
    }
}
