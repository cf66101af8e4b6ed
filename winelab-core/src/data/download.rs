//! Archive download: the fetcher abstraction and the verify/re-fetch policy.
//!
//! The `Fetcher` trait abstracts over where archive bytes come from so the
//! retry policy can be exercised in tests without a network.

use super::archive::has_zip_signature;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from downloading, verifying, or extracting the dataset archive.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to download a valid ZIP file to {}", .0.display())]
    Integrity(PathBuf),

    #[error("cannot extract: invalid ZIP file {}", .0.display())]
    InvalidArchive(PathBuf),

    #[error("zip error in {}: {reason}", path.display())]
    Zip { path: PathBuf, reason: String },

    #[error("archive entry '{0}' escapes the extraction directory")]
    UnsafeEntry(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl IngestError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Source of archive bytes.
pub trait Fetcher {
    /// Human-readable name of this fetcher.
    fn name(&self) -> &str;

    /// Fetch `url` into `dest`, replacing any existing file. Returns bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, IngestError>;
}

/// Blocking HTTP fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, IngestError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Network {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, IngestError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| IngestError::io(parent, e))?;
        }

        let mut resp = self.client.get(url).send().map_err(|e| IngestError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IngestError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        debug!(url, headers = ?resp.headers(), "download headers");

        let mut file = fs::File::create(dest).map_err(|e| IngestError::io(dest, e))?;
        let written = resp.copy_to(&mut file).map_err(|e| IngestError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(written)
    }
}

/// Make sure a valid archive exists at `path`.
///
/// Fetches when the file is absent. A file that fails the signature check
/// (corrupt or partial download) is deleted and fetched exactly once more;
/// if it is still invalid the result is `IngestError::Integrity`.
pub fn ensure_archive(fetcher: &dyn Fetcher, url: &str, path: &Path) -> Result<(), IngestError> {
    if !path.exists() {
        info!(url, path = %path.display(), fetcher = fetcher.name(), "downloading archive");
        let bytes = fetcher.fetch(url, path)?;
        info!(path = %path.display(), bytes, "file downloaded");
    } else {
        info!(path = %path.display(), "archive already present, skipping download");
    }

    if has_zip_signature(path) {
        return Ok(());
    }

    warn!(path = %path.display(), "invalid ZIP file detected, attempting to download again");
    if path.exists() {
        fs::remove_file(path).map_err(|e| IngestError::io(path, e))?;
    }
    fetcher.fetch(url, path)?;

    if has_zip_signature(path) {
        Ok(())
    } else {
        Err(IngestError::Integrity(path.to_path_buf()))
    }
}
