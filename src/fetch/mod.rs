//! HTTP access for listing pages, detail pages and attachments.
//!
//! # Architecture
//!
//! - [`Fetch`]: the seam every network call goes through
//! - [`HttpFetcher`]: `reqwest`-backed implementation with a fixed per-request timeout
//! - [`RetryFetch`]: decorator adding exponential backoff to any [`Fetch`]
//! - [`fetch_attachment`]: skip-if-exists, temp-then-rename attachment download

pub mod attachment;
pub mod retry;

pub use attachment::{AttachmentOutcome, fetch_attachment};
pub use retry::{RetryFetch, RetryPolicy};

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Errors raised while talking to the remote site.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        FetchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Transport and HTTP status failures are worth another attempt;
    /// local filesystem failures are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Io { .. })
    }
}

/// Async access to remote resources.
pub trait Fetch {
    /// GET `url` and return the body as text.
    ///
    /// Non-2xx responses become [`FetchError::Status`].
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// GET `url` and stream the body into `dest`, truncating it first.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL of the attachment
    /// * `dest` - File to create or truncate; its directory must exist
    ///
    /// # Returns
    ///
    /// The number of bytes written. On error `dest` may hold a partial body,
    /// which is why callers hand in a temporary path.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// [`Fetch`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client whose every request, body included, must finish
    /// within `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self
            .send(url)
            .await?
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }

    #[instrument(level = "debug", skip(self), fields(dest = %dest.display()))]
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.send(url).await?;
        let mut file = fs::File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })? {
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(dest, e))?;
            written += chunk.len() as u64;
        }
        file.sync_all().await.map_err(|e| FetchError::io(dest, e))?;

        debug!(bytes = written, "Streamed download");
        Ok(written)
    }
}
