//! Idempotent attachment downloads.
//!
//! A file at the destination path is proof of an earlier successful download,
//! so the body is always streamed into a temporary sibling first and only
//! renamed into place once it is complete. The temporary file is removed on
//! failure and when the download future is dropped.

use super::{Fetch, FetchError};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Result of [`fetch_attachment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// The destination already existed; no request was made.
    Skipped,
    Written { bytes: u64 },
    Failed(String),
}

/// Download `url` to `destination` unless it is already there.
#[instrument(level = "info", skip(fetcher), fields(dest = %destination.display()))]
pub async fn fetch_attachment<F: Fetch>(
    fetcher: &F,
    url: &str,
    destination: &Path,
) -> AttachmentOutcome {
    if fs::try_exists(destination).await.unwrap_or(false) {
        info!("Attachment already exists");
        return AttachmentOutcome::Skipped;
    }

    match download_via_temp(fetcher, url, destination).await {
        Ok(bytes) => {
            info!(bytes, "Downloaded attachment");
            AttachmentOutcome::Written { bytes }
        }
        Err(e) => {
            warn!(error = %e, "Attachment download failed");
            AttachmentOutcome::Failed(e.to_string())
        }
    }
}

async fn download_via_temp<F: Fetch>(
    fetcher: &F,
    url: &str,
    destination: &Path,
) -> Result<u64, FetchError> {
    let dir = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .await
        .map_err(|e| FetchError::io(dir, e))?;

    let temp = tempfile::Builder::new()
        .prefix(".partial-")
        .suffix(".download")
        .tempfile_in(dir)
        .map_err(|e| FetchError::io(dir, e))?
        .into_temp_path();

    let bytes = fetcher.download(url, &temp).await?;

    temp.persist(destination)
        .map_err(|e| FetchError::io(destination, e.error))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::MockSite;

    const PDF_URL: &str = "https://example.org/paper/x-Paper.pdf";

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_existing_file_is_skipped_without_request() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("2020_Paper.pdf");
        std::fs::write(&dest, b"already here").unwrap();
        let site = MockSite::new().file(PDF_URL, b"new bytes");

        let outcome = fetch_attachment(&site, PDF_URL, &dest).await;

        assert_eq!(outcome, AttachmentOutcome::Skipped);
        assert_eq!(site.download_count(), 0);
        assert_eq!(std::fs::read(&dest).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn test_download_lands_at_destination_only() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("pdfs").join("2020_Paper.pdf");
        let site = MockSite::new().file(PDF_URL, b"%PDF-1.7 body");

        let outcome = fetch_attachment(&site, PDF_URL, &dest).await;

        assert_eq!(outcome, AttachmentOutcome::Written { bytes: 13 });
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7 body");
        assert_eq!(dir_entries(dest.parent().unwrap()), vec!["2020_Paper.pdf"]);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("2020_Paper.pdf");
        let site = MockSite::new().broken_file(PDF_URL);

        let outcome = fetch_attachment(&site, PDF_URL, &dest).await;

        assert!(matches!(outcome, AttachmentOutcome::Failed(ref reason) if reason.contains("502")));
        assert!(!dest.exists());
        assert!(dir_entries(tmp.path()).is_empty());

        // A later retry is not fooled into skipping.
        let site = MockSite::new().file(PDF_URL, b"ok");
        let outcome = fetch_attachment(&site, PDF_URL, &dest).await;
        assert_eq!(outcome, AttachmentOutcome::Written { bytes: 2 });
    }

    #[tokio::test]
    async fn test_missing_remote_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("2020_Missing.pdf");

        let outcome = fetch_attachment(&MockSite::new(), PDF_URL, &dest).await;

        assert!(matches!(outcome, AttachmentOutcome::Failed(_)));
        assert!(dir_entries(tmp.path()).is_empty());
    }
}
