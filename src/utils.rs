//! Helpers for filenames, title normalization, logging and output directories.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Longest sanitized filename stem, in bytes. Leaves room for a year prefix
/// and an extension under the common 255-byte filename limit.
const MAX_STEM_BYTES: usize = 200;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/*?:"<>|\x00-\x1f]"#).expect("filename regex"));

/// Replace path-unsafe characters with `_` to form a stable filename stem.
///
/// ```ignore
/// assert_eq!(sanitize_filename("a/b: c?"), "a_b_ c_");
/// ```
pub fn sanitize_filename(title: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(title.trim(), "_");
    let mut end = cleaned.len().min(MAX_STEM_BYTES);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    let stem = cleaned[..end].trim_end();
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem.to_string()
    }
}

/// Lowercase and collapse runs of whitespace; used for record identity.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate a string to at most `max` bytes for log output.
///
/// Long strings get `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    fs::write(&probe_path, b"").await?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Output directory is writable");
    Ok(())
}
