//! JSON encodings of [`ItemRecord`].
//!
//! Per-item files are pretty-printed and overwritten on every write, because
//! the title-derived filename is the dedup key. Per-year files hold one
//! compact object per line so concurrent appends stay line-atomic.

use super::StoreError;
use crate::models::ItemRecord;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Write `record` to `path`, creating parent directories and replacing any
/// previous file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_item_file(path: &Path, record: &ItemRecord) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(record)?;

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| StoreError::io(dir, e))?;
    }
    fs::write(path, json)
        .await
        .map_err(|e| StoreError::io(path, e))?;

    debug!("Wrote item file");
    Ok(())
}

/// Encode `record` as a single newline-terminated JSON line.
pub fn encode_line(record: &ItemRecord) -> Result<String, StoreError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_line_is_single_line() {
        let record = ItemRecord::new(2020, "Multi\nLine Title", "Para one.\n\nPara two.");
        let line = encode_line(&record).unwrap();

        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with('\n'));
        let back: ItemRecord = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(back, record);
    }

    #[tokio::test]
    async fn test_write_item_file_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("2020").join("Paper.json");

        write_item_file(&path, &ItemRecord::new(2020, "Paper", "old")).await.unwrap();
        write_item_file(&path, &ItemRecord::new(2020, "Paper", "new")).await.unwrap();

        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored["abstract"], "new");
        assert_eq!(stored["year"], 2020);
        assert_eq!(stored["title"], "Paper");
    }
}
