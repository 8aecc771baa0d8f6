//! The metadata store: the only shared mutable state of a run.
//!
//! [`MetadataStore::record`] first claims the item's identity, then persists
//! it in three steps and only counts it once all three are done:
//!
//! 1. per-item JSON file (no lock, the claim makes the filename exclusive)
//! 2. one line in the per-year JSON-lines file (under the lines lock)
//! 3. push onto the in-memory aggregate (under the aggregate lock)
//!
//! A crash between steps therefore loses at most the in-memory entry, never
//! an on-disk file. A failed step releases the claim. The two locks are independent so file latency never
//! blocks [`MetadataStore::snapshot`] or the CSV export.

use super::{csv_export, json};
use crate::config::YearRange;
use crate::models::ItemRecord;
use crate::utils::sanitize_filename;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl StoreError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where every output file of a run lives.
///
/// All paths are derived here so the dispatcher, the CSV export and the
/// attachment download agree on names. Titles pass through
/// [`sanitize_filename`] before they become path components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    /// Root of the per-item JSON tree, one subdirectory per year.
    pub metadata_root: PathBuf,
    /// Directory holding the per-year JSON-lines files and the CSV export.
    pub scrape_root: PathBuf,
    /// Flat directory of downloaded PDFs.
    pub pdf_root: PathBuf,
    /// Filename prefix of the aggregate files, e.g. `neurips`.
    pub source: String,
}

impl StoreLayout {
    /// `{metadata_root}/{year}/{sanitized title}.json`
    pub fn item_path(&self, record: &ItemRecord) -> PathBuf {
        self.metadata_root
            .join(record.year.to_string())
            .join(format!("{}.json", sanitize_filename(&record.title)))
    }

    /// `{scrape_root}/{source}_metadata_{year}.json`
    pub fn year_lines_path(&self, year: i32) -> PathBuf {
        self.scrape_root
            .join(format!("{}_metadata_{}.json", self.source, year))
    }

    /// `{scrape_root}/{source}_metadata_{start}-{end}.csv`
    pub fn csv_path(&self, range: &YearRange) -> PathBuf {
        self.scrape_root.join(format!(
            "{}_metadata_{}-{}.csv",
            self.source,
            range.start(),
            range.end()
        ))
    }

    /// `{pdf_root}/{year}_{sanitized title}.pdf`
    pub fn attachment_path(&self, year: i32, title: &str) -> PathBuf {
        self.pdf_root
            .join(format!("{}.pdf", sanitize_filename(&format!("{year}_{title}"))))
    }
}

/// What [`MetadataStore::record`] did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// Same (year, title) already claimed this run. Nothing was written, so
    /// the per-item file, the lines file and the aggregate keep the first
    /// version.
    Duplicate,
}

#[derive(Debug, Default)]
struct Aggregate {
    records: Vec<ItemRecord>,
    /// Identities claimed by a `record` call, including ones still writing.
    claimed: HashSet<(i32, String)>,
}

/// Thread-safe store of harvested records.
#[derive(Debug)]
pub struct MetadataStore {
    layout: StoreLayout,
    lines: AsyncMutex<HashMap<i32, File>>,
    aggregate: Mutex<Aggregate>,
}

impl MetadataStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            lines: AsyncMutex::new(HashMap::new()),
            aggregate: Mutex::new(Aggregate::default()),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Persist `item` to its per-item file and per-year lines file, then
    /// register it in the aggregate.
    ///
    /// # Arguments
    ///
    /// * `item` - The harvested record
    ///
    /// # Returns
    ///
    /// [`RecordOutcome::Duplicate`] without touching disk when the identity is
    /// already claimed, [`RecordOutcome::Recorded`] once every target holds
    /// the record.
    ///
    /// # Errors
    ///
    /// The first I/O or encoding failure. The identity is released again, so
    /// a later copy of the same item can still be recorded.
    #[instrument(level = "debug", skip_all, fields(year = item.year, title = %item.title))]
    pub async fn record(&self, item: ItemRecord) -> Result<RecordOutcome, StoreError> {
        let identity = item.identity();
        let newly_claimed = self.aggregate().claimed.insert(identity.clone());
        if !newly_claimed {
            debug!("Duplicate item; keeping the first version");
            return Ok(RecordOutcome::Duplicate);
        }

        if let Err(e) = self.persist(&item).await {
            self.aggregate().claimed.remove(&identity);
            return Err(e);
        }

        self.aggregate().records.push(item);
        Ok(RecordOutcome::Recorded)
    }

    async fn persist(&self, item: &ItemRecord) -> Result<(), StoreError> {
        json::write_item_file(&self.layout.item_path(item), item).await?;
        self.append_line(item).await
    }

    /// Append one line under the lines lock.
    ///
    /// A failed write drops the cached handle and truncates the file back to
    /// its previous length, so no partial line remains for the next append
    /// to land behind.
    async fn append_line(&self, item: &ItemRecord) -> Result<(), StoreError> {
        let line = json::encode_line(item)?;
        let path = self.layout.year_lines_path(item.year);

        let mut files = self.lines.lock().await;
        let file = match files.entry(item.year) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if let Some(dir) = path.parent() {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .map_err(|e| StoreError::io(dir, e))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await
                    .map_err(|e| StoreError::io(&path, e))?;
                entry.insert(file)
            }
        };

        let previous_len = file.metadata().await.map(|m| m.len()).ok();
        let written = match file.write_all(line.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        let Err(e) = written else {
            return Ok(());
        };

        if let Some(file) = files.remove(&item.year) {
            if let Some(len) = previous_len {
                if let Err(trunc) = file.set_len(len).await {
                    warn!(path = %path.display(), error = %trunc, "Could not roll back partial line");
                }
            }
        }
        Err(StoreError::io(&path, e))
    }

    /// Number of records registered so far.
    pub fn len(&self) -> usize {
        self.aggregate().records.len()
    }

    /// Copy of the aggregate in insertion order.
    pub fn snapshot(&self) -> Vec<ItemRecord> {
        self.aggregate().records.clone()
    }

    /// Write every registered record within `range` to the run's CSV file.
    ///
    /// Rows follow insertion order. The file is replaced atomically, so the
    /// call can be repeated freely.
    ///
    /// # Arguments
    ///
    /// * `range` - Requested years; also names the file
    ///
    /// # Returns
    ///
    /// The path written, `{scrape_root}/{source}_metadata_{start}-{end}.csv`.
    #[instrument(level = "info", skip(self), fields(range = %range))]
    pub fn export_csv(&self, range: &YearRange) -> Result<PathBuf, StoreError> {
        let rows: Vec<ItemRecord> = self
            .snapshot()
            .into_iter()
            .filter(|record| range.contains(record.year))
            .collect();
        let path = self.layout.csv_path(range);

        let bytes = csv_export::render(&rows, &path)?;
        csv_export::write_atomic(&path, &bytes)?;

        info!(path = %path.display(), rows = rows.len(), "Exported CSV");
        Ok(path)
    }

    /// Save whatever has been collected so far; used on early exit.
    pub fn flush_partial(&self, range: &YearRange) -> Result<PathBuf, StoreError> {
        info!(records = self.len(), "Flushing partial results");
        self.export_csv(range)
    }

    fn aggregate(&self) -> MutexGuard<'_, Aggregate> {
        self.aggregate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
