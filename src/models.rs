//! Data models shared by the harvesting pipeline.
//!
//! - [`ItemRecord`]: one harvested paper, as persisted to every output file
//! - [`DetailPage`]: the raw extraction result of a detail page
//! - [`WorkUnit`]: a single fetch + parse + store job handed to the pool
//! - [`RunSummary`]: counters reported at the end of a run

use crate::scrapers::PageShape;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// A harvested item (paper) with its extracted text fields.
///
/// The serialized shape is `{year, title, abstract}`; `category` is only
/// present once an external classifier has written it back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ItemRecord {
    /// Proceedings year the item was listed under.
    pub year: i32,
    /// The item title, or `"Untitled"` when the page carried none.
    pub title: String,
    /// The abstract text, or `"No abstract available"`.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Category label assigned by the downstream classifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ItemRecord {
    pub fn new(year: i32, title: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        Self {
            year,
            title: title.into(),
            abstract_text: abstract_text.into(),
            category: None,
        }
    }

    /// Identity of the record: year plus the lowercased, whitespace-collapsed title.
    pub fn identity(&self) -> (i32, String) {
        (self.year, crate::utils::normalize_title(&self.title))
    }
}

/// Fields extracted from a single detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailPage {
    pub title: String,
    pub abstract_text: String,
    /// Raw `href` of the attachment anchor, unresolved.
    pub attachment_href: Option<String>,
}

/// One unit of work: fetch a detail page, parse it, store it.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub year: i32,
    pub detail_url: Url,
    pub shape: PageShape,
    pub download_attachment: bool,
}

/// Attachment counters for a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AttachmentStats {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Pages that had no anchor matching the shape's attachment rule.
    pub missing: usize,
}

/// Outcome of a complete [`crate::dispatch::Harvester::run`].
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    /// Work units produced by listing discovery.
    pub discovered: usize,
    /// Listing pages that could not be fetched.
    pub failed_listings: usize,
    pub recorded: usize,
    pub duplicates: usize,
    /// Units dropped after exhausting retries or failing to store.
    pub failed: usize,
    /// Units cut short by cancellation.
    pub abandoned: usize,
    pub attachments: AttachmentStats,
    pub csv_path: PathBuf,
    pub cancelled: bool,
}
