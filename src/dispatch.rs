//! Year discovery and bounded fan-out of work units.
//!
//! # Pipeline
//!
//! 1. **Index**: fetch the site index and pick out the requested years
//! 2. **Listing**: fetch each year's listing (plus the 2021 benchmarks
//!    track) and turn every item link into a [`WorkUnit`]
//! 3. **Items**: run units through a pool of `workers` concurrent
//!    fetch → parse → attachment → store cycles
//! 4. **Export**: write the CSV for the requested range, on every exit path
//!
//! Discovery is lazy: listings are fetched only as the pool asks for more
//! work, and nothing new is pulled once the cancellation token fires.

use crate::config::{HarvestConfig, YearRange};
use crate::fetch::{AttachmentOutcome, Fetch, FetchError, RetryFetch, fetch_attachment};
use crate::models::{ItemRecord, RunSummary, WorkUnit};
use crate::outputs::{MetadataStore, RecordOutcome, StoreError};
use crate::scrapers::detail::parse_detail_page;
use crate::scrapers::listing::{parse_item_links, parse_year_links};
use crate::scrapers::{BENCHMARKS_YEAR, PageShape, Section};
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("no years requested")]
    NoYears,

    #[error("invalid {field} {url:?}: {source}")]
    InvalidUrl {
        field: &'static str,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to fetch the index page: {0}")]
    Index(#[source] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A listing page to enumerate.
#[derive(Debug, Clone)]
struct Listing {
    year: i32,
    url: Url,
    section: Section,
}

#[derive(Debug)]
enum AttachmentResult {
    NotRequested,
    /// The page had no link matching the shape's attachment rule.
    Missing,
    Done(AttachmentOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitStatus {
    Recorded,
    Duplicate,
    Failed,
    Abandoned,
}

#[derive(Debug)]
struct UnitReport {
    status: UnitStatus,
    attachment: AttachmentResult,
}

impl UnitReport {
    fn without_attachment(status: UnitStatus) -> Self {
        Self {
            status,
            attachment: AttachmentResult::NotRequested,
        }
    }
}

/// Drives a whole harvest run against one site.
#[derive(Debug)]
pub struct Harvester<F> {
    fetcher: RetryFetch<F>,
    store: MetadataStore,
    base_url: Url,
    benchmarks_url: Url,
    workers: usize,
}

impl<F: Fetch> Harvester<F> {
    pub fn new(
        fetcher: RetryFetch<F>,
        store: MetadataStore,
        config: &HarvestConfig,
    ) -> Result<Self, HarvestError> {
        let parse = |field: &'static str, url: &str| {
            Url::parse(url).map_err(|source| HarvestError::InvalidUrl {
                field,
                url: url.to_string(),
                source,
            })
        };
        Ok(Self {
            fetcher,
            store,
            base_url: parse("base_url", &config.base_url)?,
            benchmarks_url: parse("benchmarks_url", &config.benchmarks_url)?,
            workers: config.workers.max(1),
        })
    }

    #[cfg(test)]
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Harvest `years` and export the CSV covering them.
    ///
    /// Per-item failures never fail the run. The CSV is written even when
    /// the index fetch fails or the run is cancelled.
    #[instrument(level = "info", skip(self, cancel))]
    pub async fn run(
        &self,
        years: &BTreeSet<i32>,
        download_attachments: bool,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, HarvestError> {
        let range = YearRange::covering(years).ok_or(HarvestError::NoYears)?;
        let mut summary = RunSummary::default();

        let dispatched = self
            .dispatch(years, download_attachments, cancel, &mut summary)
            .await;

        summary.cancelled = cancel.is_cancelled();
        summary.csv_path = if summary.cancelled {
            self.store.flush_partial(&range)?
        } else {
            self.store.export_csv(&range)?
        };
        dispatched?;

        info!(
            discovered = summary.discovered,
            failed_listings = summary.failed_listings,
            recorded = summary.recorded,
            duplicates = summary.duplicates,
            failed = summary.failed,
            abandoned = summary.abandoned,
            cancelled = summary.cancelled,
            csv = %summary.csv_path.display(),
            "Harvest finished"
        );
        Ok(summary)
    }

    async fn dispatch(
        &self,
        years: &BTreeSet<i32>,
        download_attachments: bool,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), HarvestError> {
        let index_html = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            result = self.fetcher.get_text(self.base_url.as_str()) => result.map_err(HarvestError::Index)?,
        };

        let listings = self.select_listings(&index_html, years);
        let mut discovered = 0usize;
        let mut failed_listings = 0usize;

        let reports: Vec<UnitReport> = stream::iter(listings)
            .then(|listing| self.discover(listing, download_attachments))
            .inspect(|units| match units {
                Some(units) => discovered += units.len(),
                None => failed_listings += 1,
            })
            .flat_map(|units| stream::iter(units.unwrap_or_default()))
            .take_until(cancel.cancelled())
            .map(|unit| self.process(unit, cancel))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        summary.discovered = discovered;
        summary.failed_listings = failed_listings;
        for report in reports {
            match report.status {
                UnitStatus::Recorded => summary.recorded += 1,
                UnitStatus::Duplicate => summary.duplicates += 1,
                UnitStatus::Failed => summary.failed += 1,
                UnitStatus::Abandoned => summary.abandoned += 1,
            }
            let stats = &mut summary.attachments;
            match report.attachment {
                AttachmentResult::NotRequested => {}
                AttachmentResult::Missing => stats.missing += 1,
                AttachmentResult::Done(AttachmentOutcome::Written { .. }) => stats.written += 1,
                AttachmentResult::Done(AttachmentOutcome::Skipped) => stats.skipped += 1,
                AttachmentResult::Done(AttachmentOutcome::Failed(_)) => stats.failed += 1,
            }
        }
        Ok(())
    }

    /// Requested year listings found on the index, plus the benchmarks track.
    fn select_listings(&self, index_html: &str, years: &BTreeSet<i32>) -> Vec<Listing> {
        let mut listings = Vec::new();
        for link in parse_year_links(index_html, &self.base_url) {
            if years.contains(&link.year) {
                info!(year = link.year, url = %link.url, "Processing year");
                listings.push(Listing {
                    year: link.year,
                    url: link.url,
                    section: Section::Main,
                });
            } else {
                debug!(year = link.year, "Skipping year (not selected)");
            }
        }

        for year in years {
            if !listings.iter().any(|l| l.year == *year) {
                warn!(year, "Requested year not listed on the index page");
            }
        }

        if years.contains(&BENCHMARKS_YEAR) {
            listings.push(Listing {
                year: BENCHMARKS_YEAR,
                url: self.benchmarks_url.clone(),
                section: Section::Benchmarks,
            });
        }
        listings
    }

    /// Enumerate a listing's items; `None` when the listing could not be fetched.
    #[instrument(level = "info", skip(self, listing), fields(year = listing.year, url = %listing.url))]
    async fn discover(&self, listing: Listing, download_attachments: bool) -> Option<Vec<WorkUnit>> {
        let shape = PageShape::select(listing.year, listing.section);
        let html = match self.fetcher.get_text(listing.url.as_str()).await {
            Ok(html) => html,
            Err(e) => {
                error!(error = %e, "Failed to fetch listing; skipping it");
                return None;
            }
        };

        let units: Vec<WorkUnit> = parse_item_links(&html, &listing.url, shape)
            .into_iter()
            .map(|detail_url| WorkUnit {
                year: listing.year,
                detail_url,
                shape,
                download_attachment: download_attachments,
            })
            .collect();
        info!(%shape, count = units.len(), "Discovered items");
        Some(units)
    }

    /// One fetch → parse → attachment → store cycle.
    ///
    /// The network phase races the cancellation token; the store phase
    /// always runs to completion once started.
    async fn process(&self, unit: WorkUnit, cancel: &CancellationToken) -> UnitReport {
        let harvested = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url = %unit.detail_url, "Abandoning item on cancellation");
                return UnitReport::without_attachment(UnitStatus::Abandoned);
            }
            result = self.harvest(&unit) => result,
        };

        let (record, attachment) = match harvested {
            Ok(harvested) => harvested,
            Err(e) => {
                error!(url = %unit.detail_url, year = unit.year, error = %e, "Giving up on item");
                return UnitReport::without_attachment(UnitStatus::Failed);
            }
        };

        let status = match self.store.record(record).await {
            Ok(RecordOutcome::Recorded) => UnitStatus::Recorded,
            Ok(RecordOutcome::Duplicate) => UnitStatus::Duplicate,
            Err(e) => {
                error!(url = %unit.detail_url, error = %e, "Failed to store item");
                UnitStatus::Failed
            }
        };
        if let AttachmentResult::Done(AttachmentOutcome::Failed(reason)) = &attachment {
            warn!(url = %unit.detail_url, %reason, ?status, "Item kept without its PDF");
        }
        UnitReport { status, attachment }
    }

    #[instrument(level = "debug", skip_all, fields(url = %unit.detail_url, shape = %unit.shape))]
    async fn harvest(&self, unit: &WorkUnit) -> Result<(ItemRecord, AttachmentResult), FetchError> {
        let html = self.fetcher.get_text(unit.detail_url.as_str()).await?;
        let page = parse_detail_page(&html, unit.shape);
        debug!(
            title = %page.title,
            abstract_preview = %truncate_for_log(&page.abstract_text, 80),
            "Parsed item"
        );

        let attachment = if !unit.download_attachment {
            AttachmentResult::NotRequested
        } else {
            match page.attachment_href.as_deref().map(|href| unit.detail_url.join(href)) {
                Some(Ok(pdf_url)) => {
                    let dest = self.store.layout().attachment_path(unit.year, &page.title);
                    AttachmentResult::Done(fetch_attachment(&self.fetcher, pdf_url.as_str(), &dest).await)
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Unresolvable PDF link; recording text only");
                    AttachmentResult::Missing
                }
                None => {
                    warn!("No PDF link found; recording text only");
                    AttachmentResult::Missing
                }
            }
        };

        Ok((ItemRecord::new(unit.year, page.title, page.abstract_text), attachment))
    }
}
