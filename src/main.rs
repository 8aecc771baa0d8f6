//! # Proceedings Harvest
//!
//! Harvests paper metadata (title, abstract) and optionally the PDFs from a
//! year-indexed proceedings site such as <https://papers.nips.cc>.
//!
//! ## Usage
//!
//! ```sh
//! proceedings_harvest --years 2019-2024 --download-pdfs
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: read the index page and the listing of each requested year
//! 2. **Harvest**: fetch, parse and store every item, 50 at a time by default
//! 3. **Export**: write the CSV covering the requested years
//!
//! Ctrl-C stops the run early; everything recorded so far is still exported.

use clap::Parser;
use std::error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dispatch;
mod fetch;
mod interrupt;
mod models;
mod outputs;
mod scrapers;
mod utils;

use cli::Cli;
use config::HarvestConfig;
use dispatch::Harvester;
use fetch::{HttpFetcher, RetryFetch};
use outputs::MetadataStore;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("proceedings_harvest starting up");

    let args = Cli::parse();
    let config = HarvestConfig::load(&args)?;
    let range = config.check_years(args.years)?;
    debug!(?config, "Effective configuration");
    info!(%range, download_pdfs = config.download_attachments, "Scraping years");

    for dir in [&config.metadata_root, &config.scrape_root, &config.pdf_root] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    let fetcher = RetryFetch::new(HttpFetcher::new(config.timeout())?, config.retry_policy());
    let store = MetadataStore::new(config.layout());
    let harvester = Harvester::new(fetcher, store, &config)?;

    let cancel = CancellationToken::new();
    let watcher = interrupt::spawn_ctrl_c_watcher(cancel.clone());

    let result = harvester
        .run(&range.years(), config.download_attachments, &cancel)
        .await;
    watcher.abort();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Harvest failed");
            return Err(e.into());
        }
    };

    if summary.cancelled {
        warn!(
            recorded = summary.recorded,
            csv = %summary.csv_path.display(),
            "Interrupted; partial results saved"
        );
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        recorded = summary.recorded,
        failed = summary.failed,
        failed_listings = summary.failed_listings,
        pdfs_written = summary.attachments.written,
        pdfs_skipped = summary.attachments.skipped,
        pdfs_failed = summary.attachments.failed,
        pdfs_missing = summary.attachments.missing,
        csv = %summary.csv_path.display(),
        "Execution complete"
    );

    Ok(())
}
