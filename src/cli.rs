//! Command-line interface.
//!
//! Every flag is optional except `--years`; unset flags fall back to the
//! YAML config file (when given) and then to built-in defaults.

use crate::config::YearRange;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for a harvest run.
///
/// # Examples
///
/// ```sh
/// # Metadata only, two years
/// proceedings_harvest --years 2019-2020
///
/// # Metadata and PDFs, custom output roots
/// proceedings_harvest -y 2022 --download-pdfs --pdf-dir /data/pdfs --metadata-dir /data/meta
///
/// # Settings from a file, overriding the worker count
/// proceedings_harvest -y 2021 -c harvest.yaml -w 10
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Inclusive year range to harvest, e.g. 2019-2024, or a single year
    #[arg(short, long, env = "HARVEST_YEARS")]
    pub years: YearRange,

    /// Download paper PDFs as well as metadata
    #[arg(short = 'p', long)]
    pub download_pdfs: bool,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Site index listing one link per year
    #[arg(long, env = "HARVEST_BASE_URL")]
    pub base_url: Option<String>,

    /// Root directory for per-item JSON files
    #[arg(long)]
    pub metadata_dir: Option<PathBuf>,

    /// Directory for the per-year JSON-lines files and the CSV export
    #[arg(long)]
    pub scrape_dir: Option<PathBuf>,

    /// Directory for downloaded PDFs
    #[arg(long)]
    pub pdf_dir: Option<PathBuf>,

    /// Number of items processed concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Attempts per request before an item is given up
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "proceedings_harvest",
            "--years",
            "2019-2024",
            "--download-pdfs",
            "--pdf-dir",
            "./pdfs",
        ]);

        assert_eq!(cli.years, YearRange::new(2019, 2024).unwrap());
        assert!(cli.download_pdfs);
        assert_eq!(cli.pdf_dir, Some(PathBuf::from("./pdfs")));
        assert_eq!(cli.workers, None);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["proceedings_harvest", "-y", "2021", "-w", "8", "-c", "h.yaml", "-p"]);

        assert_eq!(cli.years, YearRange::new(2021, 2021).unwrap());
        assert_eq!(cli.workers, Some(8));
        assert_eq!(cli.config, Some(PathBuf::from("h.yaml")));
        assert!(cli.download_pdfs);
    }

    #[test]
    fn test_cli_rejects_bad_range() {
        assert!(Cli::try_parse_from(["proceedings_harvest", "--years", "2024-2019"]).is_err());
    }
}
