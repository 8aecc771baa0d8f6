//! Run configuration.
//!
//! Values come from three layers, later ones winning:
//! 1. [`HarvestConfig::default`]
//! 2. an optional YAML file (`--config harvest.yaml`)
//! 3. command-line flags and their environment variables
//!
//! ```yaml
//! base_url: https://papers.nips.cc
//! workers: 20
//! max_attempts: 5
//! pdf_root: /data/pdfs
//! ```

use crate::cli::Cli;
use crate::fetch::RetryPolicy;
use crate::outputs::StoreLayout;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid year range {0:?}: expected START-END (e.g. 2019-2024) or a single year")]
    YearSyntax(String),

    #[error("year range {range} must lie within {min}-{max}")]
    YearsOutOfBounds { range: YearRange, min: i32, max: i32 },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// An inclusive, non-empty range of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Smallest range covering every year in `years`.
    pub fn covering(years: &BTreeSet<i32>) -> Option<Self> {
        Self::new(*years.first()?, *years.last()?)
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    pub fn years(&self) -> BTreeSet<i32> {
        (self.start..=self.end).collect()
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for YearRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = || ConfigError::YearSyntax(s.to_string());
        let parse = |part: &str| part.trim().parse::<i32>().map_err(|_| syntax());

        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (parse(start)?, parse(end)?),
            None => {
                let year = parse(s)?;
                (year, year)
            }
        };
        YearRange::new(start, end).ok_or_else(syntax)
    }
}

/// Every tunable of a harvest run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Index page listing one link per year.
    pub base_url: String,
    /// Listing of the 2021 datasets & benchmarks track.
    pub benchmarks_url: String,
    /// Prefix of the aggregate output files.
    pub source: String,
    /// Per-item JSON tree (`{metadata_root}/{year}/{title}.json`).
    pub metadata_root: PathBuf,
    /// Per-year JSON-lines files and the CSV export.
    pub scrape_root: PathBuf,
    /// Downloaded PDFs.
    pub pdf_root: PathBuf,
    /// Detail pages fetched concurrently.
    pub workers: usize,
    /// Attempts per request, the first one included.
    pub max_attempts: usize,
    /// Per-request timeout covering connect and body.
    pub timeout_secs: u64,
    /// Delay after the first failed attempt, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Earliest year accepted on the command line.
    pub min_year: i32,
    /// Latest year accepted on the command line.
    pub max_year: i32,
    pub download_attachments: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://papers.nips.cc".to_string(),
            benchmarks_url: "https://datasets-benchmarks-proceedings.neurips.cc".to_string(),
            source: "neurips".to_string(),
            metadata_root: PathBuf::from("metadata_storage"),
            scrape_root: PathBuf::from("."),
            pdf_root: PathBuf::from("scraped-pdfs"),
            workers: 50,
            max_attempts: 3,
            timeout_secs: 60,
            retry_base_delay_ms: 1000,
            min_year: 1987,
            max_year: 2024,
            download_attachments: false,
        }
    }
}

impl HarvestConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML config file. Missing keys keep their defaults; unknown
    /// keys are rejected.
    ///
    /// # Arguments
    ///
    /// * `path` - The `config.yaml` to read
    ///
    /// # Returns
    ///
    /// The parsed config, not yet validated. See [`HarvestConfig::validate`].
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Build the effective config from the CLI, loading `--config` if given.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Overlay every flag the user actually passed.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.base_url {
            self.base_url = url.clone();
        }
        if let Some(dir) = &cli.metadata_dir {
            self.metadata_root = dir.clone();
        }
        if let Some(dir) = &cli.scrape_dir {
            self.scrape_root = dir.clone();
        }
        if let Some(dir) = &cli.pdf_dir {
            self.pdf_root = dir.clone();
        }
        if let Some(workers) = cli.workers {
            self.workers = workers;
        }
        if let Some(attempts) = cli.max_attempts {
            self.max_attempts = attempts;
        }
        if let Some(secs) = cli.timeout_secs {
            self.timeout_secs = secs;
        }
        self.download_attachments |= cli.download_pdfs;
    }

    /// Check URLs parse, counts are non-zero, the year bounds are ordered
    /// and `source` is not blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("base_url", &self.base_url), ("benchmarks_url", &self.benchmarks_url)] {
            Url::parse(value).map_err(|e| ConfigError::Invalid {
                field,
                reason: format!("{value:?}: {e}"),
            })?;
        }
        let positive = [
            ("workers", self.workers as u64),
            ("max_attempts", self.max_attempts as u64),
            ("timeout_secs", self.timeout_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.min_year > self.max_year {
            return Err(ConfigError::Invalid {
                field: "min_year",
                reason: format!("{} is after max_year {}", self.min_year, self.max_year),
            });
        }
        if self.source.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "source",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Reject ranges outside the years the site is known to serve.
    pub fn check_years(&self, range: YearRange) -> Result<YearRange, ConfigError> {
        if range.start() < self.min_year || range.end() > self.max_year {
            return Err(ConfigError::YearsOutOfBounds {
                range,
                min: self.min_year,
                max: self.max_year,
            });
        }
        Ok(range)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout {
            metadata_root: self.metadata_root.clone(),
            scrape_root: self.scrape_root.clone(),
            pdf_root: self.pdf_root.clone(),
            source: self.source.clone(),
        }
    }
}
