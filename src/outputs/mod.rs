//! Durable outputs of a harvest run.
//!
//! # Submodules
//!
//! - [`store`]: [`MetadataStore`], the single owner of all shared output state
//! - [`json`]: per-item JSON files and JSON-lines encoding
//! - [`csv_export`]: the flattened CSV export
//!
//! # Output Structure
//!
//! ```text
//! metadata_root/
//! └── 2020/
//!     └── Some Paper Title.json        # {year, title, abstract}
//!
//! scrape_root/
//! ├── neurips_metadata_2020.json       # one JSON object per line
//! └── neurips_metadata_2019-2020.csv   # year,title,abstract
//!
//! pdf_root/
//! └── 2020_Some Paper Title.pdf
//! ```

pub mod csv_export;
pub mod json;
pub mod store;

pub use store::{MetadataStore, RecordOutcome, StoreError, StoreLayout};
