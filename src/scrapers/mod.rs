//! HTML extraction for the proceedings site.
//!
//! The site changed its markup across eras, so every detail and listing page
//! is parsed according to a [`PageShape`] chosen by [`PageShape::select`].
//!
//! | Shape | Used for | Title source | Item links | Attachment link |
//! |-------|----------|--------------|------------|-----------------|
//! | [`PageShape::Conference2022Plus`] | main track, 2022 onwards | `<title>` minus site suffix | `…Abstract-Conference.html` | `…Paper-Conference.pdf` |
//! | [`PageShape::Legacy`] | main track, up to 2021 | first `<h4>` | `…Abstract.html` | contains `Paper.pdf` |
//! | [`PageShape::Benchmark`] | 2021 datasets & benchmarks track | first `<h4>` | `…Abstract.html` | contains `Paper.pdf` |
//!
//! Everything in here is pure: no I/O, deterministic output for identical input.
//!
//! - [`listing`]: year links on the index page, item links on a listing page
//! - [`detail`]: title, abstract and attachment link of one detail page

pub mod detail;
pub mod listing;

use std::fmt;

/// Last year served with the legacy markup.
pub const LAST_LEGACY_YEAR: i32 = 2021;

/// Year whose listing is accompanied by a separate benchmarks track.
pub const BENCHMARKS_YEAR: i32 = 2021;

/// Which part of the site a listing belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Main,
    Benchmarks,
}

/// Markup layout of a listing/detail page pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageShape {
    Conference2022Plus,
    Legacy,
    Benchmark,
}

impl PageShape {
    /// Pick the shape for a year and section.
    pub fn select(year: i32, section: Section) -> Self {
        match section {
            Section::Benchmarks => PageShape::Benchmark,
            Section::Main if year > LAST_LEGACY_YEAR => PageShape::Conference2022Plus,
            Section::Main => PageShape::Legacy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageShape::Conference2022Plus => "conference-2022-plus",
            PageShape::Legacy => "legacy",
            PageShape::Benchmark => "benchmark-track",
        }
    }
}

impl fmt::Display for PageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collect the visible text of an element with whitespace runs collapsed.
pub(crate) fn element_text(element: scraper::ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
