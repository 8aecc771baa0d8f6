//! Index and listing page extraction.
//!
//! The index page links one listing per year (`/paper_files/paper/{year}`);
//! each listing links the detail pages of that year's items.

use super::PageShape;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

static YEAR_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="/paper_files/paper/"]"#).expect("year link selector"));

static CONFERENCE_ITEM_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"a[href$="Abstract-Conference.html"]"#).expect("conference item selector")
});

static LEGACY_ITEM_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href$="Abstract.html"]"#).expect("legacy item selector"));

/// A year listing discovered on the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearLink {
    pub year: i32,
    pub url: Url,
}

/// Extract year listing links from the index page.
///
/// The year is the last path segment of the link; links whose last segment is
/// not an integer are skipped. Duplicate years keep their first link.
pub fn parse_year_links(html: &str, base_url: &Url) -> Vec<YearLink> {
    let document = Html::parse_document(html);

    document
        .select(&YEAR_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| match base_url.join(href) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(%href, error = %e, "Skipping unresolvable year link");
                None
            }
        })
        .filter_map(|url| {
            let year = url
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .and_then(|last| last.parse::<i32>().ok());
            match year {
                Some(year) => Some(YearLink { year, url }),
                None => {
                    debug!(%url, "Skipping invalid year URL");
                    None
                }
            }
        })
        .unique_by(|link| link.year)
        .collect()
}

/// Extract detail page links from a listing page, resolved against `page_url`.
pub fn parse_item_links(html: &str, page_url: &Url, shape: PageShape) -> Vec<Url> {
    let document = Html::parse_document(html);
    let selector: &Selector = match shape {
        PageShape::Conference2022Plus => &*CONFERENCE_ITEM_LINK,
        PageShape::Legacy | PageShape::Benchmark => &*LEGACY_ITEM_LINK,
    };

    document
        .select(selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_PAGE: &str = r#"
        <html><body><ul>
          <li><a href="/paper_files/paper/2023">Advances 36 (NeurIPS 2023)</a></li>
          <li><a href="/paper_files/paper/2022">Advances 35 (NeurIPS 2022)</a></li>
          <li><a href="/paper_files/paper/2021/">Advances 34 (NeurIPS 2021)</a></li>
          <li><a href="/paper_files/paper/2022">duplicate</a></li>
          <li><a href="/paper_files/paper/latest">not a year</a></li>
          <li><a href="/admin/login">Login</a></li>
        </ul></body></html>
    "#;

    #[test]
    fn test_parse_year_links() {
        let base = Url::parse("https://papers.nips.cc").unwrap();
        let links = parse_year_links(INDEX_PAGE, &base);

        let years: Vec<i32> = links.iter().map(|l| l.year).collect();
        assert_eq!(years, vec![2023, 2022, 2021]);
        assert_eq!(links[0].url.as_str(), "https://papers.nips.cc/paper_files/paper/2023");
        assert_eq!(links[2].url.as_str(), "https://papers.nips.cc/paper_files/paper/2021/");
    }

    #[test]
    fn test_parse_item_links_conference_shape() {
        let page_url = Url::parse("https://papers.nips.cc/paper_files/paper/2022").unwrap();
        let html = r#"
            <a href="/paper_files/paper/2022/hash/aaa-Abstract-Conference.html">A</a>
            <a href="/paper_files/paper/2022/hash/bbb-Abstract-Datasets_and_Benchmarks.html">B</a>
            <a href="/paper_files/paper/2022/hash/ccc-Abstract-Conference.html">C</a>
            <a href="/paper_files/paper/2022/hash/aaa-Abstract-Conference.html">A again</a>
        "#;
        let links = parse_item_links(html, &page_url, PageShape::Conference2022Plus);

        assert_eq!(
            links.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec![
                "https://papers.nips.cc/paper_files/paper/2022/hash/aaa-Abstract-Conference.html",
                "https://papers.nips.cc/paper_files/paper/2022/hash/ccc-Abstract-Conference.html",
            ]
        );
    }

    #[test]
    fn test_parse_item_links_legacy_shape_resolves_relative() {
        let page_url = Url::parse("https://datasets-benchmarks-proceedings.neurips.cc/").unwrap();
        let html = r#"
            <a href="paper/2021/hash/x-Abstract.html">X</a>
            <a href="/paper/2021/hash/y-Abstract-round2.html">Y</a>
        "#;
        let links = parse_item_links(html, &page_url, PageShape::Benchmark);

        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0].as_str(),
            "https://datasets-benchmarks-proceedings.neurips.cc/paper/2021/hash/x-Abstract.html"
        );
    }

    #[test]
    fn test_legacy_listing_ignores_conference_links() {
        let page_url = Url::parse("https://papers.nips.cc/paper_files/paper/2019").unwrap();
        let html = r#"<a href="/a-Abstract-Conference.html">A</a><a href="/b-Abstract.html">B</a>"#;
        let links = parse_item_links(html, &page_url, PageShape::Legacy);

        assert_eq!(links.len(), 1);
        assert!(links[0].as_str().ends_with("/b-Abstract.html"));
    }
}
