//! Detail page extraction.
//!
//! A detail page yields a title, an abstract and, when present, the `href` of
//! the paper PDF. Missing fields degrade to placeholders; parsing never fails.

use super::{PageShape, element_text};
use crate::models::DetailPage;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

pub const UNTITLED: &str = "Untitled";
pub const NO_ABSTRACT: &str = "No abstract available";

/// Suffix the 2022+ pages append to `<title>`, matched after whitespace collapsing.
const SITE_TITLE_SUFFIX: &str = "- NeurIPS";

struct DetailSelectors {
    page_title: Selector,
    heading: Selector,
    heading_or_paragraph: Selector,
    conference_pdf: Selector,
    legacy_pdf: Selector,
}

static SELECTORS: Lazy<DetailSelectors> = Lazy::new(|| DetailSelectors {
    page_title: Selector::parse("title").expect("title selector"),
    heading: Selector::parse("h4").expect("heading selector"),
    heading_or_paragraph: Selector::parse("h4, p").expect("heading/paragraph selector"),
    conference_pdf: Selector::parse(r#"a[href$="Paper-Conference.pdf"]"#)
        .expect("conference pdf selector"),
    legacy_pdf: Selector::parse(r#"a[href*="Paper.pdf"]"#).expect("legacy pdf selector"),
});

static ABSTRACT_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)abstract").expect("abstract heading regex"));

/// Parse a detail page according to its shape.
pub fn parse_detail_page(html: &str, shape: PageShape) -> DetailPage {
    let document = Html::parse_document(html);

    let title = match shape {
        PageShape::Conference2022Plus => conference_title(&document),
        PageShape::Legacy | PageShape::Benchmark => first_heading_title(&document),
    }
    .unwrap_or_else(|| UNTITLED.to_string());

    DetailPage {
        title,
        abstract_text: abstract_text(&document).unwrap_or_else(|| NO_ABSTRACT.to_string()),
        attachment_href: attachment_href(&document, shape),
    }
}

fn conference_title(document: &Html) -> Option<String> {
    let text = element_text(document.select(&SELECTORS.page_title).next()?);
    let text = text.strip_suffix(SITE_TITLE_SUFFIX).unwrap_or(&text).trim();
    non_empty(text.to_string())
}

fn first_heading_title(document: &Html) -> Option<String> {
    non_empty(element_text(document.select(&SELECTORS.heading).next()?))
}

/// First non-empty `<p>` after the abstract heading.
///
/// The heading is the first `<h4>` reading exactly "Abstract" (any case). Only
/// when no such heading exists is the first `<h4>` mentioning the word used,
/// so a title like "Abstract Reasoning" never shadows the real section.
fn abstract_text(document: &Html) -> Option<String> {
    let blocks: Vec<ElementRef<'_>> = document.select(&SELECTORS.heading_or_paragraph).collect();
    let heading_text = |el: &ElementRef<'_>| is_heading(el).then(|| element_text(*el));

    let start = blocks
        .iter()
        .position(|el| heading_text(el).is_some_and(|t| t.eq_ignore_ascii_case("abstract")))
        .or_else(|| {
            blocks
                .iter()
                .position(|el| heading_text(el).is_some_and(|t| ABSTRACT_HEADING.is_match(&t)))
        })?;

    blocks[start + 1..]
        .iter()
        .filter(|el| !is_heading(el))
        .map(|el| element_text(*el))
        .find(|text| !text.is_empty())
}

fn attachment_href(document: &Html, shape: PageShape) -> Option<String> {
    let selector = match shape {
        PageShape::Conference2022Plus => &SELECTORS.conference_pdf,
        PageShape::Legacy | PageShape::Benchmark => &SELECTORS.legacy_pdf,
    };
    document
        .select(selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
}

fn is_heading(el: &ElementRef<'_>) -> bool {
    el.value().name() == "h4"
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFERENCE_PAGE: &str = r#"
        <html><head><title>Scaling Laws for Everything - NeurIPS</title></head>
        <body>
          <div class="container-fluid">
            <h4>Scaling Laws for Everything</h4>
            <p>Part of Advances in Neural Information Processing Systems 35 (NeurIPS 2022)</p>
            <a href="/paper_files/paper/2022/file/abc-Paper-Conference.pdf">Paper</a>
            <a href="/paper_files/paper/2022/file/abc-Supplemental-Conference.zip">Supplemental</a>
            <h4>Abstract</h4>
            <p>We study   scaling
               behaviour.</p>
          </div>
        </body></html>
    "#;

    const LEGACY_PAGE: &str = r#"
        <html><head><title>NeurIPS Proceedings</title></head>
        <body>
          <h4>Learning to Learn</h4>
          <p>Authors</p>
          <a href="/paper/2016/file/def-Paper.pdf">Paper</a>
          <h4>abstract</h4>
          <p></p>
          <p>Meta <em>learning</em> works.</p>
        </body></html>
    "#;

    #[test]
    fn test_conference_page_fields() {
        let page = parse_detail_page(CONFERENCE_PAGE, PageShape::Conference2022Plus);

        assert_eq!(page.title, "Scaling Laws for Everything");
        assert_eq!(page.abstract_text, "We study scaling behaviour.");
        assert_eq!(
            page.attachment_href.as_deref(),
            Some("/paper_files/paper/2022/file/abc-Paper-Conference.pdf")
        );
    }

    #[test]
    fn test_legacy_page_skips_empty_paragraph() {
        let page = parse_detail_page(LEGACY_PAGE, PageShape::Legacy);

        assert_eq!(page.title, "Learning to Learn");
        assert_eq!(page.abstract_text, "Meta learning works.");
        assert_eq!(page.attachment_href.as_deref(), Some("/paper/2016/file/def-Paper.pdf"));
    }

    #[test]
    fn test_conference_page_skips_empty_paragraph() {
        let html = r#"<title>T - NeurIPS</title><h4>ABSTRACT</h4><p>  </p><p>Real text</p>"#;
        let page = parse_detail_page(html, PageShape::Conference2022Plus);
        assert_eq!(page.abstract_text, "Real text");
    }

    #[test]
    fn test_benchmark_page_uses_heading_title() {
        let page = parse_detail_page(LEGACY_PAGE, PageShape::Benchmark);
        assert_eq!(page.title, "Learning to Learn");
        assert_eq!(page.abstract_text, "Meta learning works.");
    }

    #[test]
    fn test_missing_abstract_heading_gives_placeholder() {
        let html = "<html><body><h4>Only a Title</h4><p>Not an abstract</p></body></html>";

        for shape in [PageShape::Conference2022Plus, PageShape::Legacy, PageShape::Benchmark] {
            let page = parse_detail_page(html, shape);
            assert_eq!(page.abstract_text, NO_ABSTRACT, "shape {shape}");
        }
    }

    #[test]
    fn test_abstract_heading_without_paragraph_gives_placeholder() {
        let html = "<h4>Title</h4><p>byline</p><h4>Abstract</h4><p></p>";
        let page = parse_detail_page(html, PageShape::Legacy);
        assert_eq!(page.abstract_text, NO_ABSTRACT);
    }

    #[test]
    fn test_missing_title_gives_untitled() {
        let empty = "<html><body><p>nothing here</p></body></html>";
        assert_eq!(parse_detail_page(empty, PageShape::Legacy).title, UNTITLED);
        assert_eq!(parse_detail_page(empty, PageShape::Conference2022Plus).title, UNTITLED);

        let blank_title = "<html><head><title> - NeurIPS</title></head></html>";
        assert_eq!(parse_detail_page(blank_title, PageShape::Conference2022Plus).title, UNTITLED);
    }

    #[test]
    fn test_conference_title_without_suffix_kept() {
        let html = "<html><head><title>Plain Title</title></head></html>";
        assert_eq!(parse_detail_page(html, PageShape::Conference2022Plus).title, "Plain Title");
    }

    #[test]
    fn test_attachment_rule_is_shape_specific() {
        // A legacy-style link is not a 2022+ attachment and vice versa.
        let legacy_link = r#"<h4>T</h4><a href="/x-Paper.pdf">pdf</a>"#;
        assert!(parse_detail_page(legacy_link, PageShape::Conference2022Plus).attachment_href.is_none());
        assert!(parse_detail_page(legacy_link, PageShape::Legacy).attachment_href.is_some());

        let conference_link = r#"<title>T</title><a href="/x-Paper-Conference.pdf">pdf</a>"#;
        assert!(parse_detail_page(conference_link, PageShape::Legacy).attachment_href.is_none());
    }

    #[test]
    fn test_missing_attachment_keeps_text_fields() {
        let html = "<h4>Title Only</h4><h4>Abstract</h4><p>Body</p>";
        let page = parse_detail_page(html, PageShape::Legacy);

        assert!(page.attachment_href.is_none());
        assert_eq!(page.title, "Title Only");
        assert_eq!(page.abstract_text, "Body");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = parse_detail_page(CONFERENCE_PAGE, PageShape::Conference2022Plus);
        let b = parse_detail_page(CONFERENCE_PAGE, PageShape::Conference2022Plus);
        assert_eq!(a, b);
    }

    #[test]
    fn test_title_mentioning_abstract_does_not_shadow_section() {
        let html = r#"
            <h4>Abstract Reasoning with Graphs</h4>
            <p>Alice, Bob</p>
            <h4>Abstract</h4>
            <p>We reason over graphs.</p>
        "#;

        for shape in [PageShape::Legacy, PageShape::Benchmark] {
            let page = parse_detail_page(html, shape);
            assert_eq!(page.title, "Abstract Reasoning with Graphs");
            assert_eq!(page.abstract_text, "We reason over graphs.");
        }
    }

    #[test]
    fn test_heading_containing_abstract_used_when_no_exact_heading() {
        let html = "<h4>Title</h4><p>byline</p><h4>Paper Abstract</h4><p>Body.</p>";
        let page = parse_detail_page(html, PageShape::Legacy);
        assert_eq!(page.abstract_text, "Body.");
    }
}
