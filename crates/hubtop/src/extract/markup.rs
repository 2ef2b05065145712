//! Degraded-mode extraction from rendered page markup.
//!
//! Used only when a page produced no usable structured payload. The
//! rendered listing wraps each repository in an anchor pointing at
//! `/r/<owner>/<repo>`, with pulls, stars, and last-updated rendered
//! somewhere in the anchor's visible text. Lower fidelity than the
//! structured path by design.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::record::{HUB_ORIGIN, RepoRecord};

static REPO_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/r/([^/]+)/([^/]+)/?$").expect("hardcoded regex pattern is valid")
});

/// Label-before-value and value-before-label variants, tried in order.
static PULLS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_patterns(&[
        r"(?i)Pulls\.\s*([0-9A-Za-z+.,]+)",
        r"(?i)([0-9A-Za-z+.,]+)\s+Pulls",
    ])
});

static STARS_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_patterns(&[r"(?i)Stars\.\s*([0-9,]+)", r"(?i)([0-9,]+)\s+Stars"]));

static UPDATED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_patterns(&[r"(?i)Last Updated\.\s*([^\n]+)", r"(?i)Updated\s*([^\n]+)"])
});

fn compile_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("hardcoded regex pattern is valid"))
        .collect()
}

/// Scrape repository records out of rendered page markup.
///
/// Pattern misses yield empty defaults rather than errors; anchors that
/// do not look like repository links contribute nothing.
#[must_use]
pub fn extract_from_markup(markup: &str) -> Vec<RepoRecord> {
    let document = Html::parse_document(markup);
    let selector = Selector::parse("a[href]").expect("selector should parse");

    let mut records = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(captures) = REPO_HREF.captures(href) else {
            continue;
        };

        let owner = captures[1].to_string();
        let name = captures[2].to_string();
        let text = flatten_text(&element);

        let pulls = first_capture(&PULLS_PATTERNS, &text).unwrap_or_default();
        let stars = first_capture(&STARS_PATTERNS, &text)
            .and_then(|s| s.replace(',', "").parse().ok())
            .unwrap_or(0);
        let last_updated = first_capture(&UPDATED_PATTERNS, &text).unwrap_or_default();

        records.push(RepoRecord {
            name,
            owner,
            pulls,
            stars,
            last_updated,
            url: format!("{HUB_ORIGIN}{href}"),
        });
    }

    records
}

/// Flattened visible text of an element: text nodes trimmed and joined
/// with single spaces.
fn flatten_text(element: &scraper::ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .map(|captures| captures[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_record_from_repo_anchor() {
        let markup = r#"
            <html><body>
                <a href="/r/foo/bar">bar Pulls. 5M+ Stars. 12</a>
            </body></html>
        "#;

        let records = extract_from_markup(markup);
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.owner, "foo");
        assert_eq!(record.name, "bar");
        assert_eq!(record.pulls, "5M+");
        assert_eq!(record.stars, 12);
        assert_eq!(record.url, "https://hub.docker.com/r/foo/bar");
    }

    #[test]
    fn test_value_before_label_variants() {
        let markup = r#"
            <a href="/r/library/nginx">nginx 1B+ Pulls 20,000 Stars Updated 2 days ago</a>
        "#;

        let records = extract_from_markup(markup);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pulls, "1B+");
        assert_eq!(records[0].stars, 20000);
        assert_eq!(records[0].last_updated, "2 days ago");
    }

    #[test]
    fn test_label_dot_variants() {
        let markup = r#"
            <a href="/r/library/redis">redis Pulls. 12,345,678 Stars. 9,001 Last Updated. yesterday</a>
        "#;

        let records = extract_from_markup(markup);
        assert_eq!(records[0].pulls, "12,345,678");
        assert_eq!(records[0].stars, 9001);
        assert_eq!(records[0].last_updated, "yesterday");
    }

    #[test]
    fn test_pattern_misses_yield_defaults() {
        let markup = r#"<a href="/r/foo/bar">bar</a>"#;

        let records = extract_from_markup(markup);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pulls, "");
        assert_eq!(records[0].stars, 0);
        assert_eq!(records[0].last_updated, "");
    }

    #[test]
    fn test_non_repo_anchors_are_ignored() {
        let markup = r#"
            <a href="/search?page=2">next</a>
            <a href="/r/onlyone">short</a>
            <a href="/r/a/b/tags">too deep</a>
            <a href="https://hub.docker.com/r/abs/olute">absolute</a>
        "#;

        assert!(extract_from_markup(markup).is_empty());
    }

    #[test]
    fn test_nested_markup_text_is_flattened() {
        let markup = r#"
            <a href="/r/library/postgres">
                <h3>postgres</h3>
                <span> 10M+ </span><span>Pulls</span>
                <span>9,123</span> <span>Stars</span>
            </a>
        "#;

        let records = extract_from_markup(markup);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pulls, "10M+");
        assert_eq!(records[0].stars, 9123);
    }

    #[test]
    fn test_trailing_slash_href_still_matches() {
        let markup = r#"<a href="/r/foo/bar/">bar</a>"#;

        let records = extract_from_markup(markup);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner, "foo");
        assert_eq!(records[0].name, "bar");
    }
}
