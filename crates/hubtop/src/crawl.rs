//! Paginated crawl of the Docker Hub search listing.
//!
//! One [`fetch_sorted`] run walks the result pages for a single sort
//! order, capturing structured search payloads observed during each page
//! load and falling back to the rendered markup when none arrive. All
//! per-entry and per-page faults are absorbed here: a run always
//! terminates with a (possibly short, possibly empty) record list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::Serialize;
use thiserror::Error;

use crate::driver::{DriverError, PageDriver, ResponseEvent};
use crate::extract::{extract_from_markup, extract_records};
use crate::record::{HUB_ORIGIN, RepoRecord};

pub type CrawlProgressCallback = dyn Fn(CrawlProgress) + Send + Sync;

/// Address fragments identifying search-result payloads among the
/// responses observed during a page load.
const SEARCH_JSON_PATTERNS: [&str; 4] = [
    "/api/search",
    "/api/content/v1/products/search",
    "/v2/search/repositories",
    "/search/repositories",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Pulls,
    Stars,
    Updated,
}

impl SortOrder {
    /// Value of the `sort` query parameter for this order.
    #[must_use]
    pub fn query_value(self) -> &'static str {
        match self {
            SortOrder::Pulls => "pulls",
            SortOrder::Stars => "stars",
            SortOrder::Updated => "updated_at",
        }
    }
}

/// Search page address for one sort order and page number.
#[must_use]
pub fn search_url(sort: SortOrder, page: u32) -> String {
    format!(
        "{HUB_ORIGIN}/search?q=&type=image&order=desc&sort={}&page={}",
        sort.query_value(),
        page
    )
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Quota shared by the pulls and stars runs.
    pub top_quota: usize,
    /// Quota for the most-recently-updated run.
    pub latest_quota: usize,
    /// Hard page counter ceiling per sort order.
    pub page_ceiling: u32,
    /// Wait after load-complete to catch late-arriving payloads.
    ///
    /// A heuristic with no sufficiency guarantee; raise it on slow
    /// networks.
    pub settle_delay: StdDuration,
    pub request_timeout: StdDuration,
    pub user_agent: Option<String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            top_quota: 25,
            latest_quota: 10,
            page_ceiling: 50,
            settle_delay: StdDuration::from_millis(500),
            request_timeout: StdDuration::from_secs(15),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CrawlProgress {
    SortStarted {
        sort: SortOrder,
        quota: usize,
    },
    PageLoaded {
        sort: SortOrder,
        page: u32,
        batch: usize,
        total: usize,
    },
    MarkupFallback {
        sort: SortOrder,
        page: u32,
    },
    SortFinished {
        sort: SortOrder,
        total: usize,
    },
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to start navigation driver: {0}")]
    Driver(#[from] DriverError),
}

/// The assembled result set: three independently crawled listings.
///
/// Cross-listing duplicates are expected; different sort orders may
/// legitimately surface the same repository.
#[derive(Debug, Clone, Serialize)]
pub struct TopImagesReport {
    pub top_by_pulls: Vec<RepoRecord>,
    pub top_by_stars: Vec<RepoRecord>,
    pub latest: Vec<RepoRecord>,
}

/// Crawl all three listings with a freshly started HTTP driver.
///
/// Driver startup is the only fault that propagates; the crawl itself
/// always completes. The driver is owned here and released on every
/// exit path.
#[cfg(feature = "http-driver")]
pub async fn crawl_top_images(
    options: &CrawlOptions,
    on_progress: Option<&CrawlProgressCallback>,
) -> Result<TopImagesReport, CrawlError> {
    let driver = build_driver(options)?;
    Ok(crawl_top_images_with_driver(driver, options, on_progress).await)
}

/// Crawl all three listings with a caller-supplied driver session.
pub async fn crawl_top_images_with_driver(
    driver: Arc<dyn PageDriver>,
    options: &CrawlOptions,
    on_progress: Option<&CrawlProgressCallback>,
) -> TopImagesReport {
    let top_by_pulls = fetch_sorted(
        driver.as_ref(),
        SortOrder::Pulls,
        options.top_quota,
        options,
        on_progress,
    )
    .await;
    let top_by_stars = fetch_sorted(
        driver.as_ref(),
        SortOrder::Stars,
        options.top_quota,
        options,
        on_progress,
    )
    .await;
    let latest = fetch_sorted(
        driver.as_ref(),
        SortOrder::Updated,
        options.latest_quota,
        options,
        on_progress,
    )
    .await;

    TopImagesReport {
        top_by_pulls,
        top_by_stars,
        latest,
    }
}

#[cfg(feature = "http-driver")]
fn build_driver(options: &CrawlOptions) -> Result<Arc<dyn PageDriver>, CrawlError> {
    use crate::driver::http_driver::HttpDriver;

    let user_agent = options.user_agent.as_deref().unwrap_or("hubtop/0.1");
    let driver = HttpDriver::with_timeout(options.request_timeout, user_agent)?;
    Ok(Arc::new(driver))
}

/// Walk the result pages for one sort order, accumulating unique records
/// until the quota, an empty page, or the page ceiling stops the loop.
pub async fn fetch_sorted(
    driver: &dyn PageDriver,
    sort: SortOrder,
    quota: usize,
    options: &CrawlOptions,
    on_progress: Option<&CrawlProgressCallback>,
) -> Vec<RepoRecord> {
    emit_progress(on_progress, CrawlProgress::SortStarted { sort, quota });

    let mut collected: Vec<RepoRecord> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut page = 1u32;

    while collected.len() < quota && page <= options.page_ceiling {
        let url = search_url(sort, page);
        let batch = load_page_batch(driver, &url, sort, page, options, on_progress).await;
        let batch_len = batch.len();

        for record in batch {
            if !seen.insert(record.key()) {
                continue;
            }
            collected.push(record);
            if collected.len() >= quota {
                break;
            }
        }

        emit_progress(
            on_progress,
            CrawlProgress::PageLoaded {
                sort,
                page,
                batch: batch_len,
                total: collected.len(),
            },
        );

        // No data from either path means the listing is exhausted.
        if batch_len == 0 {
            break;
        }
        page += 1;
    }

    collected.truncate(quota);
    emit_progress(
        on_progress,
        CrawlProgress::SortFinished {
            sort,
            total: collected.len(),
        },
    );
    collected
}

/// Load one page and produce its record batch: structured observations
/// first, markup fallback if they yield nothing.
async fn load_page_batch(
    driver: &dyn PageDriver,
    url: &str,
    sort: SortOrder,
    page: u32,
    options: &CrawlOptions,
    on_progress: Option<&CrawlProgressCallback>,
) -> Vec<RepoRecord> {
    // Subscribe before navigating, drop after the settle window, so the
    // capture window is bounded to exactly this page's lifetime.
    let mut subscription = driver.subscribe();

    if let Err(err) = driver.open(url).await {
        tracing::warn!(url, error = %err, "navigation failed; continuing with markup fallback");
    }

    tokio::time::sleep(options.settle_delay).await;
    let observations = subscription.drain();
    drop(subscription);

    let mut batch = Vec::new();
    for observation in observations {
        if !is_search_payload(&observation) {
            continue;
        }
        match observation.json() {
            Ok(payload) => batch.extend(extract_records(&payload)),
            Err(err) => {
                tracing::debug!(
                    url = observation.url,
                    error = %err,
                    "discarding undecodable search response"
                );
            }
        }
    }

    if batch.is_empty() {
        emit_progress(on_progress, CrawlProgress::MarkupFallback { sort, page });
        match driver.markup().await {
            Ok(markup) => batch = extract_from_markup(&markup),
            Err(err) => {
                tracing::warn!(url, error = %err, "markup unavailable; treating page as empty");
            }
        }
    }

    batch
}

fn is_search_payload(event: &ResponseEvent) -> bool {
    SEARCH_JSON_PATTERNS
        .iter()
        .any(|pattern| event.url.contains(pattern))
        && event
            .content_type()
            .is_some_and(|content_type| content_type.contains("json"))
}

fn emit_progress(on_progress: Option<&CrawlProgressCallback>, event: CrawlProgress) {
    if let Some(callback) = on_progress {
        callback(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::driver::{MockDriver, MockPage, ResponseEvent};

    fn test_options() -> CrawlOptions {
        CrawlOptions {
            settle_delay: StdDuration::ZERO,
            ..CrawlOptions::default()
        }
    }

    fn json_event(url: &str, payload: &serde_json::Value) -> ResponseEvent {
        ResponseEvent {
            url: url.to_string(),
            headers: vec![(
                "content-type".to_string(),
                "application/json; charset=utf-8".to_string(),
            )],
            body: payload.to_string().into_bytes(),
        }
    }

    fn results_payload(entries: &[(&str, &str)]) -> serde_json::Value {
        let results: Vec<serde_json::Value> = entries
            .iter()
            .map(|(owner, name)| json!({"namespace": owner, "name": name}))
            .collect();
        json!({ "results": results })
    }

    fn search_page(entries: &[(&str, &str)]) -> MockPage {
        MockPage {
            responses: vec![json_event(
                "https://hub.docker.com/api/search/v4?page=1",
                &results_payload(entries),
            )],
            markup: String::new(),
        }
    }

    fn keys(records: &[RepoRecord]) -> Vec<(String, String)> {
        records.iter().map(RepoRecord::key).collect()
    }

    #[test]
    fn test_search_url_format() {
        assert_eq!(
            search_url(SortOrder::Updated, 3),
            "https://hub.docker.com/search?q=&type=image&order=desc&sort=updated_at&page=3"
        );
        assert_eq!(SortOrder::Pulls.query_value(), "pulls");
        assert_eq!(SortOrder::Stars.query_value(), "stars");
    }

    #[tokio::test]
    async fn test_fetch_stops_at_quota_and_truncates() {
        let driver = MockDriver::new();
        driver.push_page(
            search_url(SortOrder::Pulls, 1),
            search_page(&[("library", "nginx"), ("library", "redis"), ("library", "postgres")]),
        );

        let records = fetch_sorted(&driver, SortOrder::Pulls, 2, &test_options(), None).await;

        assert_eq!(
            keys(&records),
            vec![
                ("library".to_string(), "nginx".to_string()),
                ("library".to_string(), "redis".to_string()),
            ]
        );
        // Quota met on page one, so page two is never requested.
        assert_eq!(driver.opened(), vec![search_url(SortOrder::Pulls, 1)]);
    }

    #[tokio::test]
    async fn test_met_quota_performs_no_page_fetches() {
        let driver = MockDriver::new();

        let records = fetch_sorted(&driver, SortOrder::Pulls, 0, &test_options(), None).await;

        assert!(records.is_empty());
        assert!(driver.opened().is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_are_dropped_across_pages_and_within_a_batch() {
        let driver = MockDriver::new();
        driver.push_page(
            search_url(SortOrder::Stars, 1),
            search_page(&[("library", "nginx"), ("library", "nginx"), ("library", "redis")]),
        );
        // Page two repeats page one entirely, then adds one new record.
        driver.push_page(
            search_url(SortOrder::Stars, 2),
            search_page(&[("library", "nginx"), ("library", "redis"), ("library", "postgres")]),
        );

        let records = fetch_sorted(&driver, SortOrder::Stars, 10, &test_options(), None).await;

        let collected = keys(&records);
        assert_eq!(
            collected,
            vec![
                ("library".to_string(), "nginx".to_string()),
                ("library".to_string(), "redis".to_string()),
                ("library".to_string(), "postgres".to_string()),
            ]
        );

        let unique: HashSet<_> = collected.iter().cloned().collect();
        assert_eq!(unique.len(), collected.len());
    }

    #[tokio::test]
    async fn test_empty_batch_terminates_the_loop() {
        let driver = MockDriver::new();
        driver.push_page(
            search_url(SortOrder::Pulls, 1),
            search_page(&[("library", "nginx")]),
        );
        // Page two loads fine but yields nothing from either path.
        driver.push_page(search_url(SortOrder::Pulls, 2), MockPage::default());

        let records = fetch_sorted(&driver, SortOrder::Pulls, 10, &test_options(), None).await;

        assert_eq!(records.len(), 1);
        assert_eq!(
            driver.opened(),
            vec![search_url(SortOrder::Pulls, 1), search_url(SortOrder::Pulls, 2)]
        );
    }

    #[tokio::test]
    async fn test_page_ceiling_terminates_the_loop() {
        let driver = MockDriver::new();
        let options = CrawlOptions {
            page_ceiling: 2,
            ..test_options()
        };
        for page in 1..=3 {
            driver.push_page(
                search_url(SortOrder::Pulls, page),
                search_page(&[("library", "nginx")]),
            );
        }

        let records = fetch_sorted(&driver, SortOrder::Pulls, 10, &options, None).await;

        assert_eq!(records.len(), 1);
        assert_eq!(driver.opened().len(), 2);
    }

    #[tokio::test]
    async fn test_markup_fallback_when_no_structured_payload_arrives() {
        let driver = MockDriver::new();
        driver.push_page(
            search_url(SortOrder::Pulls, 1),
            MockPage {
                responses: Vec::new(),
                markup: r#"<a href="/r/foo/bar">bar Pulls. 5M+ Stars. 12</a>"#.to_string(),
            },
        );

        let records = fetch_sorted(&driver, SortOrder::Pulls, 1, &test_options(), None).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner, "foo");
        assert_eq!(records[0].pulls, "5M+");
        assert_eq!(records[0].stars, 12);
    }

    #[tokio::test]
    async fn test_structured_path_is_preferred_over_markup() {
        let driver = MockDriver::new();
        driver.push_page(
            search_url(SortOrder::Pulls, 1),
            MockPage {
                responses: vec![json_event(
                    "https://hub.docker.com/v2/search/repositories?page=1",
                    &results_payload(&[("library", "from-json")]),
                )],
                markup: r#"<a href="/r/library/from-markup">x</a>"#.to_string(),
            },
        );

        let records = fetch_sorted(&driver, SortOrder::Pulls, 10, &test_options(), None).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "from-json");
    }

    #[tokio::test]
    async fn test_decode_failure_discards_only_that_observation() {
        let driver = MockDriver::new();
        driver.push_page(
            search_url(SortOrder::Pulls, 1),
            MockPage {
                responses: vec![
                    ResponseEvent {
                        url: "https://hub.docker.com/api/search/broken".to_string(),
                        headers: vec![(
                            "content-type".to_string(),
                            "application/json".to_string(),
                        )],
                        body: b"<html>not json</html>".to_vec(),
                    },
                    json_event(
                        "https://hub.docker.com/api/search/ok",
                        &results_payload(&[("library", "nginx")]),
                    ),
                ],
                markup: String::new(),
            },
        );

        let records = fetch_sorted(&driver, SortOrder::Pulls, 10, &test_options(), None).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "nginx");
    }

    #[tokio::test]
    async fn test_unrelated_and_non_json_responses_are_filtered_out() {
        let driver = MockDriver::new();
        driver.push_page(
            search_url(SortOrder::Pulls, 1),
            MockPage {
                responses: vec![
                    // Address does not match any search endpoint pattern.
                    json_event(
                        "https://hub.docker.com/api/recommendations",
                        &results_payload(&[("library", "ignored")]),
                    ),
                    // Matching address but not a JSON response.
                    ResponseEvent {
                        url: "https://hub.docker.com/api/search/v4".to_string(),
                        headers: vec![("content-type".to_string(), "text/html".to_string())],
                        body: b"{}".to_vec(),
                    },
                ],
                markup: r#"<a href="/r/library/from-markup">x</a>"#.to_string(),
            },
        );

        let records = fetch_sorted(&driver, SortOrder::Pulls, 10, &test_options(), None).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "from-markup");
    }

    #[tokio::test]
    async fn test_navigation_failure_degrades_to_an_empty_page() {
        let driver = MockDriver::new();

        // No page registered: open errors, markup is empty, the run
        // still terminates cleanly with what was accumulated (nothing).
        let records = fetch_sorted(&driver, SortOrder::Pulls, 5, &test_options(), None).await;

        assert!(records.is_empty());
        assert_eq!(driver.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_orchestrator_runs_three_independent_sorts() {
        let driver = MockDriver::new();
        driver.push_page(
            search_url(SortOrder::Pulls, 1),
            search_page(&[("library", "nginx"), ("library", "redis")]),
        );
        driver.push_page(
            search_url(SortOrder::Stars, 1),
            // Cross-run duplicates are allowed: nginx appears again.
            search_page(&[("library", "nginx"), ("library", "postgres")]),
        );
        driver.push_page(
            search_url(SortOrder::Updated, 1),
            search_page(&[("fresh", "image")]),
        );

        let options = CrawlOptions {
            top_quota: 2,
            latest_quota: 1,
            ..test_options()
        };
        let driver = Arc::new(driver);
        let report =
            crawl_top_images_with_driver(Arc::clone(&driver) as Arc<dyn PageDriver>, &options, None)
                .await;

        assert_eq!(
            keys(&report.top_by_pulls),
            vec![
                ("library".to_string(), "nginx".to_string()),
                ("library".to_string(), "redis".to_string()),
            ]
        );
        assert_eq!(
            keys(&report.top_by_stars),
            vec![
                ("library".to_string(), "nginx".to_string()),
                ("library".to_string(), "postgres".to_string()),
            ]
        );
        assert_eq!(
            keys(&report.latest),
            vec![("fresh".to_string(), "image".to_string())]
        );
    }

    #[tokio::test]
    async fn test_progress_events_are_emitted_in_order() {
        use std::sync::{Arc, Mutex};

        let driver = MockDriver::new();
        driver.push_page(
            search_url(SortOrder::Pulls, 1),
            MockPage {
                responses: Vec::new(),
                markup: r#"<a href="/r/foo/bar">bar</a>"#.to_string(),
            },
        );
        driver.push_page(search_url(SortOrder::Pulls, 2), MockPage::default());

        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let events_in_callback = Arc::clone(&events);
        let callback = move |event: CrawlProgress| {
            let tag = match event {
                CrawlProgress::SortStarted { .. } => "started",
                CrawlProgress::PageLoaded { .. } => "page",
                CrawlProgress::MarkupFallback { .. } => "fallback",
                CrawlProgress::SortFinished { .. } => "finished",
            };
            events_in_callback.lock().expect("event lock").push(tag.to_string());
        };

        let records =
            fetch_sorted(&driver, SortOrder::Pulls, 10, &test_options(), Some(&callback)).await;

        assert_eq!(records.len(), 1);
        assert_eq!(
            *events.lock().expect("event lock"),
            vec!["started", "fallback", "page", "fallback", "page", "finished"]
        );
    }
}
