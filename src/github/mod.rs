pub mod fixture;
pub mod graphql;
pub mod types;

pub use fixture::FixtureSource;
pub use graphql::GraphqlSource;
pub use types::{Page, PullRequestRecord, RepoRef};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("GitHub GraphQL errors: {0}")]
    GraphQl(String),

    #[error("Malformed GitHub response: {0}")]
    Malformed(String),

    #[error("GitHub token not found in config or environment")]
    MissingToken,

    #[error("Invalid repository: {0}")]
    InvalidRepo(String),
}

/// Source of pull request pages, newest first.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page following `cursor` (the first page when None).
    async fn fetch_page(&self, cursor: Option<&str>, page_size: u32) -> Result<Page, FetchError>;
}

/// Knobs for one pagination run.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub page_size: u32,
    /// Fixed pause between page requests
    pub delay: Duration,
    /// Stop once a page ends at or before this instant; None walks every page
    pub boundary: Option<DateTime<Utc>>,
}

/// Why a pagination run finished cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last record of a page was at or before the time boundary
    ReachedBoundary,
    /// The API reported no further pages
    Exhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ReachedBoundary => write!(f, "reached time boundary"),
            StopReason::Exhausted => write!(f, "no more pages"),
        }
    }
}

/// How a pagination run ended.
#[derive(Debug)]
pub enum FetchStatus {
    Complete(StopReason),
    /// A request failed after some records were collected
    Partial(FetchError),
    /// A request failed before any record was collected
    Failed(FetchError),
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStatus::Complete(reason) => write!(f, "complete ({})", reason),
            FetchStatus::Partial(err) => write!(f, "partial ({})", err),
            FetchStatus::Failed(err) => write!(f, "failed ({})", err),
        }
    }
}

/// Records accumulated by a pagination run, in page order.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<PullRequestRecord>,
    pub status: FetchStatus,
    /// Pages successfully fetched
    pub pages: usize,
}

impl FetchOutcome {
    /// Records the rest of the run may use. A `Failed` run aborts with its
    /// error; `Partial` runs hand back what was collected.
    pub fn into_records(self) -> Result<Vec<PullRequestRecord>, FetchError> {
        match self.status {
            FetchStatus::Failed(err) => Err(err),
            FetchStatus::Complete(_) | FetchStatus::Partial(_) => Ok(self.records),
        }
    }
}

/// Parse a repository reference.
///
/// Accepts `owner/name` or a GitHub URL such as `https://github.com/owner/name`
/// (trailing path segments like `/pulls` are ignored).
pub fn parse_repo(input: &str) -> Result<RepoRef, FetchError> {
    let invalid = || FetchError::InvalidRepo(input.to_string());

    let segments: Vec<String> = if input.contains("://") {
        let parsed = reqwest::Url::parse(input).map_err(|_| invalid())?;
        if parsed.host_str() != Some("github.com") {
            return Err(invalid());
        }
        parsed
            .path_segments()
            .ok_or_else(invalid)?
            .filter(|segment| !segment.is_empty())
            .take(2)
            .map(str::to_string)
            .collect()
    } else {
        let parts: Vec<String> = input.trim().split('/').map(str::to_string).collect();
        if parts.len() != 2 {
            return Err(invalid());
        }
        parts
    };

    match segments.as_slice() {
        [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(RepoRef {
            owner: owner.clone(),
            name: name.trim_end_matches(".git").to_string(),
        }),
        _ => Err(invalid()),
    }
}

/// Walk the source page by page until the time boundary is crossed, the
/// API runs out of pages, or a request fails.
///
/// The boundary check looks only at the last record of each page, so the
/// page that crosses the boundary is kept whole. Failures are never retried:
/// whatever was collected before the failure is returned with a `Partial`
/// status, or `Failed` when nothing was collected.
#[instrument(skip(source, options), fields(page_size = options.page_size, boundary = ?options.boundary))]
pub async fn fetch_pull_requests<S: PageSource + ?Sized>(
    source: &S,
    options: &FetchOptions,
) -> FetchOutcome {
    let mut cursor: Option<String> = None;
    let mut records: Vec<PullRequestRecord> = Vec::new();
    let mut pages = 0;

    let status = loop {
        debug!(page = pages + 1, cursor = ?cursor, "fetching page");
        let page = match source.fetch_page(cursor.as_deref(), options.page_size).await {
            Ok(page) => page,
            Err(err) if records.is_empty() => {
                error!(error = %err, "first page request failed");
                break FetchStatus::Failed(err);
            }
            Err(err) => {
                warn!(error = %err, collected = records.len(), "page request failed, keeping partial results");
                break FetchStatus::Partial(err);
            }
        };
        pages += 1;

        let last_created = page.records.last().map(|r| r.created_at);
        info!(page = pages, records = page.records.len(), has_next_page = page.has_next_page, "fetched page");
        records.extend(page.records);

        let Some(last_created) = last_created else {
            break FetchStatus::Complete(StopReason::Exhausted);
        };

        if options.boundary.is_some_and(|boundary| last_created <= boundary) {
            debug!(%last_created, "last record is at or before boundary");
            break FetchStatus::Complete(StopReason::ReachedBoundary);
        }

        match (page.has_next_page, page.end_cursor) {
            (true, Some(next)) => cursor = Some(next),
            _ => break FetchStatus::Complete(StopReason::Exhausted),
        }

        if !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }
    };

    info!(pages, records = records.len(), status = %status, "pagination finished");
    FetchOutcome {
        records,
        status,
        pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves a scripted sequence of page results and records each cursor
    /// it was asked for.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Page, FetchError>>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Page, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                cursors: Mutex::new(Vec::new()),
            }
        }

        fn requested_cursors(&self) -> Vec<Option<String>> {
            self.cursors.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, cursor: Option<&str>, _page_size: u32) -> Result<Page, FetchError> {
            self.cursors.lock().unwrap().push(cursor.map(str::to_string));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Malformed("script exhausted".to_string())))
        }
    }

    fn record(title: &str, created_at: &str) -> PullRequestRecord {
        PullRequestRecord {
            title: title.to_string(),
            url: format!("https://github.com/org/repo/pull/{}", title),
            created_at: created_at.parse().unwrap(),
            comments: vec![],
            reviews: vec![],
        }
    }

    fn page(records: Vec<PullRequestRecord>, next: Option<&str>) -> Page {
        Page {
            records,
            has_next_page: next.is_some(),
            end_cursor: next.map(str::to_string),
        }
    }

    fn options(boundary: Option<&str>) -> FetchOptions {
        FetchOptions {
            page_size: 10,
            delay: Duration::ZERO,
            boundary: boundary.map(|b| b.parse().unwrap()),
        }
    }

    fn titles(records: &[PullRequestRecord]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_parse_repo_slug() {
        let repo = parse_repo("octo-org/uploader").unwrap();
        assert_eq!(repo.owner, "octo-org");
        assert_eq!(repo.name, "uploader");
    }

    #[test]
    fn test_parse_repo_url() {
        let repo = parse_repo("https://github.com/octo-org/uploader/pulls").unwrap();
        assert_eq!(repo.to_string(), "octo-org/uploader");

        let repo = parse_repo("https://github.com/octo-org/uploader.git").unwrap();
        assert_eq!(repo.name, "uploader");
    }

    #[test]
    fn test_parse_invalid_repo() {
        assert!(parse_repo("uploader").is_err());
        assert!(parse_repo("a/b/c").is_err());
        assert!(parse_repo("/uploader").is_err());
        assert!(parse_repo("https://example.com/org/repo").is_err());
        assert!(parse_repo("https://github.com/org").is_err());
    }

    #[tokio::test]
    async fn test_pagination_preserves_page_order() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![record("1", "2024-06-10T00:00:00Z"), record("2", "2024-06-09T00:00:00Z")], Some("c1"))),
            Ok(page(vec![record("3", "2024-06-08T00:00:00Z")], Some("c2"))),
            Ok(page(vec![record("4", "2024-06-07T00:00:00Z")], None)),
        ]);

        let outcome = fetch_pull_requests(&source, &options(None)).await;
        assert_eq!(titles(&outcome.records), vec!["1", "2", "3", "4"]);
        assert_eq!(outcome.pages, 3);
        assert!(matches!(outcome.status, FetchStatus::Complete(StopReason::Exhausted)));
        assert_eq!(
            source.requested_cursors(),
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_pagination_stops_at_boundary_and_keeps_crossing_page() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![record("1", "2024-06-10T00:00:00Z")], Some("c1"))),
            Ok(page(vec![record("2", "2024-06-05T00:00:00Z")], Some("c2"))),
            Ok(page(vec![record("3", "2024-05-01T00:00:00Z")], Some("c3"))),
            Ok(page(vec![record("4", "2024-04-01T00:00:00Z")], None)),
        ]);

        let outcome = fetch_pull_requests(&source, &options(Some("2024-06-01T00:00:00Z"))).await;
        assert_eq!(titles(&outcome.records), vec!["1", "2", "3"]);
        assert_eq!(outcome.pages, 3);
        assert!(matches!(outcome.status, FetchStatus::Complete(StopReason::ReachedBoundary)));
        assert_eq!(source.requested_cursors().len(), 3, "no page requested after the boundary");
    }

    #[tokio::test]
    async fn test_boundary_checks_only_last_record() {
        // First record is older than the boundary but the last is not
        let source = ScriptedSource::new(vec![
            Ok(page(vec![record("old", "2024-01-01T00:00:00Z"), record("new", "2024-06-10T00:00:00Z")], Some("c1"))),
            Ok(page(vec![record("last", "2024-06-09T00:00:00Z")], None)),
        ]);

        let outcome = fetch_pull_requests(&source, &options(Some("2024-06-01T00:00:00Z"))).await;
        assert_eq!(outcome.pages, 2);
        assert!(matches!(outcome.status, FetchStatus::Complete(StopReason::Exhausted)));
    }

    #[tokio::test]
    async fn test_boundary_is_inclusive() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![record("1", "2024-06-01T00:00:00Z")], Some("c1"))),
            Ok(page(vec![record("2", "2024-05-01T00:00:00Z")], None)),
        ]);

        let outcome = fetch_pull_requests(&source, &options(Some("2024-06-01T00:00:00Z"))).await;
        assert_eq!(titles(&outcome.records), vec!["1"]);
        assert!(matches!(outcome.status, FetchStatus::Complete(StopReason::ReachedBoundary)));
    }

    #[tokio::test]
    async fn test_failure_after_first_page_is_partial() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![record("1", "2024-06-10T00:00:00Z")], Some("c1"))),
            Err(FetchError::Api {
                status: 502,
                body: "bad gateway".to_string(),
            }),
        ]);

        let outcome = fetch_pull_requests(&source, &options(None)).await;
        assert_eq!(titles(&outcome.records), vec!["1"]);
        assert_eq!(outcome.pages, 1);
        assert!(matches!(outcome.status, FetchStatus::Partial(FetchError::Api { status: 502, .. })));
    }

    #[tokio::test]
    async fn test_failure_on_first_page_is_failed() {
        let source = ScriptedSource::new(vec![Err(FetchError::GraphQl("rate limited".to_string()))]);

        let outcome = fetch_pull_requests(&source, &options(None)).await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.pages, 0);
        assert!(matches!(outcome.status, FetchStatus::Failed(FetchError::GraphQl(_))));
    }

    #[tokio::test]
    async fn test_empty_page_ends_pagination() {
        let source = ScriptedSource::new(vec![Ok(page(vec![], Some("c1")))]);

        let outcome = fetch_pull_requests(&source, &options(Some("2024-06-01T00:00:00Z"))).await;
        assert!(outcome.records.is_empty());
        assert!(matches!(outcome.status, FetchStatus::Complete(StopReason::Exhausted)));
        assert_eq!(source.requested_cursors().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_end_cursor_ends_pagination() {
        let source = ScriptedSource::new(vec![Ok(Page {
            records: vec![record("1", "2024-06-10T00:00:00Z")],
            has_next_page: true,
            end_cursor: None,
        })]);

        let outcome = fetch_pull_requests(&source, &options(None)).await;
        assert_eq!(outcome.pages, 1);
        assert!(matches!(outcome.status, FetchStatus::Complete(StopReason::Exhausted)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_between_pages_only() {
        let delay = Duration::from_secs(2);
        let source = ScriptedSource::new(vec![
            Ok(page(vec![record("1", "2024-06-10T00:00:00Z")], Some("c1"))),
            Ok(page(vec![record("2", "2024-06-09T00:00:00Z")], Some("c2"))),
            Ok(page(vec![record("3", "2024-06-08T00:00:00Z")], None)),
        ]);
        let options = FetchOptions {
            delay,
            ..options(None)
        };

        let started = tokio::time::Instant::now();
        let outcome = fetch_pull_requests(&source, &options).await;

        assert_eq!(outcome.pages, 3);
        // Two pauses for three pages, none after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= delay * 2, "elapsed {elapsed:?}");
        assert!(elapsed < delay * 3, "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_after_boundary_stop() {
        let delay = Duration::from_millis(1500);
        let source = ScriptedSource::new(vec![
            Ok(page(vec![record("1", "2024-06-10T00:00:00Z")], Some("c1"))),
            Ok(page(vec![record("2", "2024-05-01T00:00:00Z")], Some("c2"))),
            Ok(page(vec![record("3", "2024-04-01T00:00:00Z")], None)),
        ]);
        let options = FetchOptions {
            delay,
            ..options(Some("2024-06-01T00:00:00Z"))
        };

        let started = tokio::time::Instant::now();
        let outcome = fetch_pull_requests(&source, &options).await;

        assert_eq!(outcome.pages, 2);
        assert!(matches!(outcome.status, FetchStatus::Complete(StopReason::ReachedBoundary)));
        let elapsed = started.elapsed();
        assert!(elapsed >= delay, "elapsed {elapsed:?}");
        assert!(elapsed < delay * 2, "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_partial_outcome_is_usable() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![record("1", "2024-06-10T00:00:00Z")], Some("c1"))),
            Err(FetchError::Malformed("truncated body".to_string())),
        ]);

        let records = fetch_pull_requests(&source, &options(None))
            .await
            .into_records()
            .unwrap();
        assert_eq!(titles(&records), vec!["1"]);
    }

    #[tokio::test]
    async fn test_failed_outcome_aborts() {
        let source = ScriptedSource::new(vec![Err(FetchError::MissingToken)]);

        let result = fetch_pull_requests(&source, &options(None)).await.into_records();
        assert!(matches!(result, Err(FetchError::MissingToken)));
    }

    #[test]
    fn test_fetch_status_display() {
        assert_eq!(
            FetchStatus::Complete(StopReason::ReachedBoundary).to_string(),
            "complete (reached time boundary)"
        );
        assert_eq!(
            FetchStatus::Partial(FetchError::MissingToken).to_string(),
            "partial (GitHub token not found in config or environment)"
        );
    }
}
