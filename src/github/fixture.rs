use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::graphql::GraphQlResponse;
use super::types::Page;
use super::{FetchError, PageSource};

/// Serves canned GraphQL pages so the full pipeline can run without a
/// GitHub token. Pages are chained by their `endCursor` values exactly as
/// the live API chains them.
pub struct FixtureSource {
    pages: Vec<Page>,
}

impl FixtureSource {
    /// Parse a JSON array of GraphQL response bodies.
    pub fn from_json(text: &str) -> Result<Self, FetchError> {
        let responses: Vec<GraphQlResponse> =
            serde_json::from_str(text).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let pages = responses
            .into_iter()
            .map(GraphQlResponse::into_page)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { pages })
    }

    /// The demo fixture bundled with the binary.
    pub fn embedded() -> Result<Self, FetchError> {
        Self::from_json(include_str!("../../tests/fixtures/sample_pages.json"))
    }

    /// A clock reading one day after the newest record, so time windows
    /// behave the same whenever the demo runs.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.pages
            .iter()
            .flat_map(|p| p.records.iter())
            .map(|r| r.created_at)
            .max()
            .map(|newest| newest + Duration::days(1))
    }
}

#[async_trait]
impl PageSource for FixtureSource {
    async fn fetch_page(&self, cursor: Option<&str>, _page_size: u32) -> Result<Page, FetchError> {
        let index = match cursor {
            None => 0,
            Some(cursor) => {
                self.pages
                    .iter()
                    .position(|p| p.end_cursor.as_deref() == Some(cursor))
                    .ok_or_else(|| FetchError::Malformed(format!("unknown cursor {cursor}")))?
                    + 1
            }
        };

        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| FetchError::Malformed(format!("no fixture page at index {index}")))
    }
}
