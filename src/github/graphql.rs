use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::types::{InlineComment, Page, PullRequestRecord, RepoRef, ReviewThread, TopLevelComment};
use super::{FetchError, PageSource};
use crate::config::Config;

const USER_AGENT: &str = "pr-comment-insights";

const PULL_REQUESTS_QUERY: &str = r#"
query RecentPullRequests($owner: String!, $repo: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $repo) {
    pullRequests(first: $first, states: [OPEN, CLOSED, MERGED], orderBy: {field: CREATED_AT, direction: DESC}, after: $after) {
      pageInfo {
        endCursor
        hasNextPage
      }
      nodes {
        title
        url
        createdAt
        reviews(first: 100) {
          nodes {
            body
            comments(first: 10) {
              nodes {
                body
                createdAt
                position
                path
              }
            }
          }
        }
        comments(first: 10) {
          nodes {
            body
            createdAt
          }
        }
      }
    }
  }
}
"#;

/// GraphQL response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse {
    data: Option<RepositoryData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryData {
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    pull_requests: PullRequestConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestConnection {
    page_info: PageInfo,
    nodes: Vec<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestNode {
    title: String,
    url: String,
    created_at: DateTime<Utc>,
    reviews: Connection<ReviewNode>,
    comments: Connection<CommentNode>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ReviewNode {
    body: Option<String>,
    comments: Connection<InlineCommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineCommentNode {
    body: String,
    created_at: DateTime<Utc>,
    position: Option<u64>,
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    body: String,
    created_at: DateTime<Utc>,
}

impl From<PullRequestNode> for PullRequestRecord {
    fn from(node: PullRequestNode) -> Self {
        PullRequestRecord {
            title: node.title,
            url: node.url,
            created_at: node.created_at,
            comments: node
                .comments
                .nodes
                .into_iter()
                .map(|c| TopLevelComment {
                    body: c.body,
                    created_at: c.created_at,
                })
                .collect(),
            reviews: node.reviews.nodes.into_iter().map(ReviewThread::from).collect(),
        }
    }
}

impl From<ReviewNode> for ReviewThread {
    fn from(node: ReviewNode) -> Self {
        ReviewThread {
            // GitHub reports "" for reviews submitted without a summary
            body: node.body.filter(|b| !b.is_empty()),
            comments: node
                .comments
                .nodes
                .into_iter()
                .map(|c| InlineComment {
                    body: c.body,
                    created_at: c.created_at,
                    position: c.position,
                    path: c.path,
                })
                .collect(),
        }
    }
}

impl GraphQlResponse {
    /// Unwrap the envelope into a page, surfacing GraphQL errors and
    /// missing payloads as typed failures.
    pub(crate) fn into_page(self) -> Result<Page, FetchError> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::GraphQl(messages.join(", ")));
        }

        let connection = self
            .data
            .and_then(|d| d.repository)
            .ok_or_else(|| FetchError::Malformed("response has no repository data".to_string()))?
            .pull_requests;

        Ok(Page {
            records: connection
                .nodes
                .into_iter()
                .map(PullRequestRecord::from)
                .collect(),
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        })
    }
}

/// Decode a raw GraphQL response body into a page.
pub(crate) fn decode_page(body: &str) -> Result<Page, FetchError> {
    let envelope: GraphQlResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    envelope.into_page()
}

/// Pages through a repository's pull requests via the GitHub GraphQL API.
pub struct GraphqlSource {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    repo: RepoRef,
}

impl GraphqlSource {
    pub fn new(
        repo: RepoRef,
        token: String,
        api_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/graphql", api_url.trim_end_matches('/')),
            token,
            repo,
        })
    }

    /// Build a source from loaded configuration.
    /// Returns FetchError::MissingToken when neither the config file nor
    /// GITHUB_TOKEN supplies a token.
    pub fn from_config(repo: RepoRef, config: &Config) -> Result<Self, FetchError> {
        let token = config.github_token().ok_or(FetchError::MissingToken)?;
        Self::new(
            repo,
            token,
            &config.github.api_url,
            config.github.request_timeout(),
        )
    }
}

#[async_trait]
impl PageSource for GraphqlSource {
    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn fetch_page(&self, cursor: Option<&str>, page_size: u32) -> Result<Page, FetchError> {
        let request_body = json!({
            "query": PULL_REQUESTS_QUERY,
            "variables": {
                "owner": self.repo.owner,
                "repo": self.repo.name,
                "first": page_size,
                "after": cursor,
            },
        });

        debug!(endpoint = %self.endpoint, "posting GraphQL query");
        let response = self
            .client
            .post(&self.endpoint)
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        debug!(response_bytes = body.len(), "received GraphQL response");
        decode_page(&body)
    }
}
