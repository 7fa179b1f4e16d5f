use chrono::{DateTime, Utc};
use serde::Serialize;

/// A pull request as returned by the GitHub API, reduced to the fields the
/// comment pipeline needs.
/// Note: Not Deserialize. Built from the GraphQL wire structs in graphql.rs
/// so that required and optional fields are checked at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRecord {
    /// PR title
    pub title: String,
    /// Web URL of the PR
    pub url: String,
    /// When the PR was opened
    pub created_at: DateTime<Utc>,
    /// Conversation comments on the PR itself
    pub comments: Vec<TopLevelComment>,
    /// Submitted reviews with their inline comments
    pub reviews: Vec<ReviewThread>,
}

/// A submitted review and the inline comments attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewThread {
    /// Review summary text; GitHub sends an empty or missing body for
    /// reviews submitted without one
    pub body: Option<String>,
    pub comments: Vec<InlineComment>,
}

/// A review comment attached to a file in the diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineComment {
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Diff offset; None for comments on outdated lines or whole files
    pub position: Option<u64>,
    pub path: String,
}

/// A comment on the PR conversation, not tied to a review or a line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLevelComment {
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl PullRequestRecord {
    /// True when the PR carries any review or conversation comment.
    pub fn has_activity(&self) -> bool {
        !self.reviews.is_empty() || !self.comments.is_empty()
    }
}

/// One page of pull requests, newest first.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<PullRequestRecord>,
    pub has_next_page: bool,
    /// Cursor to pass as `after` for the next page
    pub end_cursor: Option<String>,
}

/// Repository coordinates.
/// Extracted by parse_repo() in github/mod.rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
