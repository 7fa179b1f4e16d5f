use chrono::{DateTime, Utc};
use serde::Serialize;

/// A group of comment bodies: every inline comment at one diff position, or a
/// single standalone comment.
pub type CommentGroup = Vec<String>;

/// Output-ready view of a pull request's discussion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedRecord {
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    /// Review groups first, then one group per top-level comment
    pub comments: Vec<CommentGroup>,
}
