pub mod types;

pub use types::{CommentGroup, FormattedRecord};

use std::collections::BTreeMap;
use tracing::debug;

use crate::github::types::{PullRequestRecord, ReviewThread, TopLevelComment};

/// Drop pull requests whose title contains `marker` (case-sensitive).
///
/// An empty marker disables the filter rather than excluding everything.
pub fn exclude_dependency_updates(
    records: Vec<PullRequestRecord>,
    marker: &str,
) -> Vec<PullRequestRecord> {
    if marker.is_empty() {
        return records;
    }
    let before = records.len();
    let kept: Vec<_> = records
        .into_iter()
        .filter(|pr| !pr.title.contains(marker))
        .collect();
    debug!(marker, excluded = before - kept.len(), "applied dependency-update filter");
    kept
}

/// Group inline review comments by diff position.
///
/// Comments sharing a position are merged in encounter order, groups ordered
/// by ascending position. Each comment without a position follows as its own
/// group. Review summary bodies are not part of the output.
pub fn group_review_comments(reviews: &[ReviewThread]) -> Vec<CommentGroup> {
    let mut by_position: BTreeMap<u64, CommentGroup> = BTreeMap::new();
    let mut unpositioned: Vec<CommentGroup> = Vec::new();

    for comment in reviews.iter().flat_map(|review| review.comments.iter()) {
        match comment.position {
            Some(position) => by_position
                .entry(position)
                .or_default()
                .push(comment.body.clone()),
            None => unpositioned.push(vec![comment.body.clone()]),
        }
    }

    by_position.into_values().chain(unpositioned).collect()
}

/// One singleton group per top-level comment.
pub fn group_comments(comments: &[TopLevelComment]) -> Vec<CommentGroup> {
    comments.iter().map(|c| vec![c.body.clone()]).collect()
}

/// Run the full transform: exclusion filter, grouping, and removal of pull
/// requests left without any group. Page order is preserved.
pub fn format_records(records: Vec<PullRequestRecord>, marker: &str) -> Vec<FormattedRecord> {
    exclude_dependency_updates(records, marker)
        .into_iter()
        .filter_map(|pr| {
            let mut groups = group_review_comments(&pr.reviews);
            groups.extend(group_comments(&pr.comments));
            if groups.is_empty() {
                return None;
            }
            Some(FormattedRecord {
                title: pr.title,
                url: pr.url,
                created_at: pr.created_at,
                comments: groups,
            })
        })
        .collect()
}
