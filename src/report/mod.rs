pub mod types;

pub use types::{OutputFormat, RunSummary};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::github::types::PullRequestRecord;
use crate::transform::FormattedRecord;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub const TABLE_HEADER: [&str; 4] = [
    "Pull Request Link",
    "Pull Request Title",
    "Review Comment",
    "Comment Date",
];

/// Write grouped records as a pretty-printed JSON array.
#[instrument(skip(records), fields(records = records.len(), path = %path.display()))]
pub fn write_json(records: &[FormattedRecord], path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    debug!("wrote JSON report");
    Ok(())
}

/// Write the raw records that carry any review or comment, as fetched.
/// Returns the number of records written.
#[instrument(skip(records), fields(path = %path.display()))]
pub fn write_raw(records: &[PullRequestRecord], path: &Path) -> Result<usize, ReportError> {
    let active: Vec<&PullRequestRecord> = records.iter().filter(|pr| pr.has_activity()).collect();
    let json = serde_json::to_string_pretty(&active)?;
    std::fs::write(path, json)?;
    debug!(records = active.len(), "wrote raw records");
    Ok(active.len())
}

/// Render one comma-separated row per comment created at or after `since`.
///
/// Inline review comments come before top-level comments within each pull
/// request. Blank comments are skipped. Returns the text and the number of
/// data rows.
pub fn render_table(records: &[PullRequestRecord], since: DateTime<Utc>) -> (String, usize) {
    let mut out = String::new();
    push_row(&mut out, &TABLE_HEADER);
    let mut rows = 0;

    for pr in records {
        let inline = pr
            .reviews
            .iter()
            .flat_map(|r| r.comments.iter())
            .map(|c| (c.body.as_str(), c.created_at));
        let top_level = pr.comments.iter().map(|c| (c.body.as_str(), c.created_at));

        for (body, created_at) in inline.chain(top_level) {
            if created_at < since || body.trim().is_empty() {
                continue;
            }
            let date = created_at.to_rfc3339_opts(SecondsFormat::Secs, true);
            push_row(&mut out, &[pr.url.as_str(), pr.title.as_str(), body, date.as_str()]);
            rows += 1;
        }
    }

    (out, rows)
}

/// Write the comment table for the trailing `window` ending at `now`.
/// A window reaching past chrono's range keeps every comment.
/// Returns the number of data rows written.
#[instrument(skip(records), fields(records = records.len(), path = %path.display()))]
pub fn write_table(
    records: &[PullRequestRecord],
    now: DateTime<Utc>,
    window: Duration,
    path: &Path,
) -> Result<usize, ReportError> {
    let since = now
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let (table, rows) = render_table(records, since);
    std::fs::write(path, table)?;
    debug!(rows, "wrote table report");
    Ok(rows)
}

fn push_row(out: &mut String, fields: &[&str]) {
    let escaped: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    out.push_str(&escaped.join(","));
    out.push('\n');
}

/// Quote a field when it holds a delimiter, quote, or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Print the run summary to the terminal.
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{} {}", "Source:".bold(), summary.source);
    println!(
        "Pages: {} | Pull requests fetched: {}",
        summary.pages, summary.fetched
    );
    let status = if summary.partial {
        summary.status.yellow().bold()
    } else {
        summary.status.green().bold()
    };
    println!("Status: {}", status);
    let written_label = match summary.format {
        OutputFormat::Json => "pull requests",
        OutputFormat::Table => "comment rows",
    };
    println!(
        "Wrote {} {} to {} ({})",
        summary.written,
        written_label,
        summary.output.display().to_string().cyan(),
        summary.format
    );
    if let Some(raw) = &summary.raw_output {
        println!("Raw records: {}", raw.display().to_string().cyan());
    }
    println!();
}
