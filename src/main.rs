mod config;
mod github;
mod report;
mod transform;

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use config::Config;
use github::{FetchOptions, FetchStatus, FixtureSource, GraphqlSource, PageSource};
use report::{OutputFormat, RunSummary};

/// Largest `first` argument GitHub's GraphQL API accepts.
const MAX_PAGE_SIZE: u32 = 100;

/// PR Comment Insights: collects review comments from a GitHub repository's
/// recent pull requests and exports them for analysis.
#[derive(Parser, Debug)]
#[command(name = "pr-comment-insights", version, about)]
struct Cli {
    /// Repository as owner/name or https://github.com/owner/name
    ///
    /// Not required when --mock is used.
    repo: Option<String>,

    /// Output file path (default: output.json or output.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Stop paginating once pull requests are older than this many days
    #[arg(long, conflicts_with = "all")]
    since_days: Option<u32>,

    /// Walk every page regardless of age
    #[arg(long)]
    all: bool,

    /// Pull requests requested per page (GitHub allows 1 to 100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    page_size: Option<u32>,

    /// Pause between page requests in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Also write fetched records with any activity, unfiltered, to this path
    #[arg(long)]
    raw_output: Option<PathBuf>,

    /// Use built-in fixture pages for demo purposes (no GitHub token needed)
    #[arg(long)]
    r#mock: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = Config::load()?;

    let summary = run(&cli, &config).await?;
    report::print_summary(&summary);
    info!(written = summary.written, "done");

    Ok(())
}

/// Fetch, transform, and write one report.
async fn run(cli: &Cli, config: &Config) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let (source, label, now): (Box<dyn PageSource>, String, DateTime<Utc>) = if cli.r#mock {
        info!("using fixture pages for demo");
        let fixture = FixtureSource::embedded()?;
        let now = fixture.reference_time().unwrap_or_else(Utc::now);
        (Box::new(fixture) as Box<dyn PageSource>, "fixture".to_string(), now)
    } else {
        let repo_arg = cli.repo.as_deref().ok_or(
            "repository is required unless --mock is used. Usage: pr-comment-insights <owner/repo> or pr-comment-insights --mock",
        )?;
        let repo = github::parse_repo(repo_arg)?;
        debug!(owner = %repo.owner, name = %repo.name, "parsed repository");
        let label = repo.to_string();
        let source: Box<dyn PageSource> = Box::new(GraphqlSource::from_config(repo, config)?);
        (source, label, Utc::now())
    };

    let options = fetch_options(cli, config, now);
    info!(source = %label, "fetching pull requests");
    let outcome = github::fetch_pull_requests(source.as_ref(), &options)
        .instrument(info_span!("collect", source = %label))
        .await;

    let pages = outcome.pages;
    let status = outcome.status.to_string();
    let partial = matches!(outcome.status, FetchStatus::Partial(_));
    if partial {
        warn!(%status, "continuing with partial results");
    }
    let records = outcome.into_records()?;
    let fetched = records.len();
    info!(pages, fetched, "fetched pull requests");

    if let Some(raw_path) = &cli.raw_output {
        let raw_count = report::write_raw(&records, raw_path)?;
        info!(records = raw_count, path = %raw_path.display(), "wrote raw records");
    }

    let marker = config.filter.exclude_marker.as_str();
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.format.default_path());

    let written = match cli.format {
        OutputFormat::Json => {
            let formatted = transform::format_records(records, marker);
            report::write_json(&formatted, &output)?;
            formatted.len()
        }
        OutputFormat::Table => {
            let kept = transform::exclude_dependency_updates(records, marker);
            let window = Duration::try_days(i64::from(config.report.table_window_days))
                .unwrap_or(Duration::MAX);
            report::write_table(&kept, now, window, &output)?
        }
    };

    Ok(RunSummary {
        source: label,
        pages,
        fetched,
        written,
        status,
        partial,
        format: cli.format,
        output,
        raw_output: cli.raw_output.clone(),
    })
}

/// Merge CLI overrides over configuration. Fixture runs skip the delay.
fn fetch_options(cli: &Cli, config: &Config, now: DateTime<Utc>) -> FetchOptions {
    let lookback_days = cli.since_days.unwrap_or(config.fetch.lookback_days);
    // A lookback reaching past chrono's range walks every page
    let boundary = if cli.all {
        None
    } else {
        Duration::try_days(i64::from(lookback_days)).and_then(|d| now.checked_sub_signed(d))
    };
    let delay = if cli.r#mock {
        std::time::Duration::ZERO
    } else {
        std::time::Duration::from_millis(cli.delay_ms.unwrap_or(config.fetch.delay_ms))
    };

    FetchOptions {
        page_size: cli
            .page_size
            .unwrap_or(config.fetch.page_size)
            .clamp(1, MAX_PAGE_SIZE),
        delay,
        boundary,
    }
}
