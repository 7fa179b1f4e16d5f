use std::path::PathBuf;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON array of grouped comments per pull request
    Json,
    /// Comma-separated rows, one per recent comment
    Table,
}

impl OutputFormat {
    /// File written when no explicit output path is given.
    pub fn default_path(self) -> PathBuf {
        match self {
            OutputFormat::Json => PathBuf::from("output.json"),
            OutputFormat::Table => PathBuf::from("output.csv"),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

/// What a run did, for the closing terminal summary.
#[derive(Debug)]
pub struct RunSummary {
    /// Repository slug, or "fixture" in mock mode
    pub source: String,
    pub pages: usize,
    /// Pull requests fetched before any filtering
    pub fetched: usize,
    /// Entries written: pull requests for JSON, comment rows for table
    pub written: usize,
    /// Human-readable pagination status
    pub status: String,
    /// Whether pagination stopped early on an error
    pub partial: bool,
    pub format: OutputFormat,
    pub output: PathBuf,
    pub raw_output: Option<PathBuf>,
}
