use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE: &str = ".pr-comment-insights.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .pr-comment-insights.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub-specific settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Pagination settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Record exclusion settings
    #[serde(default)]
    pub filter: FilterConfig,

    /// Output settings
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// API base URL; the GraphQL endpoint is `{api_url}/graphql`
    pub api_url: String,
    /// Per-request timeout; 0 disables it
    pub timeout_secs: u64,
}

impl GitHubConfig {
    /// Request timeout, or None when `timeout_secs` is 0.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Pull requests requested per page
    pub page_size: u32,
    /// Pause between page requests, keeps clear of GitHub's abuse limits
    pub delay_ms: u64,
    /// How far back pagination walks before stopping
    pub lookback_days: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            delay_ms: 2000,
            lookback_days: 364,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Title substring marking automated dependency bumps
    pub exclude_marker: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_marker: "chore(deps):".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Trailing window of comments included in table output
    pub table_window_days: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            table_window_days: 10,
        }
    }
}

impl Config {
    /// Load configuration from .pr-comment-insights.toml in the current
    /// directory. Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        let mut config: Config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        config.github.token = config.github_token();
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var. Blank values count as unset.
    pub fn github_token(&self) -> Option<String> {
        let non_blank = |token: &String| !token.trim().is_empty();
        self.github
            .token
            .clone()
            .filter(non_blank)
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(non_blank))
    }
}
