//! Configuration file handling.
//!
//! Settings come from `.review-metrics.toml` (or `--config`), overlaid by
//! environment variables and flags. Owner, repository, token and year are
//! required before anything touches the network.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::cli::{CollectArgs, RenderArgs};
use crate::error::{MetricsError, Result};
use crate::svg::Theme;

pub const DEFAULT_CONFIG_FILE: &str = ".review-metrics.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub charts: ChartsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub repo: Option<String>,

    /// Prefer GITHUB_TOKEN over committing this.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            token: None,
            api_url: default_api_url(),
            timeout_seconds: default_timeout(),
            page_size: default_page_size(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_page_size() -> u32 {
    100
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub year: Option<i32>,

    /// Defaults to `pr_metrics_<year>.json`.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsConfig {
    #[serde(default = "default_charts_output")]
    pub output: PathBuf,

    #[serde(default)]
    pub theme: Theme,

    #[serde(default)]
    pub template: Option<PathBuf>,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            output: default_charts_output(),
            theme: Theme::default(),
            template: None,
        }
    }
}

fn default_charts_output() -> PathBuf {
    PathBuf::from("pr_metrics.html")
}

/// Fully resolved settings for one collection run.
#[derive(Debug, Clone)]
pub struct CollectSettings {
    pub owner: String,
    pub repo: String,
    pub token: String,
    pub year: i32,
    pub api_url: String,
    pub timeout: Duration,
    pub page_size: u32,
    pub output: PathBuf,
}

impl CollectSettings {
    /// Token reduced to its first and last four characters for logging.
    pub fn masked_token(&self) -> String {
        mask_token(&self.token)
    }
}

pub fn report_file_name(year: i32) -> PathBuf {
    PathBuf::from(format!("pr_metrics_{year}.json"))
}

pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    match chars.len() {
        0 => "missing".to_string(),
        n if n <= 8 => "****".to_string(),
        n => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[n - 4..].iter().collect();
            format!("{head}...{tail}")
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MetricsError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            MetricsError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    pub fn discover(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            debug!("Loading config from {}", default_path.display());
            Self::load(default_path)
        } else {
            debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Merge collect flags (and their env fallbacks) over file values.
    pub fn merge_collect_args(&mut self, args: &CollectArgs) {
        if let Some(owner) = &args.owner {
            self.github.owner = Some(owner.clone());
        }
        if let Some(repo) = &args.repo {
            self.github.repo = Some(repo.clone());
        }
        if let Some(token) = &args.token {
            self.github.token = Some(token.clone());
        }
        if let Some(api_url) = &args.api_url {
            self.github.api_url = api_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.github.timeout_seconds = timeout;
        }
        if let Some(page_size) = args.page_size {
            self.github.page_size = page_size;
        }
        if let Some(year) = args.year {
            self.report.year = Some(year);
        }
        if let Some(output) = &args.output {
            self.report.output = Some(output.clone());
        }
        if let Some(output) = &args.charts_output {
            self.charts.output = output.clone();
        }
        if let Some(theme) = args.theme {
            self.charts.theme = theme;
        }
    }

    pub fn merge_render_args(&mut self, args: &RenderArgs) {
        if let Some(year) = args.year {
            self.report.year = Some(year);
        }
        if let Some(output) = &args.output {
            self.charts.output = output.clone();
        }
        if let Some(template) = &args.template {
            self.charts.template = Some(template.clone());
        }
        if let Some(theme) = args.theme {
            self.charts.theme = theme;
        }
        if let Some(timeout) = args.timeout {
            self.github.timeout_seconds = timeout;
        }
    }

    /// Check that every value a collection run needs is present.
    ///
    /// Empty strings count as missing.
    pub fn validate_required(&self) -> Result<CollectSettings> {
        fn required(key: &str, value: &Option<String>) -> Result<String> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(MetricsError::Config(format!(
                    "Missing required configuration: {key}"
                ))),
            }
        }

        let owner = required("owner", &self.github.owner)?;
        let repo = required("repo", &self.github.repo)?;
        let token = required("token", &self.github.token)?;
        let year = self.report.year.ok_or_else(|| {
            MetricsError::Config("Missing required configuration: year".to_string())
        })?;

        if self.github.timeout_seconds == 0 {
            return Err(MetricsError::Config(
                "Timeout must be at least 1 second".to_string(),
            ));
        }

        Ok(CollectSettings {
            owner,
            repo,
            token,
            year,
            api_url: self.github.api_url.clone(),
            timeout: Duration::from_secs(self.github.timeout_seconds),
            page_size: self.github.page_size.clamp(1, 100),
            output: self
                .report
                .output
                .clone()
                .unwrap_or_else(|| report_file_name(year)),
        })
    }

    /// Where `render` reads the report from when no source is given.
    pub fn default_render_source(&self) -> Result<String> {
        if let Some(output) = &self.report.output {
            return Ok(output.display().to_string());
        }
        match self.report.year {
            Some(year) => Ok(report_file_name(year).display().to_string()),
            None => Err(MetricsError::Config(
                "Missing required configuration: source (or year)".to_string(),
            )),
        }
    }
}
