//! Command-line interface argument parsing.
//!
//! Every value that can also live in the config file is optional here, so
//! that an unset flag never overrides the file.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::svg::Theme;

/// Pull-request review metrics for a GitHub repository.
///
/// Collects one year of pull requests and reviews, computes per-user
/// change-request statistics, saves them as JSON and renders bar charts.
///
/// Examples:
///   review-metrics collect --owner acme --repo widgets --year 2024
///   review-metrics collect --year 2024 --render
///   review-metrics render --source pr_metrics_2024.json --theme dark
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Enable verbose logging output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch pull requests, aggregate metrics and write the JSON report
    Collect(CollectArgs),
    /// Render the chart page from an existing JSON report
    Render(RenderArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CollectArgs {
    /// Repository owner (user or organization)
    #[arg(long, env = "GITHUB_OWNER")]
    pub owner: Option<String>,

    /// Repository name
    #[arg(long, env = "GITHUB_REPO")]
    pub repo: Option<String>,

    /// GitHub token with read access to the repository
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Calendar year of PR creation to report on
    #[arg(long, env = "REVIEW_METRICS_YEAR")]
    pub year: Option<i32>,

    /// Where to write the JSON report [default: pr_metrics_<year>.json]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// GraphQL endpoint
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Pull requests requested per page (1-100)
    #[arg(long, value_name = "COUNT", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub page_size: Option<u32>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .review-metrics.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also render the chart page after writing the report
    #[arg(long)]
    pub render: bool,

    /// Where to write the chart page when --render is set
    #[arg(long, value_name = "FILE")]
    pub charts_output: Option<PathBuf>,

    /// Chart color theme
    #[arg(long)]
    pub theme: Option<Theme>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RenderArgs {
    /// JSON report to chart: a file path or an http(s) URL
    #[arg(short, long, value_name = "PATH|URL")]
    pub source: Option<String>,

    /// Year used to derive the default source name
    #[arg(long, env = "REVIEW_METRICS_YEAR")]
    pub year: Option<i32>,

    /// Where to write the chart page
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// HTML template holding the prChart1..3 drawing surfaces
    #[arg(long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Chart color theme
    #[arg(long)]
    pub theme: Option<Theme>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds when the source is a URL
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl Args {
    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        match &self.command {
            Command::Collect(args) => args.config.as_ref(),
            Command::Render(args) => args.config.as_ref(),
        }
    }
}
