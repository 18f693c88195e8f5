mod cli;
mod config;
mod error;
mod github;
mod metrics;
mod model;
mod page;
mod report;
mod svg;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, CollectArgs, Command, RenderArgs};
use config::Config;
use github::GithubClient;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(args).await {
        error!("Run failed: {e:#}");
        std::process::exit(1);
    }
}

/// Compact stderr logging; RUST_LOG overrides the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = Config::discover(args.config_path())?;

    match &args.command {
        Command::Collect(collect_args) => collect(config, collect_args).await,
        Command::Render(render_args) => render(config, render_args).await,
    }
}

/// Access check, full fetch, aggregation and report write. Nothing is written
/// unless every step before it succeeded.
async fn collect(mut config: Config, args: &CollectArgs) -> Result<()> {
    config.merge_collect_args(args);
    let settings = config.validate_required()?;

    info!(
        "Configuration: owner={}, repo={}, year={}, api_url={}, token={}",
        settings.owner,
        settings.repo,
        settings.year,
        settings.api_url,
        settings.masked_token()
    );

    let client = GithubClient::new(&settings)?;

    info!("Testing API access...");
    let access = client
        .verify_access(&settings.owner, &settings.repo)
        .await?;

    info!("Fetching pull requests...");
    let prs = client
        .fetch_pull_requests(&settings.owner, &settings.repo, settings.page_size)
        .await?;
    info!("Found {} PRs in total.", prs.len());

    let metrics = metrics::aggregate(&prs, settings.year);
    debug!(
        "Final metrics by user: {}",
        serde_json::to_string_pretty(&metrics)?
    );

    report::persist(&metrics, &settings.output)?;
    println!(
        "Saved {} metrics for {} users ({} as {}) to {}",
        settings.year,
        metrics.len(),
        access.name_with_owner,
        access.login,
        settings.output.display()
    );

    if args.render {
        let source = settings.output.display().to_string();
        write_charts(&config, &source).await?;
    }

    Ok(())
}

async fn render(mut config: Config, args: &RenderArgs) -> Result<()> {
    config.merge_render_args(args);
    let source = match &args.source {
        Some(source) => source.clone(),
        None => config.default_render_source()?,
    };

    write_charts(&config, &source).await
}

/// Load errors end up inside the page; only template and write failures are
/// returned. The report is not fetched for a template that cannot hold it.
async fn write_charts(config: &Config, source: &str) -> Result<()> {
    let theme = config.charts.theme;
    let template = match &config.charts.template {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?,
        None => page::default_template(theme),
    };

    let timeout = Duration::from_secs(config.github.timeout_seconds.max(1));
    let loaded = match page::check_surfaces(&template) {
        Ok(_) => report::load(source, timeout).await,
        Err(err) => Err(err),
    };
    let html = page::render_page(&template, loaded, theme);

    page::write_page(&config.charts.output, &html)?;
    println!("Generated {} from {}", config.charts.output.display(), source);

    Ok(())
}
