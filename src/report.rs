//! report.rs
//!
//! Writes the aggregated metrics as a pretty-printed JSON object and reads it
//! back for charting, either from disk or over HTTP.

use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{MetricsError, Result};
use crate::metrics::MetricsByUser;

/// Write `metrics` to `path`, replacing any previous report.
pub fn persist(metrics: &MetricsByUser, path: &Path) -> Result<()> {
    let io_err = |source: std::io::Error| MetricsError::Io {
        path: path.display().to_string(),
        source,
    };

    let json = serde_json::to_string_pretty(metrics)
        .map_err(|e| io_err(std::io::Error::other(e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, json).map_err(io_err)?;

    info!("Results saved to {}", path.display());
    Ok(())
}

/// Load a report from a file path or an `http(s)://` URL.
pub async fn load(source: &str, timeout: Duration) -> Result<MetricsByUser> {
    info!("Attempting to load JSON from: {source}");

    let body = if source.starts_with("http://") || source.starts_with("https://") {
        fetch(source, timeout).await?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| MetricsError::Load(format!("Could not load {source}: {e}")))?
    };

    parse(source, &body)
}

async fn fetch(url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MetricsError::Load(e.to_string()))?;

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| MetricsError::Load(format!("Could not load {url}: {e}")))?;

    let status = resp.status();
    debug!("Fetch response: {}", status);
    if !status.is_success() {
        return Err(MetricsError::Load(format!(
            "Could not load {url}: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )));
    }

    resp.text()
        .await
        .map_err(|e| MetricsError::Load(format!("Could not load {url}: {e}")))
}

/// The document must be a JSON object of per-user metrics objects.
pub fn parse(source: &str, body: &str) -> Result<MetricsByUser> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| MetricsError::Load(format!("Invalid JSON in {source}: {e}")))?;

    if !value.is_object() {
        return Err(MetricsError::Load(format!("Invalid data format in {source}")));
    }

    serde_json::from_value(value)
        .map_err(|e| MetricsError::Load(format!("Invalid data format in {source}: {e}")))
}
