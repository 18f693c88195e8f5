//! page.rs
//!
//! Builds the HTML page holding the three review charts.
//!
//! A template names its drawing surfaces by id (`prChart1`..`prChart3`); each
//! chart's SVG is placed inside the matching element. Problems with the
//! template or the data never abort the page: the message is written in red
//! inside the `charts-container` element instead.

use std::path::Path;
use tracing::{error, info};

use crate::error::{MetricsError, Result};
use crate::metrics::MetricsByUser;
use crate::svg::{self, BarColor, ChartStyle, Theme};

pub const SURFACE_IDS: [&str; 3] = ["prChart1", "prChart2", "prChart3"];

const CONTAINER_CLASS: &str = "charts-container";

/// The three charts, in surface order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    ReceivingChanges,
    ChangesRequested,
    ChangeRequestRatio,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [
        ChartKind::ReceivingChanges,
        ChartKind::ChangesRequested,
        ChartKind::ChangeRequestRatio,
    ];

    pub fn style(self) -> ChartStyle {
        match self {
            ChartKind::ReceivingChanges => ChartStyle {
                title: "PRs Receiving Changes",
                x_label: "GitHub Username",
                y_label: "Number of PRs",
                color: BarColor {
                    fill: "rgba(255, 99, 132, 0.6)",
                    stroke: "rgba(255, 99, 132, 1)",
                },
                percent: false,
            },
            ChartKind::ChangesRequested => ChartStyle {
                title: "Changes Requested to Others",
                x_label: "GitHub Username",
                y_label: "Number of Reviews",
                color: BarColor {
                    fill: "rgba(54, 162, 235, 0.6)",
                    stroke: "rgba(54, 162, 235, 1)",
                },
                percent: false,
            },
            ChartKind::ChangeRequestRatio => ChartStyle {
                title: "% PRs Needing Changes",
                x_label: "GitHub Username",
                y_label: "Percentage",
                color: BarColor {
                    fill: "rgba(75, 192, 192, 0.6)",
                    stroke: "rgba(75, 192, 192, 1)",
                },
                percent: true,
            },
        }
    }

    /// Per-user values for this chart, largest first.
    pub fn series(self, metrics: &MetricsByUser) -> Vec<(String, f64)> {
        let data = metrics
            .iter()
            .map(|(user, m)| {
                let value = match self {
                    ChartKind::ReceivingChanges => m.prs_receiving_changes as f64,
                    ChartKind::ChangesRequested => m.changes_requested as f64,
                    ChartKind::ChangeRequestRatio => m.change_request_ratio.value(),
                };
                (user.clone(), value)
            })
            .collect();

        svg::sort_descending(data)
    }
}

/// Built-in page with the container and the three surfaces.
pub fn default_template(theme: Theme) -> String {
    let colors = theme.colors();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>PR Review Metrics</title>
<style>
body {{ background: {bg}; color: {text}; font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 0; padding: 24px; }}
h1 {{ font-size: 20px; }}
.charts-container {{ display: flex; flex-direction: column; gap: 32px; }}
.chart svg {{ max-width: 100%; height: auto; }}
</style>
</head>
<body>
<h1>PR Review Metrics</h1>
<div class="{CONTAINER_CLASS}">
<div id="prChart1" class="chart"></div>
<div id="prChart2" class="chart"></div>
<div id="prChart3" class="chart"></div>
</div>
</body>
</html>
"#,
        bg = colors.bg,
        text = colors.text,
    )
}

/// End offset of the opening tag of the first element whose `attr` value
/// satisfies `accept`. The attribute must stand alone, so `data-id` is not `id`.
fn opening_tag_end(html: &str, attr: &str, accept: impl Fn(&str) -> bool) -> Option<usize> {
    let bytes = html.as_bytes();
    let mut from = 0;

    while let Some(offset) = html[from..].find(attr) {
        let at = from + offset;
        from = at + attr.len();

        if at == 0 || !bytes[at - 1].is_ascii_whitespace() {
            continue;
        }
        let Some(rest) = html[from..].trim_start().strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };

        let value_start = html.len() - rest.len() + 1;
        let Some(len) = html[value_start..].find(quote) else {
            continue;
        };
        let value_end = value_start + len;
        if accept(&html[value_start..value_end]) {
            return html[value_end..].find('>').map(|o| value_end + o + 1);
        }
    }

    None
}

/// Locate the three drawing surfaces, or name the missing ones.
pub fn check_surfaces(template: &str) -> Result<Vec<(usize, ChartKind)>> {
    let mut slots = Vec::with_capacity(SURFACE_IDS.len());
    let mut missing = Vec::new();

    for (id, kind) in SURFACE_IDS.iter().zip(ChartKind::ALL) {
        match opening_tag_end(template, "id", |value| value == *id) {
            Some(end) => slots.push((end, kind)),
            None => missing.push(*id),
        }
    }

    if !missing.is_empty() {
        return Err(MetricsError::Load(format!(
            "Missing canvas elements: {}",
            missing.join(" ")
        )));
    }

    Ok(slots)
}

/// Place one chart per surface. Fails if any surface is missing.
pub fn render(template: &str, metrics: &MetricsByUser, theme: Theme) -> Result<String> {
    let mut slots = check_surfaces(template)?;

    // insert back to front so earlier offsets stay valid
    slots.sort_by(|a, b| b.0.cmp(&a.0));

    let mut html = template.to_string();
    for (end, kind) in slots {
        let chart = svg::render_bar_chart(&kind.style(), &kind.series(metrics), theme);
        html.insert_str(end, &chart);
        info!("Rendered chart: {}", kind.style().title);
    }

    Ok(html)
}

/// Render, or show the failure inline in the page.
pub fn render_page(template: &str, metrics: Result<MetricsByUser>, theme: Theme) -> String {
    let outcome = metrics.and_then(|metrics| render(template, &metrics, theme));
    match outcome {
        Ok(html) => html,
        Err(err) => {
            error!("Error loading data or rendering charts: {err}");
            inline_error(template, &err.to_string())
        }
    }
}

fn inline_error(template: &str, message: &str) -> String {
    let mut html = template.to_string();
    if let Some(end) = find_container(template) {
        html.insert_str(
            end,
            &format!(
                r#"<div style="color: red; padding: 20px;">Error: {}</div>"#,
                svg::escape_xml(message)
            ),
        );
    }
    html
}

fn find_container(html: &str) -> Option<usize> {
    opening_tag_end(html, "class", |value| {
        value.split_ascii_whitespace().any(|class| class == CONTAINER_CLASS)
    })
}

pub fn write_page(path: &Path, html: &str) -> Result<()> {
    let io_err = |source: std::io::Error| MetricsError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, html).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ChangeRequestRatio, UserMetrics};

    fn metrics() -> MetricsByUser {
        let mut metrics = MetricsByUser::new();
        metrics.insert(
            "alice".into(),
            UserMetrics {
                prs_receiving_changes: 1,
                changes_requested: 0,
                total_prs_opened: 3,
                change_request_ratio: ChangeRequestRatio::from_counts(1, 3),
            },
        );
        metrics.insert(
            "bob".into(),
            UserMetrics {
                prs_receiving_changes: 2,
                changes_requested: 5,
                total_prs_opened: 2,
                change_request_ratio: ChangeRequestRatio::from_counts(2, 2),
            },
        );
        metrics.insert(
            "carol".into(),
            UserMetrics {
                changes_requested: 1,
                ..UserMetrics::default()
            },
        );
        metrics
    }

    #[test]
    fn series_are_sorted_largest_first() {
        let ratio = ChartKind::ChangeRequestRatio.series(&metrics());
        assert_eq!(
            ratio,
            vec![
                ("bob".to_string(), 100.0),
                ("alice".to_string(), 33.3),
                ("carol".to_string(), 0.0),
            ]
        );

        let requested = ChartKind::ChangesRequested.series(&metrics());
        assert_eq!(requested[0], ("bob".to_string(), 5.0));
        assert_eq!(requested[1], ("carol".to_string(), 1.0));
    }

    #[test]
    fn each_surface_receives_its_chart() {
        let html = render(&default_template(Theme::Light), &metrics(), Theme::Light).unwrap();

        assert_eq!(html.matches("<svg").count(), 3);
        let first = html.find("PRs Receiving Changes").unwrap();
        let second = html.find("Changes Requested to Others").unwrap();
        let third = html.find("% PRs Needing Changes").unwrap();
        assert!(first < second && second < third);
        assert!(html.find(r#"id="prChart1""#).unwrap() < first);
    }

    #[test]
    fn missing_surfaces_are_named() {
        let template = r#"<div class="charts-container"><div id="prChart2"></div></div>"#;
        let err = render(template, &metrics(), Theme::Light).unwrap_err();
        assert!(err.to_string().contains("Missing canvas elements: prChart1 prChart3"));
    }

    #[test]
    fn load_failures_are_shown_inline() {
        let template = default_template(Theme::Dark);
        let html = render_page(
            &template,
            Err(MetricsError::Load("Could not load x.json: 404 Not Found".into())),
            Theme::Dark,
        );

        assert!(!html.contains("<svg"));
        assert!(html.contains(
            r#"<div style="color: red; padding: 20px;">Error: failed to load data: Could not load x.json: 404 Not Found</div>"#
        ));
    }

    #[test]
    fn single_quoted_surfaces_are_found() {
        let template = "<div class='charts-container'>\
            <div id='prChart1'></div><div id='prChart2'></div><div id='prChart3'></div></div>";
        let html = render_page(template, Ok(metrics()), Theme::Light);
        assert_eq!(html.matches("<svg").count(), 3);
    }

    #[test]
    fn container_is_found_among_other_classes() {
        let template = r#"<div class="wide charts-container"><div id="prChart1"></div></div>"#;
        let html = render_page(template, Ok(MetricsByUser::new()), Theme::Light);

        assert!(html.starts_with(
            r#"<div class="wide charts-container"><div style="color: red; padding: 20px;">Error: failed to load data: Missing canvas elements: prChart2 prChart3</div>"#
        ));
    }

    #[test]
    fn similar_class_names_are_not_the_container() {
        let template = r#"<div class="charts-container-old"></div>"#;
        let html = render_page(template, Ok(metrics()), Theme::Light);
        assert_eq!(html, template);
    }

    #[test]
    fn prefixed_attributes_are_not_surfaces() {
        let template = r#"<div class="charts-container">
<span data-id="prChart1"></span><div id="prChart2"></div><div id="prChart3"></div></div>"#;
        let html = render_page(template, Ok(metrics()), Theme::Light);

        assert!(html.contains("Missing canvas elements: prChart1"));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn spaces_around_equals_are_accepted() {
        let template = "<div class = \"charts-container\">\
            <div id = \"prChart1\"></div><div id=\"prChart2\"></div><div\tid='prChart3'></div></div>";
        assert_eq!(check_surfaces(template).unwrap().len(), 3);
    }

    #[test]
    fn write_page_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site").join("index.html");

        write_page(&path, "<html></html>").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }
}
