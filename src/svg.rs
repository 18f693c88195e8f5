use serde::{Deserialize, Serialize};

const TOP_PADDING: f32 = 56.0;
const LEFT_PADDING: f32 = 72.0;
const RIGHT_PADDING: f32 = 30.0;
const BOTTOM_PADDING: f32 = 120.0;
const PLOT_HEIGHT: f32 = 300.0;
const BAR_WIDTH: f32 = 36.0;
const BAR_GAP: f32 = 18.0;
const MIN_PLOT_WIDTH: f32 = 360.0;
const Y_TICKS: u32 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

pub struct ThemeColors {
    pub bg: &'static str,
    pub text: &'static str,
    pub muted: &'static str,
    pub grid: &'static str,
}

impl Theme {
    pub fn colors(self) -> ThemeColors {
        match self {
            Theme::Dark => ThemeColors {
                bg: "#161b22",
                text: "#c9d1d9",
                muted: "#8b949e",
                grid: "#30363d",
            },
            Theme::Light => ThemeColors {
                bg: "#ffffff",
                text: "#24292f",
                muted: "#6a737d",
                grid: "#e1e4e8",
            },
        }
    }
}

/// Fill and outline of the bars in one chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarColor {
    pub fill: &'static str,
    pub stroke: &'static str,
}

/// Static description of a bar chart: labels, color and value style.
#[derive(Clone, Copy, Debug)]
pub struct ChartStyle {
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub color: BarColor,
    pub percent: bool,
}

// Utilities for building SVG content

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Sort descending by value. Equal values keep their input order.
pub fn sort_descending(mut data: Vec<(String, f64)>) -> Vec<(String, f64)> {
    data.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    data
}

/// Step between y-axis ticks: 1, 2 or 5 times a power of ten.
fn tick_step(max: f64, integer_only: bool) -> f64 {
    if max <= 0.0 {
        return 1.0;
    }

    let raw = max / Y_TICKS as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = match raw / magnitude {
        r if r <= 1.0 => magnitude,
        r if r <= 2.0 => 2.0 * magnitude,
        r if r <= 5.0 => 5.0 * magnitude,
        _ => 10.0 * magnitude,
    };

    if integer_only { step.max(1.0) } else { step }
}

fn format_value(value: f64, percent: bool) -> String {
    let text = if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    };
    if percent { format!("{text}%") } else { text }
}

/// Render one bar chart as a standalone SVG document.
///
/// `data` is drawn in the given order; callers sort it first. The y axis
/// always starts at zero.
pub fn render_bar_chart(style: &ChartStyle, data: &[(String, f64)], theme: Theme) -> String {
    let colors = theme.colors();

    let slot = BAR_WIDTH + BAR_GAP;
    let plot_width = (data.len() as f32 * slot).max(MIN_PLOT_WIDTH);
    let w = LEFT_PADDING + plot_width + RIGHT_PADDING;
    let h = TOP_PADDING + PLOT_HEIGHT + BOTTOM_PADDING;
    let baseline = TOP_PADDING + PLOT_HEIGHT;

    let max = data.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let step = tick_step(max, !style.percent);
    let axis_max = ((max / step).ceil() * step).max(step);
    let scale = |v: f64| (v / axis_max) as f32 * PLOT_HEIGHT;

    let mut grid = String::new();
    let mut tick = 0.0;
    while tick <= axis_max + step / 2.0 {
        let y = baseline - scale(tick);
        grid.push_str(&format!(
            r#"<line x1="{LEFT_PADDING}" y1="{y}" x2="{x2}" y2="{y}" class="grid"/>
<text x="{tx}" y="{ty}" class="tick" text-anchor="end">{label}</text>
"#,
            x2 = LEFT_PADDING + plot_width,
            tx = LEFT_PADDING - 8.0,
            ty = y + 4.0,
            label = format_value(tick, false),
        ));
        tick += step;
    }

    let mut bars = String::new();
    for (i, (user, value)) in data.iter().enumerate() {
        let x = LEFT_PADDING + i as f32 * slot + BAR_GAP / 2.0;
        let bar_h = scale(value.max(0.0));
        let y = baseline - bar_h;
        let center = x + BAR_WIDTH / 2.0;
        let user = escape_xml(user);
        let value_text = format_value(*value, style.percent);

        bars.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{BAR_WIDTH}" height="{bar_h}" class="bar"><title>{user}: {value_text}</title></rect>
<text x="{center}" y="{vy}" class="value" text-anchor="middle">{value_text}</text>
<text x="{center}" y="{ly}" class="tick" text-anchor="end" transform="rotate(-45 {center} {ly})">{user}</text>
"#,
            vy = y - 6.0,
            ly = baseline + 16.0,
        ));
    }

    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="-apple-system,Segoe UI,Helvetica,Arial,sans-serif" font-size="12px">
<style>
.title {{ fill: {text}; font-size: 16px; font-weight: bold; }}
.axis  {{ fill: {text}; font-size: 14px; }}
.tick  {{ fill: {muted}; }}
.value {{ fill: {text}; font-size: 11px; }}
.grid  {{ stroke: {grid_color}; stroke-width: 1; }}
.bar   {{ fill: {fill}; stroke: {stroke}; stroke-width: 1; }}
</style>
<rect width="{w}" height="{h}" fill="{bg}" rx="8"/>
<text x="{title_x}" y="28" class="title" text-anchor="middle">{title}</text>
{grid}{bars}<line x1="{LEFT_PADDING}" y1="{baseline}" x2="{x2}" y2="{baseline}" stroke="{muted}"/>
<text x="{title_x}" y="{x_label_y}" class="axis" text-anchor="middle">{x_label}</text>
<text x="18" y="{y_label_y}" class="axis" text-anchor="middle" transform="rotate(-90 18 {y_label_y})">{y_label}</text>
</svg>
"#,
        text = colors.text,
        muted = colors.muted,
        grid_color = colors.grid,
        bg = colors.bg,
        fill = style.color.fill,
        stroke = style.color.stroke,
        title_x = LEFT_PADDING + plot_width / 2.0,
        title = escape_xml(style.title),
        x2 = LEFT_PADDING + plot_width,
        x_label_y = h - 12.0,
        x_label = escape_xml(style.x_label),
        y_label_y = TOP_PADDING + PLOT_HEIGHT / 2.0,
        y_label = escape_xml(style.y_label),
    )
}
