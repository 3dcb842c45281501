//! Chart and table artifact rendering.
//!
//! Renderers are pure functions of the [`ExperimentTable`] they receive:
//! row order maps straight onto the x-axis / rendered row order, and no
//! sweep history beyond the table leaks in. Output is SVG markup; with the
//! `visualization` feature the drawing goes through trueno-viz's
//! `SvgEncoder`, otherwise a dependency-free writer emits the same layout.

#[cfg(not(feature = "visualization"))]
use std::fmt::Write as _;

use std::fs;
use std::path::Path;

use crate::error::{MedirError, Result};
use crate::sweep::ExperimentTable;

const CHART_WIDTH: f32 = 900.0;
const CHART_HEIGHT: f32 = 500.0;
const MARGIN: f32 = 60.0;
const PLOT_TOP: f32 = 90.0;

/// Sparkline bar characters (8 levels).
const SPARKLINE_BARS: &[char] = &['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Computed chart geometry shared by both rendering backends.
struct ChartLayout {
    /// Data points in row order, pixel coordinates
    points: Vec<(f32, f32)>,
    /// One x tick per row: position and label
    x_ticks: Vec<(f32, String)>,
    /// Min/mid/max y ticks: position and label
    y_ticks: Vec<(f32, String)>,
}

impl ChartLayout {
    fn plot_left() -> f32 {
        MARGIN + 20.0
    }

    fn plot_right() -> f32 {
        CHART_WIDTH - MARGIN
    }

    fn plot_bottom() -> f32 {
        CHART_HEIGHT - MARGIN
    }

    fn from_table(table: &ExperimentTable) -> Self {
        let params: Vec<f64> = table.rows.iter().map(|r| f64::from(r.parameter)).collect();
        let latencies = table.latencies();

        let x_min = params.first().copied().unwrap_or(0.0);
        let x_max = params.last().copied().unwrap_or(1.0);
        let x_span = if (x_max - x_min).abs() < f64::EPSILON {
            1.0
        } else {
            x_max - x_min
        };

        let lat_min = latencies.iter().copied().fold(f64::INFINITY, f64::min);
        let lat_max = latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let y_min = lat_min.min(0.0);
        let y_max = if lat_max <= y_min { y_min + 1.0 } else { lat_max };
        let y_span = y_max - y_min;

        let left = Self::plot_left();
        let bottom = Self::plot_bottom();
        let width = Self::plot_right() - left;
        let height = bottom - PLOT_TOP;

        let to_x = |p: f64| left + ((p - x_min) / x_span * f64::from(width)) as f32;
        let to_y = |v: f64| bottom - ((v - y_min) / y_span * f64::from(height)) as f32;

        let points = params
            .iter()
            .zip(&latencies)
            .map(|(&p, &v)| (to_x(p), to_y(v)))
            .collect();

        let x_ticks = table
            .rows
            .iter()
            .map(|row| (to_x(f64::from(row.parameter)), row.parameter.to_string()))
            .collect();

        let y_mid = f64::midpoint(y_min, y_max);
        let y_ticks = vec![
            (to_y(y_min), format!("{y_min:.1}")),
            (to_y(y_mid), format!("{y_mid:.1}")),
            (to_y(y_max), format!("{y_max:.1}")),
        ];

        Self {
            points,
            x_ticks,
            y_ticks,
        }
    }
}

/// Render a line chart of the table as SVG markup.
///
/// Pure function of the table: row order is the x-axis order. An empty
/// table renders a placeholder panel rather than failing.
#[must_use]
pub fn render_line_chart(
    table: &ExperimentTable,
    x_label: &str,
    y_label: &str,
    title: &str,
) -> String {
    if table.is_empty() {
        return render_placeholder(title);
    }
    let layout = ChartLayout::from_table(table);
    line_chart_svg(&layout, x_label, y_label, title)
}

/// Render the table itself as an SVG image: header row plus one row per
/// sweep point, in table order, means shown with two decimals.
#[must_use]
pub fn render_table_image(table: &ExperimentTable, title: &str) -> String {
    if table.is_empty() {
        return render_placeholder(title);
    }
    table_image_svg(table, title)
}

/// Write a rendered artifact to disk.
///
/// # Errors
///
/// Returns `MedirError::ArtifactWrite` when the file cannot be written.
pub fn write_artifact(path: &Path, svg: &str) -> Result<()> {
    fs::write(path, svg).map_err(|source| MedirError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Render a compact terminal sparkline for quick latency trends.
#[must_use]
pub fn render_sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    let mut out = String::with_capacity(width);
    for i in 0..width {
        let idx = i * values.len() / width;
        let value = values[idx.min(values.len() - 1)];
        let normalized = if range > 0.0 {
            (value - min) / range
        } else {
            0.5
        };
        let bar = (normalized * (SPARKLINE_BARS.len() - 1) as f64).round() as usize;
        out.push(SPARKLINE_BARS[bar.min(SPARKLINE_BARS.len() - 1)]);
    }
    out
}

#[cfg(not(feature = "visualization"))]
fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ============================================================================
// Dependency-free SVG backend
// ============================================================================

#[cfg(not(feature = "visualization"))]
fn line_chart_svg(layout: &ChartLayout, x_label: &str, y_label: &str, title: &str) -> String {
    let mut svg = svg_open();
    let left = ChartLayout::plot_left();
    let right = ChartLayout::plot_right();
    let bottom = ChartLayout::plot_bottom();

    let _ = writeln!(
        svg,
        r##"  <text x="{x}" y="34" text-anchor="middle" font-size="18" fill="#333">{t}</text>"##,
        x = CHART_WIDTH / 2.0,
        t = escape_text(title)
    );

    // Axes
    let _ = writeln!(
        svg,
        r##"  <line x1="{left}" y1="{PLOT_TOP}" x2="{left}" y2="{bottom}" stroke="#333" stroke-width="1"/>"##
    );
    let _ = writeln!(
        svg,
        r##"  <line x1="{left}" y1="{bottom}" x2="{right}" y2="{bottom}" stroke="#333" stroke-width="1"/>"##
    );

    // Ticks and grid
    for (x, label) in &layout.x_ticks {
        let _ = writeln!(
            svg,
            r##"  <line x1="{x}" y1="{bottom}" x2="{x}" y2="{y2}" stroke="#333" stroke-width="1"/>"##,
            y2 = bottom + 5.0
        );
        let _ = writeln!(
            svg,
            r##"  <text x="{x}" y="{y}" text-anchor="middle" font-size="11" fill="#333">{label}</text>"##,
            y = bottom + 20.0,
            label = escape_text(label)
        );
    }
    for (y, label) in &layout.y_ticks {
        let _ = writeln!(
            svg,
            r##"  <line x1="{x1}" y1="{y}" x2="{right}" y2="{y}" stroke="#ddd" stroke-width="1"/>"##,
            x1 = left
        );
        let _ = writeln!(
            svg,
            r##"  <text x="{x}" y="{y}" text-anchor="end" font-size="11" fill="#333">{label}</text>"##,
            x = left - 8.0,
            y = y + 4.0,
            label = escape_text(label)
        );
    }

    // Axis labels
    let _ = writeln!(
        svg,
        r##"  <text x="{x}" y="{y}" text-anchor="middle" font-size="13" fill="#333">{l}</text>"##,
        x = (left + right) / 2.0,
        y = CHART_HEIGHT - 15.0,
        l = escape_text(x_label)
    );
    let _ = writeln!(
        svg,
        r##"  <text x="{x}" y="{y}" text-anchor="start" font-size="13" fill="#333">{l}</text>"##,
        x = 15.0,
        y = PLOT_TOP - 16.0,
        l = escape_text(y_label)
    );

    // Data series
    let points = layout
        .points
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(
        svg,
        r##"  <polyline points="{points}" fill="none" stroke="#4285f4" stroke-width="2"/>"##
    );
    for (x, y) in &layout.points {
        let _ = writeln!(
            svg,
            r##"  <circle cx="{x:.1}" cy="{y:.1}" r="3.5" fill="#4285f4"/>"##
        );
    }

    svg.push_str("</svg>\n");
    svg
}

#[cfg(not(feature = "visualization"))]
fn table_image_svg(table: &ExperimentTable, title: &str) -> String {
    let rows = table.rows.len() as f32;
    let row_height = 26.0;
    let width = 460.0;
    let height = 70.0 + (rows + 1.0) * row_height + 20.0;
    let left = 30.0;
    let col_width = (width - 2.0 * left) / 2.0;
    let header_y = 70.0;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    let _ = writeln!(
        svg,
        r##"  <rect width="{width}" height="{height}" fill="#fafafa"/>"##
    );
    let _ = writeln!(
        svg,
        r##"  <text x="{x}" y="34" text-anchor="middle" font-size="16" fill="#333">{t}</text>"##,
        x = width / 2.0,
        t = escape_text(title)
    );

    // Header
    for (i, label) in [&table.parameter_label, &table.latency_label]
        .iter()
        .enumerate()
    {
        let _ = writeln!(
            svg,
            r##"  <text x="{x}" y="{y}" text-anchor="middle" font-size="13" font-weight="bold" fill="#333">{l}</text>"##,
            x = left + (i as f32 + 0.5) * col_width,
            y = header_y,
            l = escape_text(label)
        );
    }
    let _ = writeln!(
        svg,
        r##"  <line x1="{left}" y1="{y}" x2="{x2}" y2="{y}" stroke="#333" stroke-width="1"/>"##,
        y = header_y + 8.0,
        x2 = width - left
    );

    // Rows, preserving table order
    for (i, row) in table.rows.iter().enumerate() {
        let y = header_y + 8.0 + (i as f32 + 1.0) * row_height;
        let _ = writeln!(
            svg,
            r##"  <text x="{x}" y="{y}" text-anchor="middle" font-size="12" fill="#333">{v}</text>"##,
            x = left + 0.5 * col_width,
            v = row.parameter
        );
        let _ = writeln!(
            svg,
            r##"  <text x="{x}" y="{y}" text-anchor="middle" font-size="12" fill="#333">{v:.2}</text>"##,
            x = left + 1.5 * col_width,
            v = row.mean_latency
        );
        let _ = writeln!(
            svg,
            r##"  <line x1="{left}" y1="{sep}" x2="{x2}" y2="{sep}" stroke="#ddd" stroke-width="1"/>"##,
            sep = y + 8.0,
            x2 = width - left
        );
    }

    let _ = writeln!(
        svg,
        r##"  <rect x="{left}" y="{y}" width="{w}" height="{h}" fill="none" stroke="#999" stroke-width="1"/>"##,
        y = header_y - 18.0,
        w = width - 2.0 * left,
        h = (rows + 1.0) * row_height + 8.0
    );

    svg.push_str("</svg>\n");
    svg
}

#[cfg(not(feature = "visualization"))]
fn render_placeholder(title: &str) -> String {
    let mut svg = svg_open();
    let _ = writeln!(
        svg,
        r##"  <text x="{x}" y="34" text-anchor="middle" font-size="18" fill="#333">{t}</text>"##,
        x = CHART_WIDTH / 2.0,
        t = escape_text(title)
    );
    let _ = writeln!(
        svg,
        r##"  <text x="{x}" y="{y}" text-anchor="middle" font-size="14" fill="#999">no data</text>"##,
        x = CHART_WIDTH / 2.0,
        y = CHART_HEIGHT / 2.0
    );
    svg.push_str("</svg>\n");
    svg
}

#[cfg(not(feature = "visualization"))]
fn svg_open() -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{CHART_WIDTH}" height="{CHART_HEIGHT}" viewBox="0 0 {CHART_WIDTH} {CHART_HEIGHT}">"#
    );
    let _ = writeln!(
        svg,
        r##"  <rect width="{CHART_WIDTH}" height="{CHART_HEIGHT}" fill="#fafafa"/>"##
    );
    svg
}

// ============================================================================
// trueno-viz backend
// ============================================================================

#[cfg(feature = "visualization")]
mod viz_backend {
    use trueno_viz::color::Rgba;
    use trueno_viz::output::{SvgEncoder, TextAnchor};

    use super::{ChartLayout, ExperimentTable, CHART_HEIGHT, CHART_WIDTH, PLOT_TOP};

    fn ink() -> Rgba {
        Rgba::rgb(51, 51, 51)
    }

    fn grid() -> Rgba {
        Rgba::rgb(221, 221, 221)
    }

    fn series() -> Rgba {
        Rgba::rgb(66, 133, 244)
    }

    fn base_encoder(width: u32, height: u32, title: &str) -> SvgEncoder {
        SvgEncoder::new(width, height)
            .background(Some(Rgba::rgb(250, 250, 250)))
            .text_anchored(
                width as f32 / 2.0,
                34.0,
                title,
                18.0,
                ink(),
                TextAnchor::Middle,
            )
    }

    pub(super) fn line_chart(
        layout: &ChartLayout,
        x_label: &str,
        y_label: &str,
        title: &str,
    ) -> String {
        let left = ChartLayout::plot_left();
        let right = ChartLayout::plot_right();
        let bottom = ChartLayout::plot_bottom();

        let mut encoder = base_encoder(CHART_WIDTH as u32, CHART_HEIGHT as u32, title)
            .rect(left, PLOT_TOP, 1.0, bottom - PLOT_TOP, ink())
            .rect(left, bottom, right - left, 1.0, ink())
            .text_anchored(
                (left + right) / 2.0,
                CHART_HEIGHT - 15.0,
                x_label,
                13.0,
                ink(),
                TextAnchor::Middle,
            )
            .text(15.0, PLOT_TOP - 16.0, y_label, 13.0, ink());

        for (x, label) in &layout.x_ticks {
            encoder = encoder.rect(*x, bottom, 1.0, 5.0, ink()).text_anchored(
                *x,
                bottom + 20.0,
                label,
                11.0,
                ink(),
                TextAnchor::Middle,
            );
        }
        for (y, label) in &layout.y_ticks {
            encoder = encoder
                .rect(left, *y, right - left, 1.0, grid())
                .text_anchored(left - 8.0, y + 4.0, label, 11.0, ink(), TextAnchor::End);
        }

        // Series: dotted segments between consecutive points, then markers.
        for pair in layout.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            let steps = 24;
            for step in 0..=steps {
                let t = step as f32 / steps as f32;
                let x = x0 + (x1 - x0) * t;
                let y = y0 + (y1 - y0) * t;
                encoder = encoder.rect(x - 1.0, y - 1.0, 2.0, 2.0, series());
            }
        }
        for (x, y) in &layout.points {
            encoder = encoder.rect(x - 3.0, y - 3.0, 6.0, 6.0, series());
        }

        encoder.render()
    }

    pub(super) fn table_image(table: &ExperimentTable, title: &str) -> String {
        let rows = table.rows.len() as f32;
        let row_height = 26.0;
        let width = 460.0_f32;
        let height = 70.0 + (rows + 1.0) * row_height + 20.0;
        let left = 30.0;
        let col_width = (width - 2.0 * left) / 2.0;
        let header_y = 70.0;

        let mut encoder = base_encoder(width as u32, height as u32, title);

        for (i, label) in [&table.parameter_label, &table.latency_label]
            .iter()
            .enumerate()
        {
            encoder = encoder.text_anchored(
                left + (i as f32 + 0.5) * col_width,
                header_y,
                label,
                13.0,
                ink(),
                TextAnchor::Middle,
            );
        }
        encoder = encoder.rect(left, header_y + 8.0, width - 2.0 * left, 1.0, ink());

        for (i, row) in table.rows.iter().enumerate() {
            let y = header_y + 8.0 + (i as f32 + 1.0) * row_height;
            encoder = encoder
                .text_anchored(
                    left + 0.5 * col_width,
                    y,
                    &row.parameter.to_string(),
                    12.0,
                    ink(),
                    TextAnchor::Middle,
                )
                .text_anchored(
                    left + 1.5 * col_width,
                    y,
                    &format!("{:.2}", row.mean_latency),
                    12.0,
                    ink(),
                    TextAnchor::Middle,
                )
                .rect(left, y + 8.0, width - 2.0 * left, 1.0, grid());
        }

        encoder.render()
    }

    pub(super) fn placeholder(title: &str) -> String {
        base_encoder(CHART_WIDTH as u32, CHART_HEIGHT as u32, title)
            .text_anchored(
                CHART_WIDTH / 2.0,
                CHART_HEIGHT / 2.0,
                "no data",
                14.0,
                Rgba::rgb(153, 153, 153),
                TextAnchor::Middle,
            )
            .render()
    }
}

#[cfg(feature = "visualization")]
fn line_chart_svg(layout: &ChartLayout, x_label: &str, y_label: &str, title: &str) -> String {
    viz_backend::line_chart(layout, x_label, y_label, title)
}

#[cfg(feature = "visualization")]
fn table_image_svg(table: &ExperimentTable, title: &str) -> String {
    viz_backend::table_image(table, title)
}

#[cfg(feature = "visualization")]
fn render_placeholder(title: &str) -> String {
    viz_backend::placeholder(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::SweepRow;

    fn sample_table() -> ExperimentTable {
        let mut table = ExperimentTable::new("Threads", "Latency (ms)");
        for (parameter, mean_latency) in [(1, 42.0), (2, 35.5), (3, 28.25)] {
            table.rows.push(SweepRow {
                parameter,
                mean_latency,
            });
        }
        table
    }

    #[test]
    fn test_line_chart_contains_title_and_labels() {
        let svg = render_line_chart(&sample_table(), "Threads", "Latency (ms)", "Latency vs Threads");
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Latency vs Threads"));
        assert!(svg.contains("Threads"));
    }

    #[cfg(not(feature = "visualization"))]
    #[test]
    fn test_line_chart_one_marker_per_row() {
        let svg = render_line_chart(&sample_table(), "x", "y", "t");
        assert_eq!(svg.matches("<circle").count(), 3);
    }

    #[cfg(not(feature = "visualization"))]
    #[test]
    fn test_line_chart_x_ticks_in_row_order() {
        let svg = render_line_chart(&sample_table(), "x", "y", "t");
        let first = svg.find(">1</text>").expect("tick 1");
        let second = svg.find(">2</text>").expect("tick 2");
        let third = svg.find(">3</text>").expect("tick 3");
        assert!(first < second && second < third);
    }

    #[test]
    fn test_line_chart_handles_failure_rows() {
        let mut table = sample_table();
        table.rows[1].mean_latency = -1.0;
        let svg = render_line_chart(&table, "x", "y", "t");
        // Failure rows stay on the chart; y range extends below zero.
        assert!(svg.contains("-1.0"));
    }

    #[test]
    fn test_table_image_renders_rows_in_order() {
        let svg = render_table_image(&sample_table(), "Latency by Threads");
        assert!(svg.contains("Latency by Threads"));
        assert!(svg.contains("42.00"));
        assert!(svg.contains("35.50"));
        assert!(svg.find("42.00").unwrap() < svg.find("35.50").unwrap());
    }

    #[test]
    fn test_empty_table_renders_placeholder() {
        let table = ExperimentTable::new("p", "l");
        let chart = render_line_chart(&table, "x", "y", "Empty Sweep");
        assert!(chart.contains("no data"));
        let image = render_table_image(&table, "Empty Sweep");
        assert!(image.contains("no data"));
    }

    #[cfg(not(feature = "visualization"))]
    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn test_write_artifact_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        let svg = render_line_chart(&sample_table(), "x", "y", "t");
        write_artifact(&path, &svg).unwrap();
        assert!(path.exists());
        assert!(fs::read_to_string(&path).unwrap().contains("<svg"));
    }

    #[test]
    fn test_write_artifact_surfaces_io_error() {
        let err = write_artifact(Path::new("/nonexistent-dir/chart.svg"), "x").unwrap_err();
        assert!(err.to_string().contains("artifact"));
    }

    #[test]
    fn test_sparkline_width_and_extremes() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 4.0, 3.0, 2.0, 1.0];
        let line = render_sparkline(&values, 9);
        assert_eq!(line.chars().count(), 9);
        assert!(line.contains('▁'));
        assert!(line.contains('█'));
    }

    #[test]
    fn test_sparkline_empty() {
        assert!(render_sparkline(&[], 10).is_empty());
    }

    #[test]
    fn test_sparkline_constant_values() {
        let line = render_sparkline(&[5.0; 8], 8);
        let unique: std::collections::HashSet<char> = line.chars().collect();
        assert_eq!(unique.len(), 1);
    }
}
