//! Chart rendering.
//!
//! One SVG per host: time on the x-axis, latency in milliseconds on the
//! y-axis, a line through the samples plus a marker per sample, on a grid.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use thiserror::Error;

use crate::collector::Host;
use crate::report::aggregate::CoordinateSeries;

/// Default canvas width in pixels (about 20 cm at 96 dpi).
pub const DEFAULT_WIDTH: u32 = 800;

/// Default canvas height in pixels (about 7 cm at 96 dpi).
pub const DEFAULT_HEIGHT: u32 = 280;

/// Horizontal padding, in seconds, around a series with a single timestamp.
const SINGLE_POINT_PADDING_SECS: i64 = 30;

/// Errors raised while drawing a chart.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Output directory or chart file could not be written.
    #[error("render io error: {0}")]
    Io(#[from] std::io::Error),

    /// The drawing backend failed.
    #[error("drawing backend error: {0}")]
    Backend(String),

    /// Nothing to draw.
    #[error("series for '{0}' has no points")]
    EmptySeries(Host),
}

fn backend_err<E>(e: DrawingAreaErrorKind<E>) -> RenderError
where
    E: std::error::Error + Send + Sync,
{
    RenderError::Backend(e.to_string())
}

/// Draws a single host's series to a file.
pub trait ChartRenderer: Send + Sync + 'static {
    /// File extension of the produced artifact, without the dot.
    fn extension(&self) -> &'static str;

    /// Draw `series` into `path`, replacing any existing file.
    fn render(&self, series: &CoordinateSeries, path: &Path) -> Result<(), RenderError>;
}

/// SVG chart renderer backed by `plotters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgChartRenderer {
    width: u32,
    height: u32,
}

impl SvgChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

/// Tick label for a unix timestamp, e.g. `03-01 10:00:00`.
fn format_time_tick(secs: f64) -> String {
    DateTime::from_timestamp(secs.round() as i64, 0)
        .map(|t| t.format("%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

impl ChartRenderer for SvgChartRenderer {
    fn extension(&self) -> &'static str {
        "svg"
    }

    fn render(&self, series: &CoordinateSeries, path: &Path) -> Result<(), RenderError> {
        let (x_min, x_max) = series
            .x_bounds()
            .ok_or_else(|| RenderError::EmptySeries(series.host.clone()))?;
        let (x_min, x_max) = if x_min == x_max {
            (x_min - SINGLE_POINT_PADDING_SECS, x_max + SINGLE_POINT_PADDING_SECS)
        } else {
            (x_min, x_max)
        };
        let y_max = series.y_max().unwrap_or(0.0).max(1.0) * 1.1;

        let root = SVGBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(backend_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Ping for {}", series.host), ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(x_min as f64..x_max as f64, 0f64..y_max)
            .map_err(backend_err)?;

        chart
            .configure_mesh()
            .x_labels(5)
            .x_label_formatter(&|x| format_time_tick(*x))
            .y_desc("Ping Time (ms)")
            .draw()
            .map_err(backend_err)?;

        chart
            .draw_series(LineSeries::new(
                series.points.iter().map(|p| (p.x as f64, p.y)),
                GREEN.stroke_width(2),
            ))
            .map_err(backend_err)?;

        chart
            .draw_series(
                series
                    .points
                    .iter()
                    .map(|p| Circle::new((p.x as f64, p.y), 3, RED.filled())),
            )
            .map_err(backend_err)?;

        root.present().map_err(backend_err)?;
        Ok(())
    }
}

/// Deterministic, filesystem-safe chart file name for `host`.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; anything else becomes `_`.
/// A leading dot is prefixed so the name can never be hidden or `..`.
pub fn chart_file_name(host: &Host, extension: &str) -> String {
    let mut stem: String = host
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() || stem.starts_with('.') {
        stem.insert(0, '_');
    }
    format!("{stem}.{extension}")
}

/// Charts written and hosts skipped by one render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    pub rendered: Vec<PathBuf>,
    pub failed: Vec<(Host, String)>,
}

/// Render every series into `output_dir`, creating it if needed.
///
/// Each chart is drawn to a temporary file and renamed into place, so the
/// file server never sees a half-written chart. A failing host is logged and
/// skipped; only an unusable output directory fails the whole pass.
///
/// When two hosts sanitize to the same file name, the first one keeps the
/// chart and the other is reported as failed.
pub fn render_all<'a>(
    renderer: &dyn ChartRenderer,
    series: impl IntoIterator<Item = &'a CoordinateSeries>,
    output_dir: &Path,
) -> Result<RenderReport, RenderError> {
    std::fs::create_dir_all(output_dir)?;

    let mut report = RenderReport::default();
    let mut claimed: HashMap<String, &Host> = HashMap::new();
    for s in series {
        let file_name = chart_file_name(&s.host, renderer.extension());
        if let Some(owner) = claimed.get(&file_name) {
            tracing::warn!(
                host = %s.host,
                owner = %owner,
                file = %file_name,
                "Skipping chart: file name already used"
            );
            let reason = format!("chart file '{file_name}' already used by '{owner}'");
            report.failed.push((s.host.clone(), reason));
            continue;
        }
        claimed.insert(file_name.clone(), &s.host);
        let target = output_dir.join(&file_name);
        let staging = output_dir.join(format!(".{file_name}.tmp"));

        let result = renderer
            .render(s, &staging)
            .and_then(|()| std::fs::rename(&staging, &target).map_err(RenderError::from));

        match result {
            Ok(()) => {
                tracing::debug!(host = %s.host, path = %target.display(), points = s.len(), "Chart rendered");
                report.rendered.push(target);
            }
            Err(e) => {
                tracing::warn!(host = %s.host, error = %e, "Skipping chart");
                let _ = std::fs::remove_file(&staging);
                report.failed.push((s.host.clone(), e.to_string()));
            }
        }
    }
    Ok(report)
}
