//! Report Layer
//!
//! Turns the stored time series into one chart per host.
//!
//! - [`aggregate`]: groups records by host into [`CoordinateSeries`]
//! - [`ChartRenderer`]: draws one series ([`SvgChartRenderer`] in production)
//! - [`render_all`]: writes every chart into the output directory, isolating
//!   per-host failures

mod aggregate;
mod render;

pub use aggregate::{CoordinateSeries, Point, aggregate};
pub use render::{
    ChartRenderer, DEFAULT_HEIGHT, DEFAULT_WIDTH, RenderError, RenderReport, SvgChartRenderer,
    chart_file_name, render_all,
};
