//! net-health - network reachability and latency monitor
//!
//! Periodically probes a fixed list of remote hosts and every address of the
//! configured local subnets, appends the latency samples to a flat log and
//! renders one latency-over-time chart per host.
//!
//! # Architecture
//!
//! - **Collector**: host enumeration, liveness phase and latency phase over ICMP
//! - **Storage**: append-only JSON-lines time series
//! - **Report**: per-host aggregation and SVG chart rendering
//! - **Pipeline / Scheduler**: one collection cycle, fired on an interval or cron
//! - **Server**: serves the rendered charts
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use net_health::{AppConfig, IcmpProber, Pipeline};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let pipeline = Pipeline::from_config(&config, Arc::new(IcmpProber::new()));
//! let report = pipeline.run_once().await?;
//! println!("{} samples stored", report.stored);
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod server;
pub mod storage;

pub use collector::{
    CollectionOutcome, Collector, FanOut, Host, HostEnumerator, IcmpProber, Ipv4Block,
    LivenessResult, ProbeError, ProbeSpec, ProbeStats, Prober,
};
pub use config::{AppConfig, ConfigError};
pub use pipeline::{CycleReport, Pipeline, PipelineError};
pub use report::{
    ChartRenderer, CoordinateSeries, Point, RenderError, RenderReport, SvgChartRenderer,
    aggregate,
};
pub use scheduler::{CycleJob, Schedule, Scheduler};
pub use storage::{CorruptRecordPolicy, LatencySample, StorageError, TimeSeriesStore};
