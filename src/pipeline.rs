//! One collection cycle: enumerate, probe, persist, aggregate, render.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::collector::{Collector, HostEnumerator, Prober};
use crate::config::AppConfig;
use crate::report::{ChartRenderer, RenderError, RenderReport, aggregate, render_all};
use crate::scheduler::CycleJob;
use crate::storage::{StorageError, TimeSeriesStore};

/// Errors that abort a cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Hosts enumerated and probed for liveness.
    pub probed: usize,
    /// Hosts that answered the liveness probe.
    pub reachable: usize,
    /// Samples appended to the store.
    pub stored: usize,
    /// Charts written.
    pub charts: usize,
    /// Hosts whose chart could not be drawn.
    pub chart_failures: usize,
    pub elapsed: Duration,
}

/// Runs collection cycles end to end.
///
/// Cycles are serialized by an async mutex, so a manual [`Pipeline::run_once`]
/// racing a scheduled one waits instead of interleaving writes.
pub struct Pipeline {
    enumerator: HostEnumerator,
    collector: Collector,
    store: Arc<TimeSeriesStore>,
    renderer: Arc<dyn ChartRenderer>,
    output_dir: PathBuf,
    sort_by_time: bool,
    cycle_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        enumerator: HostEnumerator,
        collector: Collector,
        store: TimeSeriesStore,
        renderer: Arc<dyn ChartRenderer>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            enumerator,
            collector,
            store: Arc::new(store),
            renderer,
            output_dir: output_dir.into(),
            sort_by_time: false,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Build a pipeline from configuration with the given prober.
    pub fn from_config(config: &AppConfig, prober: Arc<dyn Prober>) -> Self {
        Self::new(
            config.hosts.enumerator(),
            Collector::new(prober, config.probe.clone()),
            config.store.store(),
            Arc::new(config.render.renderer()),
            config.render.output_dir.clone(),
        )
        .with_sort_by_time(config.render.sort_by_time)
    }

    /// Sort each host's points by timestamp before drawing.
    pub fn with_sort_by_time(mut self, sort_by_time: bool) -> Self {
        self.sort_by_time = sort_by_time;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    /// Run one full cycle.
    ///
    /// # Errors
    /// Storage failures and panicked background tasks abort the cycle.
    /// Per-host probe and chart failures are only counted.
    pub async fn run_once(&self) -> Result<CycleReport, PipelineError> {
        let _guard = self.cycle_lock.lock().await;
        let started = Instant::now();

        let hosts = self.enumerator.enumerate();
        let outcome = self.collector.collect(hosts).await;

        let store = Arc::clone(&self.store);
        let samples = outcome.samples;
        let stored = tokio::task::spawn_blocking(move || store.append_all(&samples)).await??;

        let render = self.render_locked().await?;

        Ok(CycleReport {
            probed: outcome.probed,
            reachable: outcome.reachable.len(),
            stored,
            charts: render.rendered.len(),
            chart_failures: render.failed.len(),
            elapsed: started.elapsed(),
        })
    }

    /// Redraw every chart from the store without probing.
    pub async fn render_charts(&self) -> Result<RenderReport, PipelineError> {
        let _guard = self.cycle_lock.lock().await;
        self.render_locked().await
    }

    async fn render_locked(&self) -> Result<RenderReport, PipelineError> {
        let store = Arc::clone(&self.store);
        let renderer = Arc::clone(&self.renderer);
        let output_dir = self.output_dir.clone();
        let sort_by_time = self.sort_by_time;

        tokio::task::spawn_blocking(move || -> Result<RenderReport, PipelineError> {
            let records = store.read_all()?;
            let series = aggregate(&records, sort_by_time);
            tracing::debug!(records = records.len(), hosts = series.len(), "Rendering charts");
            Ok(render_all(renderer.as_ref(), series.values(), &output_dir)?)
        })
        .await?
    }
}

#[async_trait::async_trait]
impl CycleJob for Pipeline {
    async fn run_cycle(&self) -> Result<CycleReport, PipelineError> {
        self.run_once().await
    }
}
