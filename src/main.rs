//! net-health Binary Entry Point
//!
//! Runs the collection scheduler and the chart server side by side.
//! Core functionality is provided by the `net_health` library crate.

use clap::Parser;
use net_health::{
    AppConfig, IcmpProber, Pipeline, Scheduler,
    config::parse_duration,
    server::{AppState, create_router},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// net-health - network reachability and latency monitor
#[derive(Parser, Debug)]
#[command(name = "net-health", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "NET_HEALTH_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, env = "NET_HEALTH_BIND")]
    bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(short, long, env = "NET_HEALTH_PORT")]
    port: Option<u16>,

    /// Time-series store path (overrides config file)
    #[arg(long, env = "NET_HEALTH_STORE")]
    store: Option<PathBuf>,

    /// Chart output directory (overrides config file)
    #[arg(long, env = "NET_HEALTH_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Time between collection cycles, e.g. `30s` (overrides any configured schedule)
    #[arg(long, env = "NET_HEALTH_INTERVAL", value_parser = parse_duration)]
    interval: Option<Duration>,
}

impl Cli {
    /// Apply CLI/env overrides (CLI > ENV > config file).
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(store) = &self.store {
            config.store.path = store.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.render.output_dir = output_dir.clone();
        }
        if let Some(interval) = self.interval {
            config.schedule.interval = Some(interval);
            config.schedule.cron = None;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,net_health=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("net-health - network reachability and latency monitor");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load_or_default(&cli.config)?;

    cli.apply_overrides(&mut config);
    config.validate()?;

    let schedule = config.schedule.schedule()?;
    let hosts = config.hosts.enumerator().enumerate();
    tracing::info!(
        "Server: {}:{}, Store: {}, Charts: {}, Hosts: {}, Schedule: {}",
        config.server.bind,
        config.server.port,
        config.store.path.display(),
        config.render.output_dir.display(),
        hosts.len(),
        schedule,
    );

    // The chart directory must exist before the file server starts
    std::fs::create_dir_all(&config.render.output_dir)?;

    // Build the collection pipeline
    let pipeline = Arc::new(Pipeline::from_config(&config, Arc::new(IcmpProber::new())));
    match pipeline.render_charts().await {
        Ok(report) if !report.rendered.is_empty() => {
            tracing::info!("Rendered {} charts from existing store", report.rendered.len());
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to render charts from existing store: {}", e),
    }

    // Start the scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(Arc::clone(&pipeline), schedule)?
        .with_run_immediately(config.schedule.run_immediately);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    // Create web server state
    let app_state = AppState {
        output_dir: config.render.output_dir.clone(),
    };

    // Build Axum router
    let app = create_router(app_state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    tracing::info!("Waiting for the current cycle to finish...");
    if let Err(e) = scheduler_handle.await {
        tracing::error!("Scheduler task failed: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Stopping scheduler...");
    if shutdown.send(true).is_err() {
        tracing::debug!("Scheduler already stopped");
    }
}
