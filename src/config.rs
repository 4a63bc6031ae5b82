//! Configuration module for net-health.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Host list (remote names, local subnets)
//! - Probe timing for the liveness and latency phases
//! - Store and chart output locations
//! - Cycle schedule (interval or cron)

mod app;
mod validation;

pub use app::{
    AppConfig, HostsConfig, LatencyConfig, LivenessConfig, ProbeConfig, RenderConfig,
    ScheduleConfig, ServerConfig, StoreConfig,
};
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{DEFAULT_CYCLE_INTERVAL, DEFAULT_OUTPUT_DIR, DEFAULT_PORT};
