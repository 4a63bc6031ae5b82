//! Application configuration structures.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::{
    DEFAULT_REMOTE_HOSTS, Host, HostEnumerator, Ipv4Block, MIN_PREFIX_LEN, default_subnet,
};
use crate::report::{DEFAULT_HEIGHT, DEFAULT_WIDTH, SvgChartRenderer};
use crate::scheduler::Schedule;
use crate::storage::{CorruptRecordPolicy, DEFAULT_STORE_PATH, TimeSeriesStore};

use super::validation::{ConfigError, expand_env_vars, require_nonzero, validate_cron};

// =============================================================================
// Constants
// =============================================================================

/// Default time between collection cycles (10 seconds).
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(10);

/// Default port of the chart server.
pub const DEFAULT_PORT: u16 = 8000;

/// Default directory for rendered charts.
pub const DEFAULT_OUTPUT_DIR: &str = "./static";

/// Default liveness probe timeout (1 second).
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

/// Default delay between liveness task launches.
pub const DEFAULT_LIVENESS_STAGGER: Duration = Duration::from_millis(1);

/// Default number of echo requests per latency burst.
pub const DEFAULT_LATENCY_COUNT: u32 = 20;

/// Default spacing between echo requests in a burst.
pub const DEFAULT_LATENCY_INTERVAL: Duration = Duration::from_millis(100);

/// Default overall deadline of a latency burst (2 seconds).
pub const DEFAULT_LATENCY_TIMEOUT: Duration = Duration::from_secs(2);

/// Default delay between latency task launches.
pub const DEFAULT_LATENCY_STAGGER: Duration = Duration::from_millis(25);

// =============================================================================
// Server Configuration
// =============================================================================

/// Chart server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 8000).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// =============================================================================
// Hosts Configuration
// =============================================================================

/// Which hosts each cycle probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    /// Well-known external hostnames.
    pub remote: Vec<Host>,

    /// IPv4 CIDR blocks whose every address is probed.
    pub subnets: Vec<Ipv4Block>,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE_HOSTS.iter().map(|h| Host::from(*h)).collect(),
            subnets: vec![default_subnet()],
        }
    }
}

impl HostsConfig {
    pub fn enumerator(&self) -> HostEnumerator {
        HostEnumerator::new(self.remote.clone(), self.subnets.clone())
    }
}

// =============================================================================
// Probe Configuration
// =============================================================================

/// Liveness phase timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Wait for the single echo reply (default: 1s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Delay between task launches (default: 1ms).
    #[serde(with = "humantime_serde")]
    pub stagger: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LIVENESS_TIMEOUT,
            stagger: DEFAULT_LIVENESS_STAGGER,
        }
    }
}

/// Latency phase timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Echo requests per burst (default: 20).
    pub count: u32,

    /// Spacing between echo requests (default: 100ms).
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Overall deadline of the burst (default: 2s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Delay between task launches (default: 25ms).
    #[serde(with = "humantime_serde")]
    pub stagger: Duration,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_LATENCY_COUNT,
            interval: DEFAULT_LATENCY_INTERVAL,
            timeout: DEFAULT_LATENCY_TIMEOUT,
            stagger: DEFAULT_LATENCY_STAGGER,
        }
    }
}

/// Probing configuration for both phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub liveness: LivenessConfig,

    pub latency: LatencyConfig,

    /// Cap on concurrently running probe tasks per phase (default: unbounded).
    pub max_in_flight: Option<usize>,
}

// =============================================================================
// Store / Render Configuration
// =============================================================================

/// Time-series store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Log file path (default: "responseTimes.json").
    pub path: PathBuf,

    /// What to do with an undecodable record: `abort` (default) or `skip`.
    pub on_corrupt: CorruptRecordPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            on_corrupt: CorruptRecordPolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn store(&self) -> TimeSeriesStore {
        TimeSeriesStore::new(&self.path).with_corrupt_policy(self.on_corrupt)
    }
}

/// Chart output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Directory the charts are written to and served from (default: "./static").
    pub output_dir: PathBuf,

    /// Canvas width in pixels (default: 800).
    pub width: u32,

    /// Canvas height in pixels (default: 280).
    pub height: u32,

    /// Sort each host's points by timestamp before drawing (default: false).
    pub sort_by_time: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            sort_by_time: false,
        }
    }
}

impl RenderConfig {
    pub fn renderer(&self) -> SvgChartRenderer {
        SvgChartRenderer::new(self.width, self.height)
    }
}

// =============================================================================
// Schedule Configuration
// =============================================================================

/// When collection cycles fire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Fixed period between cycles (default: 10s).
    #[serde(with = "humantime_serde")]
    pub interval: Option<Duration>,

    /// 6-field cron expression; mutually exclusive with `interval`.
    pub cron: Option<String>,

    /// Run one cycle at startup instead of waiting a full period (default: false).
    pub run_immediately: bool,
}

impl ScheduleConfig {
    /// Resolve to a [`Schedule`].
    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        match (&self.interval, &self.cron) {
            (Some(_), Some(_)) => Err(ConfigError::ValidationError(
                "schedule: cannot specify both interval and cron".to_string(),
            )),
            (_, Some(expr)) => {
                validate_cron(expr)?;
                Ok(Schedule::Cron(expr.clone()))
            }
            (interval, None) => Ok(Schedule::interval(
                interval.unwrap_or(DEFAULT_CYCLE_INTERVAL),
            )),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Chart server configuration.
    pub server: ServerConfig,

    /// Hosts probed each cycle.
    pub hosts: HostsConfig,

    /// Probe timing.
    pub probe: ProbeConfig,

    /// Time-series store.
    pub store: StoreConfig,

    /// Chart output.
    pub render: RenderConfig,

    /// Cycle schedule.
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load(path)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Self = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate server bind address
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        // Validate server port
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        // Validate hosts
        if let Some(empty) = self.hosts.remote.iter().position(|h| h.as_str().trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "hosts.remote[{empty}] is empty"
            )));
        }
        for block in &self.hosts.subnets {
            if block.prefix_len() < MIN_PREFIX_LEN {
                return Err(ConfigError::ValidationError(format!(
                    "hosts.subnets: '{block}' is wider than /{MIN_PREFIX_LEN}"
                )));
            }
        }

        // Validate probe timing
        require_nonzero("probe.liveness.timeout", self.probe.liveness.timeout)?;
        require_nonzero("probe.latency.timeout", self.probe.latency.timeout)?;
        if self.probe.latency.count == 0 {
            return Err(ConfigError::ValidationError(
                "probe.latency.count must be positive".to_string(),
            ));
        }
        if self.probe.latency.count > u32::from(u16::MAX) {
            return Err(ConfigError::ValidationError(format!(
                "probe.latency.count must be at most {}",
                u16::MAX
            )));
        }
        if self.probe.latency.count > 1 {
            require_nonzero("probe.latency.interval", self.probe.latency.interval)?;
        }
        if self.probe.max_in_flight == Some(0) {
            return Err(ConfigError::ValidationError(
                "probe.max_in_flight must be positive".to_string(),
            ));
        }

        // Validate render canvas
        if self.render.width == 0 || self.render.height == 0 {
            return Err(ConfigError::ValidationError(
                "render width and height must be positive".to_string(),
            ));
        }

        // Validate schedule
        if let Some(interval) = self.schedule.interval {
            require_nonzero("schedule.interval", interval)?;
        }
        self.schedule.schedule()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.path, PathBuf::from("responseTimes.json"));
        assert_eq!(config.render.output_dir, PathBuf::from("./static"));
        assert_eq!(config.probe.latency.count, 20);
        assert!(!config.schedule.run_immediately);
    }

    #[test]
    fn test_default_schedule_is_ten_seconds() {
        let schedule = ScheduleConfig::default().schedule().unwrap();
        assert!(matches!(schedule, Schedule::Interval(d) if d == Duration::from_secs(10)));
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
server:
  port: 9000
hosts:
  remote: ["a.test", "b.test"]
  subnets: ["10.0.0.0/30"]
probe:
  liveness:
    timeout: 500ms
  latency:
    count: 5
    interval: 50ms
  max_in_flight: 32
store:
  path: /tmp/samples.json
  on_corrupt: skip
render:
  output_dir: /tmp/charts
  sort_by_time: true
schedule:
  interval: 30s
  run_immediately: true
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.hosts.enumerator().enumerate().len(), 2 + 4);
        assert_eq!(config.probe.liveness.timeout, Duration::from_millis(500));
        assert_eq!(config.probe.liveness.stagger, DEFAULT_LIVENESS_STAGGER);
        assert_eq!(config.probe.latency.count, 5);
        assert_eq!(config.probe.latency.timeout, DEFAULT_LATENCY_TIMEOUT);
        assert_eq!(config.probe.max_in_flight, Some(32));
        assert_eq!(config.store.on_corrupt, CorruptRecordPolicy::Skip);
        assert!(config.render.sort_by_time);
        assert_eq!(config.render.width, DEFAULT_WIDTH);
        assert!(config.schedule.run_immediately);
        assert!(matches!(
            config.schedule.schedule().unwrap(),
            Schedule::Interval(d) if d == Duration::from_secs(30)
        ));
    }

    #[test]
    fn test_from_yaml_empty_document_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.hosts.remote.len(), 4);
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind = "not-an-ip".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid server bind address")
        );
    }

    #[test]
    fn test_config_validation_wide_subnet() {
        let mut config = AppConfig::default();
        config.hosts.subnets = vec!["10.0.0.0/8".parse().unwrap()];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("wider than /16"));
    }

    #[test]
    fn test_config_validation_bad_subnet_in_yaml() {
        let result = AppConfig::from_yaml("hosts:\n  subnets: [\"10.0.0.0\"]\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_validation_zero_timeouts() {
        let mut config = AppConfig::default();
        config.probe.latency.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.probe.latency.count = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.probe.max_in_flight = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_latency_count_fits_sequence_numbers() {
        let mut config = AppConfig::default();
        config.probe.latency.count = u32::from(u16::MAX);
        assert!(config.validate().is_ok());

        config.probe.latency.count = u32::from(u16::MAX) + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("probe.latency.count must be at most 65535"));
    }

    #[test]
    fn test_schedule_interval_and_cron_exclusive() {
        let result = AppConfig::from_yaml("schedule:\n  interval: 10s\n  cron: \"0/10 * * * * *\"\n");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot specify both"));
    }

    #[test]
    fn test_schedule_cron() {
        let config = AppConfig::from_yaml("schedule:\n  cron: \"0 */5 * * * *\"\n").unwrap();
        match config.schedule.schedule().unwrap() {
            Schedule::Cron(expr) => assert_eq!(expr, "0 */5 * * * *"),
            other => panic!("expected Cron schedule, got {other:?}"),
        }
    }

    #[test]
    fn test_schedule_invalid_cron() {
        assert!(AppConfig::from_yaml("schedule:\n  cron: \"every tuesday\"\n").is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server:\n  bind: 127.0.0.1\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
    }
}
