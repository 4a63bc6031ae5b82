//! Configuration validation utilities.

use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse a positive duration given on the command line, e.g. `--interval 30s`.
///
/// Accepts humantime forms (`10s`, `1m`, `100ms`, `1h30m`); a bare number or
/// a zero duration is rejected.
///
/// # Examples
///
/// ```
/// use net_health::config::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap().as_secs(), 30);
/// assert_eq!(parse_duration("1h30m").unwrap().as_secs(), 5400);
/// assert!(parse_duration("0s").is_err());
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration is empty".to_string());
    }
    let duration =
        humantime::parse_duration(s).map_err(|e| format!("invalid duration '{s}': {e}"))?;
    if duration.is_zero() {
        return Err(format!("duration '{s}' must be greater than zero"));
    }
    Ok(duration)
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

/// Reject a zero duration for the named field.
pub(crate) fn require_nonzero(field: &str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(())
}

/// Validate a 6-field cron expression (`sec min hour day month weekday`).
pub(crate) fn validate_cron(expr: &str) -> Result<(), ConfigError> {
    use std::str::FromStr;

    cron::Schedule::from_str(expr)
        .map(|_| ())
        .map_err(|e| ConfigError::ValidationError(format!("invalid cron expression '{expr}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_valid() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration(" 2s ").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("30x").is_err());
        let err = parse_duration("0ms").unwrap_err();
        assert!(err.contains("greater than zero"));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("port: 8000"), "port: 8000");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("path: ${NET_HEALTH_NONEXISTENT_12345:-responseTimes.json}");
        assert_eq!(result, "path: responseTimes.json");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: This test runs in isolation and only modifies a test-specific variable.
        unsafe {
            std::env::set_var("NET_HEALTH_TEST_SUBNET", "10.1.2.0/24");
        }
        let result = expand_env_vars("subnets: [\"${NET_HEALTH_TEST_SUBNET}\"]");
        assert_eq!(result, "subnets: [\"10.1.2.0/24\"]");
        // SAFETY: Cleanup test variable.
        unsafe {
            std::env::remove_var("NET_HEALTH_TEST_SUBNET");
        }
    }

    #[test]
    fn test_require_nonzero() {
        assert!(require_nonzero("probe.liveness.timeout", Duration::from_secs(1)).is_ok());
        let err = require_nonzero("probe.liveness.timeout", Duration::ZERO).unwrap_err();
        assert!(err.to_string().contains("probe.liveness.timeout"));
    }

    #[test]
    fn test_validate_cron() {
        assert!(validate_cron("0/10 * * * * *").is_ok());
        let err = validate_cron("not a cron").unwrap_err();
        assert!(err.to_string().contains("invalid cron"));
    }
}
