//! Core data types for the storage layer.
//!
//! - [`LatencySample`]: result of one latency burst against one host
//!
//! Field names on disk are `Timestamp`, `URL`, `Count` and `MeanPingtime`
//! (integer nanoseconds), so logs written by earlier net-health builds stay
//! readable.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::Host;

/// One latency measurement for one host in one collection cycle.
///
/// `mean_rtt` is only meaningful when `probe_count > 0`; the store refuses
/// samples without replies.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use chrono::Utc;
/// use net_health::{Host, LatencySample};
///
/// let sample = LatencySample {
///     timestamp: Utc::now(),
///     host: Host::from("www.google.com"),
///     probe_count: 18,
///     mean_rtt: Duration::from_micros(12_400),
/// };
/// assert!((sample.mean_rtt_ms() - 12.4).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    /// When the burst finished (UTC).
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Probed host.
    #[serde(rename = "URL")]
    pub host: Host,
    /// Successful replies out of the attempted burst.
    #[serde(rename = "Count")]
    pub probe_count: u32,
    /// Mean round-trip time across successful replies.
    #[serde(rename = "MeanPingtime", with = "duration_nanos")]
    pub mean_rtt: Duration,
}

impl LatencySample {
    /// Mean round-trip time in milliseconds.
    pub fn mean_rtt_ms(&self) -> f64 {
        self.mean_rtt.as_nanos() as f64 / 1e6
    }
}

impl fmt::Display for LatencySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} - {:?}",
            self.timestamp.to_rfc3339(),
            self.host,
            self.mean_rtt
        )
    }
}

/// `Duration` as a signed integer count of nanoseconds.
mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = i64::try_from(d.as_nanos()).unwrap_or(i64::MAX);
        serializer.serialize_i64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = i64::deserialize(deserializer)?;
        u64::try_from(nanos)
            .map(Duration::from_nanos)
            .map_err(|_| D::Error::custom(format!("negative duration: {nanos}ns")))
    }
}
