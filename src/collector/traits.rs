//! Core probing traits and types.

use std::time::Duration;

use thiserror::Error;

/// Errors that prevent a probe from being attempted at all.
///
/// A target that simply does not answer is not an error; it is reported as
/// [`ProbeStats`] with zero received replies.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Hostname could not be resolved to an address.
    #[error("failed to resolve '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// ICMP client (raw or datagram socket) could not be created.
    #[error("failed to create ICMP client: {0}")]
    Client(String),
}

/// Parameters for one probe burst against a single host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSpec {
    /// Maximum number of echo requests to send.
    pub count: u32,
    /// Spacing between consecutive echo requests.
    pub interval: Duration,
    /// Overall deadline for the whole burst.
    pub timeout: Duration,
}

impl ProbeSpec {
    /// A single echo request bounded by `timeout`.
    pub fn single(timeout: Duration) -> Self {
        Self {
            count: 1,
            interval: Duration::ZERO,
            timeout,
        }
    }
}

/// Outcome of a probe burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeStats {
    /// Echo requests sent.
    pub sent: u32,
    /// Echo replies received before their deadline.
    pub received: u32,
    /// Arithmetic mean of the received round-trip times.
    pub mean_rtt: Option<Duration>,
}

impl ProbeStats {
    /// Build stats from the round-trip times of the successful replies.
    pub fn from_rtts(sent: u32, rtts: &[Duration]) -> Self {
        let received = rtts.len() as u32;
        let mean_rtt = if rtts.is_empty() {
            None
        } else {
            Some(rtts.iter().sum::<Duration>() / received)
        };
        Self {
            sent,
            received,
            mean_rtt,
        }
    }

    /// True when at least one reply came back.
    pub fn is_reachable(&self) -> bool {
        self.received > 0
    }
}

/// Echo-request capability.
///
/// Given a host and a burst configuration, returns how many replies arrived
/// and their mean round-trip time. Implementations bound themselves by
/// `spec.timeout`; callers do not wrap them in an extra deadline.
#[async_trait::async_trait]
pub trait Prober: Send + Sync + 'static {
    /// Probe `host` according to `spec`.
    async fn probe(&self, host: &str, spec: ProbeSpec) -> Result<ProbeStats, ProbeError>;
}
