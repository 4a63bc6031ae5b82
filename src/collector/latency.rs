//! Latency phase: a burst of echo requests per reachable host.

use chrono::Utc;

use crate::collector::hosts::Host;
use crate::collector::traits::{ProbeError, ProbeSpec, Prober};
use crate::storage::LatencySample;

/// Probe `host` with a burst described by `spec` and summarize the replies.
///
/// The returned sample may have `probe_count == 0` when the host stopped
/// answering after the liveness phase; callers drop such samples.
pub async fn sample_latency(
    prober: &dyn Prober,
    host: &Host,
    spec: ProbeSpec,
) -> Result<LatencySample, ProbeError> {
    let stats = prober.probe(host.as_str(), spec).await?;
    Ok(LatencySample {
        timestamp: Utc::now(),
        host: host.clone(),
        probe_count: stats.received,
        mean_rtt: stats.mean_rtt.unwrap_or_default(),
    })
}
