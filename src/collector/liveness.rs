//! Liveness phase: one echo request per host.

use std::time::Duration;

use crate::collector::hosts::Host;
use crate::collector::traits::{ProbeError, ProbeSpec, Prober};

/// Reachability verdict for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessResult {
    pub host: Host,
    pub reachable: bool,
}

/// Send a single echo request to `host`, waiting at most `timeout`.
///
/// Returns an error only when the probe cannot be constructed (e.g. the name
/// does not resolve); silence from the target is `reachable: false`.
pub async fn check_reachable(
    prober: &dyn Prober,
    host: &Host,
    timeout: Duration,
) -> Result<LivenessResult, ProbeError> {
    let stats = prober.probe(host.as_str(), ProbeSpec::single(timeout)).await?;
    Ok(LivenessResult {
        host: host.clone(),
        reachable: stats.is_reachable(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::traits::ProbeStats;

    struct FixedProber(u32);

    #[async_trait::async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, _host: &str, spec: ProbeSpec) -> Result<ProbeStats, ProbeError> {
            assert_eq!(spec.count, 1);
            let rtts = vec![Duration::from_millis(5); self.0 as usize];
            Ok(ProbeStats::from_rtts(1, &rtts))
        }
    }

    #[tokio::test]
    async fn test_reply_means_reachable() {
        let result = check_reachable(&FixedProber(1), &Host::from("y"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.reachable);
        assert_eq!(result.host, Host::from("y"));
    }

    #[tokio::test]
    async fn test_silence_means_unreachable() {
        let result = check_reachable(&FixedProber(0), &Host::from("x"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!result.reachable);
    }
}
