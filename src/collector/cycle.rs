//! One collection cycle: liveness phase, then latency phase.

use std::sync::Arc;

use crate::collector::fanout::FanOut;
use crate::collector::hosts::Host;
use crate::collector::latency::sample_latency;
use crate::collector::liveness::check_reachable;
use crate::collector::traits::{ProbeSpec, Prober};
use crate::config::ProbeConfig;
use crate::storage::LatencySample;

/// Everything a cycle learned, ready for persistence.
#[derive(Debug, Clone, Default)]
pub struct CollectionOutcome {
    /// Hosts given to the liveness phase.
    pub probed: usize,
    /// Hosts that answered the liveness probe, in fan-in order.
    pub reachable: Vec<Host>,
    /// Latency samples with at least one reply, in fan-in order.
    pub samples: Vec<LatencySample>,
    /// Reachable hosts that produced no reply during the latency burst.
    pub went_silent: Vec<Host>,
    /// Hosts whose probe could not be constructed, with the reason.
    pub skipped: Vec<(Host, String)>,
}

/// Runs the two probing phases against a host list.
pub struct Collector {
    prober: Arc<dyn Prober>,
    config: ProbeConfig,
}

impl Collector {
    pub fn new(prober: Arc<dyn Prober>, config: ProbeConfig) -> Self {
        Self { prober, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe every host for liveness, then sample latency of the reachable ones.
    pub async fn collect(&self, hosts: Vec<Host>) -> CollectionOutcome {
        let mut outcome = CollectionOutcome {
            probed: hosts.len(),
            ..Default::default()
        };

        tracing::info!(hosts = hosts.len(), "Testing local and remote hosts");
        outcome.reachable = self.liveness_phase(hosts, &mut outcome.skipped).await;

        tracing::info!(
            hosts = outcome.reachable.len(),
            "Collecting ping statistics"
        );
        let samples = self
            .latency_phase(outcome.reachable.clone(), &mut outcome.skipped)
            .await;

        for sample in samples {
            if sample.probe_count > 0 {
                outcome.samples.push(sample);
            } else {
                tracing::debug!(host = %sample.host, "Host stopped replying after liveness check");
                outcome.went_silent.push(sample.host);
            }
        }

        tracing::info!(
            probed = outcome.probed,
            reachable = outcome.reachable.len(),
            sampled = outcome.samples.len(),
            skipped = outcome.skipped.len(),
            "Collection complete"
        );
        outcome
    }

    /// Returns the reachable subset of `hosts`.
    async fn liveness_phase(&self, hosts: Vec<Host>, skipped: &mut Vec<(Host, String)>) -> Vec<Host> {
        let timeout = self.config.liveness.timeout;
        let fan_out =
            FanOut::new(self.config.liveness.stagger).with_max_in_flight(self.config.max_in_flight);

        let results = fan_out
            .run(hosts, |host| {
                let prober = Arc::clone(&self.prober);
                async move { check_reachable(prober.as_ref(), &host, timeout).await }
            })
            .await;

        let mut reachable = Vec::new();
        for (host, result) in results {
            match result {
                Ok(liveness) if liveness.reachable => reachable.push(liveness.host),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "Skipping host: liveness probe not possible");
                    skipped.push((host, e.to_string()));
                }
            }
        }
        reachable
    }

    /// Returns one sample per reachable host that could be probed.
    async fn latency_phase(
        &self,
        hosts: Vec<Host>,
        skipped: &mut Vec<(Host, String)>,
    ) -> Vec<LatencySample> {
        let spec = ProbeSpec {
            count: self.config.latency.count,
            interval: self.config.latency.interval,
            timeout: self.config.latency.timeout,
        };
        let fan_out =
            FanOut::new(self.config.latency.stagger).with_max_in_flight(self.config.max_in_flight);

        let results = fan_out
            .run(hosts, |host| {
                let prober = Arc::clone(&self.prober);
                async move { sample_latency(prober.as_ref(), &host, spec).await }
            })
            .await;

        let mut samples = Vec::with_capacity(results.len());
        for (host, result) in results {
            match result {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "Skipping host: latency probe not possible");
                    skipped.push((host, e.to_string()));
                }
            }
        }
        samples
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::traits::{ProbeError, ProbeStats};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// How a scripted host answers each phase.
    #[derive(Clone, Copy)]
    enum Script {
        /// Never replies.
        Silent,
        /// Replies to everything with the given RTTs (ms).
        Replies(&'static [u64]),
        /// Answers the liveness probe, then goes quiet.
        Flaky,
        /// Probe cannot be constructed.
        Broken,
    }

    struct ScriptedProber {
        scripts: HashMap<String, Script>,
        calls: Mutex<Vec<(String, u32)>>,
    }

    impl ScriptedProber {
        fn new(scripts: &[(&str, Script)]) -> Arc<Self> {
            Arc::new(Self {
                scripts: scripts
                    .iter()
                    .map(|(h, s)| (h.to_string(), *s))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        /// Hosts that received a multi-probe burst.
        fn burst_targets(&self) -> Vec<String> {
            let mut hosts: Vec<String> = self
                .calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, count)| *count > 1)
                .map(|(h, _)| h.clone())
                .collect();
            hosts.sort();
            hosts
        }
    }

    #[async_trait::async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, host: &str, spec: ProbeSpec) -> Result<ProbeStats, ProbeError> {
            self.calls
                .lock()
                .unwrap()
                .push((host.to_string(), spec.count));
            let liveness = spec.count == 1;

            match self.scripts.get(host).copied().unwrap_or(Script::Silent) {
                Script::Silent => Ok(ProbeStats::from_rtts(spec.count, &[])),
                Script::Replies(ms) => {
                    let rtts: Vec<Duration> = ms.iter().map(|m| Duration::from_millis(*m)).collect();
                    let rtts = if liveness { &rtts[..1] } else { &rtts[..] };
                    Ok(ProbeStats::from_rtts(spec.count, rtts))
                }
                Script::Flaky if liveness => {
                    Ok(ProbeStats::from_rtts(1, &[Duration::from_millis(1)]))
                }
                Script::Flaky => Ok(ProbeStats::from_rtts(spec.count, &[])),
                Script::Broken => Err(ProbeError::Client("socket unavailable".to_string())),
            }
        }
    }

    fn fast_config() -> ProbeConfig {
        let mut config = ProbeConfig::default();
        config.liveness.stagger = Duration::ZERO;
        config.latency.stagger = Duration::ZERO;
        config
    }

    fn hosts(names: &[&str]) -> Vec<Host> {
        names.iter().map(|n| Host::from(*n)).collect()
    }

    #[tokio::test]
    async fn test_only_reachable_hosts_are_sampled() {
        let prober = ScriptedProber::new(&[("x", Script::Silent), ("y", Script::Replies(&[12]))]);
        let collector = Collector::new(prober.clone(), fast_config());

        let outcome = collector.collect(hosts(&["x", "y"])).await;

        assert_eq!(outcome.probed, 2);
        assert_eq!(outcome.reachable, vec![Host::from("y")]);
        assert_eq!(prober.burst_targets(), vec!["y".to_string()]);
        assert_eq!(outcome.samples.len(), 1);
        assert_eq!(outcome.samples[0].host, Host::from("y"));
    }

    #[tokio::test]
    async fn test_samples_carry_mean_and_count() {
        let prober = ScriptedProber::new(&[("a.test", Script::Replies(&[10, 20, 30]))]);
        let collector = Collector::new(prober, fast_config());

        let outcome = collector.collect(hosts(&["a.test"])).await;

        let sample = &outcome.samples[0];
        assert_eq!(sample.probe_count, 3);
        assert_eq!(sample.mean_rtt, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_silent_after_liveness_is_not_stored() {
        let prober = ScriptedProber::new(&[
            ("y", Script::Flaky),
            ("z", Script::Replies(&[5, 7])),
        ]);
        let collector = Collector::new(prober, fast_config());

        let outcome = collector.collect(hosts(&["y", "z"])).await;

        assert_eq!(outcome.reachable.len(), 2);
        assert_eq!(outcome.went_silent, vec![Host::from("y")]);
        assert_eq!(outcome.samples.len(), 1);
        assert_eq!(outcome.samples[0].host, Host::from("z"));
        assert!(outcome.samples.iter().all(|s| s.probe_count > 0));
    }

    #[tokio::test]
    async fn test_broken_host_is_skipped_not_fatal() {
        let prober = ScriptedProber::new(&[
            ("bad", Script::Broken),
            ("good", Script::Replies(&[3])),
        ]);
        let collector = Collector::new(prober.clone(), fast_config());

        let outcome = collector.collect(hosts(&["bad", "good"])).await;

        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].0, Host::from("bad"));
        assert_eq!(outcome.reachable, vec![Host::from("good")]);
        assert_eq!(prober.burst_targets(), vec!["good".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_host_list() {
        let prober = ScriptedProber::new(&[]);
        let collector = Collector::new(prober.clone(), fast_config());

        let outcome = collector.collect(Vec::new()).await;

        assert_eq!(outcome.probed, 0);
        assert!(outcome.samples.is_empty());
        assert!(prober.calls.lock().unwrap().is_empty());
    }
}
