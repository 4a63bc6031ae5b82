//! Collector Layer
//!
//! Two-phase probing pipeline. Every enumerated host gets one cheap liveness
//! probe; only reachable hosts are then sampled with a burst of probes. Each
//! phase fans out one Tokio task per host and fans in over an MPSC channel.
//!
//! # Architecture
//!
//! - [`HostEnumerator`]: static remote names + addresses of configured subnets
//! - [`Prober`]: ICMP echo capability ([`IcmpProber`] in production)
//! - [`FanOut`]: staggered launch, optional in-flight cap, fan-in
//! - [`Collector`]: runs liveness then latency phase for one cycle
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use net_health::{Collector, HostEnumerator, IcmpProber};
//! use net_health::config::ProbeConfig;
//!
//! # async fn run() {
//! let hosts = HostEnumerator::default().enumerate();
//! let collector = Collector::new(Arc::new(IcmpProber::new()), ProbeConfig::default());
//! let outcome = collector.collect(hosts).await;
//! println!("{} reachable", outcome.reachable.len());
//! # }
//! ```

mod cycle;
mod fanout;
mod hosts;
mod latency;
mod liveness;
mod ping;
mod traits;

pub use cycle::{CollectionOutcome, Collector};
pub use fanout::FanOut;
pub use hosts::{
    DEFAULT_REMOTE_HOSTS, Host, HostEnumerator, Ipv4Block, MIN_PREFIX_LEN, default_subnet,
};
pub use latency::sample_latency;
pub use liveness::{LivenessResult, check_reachable};
pub use ping::IcmpProber;
pub use traits::{ProbeError, ProbeSpec, ProbeStats, Prober};
