//! ICMP echo prober.
//!
//! Sends echo requests with `surge-ping`. One ICMP client per address family
//! is created lazily and shared by every concurrent probe; replies are routed
//! back to the right pinger by identifier and sequence number.
//!
//! A burst sends one request every `spec.interval` regardless of replies.
//! Each reply is awaited in its own task, bounded by what is left of the
//! burst deadline, so a lost reply never delays or ends the burst.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, timeout, timeout_at};

use crate::collector::traits::{ProbeError, ProbeSpec, ProbeStats, Prober};

/// Echo payload, same size as the classic `ping` default.
const PAYLOAD: [u8; 56] = [0; 56];

/// Spacing used when a multi-request burst is configured without one.
const MIN_SPACING: Duration = Duration::from_millis(1);

/// One echo exchange with an already resolved target.
#[async_trait::async_trait]
trait EchoChannel: Send + Sync + 'static {
    /// Send request `seq` and wait at most `wait` for its reply.
    async fn echo(&self, seq: u16, wait: Duration) -> Option<Duration>;
}

/// Run a burst described by `spec` over `channel`.
async fn run_burst(channel: Arc<dyn EchoChannel>, spec: ProbeSpec) -> ProbeStats {
    let deadline = Instant::now() + spec.timeout;
    let count = u16::try_from(spec.count).unwrap_or(u16::MAX);

    let mut ticker = tokio::time::interval(spec.interval.max(MIN_SPACING));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut replies = JoinSet::new();
    let mut sent = 0u32;

    for seq in 0..count {
        if timeout_at(deadline, ticker.tick()).await.is_err() {
            break;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        sent += 1;
        let channel = Arc::clone(&channel);
        replies.spawn(async move {
            timeout(remaining, channel.echo(seq, remaining))
                .await
                .ok()
                .flatten()
        });
    }

    let mut rtts: Vec<Duration> = Vec::with_capacity(sent as usize);
    while let Some(reply) = replies.join_next().await {
        if let Ok(Some(rtt)) = reply {
            rtts.push(rtt);
        }
    }

    ProbeStats::from_rtts(sent, &rtts)
}

/// Echo exchange over a shared `surge-ping` client.
struct IcmpEcho {
    client: Client,
    host: String,
    ip: IpAddr,
    ident: PingIdentifier,
}

#[async_trait::async_trait]
impl EchoChannel for IcmpEcho {
    async fn echo(&self, seq: u16, wait: Duration) -> Option<Duration> {
        let mut pinger = self.client.pinger(self.ip, self.ident).await;
        pinger.timeout(wait);

        match pinger.ping(PingSequence(seq), &PAYLOAD).await {
            Ok((_, rtt)) => {
                tracing::trace!(host = %self.host, seq, rtt_ms = rtt.as_secs_f64() * 1000.0, "Echo reply");
                Some(rtt)
            }
            Err(e) => {
                tracing::trace!(host = %self.host, seq, error = %e, "No echo reply");
                None
            }
        }
    }
}

/// ICMP echo prober backed by shared `surge-ping` clients.
#[derive(Default)]
pub struct IcmpProber {
    v4: OnceCell<Client>,
    v6: OnceCell<Client>,
}

impl IcmpProber {
    /// Create a prober. Sockets are opened on first use.
    pub fn new() -> Self {
        Self::default()
    }

    async fn client_for(&self, ip: IpAddr) -> Result<&Client, ProbeError> {
        let (cell, config) = match ip {
            IpAddr::V4(_) => (&self.v4, Config::default()),
            IpAddr::V6(_) => (&self.v6, Config::builder().kind(ICMP::V6).build()),
        };
        cell.get_or_try_init(|| async move {
            Client::new(&config).map_err(|e| ProbeError::Client(e.to_string()))
        })
        .await
    }
}

impl std::fmt::Debug for IcmpProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcmpProber")
            .field("v4_ready", &self.v4.initialized())
            .field("v6_ready", &self.v6.initialized())
            .finish()
    }
}

/// Resolve hostname to IP address.
async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    // First, try to parse as an IP address directly
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, host: &str, spec: ProbeSpec) -> Result<ProbeStats, ProbeError> {
        let ip = resolve_host(host)
            .await
            .map_err(|source| ProbeError::Resolve {
                host: host.to_string(),
                source,
            })?;
        let client = self.client_for(ip).await?.clone();

        let channel = Arc::new(IcmpEcho {
            client,
            host: host.to_string(),
            ip,
            ident: PingIdentifier(rand::random()),
        });
        Ok(run_burst(channel, spec).await)
    }
}
