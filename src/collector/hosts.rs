//! Host enumeration.
//!
//! Produces the ordered candidate list for a collection cycle: configured
//! remote names first, then every address of each configured IPv4 block.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Widest block accepted; a /16 already yields 65536 hosts.
pub const MIN_PREFIX_LEN: u8 = 16;

/// Remote hosts probed when none are configured.
pub const DEFAULT_REMOTE_HOSTS: [&str; 4] = [
    "www.google.com",
    "www.amazon.com",
    "www.apple.com",
    "www.bbc.co.uk",
];

/// Local subnet probed when none is configured: `192.168.1.0/24`.
pub fn default_subnet() -> Ipv4Block {
    Ipv4Block {
        network: Ipv4Addr::new(192, 168, 1, 0),
        prefix_len: 24,
    }
}

/// A probe target: DNS name or IP address literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Host {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Host {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Host {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Ipv4Addr> for Host {
    fn from(ip: Ipv4Addr) -> Self {
        Self(ip.to_string())
    }
}

/// An IPv4 CIDR block such as `192.168.1.0/24`.
///
/// The base address is normalized to the network address, so
/// `192.168.1.77/24` and `192.168.1.0/24` are the same block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Block {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Block {
    /// Create a block, masking `addr` down to its network address.
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, String> {
        if prefix_len > 32 {
            return Err(format!("prefix length {prefix_len} exceeds 32"));
        }
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len)
        };
        Ok(Self {
            network: Ipv4Addr::from(u32::from(addr) & mask),
            prefix_len,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Number of addresses in the block, network and broadcast included.
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix_len)
    }

    /// Every address in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        let base = u64::from(u32::from(self.network));
        (0..self.size()).map(move |offset| Ipv4Addr::from((base + offset) as u32))
    }
}

impl fmt::Display for Ipv4Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for Ipv4Block {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("'{s}' is not in CIDR notation (a.b.c.d/n)"))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|e| format!("invalid address in '{s}': {e}"))?;
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|e| format!("invalid prefix length in '{s}': {e}"))?;
        Self::new(addr, prefix_len)
    }
}

impl TryFrom<String> for Ipv4Block {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Block> for String {
    fn from(block: Ipv4Block) -> Self {
        block.to_string()
    }
}

/// Builds the host list for a collection cycle.
///
/// Pure data generation; no network access happens here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnumerator {
    remote: Vec<Host>,
    subnets: Vec<Ipv4Block>,
}

impl HostEnumerator {
    pub fn new(remote: Vec<Host>, subnets: Vec<Ipv4Block>) -> Self {
        Self { remote, subnets }
    }

    /// Remote names in configured order, then each block's addresses in
    /// ascending order. Repeated identifiers keep their first position.
    pub fn enumerate(&self) -> Vec<Host> {
        let capacity =
            self.remote.len() + self.subnets.iter().map(|b| b.size() as usize).sum::<usize>();
        let mut seen = HashSet::with_capacity(capacity);
        let mut hosts = Vec::with_capacity(capacity);

        let local = self
            .subnets
            .iter()
            .flat_map(|block| block.addresses())
            .map(Host::from);

        for host in self.remote.iter().cloned().chain(local) {
            if seen.insert(host.clone()) {
                hosts.push(host);
            }
        }
        hosts
    }
}

impl Default for HostEnumerator {
    fn default() -> Self {
        Self::new(
            DEFAULT_REMOTE_HOSTS.iter().map(|h| Host::from(*h)).collect(),
            vec![default_subnet()],
        )
    }
}
