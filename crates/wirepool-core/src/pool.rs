//! Enumerates the usable hosts of a CIDR block into a server address and an
//! ordered client pool.

use std::net::Ipv4Addr;

use ipnetwork::{IpNetwork, Ipv4Network};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("invalid network {cidr:?}: {reason}")]
    Invalid { cidr: String, reason: String },

    #[error("network {cidr} has {usable} usable address(es), need at least 2")]
    TooSmall { cidr: Ipv4Network, usable: u64 },
}

impl NetworkError {
    fn invalid(cidr: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            cidr: cidr.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Server address plus client hosts, lowest address first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPool {
    /// First usable host, carrying the block's prefix length.
    pub server: Ipv4Network,
    /// Client hosts as `/32` networks.
    pub hosts: Vec<Ipv4Network>,
}

/// Parse an IPv4 CIDR. The prefix length is mandatory.
pub fn parse_cidr(s: &str) -> Result<Ipv4Network, NetworkError> {
    let s = s.trim();
    if !s.contains('/') {
        return Err(NetworkError::invalid(s, "missing prefix length"));
    }
    match s.parse::<IpNetwork>() {
        Ok(IpNetwork::V4(net)) => Ok(net),
        Ok(IpNetwork::V6(_)) => Err(NetworkError::invalid(s, "IPv6 not supported")),
        Err(e) => Err(NetworkError::invalid(s, e)),
    }
}

/// First usable host and how many there are. Blocks up to /30 lose their
/// network and broadcast addresses; /31 and /32 keep every address.
fn usable_range(net: Ipv4Network) -> (u32, u64) {
    let base = u32::from(net.network());
    let total = 1u64 << (32 - u32::from(net.prefix()));
    if net.prefix() >= 31 {
        (base, total)
    } else {
        (base + 1, total - 2)
    }
}

/// Reserve the first usable host of `cidr` for the server and return up to
/// `max_clients` of the following hosts in ascending order.
pub fn generate(cidr: &str, max_clients: usize) -> Result<AddressPool, NetworkError> {
    let net = parse_cidr(cidr)?;
    let (first, usable) = usable_range(net);
    if usable < 2 {
        return Err(NetworkError::TooSmall { cidr: net, usable });
    }

    let server = Ipv4Network::new(Ipv4Addr::from(first), net.prefix())
        .map_err(|e| NetworkError::invalid(cidr, e))?;

    let count = (usable - 1).min(max_clients as u64) as u32;
    let hosts = (1..=count)
        .map(|i| Ipv4Network::from(Ipv4Addr::from(first + i)))
        .collect();

    Ok(AddressPool { server, hosts })
}
