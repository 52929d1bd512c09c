//! wirepool-types: Shared data model for wirepool.
//!
//! This crate contains the persisted instance document, its client slots,
//! and the request/response bodies spoken by the HTTP API.

#![warn(missing_docs)]

pub mod api;

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use ipnetwork::{IpNetwork, Ipv4Network};
use serde::{Deserialize, Serialize};

/// A WireGuard keypair, both halves base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    /// Public half, safe to hand out.
    pub public_key: String,
    /// Private half.
    pub private_key: String,
}

/// One VPN endpoint: a server address, its listen port, and the pool of
/// client slots carved out of the server's subnet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Unique name, fixed at creation.
    pub name: String,
    /// Server address with the subnet prefix (e.g. `10.0.0.1/24`), fixed at creation.
    pub server_address: Ipv4Network,
    /// UDP port the server listens on, fixed at creation.
    pub listen_port: u16,
    /// Public hostname clients dial.
    pub endpoint_hostname: String,
    /// DNS servers pushed to clients.
    #[serde(default)]
    pub dns_servers: Vec<String>,
    /// Command run after the interface comes up.
    #[serde(default)]
    pub post_up: String,
    /// Command run after the interface goes down.
    #[serde(default)]
    pub post_down: String,
    /// Ranges clients route through the tunnel.
    #[serde(default)]
    pub client_allowed_ips: Vec<IpNetwork>,
    /// Persistent keepalive interval in seconds, 0 disables it.
    #[serde(default)]
    pub keepalive: u16,
    /// Upper bound on the number of client slots.
    pub max_clients: usize,
    /// The server's own keypair.
    pub server_keys: Keypair,
    /// Client slots in pool generation order.
    pub slots: Vec<ClientSlot>,
}

/// A single reservable client address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSlot {
    /// Host address (`/32`), never reassigned.
    pub address: Ipv4Network,
    /// Whether an identity currently holds this slot.
    pub allocated: bool,
    /// Bound client identity, empty while the slot is free.
    #[serde(default)]
    pub identity: String,
    /// Keypair handed to whoever holds the slot.
    pub keys: Keypair,
    /// When the slot was created with its pool.
    pub generated_at: DateTime<Utc>,
    /// Last allocation time.
    #[serde(default)]
    pub allocated_at: Option<DateTime<Utc>>,
    /// Last revocation time.
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ClientSlot {
    /// Bare host address of the slot.
    pub fn ip(&self) -> Ipv4Addr {
        self.address.ip()
    }

    /// Whether the slot is available for allocation.
    pub fn is_free(&self) -> bool {
        !self.allocated
    }
}

impl Instance {
    /// Number of slots currently bound to an identity.
    pub fn allocated_count(&self) -> usize {
        self.slots.iter().filter(|s| s.allocated).count()
    }
}
