// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Client slot lookups and the allocate/revoke state machine.
//!
//! Each slot moves Free -> Allocated -> Free, picking up a fresh keypair
//! every time it returns to Free. Nothing here is synchronized; callers
//! serialize access per instance (see [`crate::manager`]).

use std::net::Ipv4Addr;

use chrono::Utc;
use ipnetwork::Ipv4Network;
use thiserror::Error;
use wirepool_types::{ClientSlot, Instance};

use crate::config::InstanceDefinition;
use crate::keys::KeyGenerator;
use crate::pool::{self, NetworkError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
    #[error("client {identity:?} already holds {address} in instance {instance}")]
    Duplicate {
        instance: String,
        identity: String,
        address: Ipv4Network,
    },

    #[error("no free addresses left in instance {instance}")]
    PoolExhausted { instance: String },

    #[error("no client slot with address {address} in instance {instance}")]
    SlotNotFound { instance: String, address: Ipv4Addr },

    #[error("client identity must not be empty")]
    EmptyIdentity,
}

/// Build a new instance: server address, server keypair and a free slot with
/// its own keypair for every pooled host.
pub fn build(def: &InstanceDefinition, keys: &dyn KeyGenerator) -> Result<Instance, NetworkError> {
    let pool = pool::generate(&def.cidr, def.max_clients)?;
    let now = Utc::now();

    let slots = pool
        .hosts
        .into_iter()
        .map(|address| ClientSlot {
            address,
            allocated: false,
            identity: String::new(),
            keys: keys.generate(),
            generated_at: now,
            allocated_at: None,
            revoked_at: None,
        })
        .collect();

    Ok(Instance {
        name: def.name.clone(),
        server_address: pool.server,
        listen_port: def.listen_port,
        endpoint_hostname: def.endpoint_hostname.clone(),
        dns_servers: def.dns_servers.clone(),
        post_up: def.post_up.clone(),
        post_down: def.post_down.clone(),
        client_allowed_ips: def.client_allowed_ips.clone(),
        keepalive: def.keepalive,
        max_clients: def.max_clients,
        server_keys: keys.generate(),
        slots,
    })
}

/// Slot operations over an instance's pool.
pub trait ClientPool {
    fn find_by_identity(&self, identity: &str) -> Option<&ClientSlot>;

    fn find_by_address(&self, address: Ipv4Addr) -> Option<&ClientSlot>;

    /// Bind `identity` to the lowest free slot.
    fn allocate_client(&mut self, identity: &str) -> Result<&ClientSlot, AllocError>;

    /// Release whatever slot `identity` holds. Returns the released address,
    /// or `None` when the identity held nothing.
    fn revoke_client(&mut self, identity: &str, keys: &dyn KeyGenerator) -> Option<Ipv4Network>;

    /// Release the slot at `address`, rotating its keypair even if it was
    /// already free.
    fn revoke_client_by_address(
        &mut self,
        address: Ipv4Addr,
        keys: &dyn KeyGenerator,
    ) -> Result<&ClientSlot, AllocError>;
}

fn release(slot: &mut ClientSlot, keys: &dyn KeyGenerator) {
    slot.identity.clear();
    slot.allocated = false;
    slot.keys = keys.generate();
    slot.revoked_at = Some(Utc::now());
}

impl ClientPool for Instance {
    fn find_by_identity(&self, identity: &str) -> Option<&ClientSlot> {
        if identity.is_empty() {
            return None;
        }
        self.slots.iter().find(|s| s.identity == identity)
    }

    fn find_by_address(&self, address: Ipv4Addr) -> Option<&ClientSlot> {
        self.slots.iter().find(|s| s.ip() == address)
    }

    fn allocate_client(&mut self, identity: &str) -> Result<&ClientSlot, AllocError> {
        if identity.is_empty() {
            return Err(AllocError::EmptyIdentity);
        }
        if let Some(existing) = self.find_by_identity(identity) {
            return Err(AllocError::Duplicate {
                instance: self.name.clone(),
                identity: identity.to_string(),
                address: existing.address,
            });
        }

        let Some(slot) = self.slots.iter_mut().find(|s| s.is_free()) else {
            return Err(AllocError::PoolExhausted {
                instance: self.name.clone(),
            });
        };

        slot.identity = identity.to_string();
        slot.allocated = true;
        slot.allocated_at = Some(Utc::now());
        Ok(slot)
    }

    fn revoke_client(&mut self, identity: &str, keys: &dyn KeyGenerator) -> Option<Ipv4Network> {
        if identity.is_empty() {
            return None;
        }
        let slot = self.slots.iter_mut().find(|s| s.identity == identity)?;
        release(slot, keys);
        Some(slot.address)
    }

    fn revoke_client_by_address(
        &mut self,
        address: Ipv4Addr,
        keys: &dyn KeyGenerator,
    ) -> Result<&ClientSlot, AllocError> {
        let instance = &self.name;
        let Some(slot) = self.slots.iter_mut().find(|s| s.ip() == address) else {
            return Err(AllocError::SlotNotFound {
                instance: instance.clone(),
                address,
            });
        };
        release(slot, keys);
        Ok(slot)
    }
}
