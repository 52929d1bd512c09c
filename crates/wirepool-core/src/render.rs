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

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use wirepool_types::{ClientSlot, Instance};

use crate::store::{self, StoreError};

/// What the server config puts in each peer's `AllowedIPs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerScope {
    /// The slot's own `/32`.
    #[default]
    Slot,
    /// The instance-wide client allowed-IPs list, identical for every peer.
    Instance,
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn allocated_stamp(slot: &ClientSlot) -> String {
    slot.allocated_at
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Render the server side config: one interface section, then a peer section
/// for every slot in pool order, free or not.
pub fn render(instance: &Instance, scope: PeerScope) -> String {
    let mut config = String::new();
    writeln!(config, "[interface]").unwrap();
    writeln!(config, "PrivateKey = {}", instance.server_keys.private_key).unwrap();
    writeln!(config, "Address = {}", instance.server_address).unwrap();
    writeln!(config, "ListenPort = {}", instance.listen_port).unwrap();
    writeln!(config, "PostUp = {}", instance.post_up).unwrap();
    writeln!(config, "PostDown = {}", instance.post_down).unwrap();
    if !instance.dns_servers.is_empty() {
        writeln!(config, "DNS = {}", join(&instance.dns_servers)).unwrap();
    }
    writeln!(config).unwrap();
    writeln!(config).unwrap();

    for slot in &instance.slots {
        writeln!(config, "[Peer]").unwrap();
        writeln!(
            config,
            "# ClientUUID: {}, IsAllocated: {}, Allocated Timestamp:{}",
            slot.identity,
            slot.allocated,
            allocated_stamp(slot)
        )
        .unwrap();
        writeln!(config, "PublicKey = {}", slot.keys.public_key).unwrap();
        match scope {
            PeerScope::Slot => {
                writeln!(config, "AllowedIPs = {}", slot.address).unwrap();
            }
            PeerScope::Instance if !instance.client_allowed_ips.is_empty() => {
                writeln!(config, "AllowedIPs = {}", join(&instance.client_allowed_ips)).unwrap();
            }
            PeerScope::Instance => {}
        }
        writeln!(config).unwrap();
        writeln!(config).unwrap();
    }

    config
}

/// Render the wg-quick profile a client imports to use `slot`.
pub fn client_profile(instance: &Instance, slot: &ClientSlot) -> String {
    let mut config = String::new();
    writeln!(config, "# {}", slot.identity).unwrap();
    writeln!(config, "[Interface]").unwrap();
    writeln!(config, "PrivateKey = {}", slot.keys.private_key).unwrap();
    writeln!(config, "Address = {}", slot.address).unwrap();
    if !instance.dns_servers.is_empty() {
        writeln!(config, "DNS = {}", join(&instance.dns_servers)).unwrap();
    }

    writeln!(config).unwrap();
    writeln!(config, "# {}", instance.name).unwrap();
    writeln!(config, "[Peer]").unwrap();
    writeln!(config, "PublicKey = {}", instance.server_keys.public_key).unwrap();
    writeln!(
        config,
        "Endpoint = {}:{}",
        instance.endpoint_hostname, instance.listen_port
    )
    .unwrap();
    if !instance.client_allowed_ips.is_empty() {
        writeln!(config, "AllowedIPs = {}", join(&instance.client_allowed_ips)).unwrap();
    }
    if instance.keepalive > 0 {
        writeln!(config, "PersistentKeepalive = {}", instance.keepalive).unwrap();
    }

    config
}

pub fn conf_path(dir: &Path, instance_name: &str) -> PathBuf {
    dir.join(format!("{instance_name}.conf"))
}

/// Render and write `<dir>/<name>.conf`, creating `dir` if needed.
#[tracing::instrument(skip(instance), fields(instance = %instance.name))]
pub async fn deploy(
    instance: &Instance,
    scope: PeerScope,
    dir: &Path,
) -> Result<PathBuf, StoreError> {
    let path = conf_path(dir, &instance.name);
    store::write_atomic(&path, render(instance, scope).as_bytes()).await?;
    Ok(path)
}
