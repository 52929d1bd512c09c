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

//! Serialized access to instances on disk.
//!
//! Every mutation runs load -> check -> mutate -> save -> deploy while holding
//! the write side of that instance's lock. A failed deploy puts the previous
//! document back. Reads take the read side. Locks of different instances never
//! interact, and only instances present on disk get a lock.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use ipnetwork::Ipv4Network;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use wirepool_types::Instance;

use crate::config::{self, ConfigError, InstanceDefinition, WirepoolToml};
use crate::instance::{self, AllocError, ClientPool};
use crate::keys::{KeyGenerator, X25519Keys};
use crate::pool::NetworkError;
use crate::render::{self, PeerScope};
use crate::store::{self, StoreError};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("instance {0} not found")]
    UnknownInstance(String),

    #[error("instance {0} already exists")]
    InstanceExists(String),

    #[error("invalid client address {0:?}")]
    InvalidAddress(String),
}

type Result<T> = std::result::Result<T, ManagerError>;

/// A freshly allocated slot and the profile its holder imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    pub instance_name: String,
    pub identity: String,
    pub address: Ipv4Network,
    pub public_key: String,
    pub profile: String,
}

pub struct InstanceManager {
    state_dir: PathBuf,
    conf_dir: PathBuf,
    scope: PeerScope,
    keys: Arc<dyn KeyGenerator>,
    locks: DashMap<String, Arc<RwLock<()>>>,
}

fn parse_address(s: &str) -> Result<Ipv4Addr> {
    let s = s.trim();
    let parsed = if s.contains('/') {
        s.parse::<Ipv4Network>().ok().map(|n| n.ip())
    } else {
        s.parse::<Ipv4Addr>().ok()
    };
    parsed.ok_or_else(|| ManagerError::InvalidAddress(s.to_string()))
}

impl InstanceManager {
    pub fn new(config: &WirepoolToml) -> Self {
        Self::with_keys(
            &config.state_dir,
            &config.conf_dir,
            config.peer_scope,
            Arc::new(X25519Keys),
        )
    }

    pub fn with_keys(
        state_dir: &Path,
        conf_dir: &Path,
        scope: PeerScope,
        keys: Arc<dyn KeyGenerator>,
    ) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            conf_dir: conf_dir.to_path_buf(),
            scope,
            keys,
            locks: DashMap::new(),
        }
    }

    fn lock(&self, name: &str) -> Arc<RwLock<()>> {
        self.locks.entry(name.to_string()).or_default().clone()
    }

    /// Lock of an instance that already has a document. Unknown names never
    /// reach the lock map.
    async fn existing_lock(&self, name: &str) -> Result<Arc<RwLock<()>>> {
        config::validate_name(name)?;
        let known = self.locks.get(name).map(|lock| Arc::clone(lock.value()));
        if let Some(lock) = known {
            return Ok(lock);
        }

        let path = self.document(name);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| StoreError::Read { path, source })?;
        if !exists {
            return Err(ManagerError::UnknownInstance(name.to_string()));
        }
        Ok(self.lock(name))
    }

    fn document(&self, name: &str) -> PathBuf {
        store::instance_path(&self.state_dir, name)
    }

    async fn load(&self, name: &str) -> Result<Instance> {
        config::validate_name(name)?;
        match store::load(&self.document(name)).await {
            Ok(instance) => Ok(instance),
            Err(StoreError::NotFound(_)) => Err(ManagerError::UnknownInstance(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Save `instance` and deploy its config. If the deploy fails the document
    /// is restored to `previous`, or removed when there was none.
    async fn commit(&self, previous: Option<&Instance>, instance: &Instance) -> Result<()> {
        let document = self.document(&instance.name);
        store::save(instance, &document).await?;

        match render::deploy(instance, self.scope, &self.conf_dir).await {
            Ok(path) => {
                debug!(instance = %instance.name, path = %path.display(), "deployed config");
                Ok(())
            }
            Err(e) => {
                let restored = match previous {
                    Some(previous) => store::save(previous, &document).await,
                    None => store::remove(&document).await,
                };
                if let Err(restore) = restored {
                    error!(
                        instance = %instance.name,
                        error = %restore,
                        "failed to restore instance document"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Generate a new instance from `def` and persist it. Fails if a document
    /// with that name already exists.
    #[tracing::instrument(skip(self, def), fields(instance = %def.name))]
    pub async fn create_instance(&self, def: &InstanceDefinition) -> Result<Instance> {
        config::validate_name(&def.name)?;
        let lock = self.lock(&def.name);
        let _guard = lock.write().await;

        match self.load(&def.name).await {
            Ok(_) => return Err(ManagerError::InstanceExists(def.name.clone())),
            Err(ManagerError::UnknownInstance(_)) => {}
            Err(e) => return Err(e),
        }
        self.create_locked(def).await
    }

    /// Load the instance named by `def`, creating it on first use. An existing
    /// instance keeps its pool and keys; its config is re-deployed.
    #[tracing::instrument(skip(self, def), fields(instance = %def.name))]
    pub async fn ensure_instance(&self, def: &InstanceDefinition) -> Result<Instance> {
        config::validate_name(&def.name)?;
        let lock = self.lock(&def.name);
        let _guard = lock.write().await;

        match self.load(&def.name).await {
            Ok(instance) => {
                let path = render::deploy(&instance, self.scope, &self.conf_dir).await?;
                info!(
                    slot_count = instance.slots.len(),
                    allocated = instance.allocated_count(),
                    path = %path.display(),
                    "loaded existing instance"
                );
                Ok(instance)
            }
            Err(ManagerError::UnknownInstance(_)) => self.create_locked(def).await,
            Err(e) => Err(e),
        }
    }

    async fn create_locked(&self, def: &InstanceDefinition) -> Result<Instance> {
        let instance = instance::build(def, &*self.keys)?;
        self.commit(None, &instance).await?;
        info!(
            server_address = %instance.server_address,
            slot_count = instance.slots.len(),
            "created instance"
        );
        Ok(instance)
    }

    /// Snapshot of the persisted instance.
    #[tracing::instrument(skip(self))]
    pub async fn instance(&self, name: &str) -> Result<Instance> {
        let lock = self.existing_lock(name).await?;
        let _guard = lock.read().await;
        self.load(name).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn allocate_client(&self, name: &str, identity: &str) -> Result<ClientProfile> {
        let lock = self.existing_lock(name).await?;
        let _guard = lock.write().await;

        let mut instance = self.load(name).await?;
        let previous = instance.clone();
        let slot = instance.allocate_client(identity)?.clone();
        self.commit(Some(&previous), &instance).await?;

        info!(address = %slot.address, "allocated client");
        Ok(ClientProfile {
            instance_name: instance.name.clone(),
            identity: slot.identity.clone(),
            address: slot.address,
            public_key: slot.keys.public_key.clone(),
            profile: render::client_profile(&instance, &slot),
        })
    }

    /// Release the slot held by `identity`. Revoking an identity that holds
    /// nothing succeeds with `None` and leaves the instance untouched.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_client(&self, name: &str, identity: &str) -> Result<Option<Ipv4Network>> {
        let lock = self.existing_lock(name).await?;
        let _guard = lock.write().await;

        let mut instance = self.load(name).await?;
        let previous = instance.clone();
        let Some(address) = instance.revoke_client(identity, &*self.keys) else {
            info!("identity holds no slot, nothing to revoke");
            return Ok(None);
        };
        self.commit(Some(&previous), &instance).await?;

        info!(%address, "revoked client");
        Ok(Some(address))
    }

    /// Release the slot at `address` (`10.0.0.2` or `10.0.0.2/32`).
    #[tracing::instrument(skip(self))]
    pub async fn revoke_client_by_address(&self, name: &str, address: &str) -> Result<Ipv4Network> {
        let ip = parse_address(address)?;
        let lock = self.existing_lock(name).await?;
        let _guard = lock.write().await;

        let mut instance = self.load(name).await?;
        let previous = instance.clone();
        let released = instance.revoke_client_by_address(ip, &*self.keys)?.address;
        self.commit(Some(&previous), &instance).await?;

        info!(address = %released, "revoked client by address");
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::{CountingKeys, definition};
    use test_case::test_case;

    #[test_case("10.0.0.2", Some("10.0.0.2") ; "bare address")]
    #[test_case("10.0.0.2/32", Some("10.0.0.2") ; "host cidr")]
    #[test_case(" 10.0.0.9 ", Some("10.0.0.9") ; "surrounding whitespace")]
    #[test_case("10.0.0", None ; "truncated")]
    #[test_case("fd00::2", None ; "ipv6")]
    fn parses_client_addresses(input: &str, expected: Option<&str>) {
        let parsed = parse_address(input).ok();
        assert_eq!(parsed, expected.map(|s| s.parse().unwrap()));
    }

    #[tokio::test]
    async fn failed_lookups_leave_no_locks_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = InstanceManager::with_keys(
            &tmp.path().join("state"),
            &tmp.path().join("conf"),
            PeerScope::Slot,
            Arc::new(CountingKeys::default()),
        );

        for i in 0..50 {
            let err = manager.allocate_client(&format!("ghost-{i}"), "alice").await.unwrap_err();
            assert!(matches!(err, ManagerError::UnknownInstance(_)));
            let err = manager.instance(&format!("../bad/{i}")).await.unwrap_err();
            assert!(matches!(err, ManagerError::Config(ConfigError::InvalidName(_))));
            let err = manager.revoke_client(&format!("ghost-{i}"), "alice").await.unwrap_err();
            assert!(matches!(err, ManagerError::UnknownInstance(_)));
        }
        assert!(manager.locks.is_empty());

        manager.create_instance(&definition("10.0.0.0/29", 2)).await.unwrap();
        manager.allocate_client("office", "alice").await.unwrap();
        assert_eq!(manager.locks.len(), 1);
    }
}
