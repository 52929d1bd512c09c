//! wirepool-core: client pools for WireGuard instances.
//!
//! An instance's subnet is carved into a fixed pool of client slots
//! ([`pool`]), slots are handed to and taken back from client identities
//! ([`instance`]), and the result is rendered into a WireGuard config
//! ([`render`]) and persisted as JSON ([`store`]). [`manager`] ties these
//! together behind per-instance locks.

pub mod config;
pub mod instance;
pub mod keys;
pub mod manager;
pub mod pool;
pub mod render;
pub mod store;

pub use instance::ClientPool;
pub use manager::{ClientProfile, InstanceManager, ManagerError};
