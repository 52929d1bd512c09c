use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::render::PeerScope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirepoolToml {
    /// Where instance documents (`<name>.json`) live.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Where rendered WireGuard configs (`<name>.conf`) are written.
    #[serde(default = "default_conf_dir")]
    pub conf_dir: PathBuf,

    #[serde(default)]
    pub peer_scope: PeerScope,

    #[serde(default)]
    pub api: ApiSection,

    #[serde(default)]
    pub instances: Vec<InstanceDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSection {
    /// Callers outside these ranges are turned away.
    #[serde(default)]
    pub allowed_cidrs: Vec<IpNetwork>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDefinition {
    pub name: String,
    pub cidr: String,
    pub listen_port: u16,
    pub endpoint_hostname: String,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub post_up: String,
    #[serde(default)]
    pub post_down: String,
    #[serde(default)]
    pub client_allowed_ips: Vec<IpNetwork>,
    #[serde(default)]
    pub keepalive: u16,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/wirepool")
}

fn default_conf_dir() -> PathBuf {
    PathBuf::from("/etc/wireguard")
}

fn default_max_clients() -> usize {
    250
}

impl Default for WirepoolToml {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            conf_dir: default_conf_dir(),
            peer_scope: PeerScope::default(),
            api: ApiSection::default(),
            instances: vec![],
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate instance name: {0}")]
    DuplicateInstance(String),

    #[error("invalid instance name {0:?}")]
    InvalidName(String),
}

pub async fn load(path: &Path) -> Result<WirepoolToml, ConfigError> {
    debug!(path = %path.display(), "loading config");

    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let config: WirepoolToml = toml::from_str(&contents)?;
            validate(&config)?;
            info!(
                path = %path.display(),
                instance_count = config.instances.len(),
                "loaded config"
            );
            for def in &config.instances {
                debug!(instance = %def.name, cidr = %def.cidr, "configured instance");
            }
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config file not found, starting with defaults");
            Ok(WirepoolToml::default())
        }
        Err(e) => Err(ConfigError::Read(e)),
    }
}

/// Instance names double as file names, so they must be non-empty and free
/// of path separators.
pub fn validate_name(name: &str) -> Result<(), ConfigError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(ConfigError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub fn validate(config: &WirepoolToml) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for def in &config.instances {
        validate_name(&def.name)?;
        if !seen.insert(def.name.as_str()) {
            warn!(instance = %def.name, "instance defined twice");
            return Err(ConfigError::DuplicateInstance(def.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const SAMPLE: &str = r#"
state_dir = "/tmp/wirepool/state"
conf_dir = "/tmp/wirepool/conf"
peer_scope = "instance"

[api]
allowed_cidrs = ["127.0.0.1/32", "10.10.0.0/16"]

[[instances]]
name = "office"
cidr = "10.0.0.0/24"
listen_port = 51820
endpoint_hostname = "vpn.example.com"
dns_servers = ["1.1.1.1"]
client_allowed_ips = ["0.0.0.0/0"]
keepalive = 25
max_clients = 10
"#;

    #[test]
    fn parse_full_file() {
        let config: WirepoolToml = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/tmp/wirepool/state"));
        assert_eq!(config.peer_scope, PeerScope::Instance);
        assert_eq!(config.api.allowed_cidrs.len(), 2);
        assert_eq!(config.instances.len(), 1);

        let office = &config.instances[0];
        assert_eq!(office.listen_port, 51820);
        assert_eq!(office.max_clients, 10);
        assert!(office.post_up.is_empty());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn parse_empty_file() {
        let parsed: WirepoolToml = toml::from_str("").unwrap();
        assert_eq!(parsed, WirepoolToml::default());
        assert_eq!(parsed.peer_scope, PeerScope::Slot);
    }

    #[test]
    fn max_clients_defaults() {
        let parsed: WirepoolToml = toml::from_str(
            r#"
[[instances]]
name = "lab"
cidr = "10.1.0.0/24"
listen_port = 51821
endpoint_hostname = "lab.example.com"
"#,
        )
        .unwrap();
        assert_eq!(parsed.instances[0].max_clients, 250);
        assert_eq!(parsed.instances[0].keepalive, 0);
    }

    #[test]
    fn duplicate_instances_rejected() {
        let mut config: WirepoolToml = toml::from_str(SAMPLE).unwrap();
        config.instances.push(config.instances[0].clone());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::DuplicateInstance(name)) if name == "office"
        ));
    }

    #[test_case("office", true ; "plain")]
    #[test_case("wg-home_2", true ; "punctuation")]
    #[test_case("", false ; "empty")]
    #[test_case("..", false ; "parent dir")]
    #[test_case("a/b", false ; "slash")]
    #[test_case("a\\b", false ; "backslash")]
    fn instance_names(name: &str, ok: bool) {
        assert_eq!(validate_name(name).is_ok(), ok);
    }
}
