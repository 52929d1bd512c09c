use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub config_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_ADDR must be a socket address (e.g. 127.0.0.1:8080), got {0:?}")]
    InvalidBindAddr(String),
}

fn parse_bind(raw: &str) -> Result<SocketAddr, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidBindAddr(raw.to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        Ok(Self {
            bind_addr: parse_bind(&bind)?,
            config_path: env::var("WIREPOOL_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/etc/wirepool/wirepool.toml")),
        })
    }
}
