//! Client configuration.
//!
//! Values come from code, from any serde source, or from the environment via
//! [`ClientConfig::from_env`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::types::{Endpoint, DEFAULT_API_PORT, DEFAULT_GATEWAY_PORT, DEFAULT_HOST};

pub const ENV_HOST: &str = "IPFS_HOST";
pub const ENV_GATEWAY_PORT: &str = "IPFS_GATEWAY_PORT";
pub const ENV_API_PORT: &str = "IPFS_API_PORT";
pub const ENV_TIMEOUT: &str = "IPFS_TIMEOUT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub gateway_port: u16,
    pub api_port: u16,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            gateway_port: DEFAULT_GATEWAY_PORT,
            api_port: DEFAULT_API_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Read `IPFS_HOST`, `IPFS_GATEWAY_PORT`, `IPFS_API_PORT` and
    /// `IPFS_TIMEOUT`. Missing or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup(ENV_HOST)
                .filter(|host| !host.is_empty())
                .unwrap_or(defaults.host),
            gateway_port: parse_or(&lookup, ENV_GATEWAY_PORT, defaults.gateway_port),
            api_port: parse_or(&lookup, ENV_API_PORT, defaults.api_port),
            timeout_secs: parse_or(&lookup, ENV_TIMEOUT, defaults.timeout_secs),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host, self.gateway_port, self.api_port)
    }
}

fn parse_or<T: FromStr + Copy>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparseable setting");
            default
        }),
        None => default,
    }
}
