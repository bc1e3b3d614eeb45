//! Endpoint addressing and the response shapes the client extracts.
//!
//! # Design
//! The daemon's JSON uses PascalCase keys; the DTOs rename them field by
//! field. Every field is optional or defaulted so a daemon that omits one
//! still yields a value instead of a decode failure.

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_GATEWAY_PORT: u16 = 8080;
pub const DEFAULT_API_PORT: u16 = 5001;

/// Where the daemon listens. Fixed for the life of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub gateway_port: u16,
    pub api_port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            gateway_port: DEFAULT_GATEWAY_PORT,
            api_port: DEFAULT_API_PORT,
        }
    }
}

impl Endpoint {
    pub fn new(host: &str, gateway_port: u16, api_port: u16) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            gateway_port,
            api_port,
        }
    }

    /// Base URL for content retrieval, no trailing slash.
    pub fn gateway_url(&self) -> String {
        format!("http://{}:{}/ipfs", self.host, self.gateway_port)
    }

    /// Base URL for control-plane calls, no trailing slash.
    pub fn api_url(&self) -> String {
        format!("http://{}:{}/api/v0", self.host, self.api_port)
    }
}

/// One entry of a directory node, as returned by `ls`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Hash", default)]
    pub hash: String,
    #[serde(rename = "Size", default)]
    pub size: u64,
    #[serde(rename = "Type", default)]
    pub kind: i32,
}

/// The daemon's answer to `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NodeIdentity {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "PublicKey", default)]
    pub public_key: String,
    /// `null` when the node has no listeners.
    #[serde(rename = "Addresses", default)]
    pub addresses: Option<Vec<String>>,
    #[serde(rename = "AgentVersion", default)]
    pub agent_version: String,
    #[serde(rename = "ProtocolVersion", default)]
    pub protocol_version: String,
}
