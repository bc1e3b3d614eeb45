//! Blocking client for an IPFS daemon's HTTP API.
//!
//! # Overview
//! Adds content, fetches it back by content identifier, lists directory
//! links, reports cumulative sizes, pins and unpins, and queries the daemon's
//! version and identity. Content retrieval goes to the gateway port
//! (`/ipfs`); everything else goes to the control-plane port (`/api/v0`).
//!
//! # Design
//! - `Transport` executes exactly one request per call over a connection
//!   handle that is created on demand and released when the call returns.
//! - Uploads are framed by `multipart` as a single file part: in memory for
//!   inline bytes, streamed for files on disk.
//! - Status classification is a pure function of status and body, so the
//!   error policy is testable without a daemon.
//! - `IpfsClient` methods are thin: one endpoint, one extracted field.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod multipart;
pub mod types;

pub use client::IpfsClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use http::{HttpMethod, HttpResponse, Query, RequestBody, Transport};
pub use types::{Endpoint, Link, NodeIdentity};
