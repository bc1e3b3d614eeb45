//! Endpoint façade over the transport.
//!
//! # Design
//! Each operation is one call to [`Transport::execute`] plus one field pulled
//! out of the decoded JSON envelope. An empty or non-JSON body decodes to no
//! envelope, and a missing or mistyped field extracts to `None`: absence is a
//! value here, not an error. Transport and daemon failures still surface as
//! `Err`.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{Query, RequestBody, Transport};
use crate::types::{Endpoint, Link, NodeIdentity};

/// Blocking client for one daemon.
///
/// Operations take `&mut self` because the connection handle lives inside
/// the client. Give each thread its own client or wrap one in a `Mutex`.
#[derive(Debug, Default)]
pub struct IpfsClient {
    endpoint: Endpoint,
    transport: Transport,
}

impl IpfsClient {
    pub fn new(host: &str, gateway_port: u16, api_port: u16) -> Self {
        Self {
            endpoint: Endpoint::new(host, gateway_port, api_port),
            transport: Transport::default(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            transport: Transport::new(config.timeout_secs),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn gateway_url(&self) -> String {
        self.endpoint.gateway_url()
    }

    pub fn api_url(&self) -> String {
        self.endpoint.api_url()
    }

    /// Request timeout in whole seconds.
    pub fn timeout(&self) -> u64 {
        self.transport.timeout()
    }

    /// Takes effect on the next request. Zero means no timeout.
    pub fn set_timeout(&mut self, secs: u64) {
        self.transport.set_timeout(secs);
    }

    /// True only while a request is in flight.
    pub fn has_open_handle(&self) -> bool {
        self.transport.has_open_handle()
    }

    /// Issue a raw request and return the classified body.
    pub fn request(&mut self, url: &str, body: &RequestBody, query: &Query) -> Result<Vec<u8>> {
        self.transport.execute(url, body, query)
    }

    /// Fetch the content addressed by `hash` from the gateway, verbatim.
    pub fn cat(&mut self, hash: &str) -> Result<Vec<u8>> {
        let url = join_segments(&self.endpoint.gateway_url(), &[hash])?;
        self.transport.execute(&url, &RequestBody::None, &Query::new())
    }

    /// Upload `content` and return its content identifier.
    pub fn add(&mut self, content: &[u8]) -> Result<Option<String>> {
        self.add_body(RequestBody::Inline(content.to_vec()))
    }

    /// Upload the file at `path`, streamed from disk.
    pub fn add_path(&mut self, path: impl AsRef<Path>) -> Result<Option<String>> {
        self.add_body(RequestBody::File(path.as_ref().to_path_buf()))
    }

    /// Upload whichever of `content` and `path` is present.
    ///
    /// Fails with `InvalidUsage` when both are, before any request is made.
    pub fn add_parts(
        &mut self,
        content: Option<&[u8]>,
        path: Option<&Path>,
    ) -> Result<Option<String>> {
        let body = RequestBody::from_parts(
            content.map(<[u8]>::to_vec),
            path.map(Path::to_path_buf),
        )?;
        self.add_body(body)
    }

    /// Download `url` with a plain GET and upload what came back.
    ///
    /// Any status from 400 up on the download fails as `Http`; the remote
    /// server is not the daemon, so its error bodies are never uploaded.
    pub fn add_from_url(&mut self, url: &str) -> Result<Option<String>> {
        let content = self
            .transport
            .send(url, &RequestBody::None, &Query::new())?
            .require_success()?;
        self.add_body(RequestBody::Inline(content))
    }

    /// Links of the directory node `hash`.
    pub fn ls(&mut self, hash: &str) -> Result<Option<Vec<Link>>> {
        let envelope = self.api(&["ls", hash], &RequestBody::None, &Query::new())?;
        Ok(envelope.and_then(|env| extract(env.pointer("/Objects/0/Links"))))
    }

    /// Cumulative size in bytes of the object `hash`.
    pub fn size(&mut self, hash: &str) -> Result<Option<u64>> {
        let envelope = self.api(&["object", "stat", hash], &RequestBody::None, &Query::new())?;
        Ok(envelope.and_then(|env| env.get("CumulativeSize").and_then(Value::as_u64)))
    }

    /// Pin `hash`, returning the identifiers that were pinned.
    pub fn pin_add(&mut self, hash: &str) -> Result<Option<Vec<String>>> {
        let envelope = self.api(&["pin", "add", hash], &RequestBody::None, &Query::new())?;
        Ok(envelope.and_then(|env| extract(env.get("Pins"))))
    }

    /// Unpin `hash`, returning the identifiers that were unpinned.
    pub fn pin_rm(&mut self, hash: &str) -> Result<Option<Vec<String>>> {
        let envelope = self.api(&["pin", "rm", hash], &RequestBody::None, &Query::new())?;
        Ok(envelope.and_then(|env| extract(env.get("Pins"))))
    }

    /// Daemon version string.
    pub fn version(&mut self) -> Result<Option<String>> {
        let envelope = self.api(&["version"], &RequestBody::None, &Query::new())?;
        Ok(envelope.and_then(|env| env.get("Version").and_then(Value::as_str).map(str::to_string)))
    }

    /// Identity of the daemon's node.
    pub fn id(&mut self) -> Result<Option<NodeIdentity>> {
        let envelope = self.api(&["id"], &RequestBody::None, &Query::new())?;
        Ok(envelope.and_then(|env| extract(Some(&env))))
    }

    fn add_body(&mut self, body: RequestBody) -> Result<Option<String>> {
        let query = Query::new().with("stream-channels", true);
        let envelope = self.api(&["add"], &body, &query)?;
        Ok(envelope.and_then(|env| env.get("Hash").and_then(Value::as_str).map(str::to_string)))
    }

    fn api(&mut self, segments: &[&str], body: &RequestBody, query: &Query) -> Result<Option<Value>> {
        let url = join_segments(&self.endpoint.api_url(), segments)?;
        let bytes = self.transport.execute(&url, body, query)?;
        Ok(decode_envelope(&bytes))
    }
}

/// Append each of `segments` to `base` as one percent-encoded path segment,
/// so `/`, `?` and spaces inside a hash stay part of the hash.
fn join_segments(base: &str, segments: &[&str]) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::InvalidUsage(format!("invalid endpoint url {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::InvalidUsage(format!("endpoint url {base} cannot take a path")))?
        .extend(segments);
    Ok(url.to_string())
}

/// Decode a response body. Empty, non-JSON and `null` bodies have no envelope.
fn decode_envelope(body: &[u8]) -> Option<Value> {
    match serde_json::from_slice(body) {
        Ok(Value::Null) | Err(_) => None,
        Ok(value) => Some(value),
    }
}

fn extract<T: DeserializeOwned>(field: Option<&Value>) -> Option<T> {
    field.and_then(|value| serde_json::from_value(value.clone()).ok())
}
