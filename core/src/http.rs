//! Blocking HTTP transport for the daemon's gateway and control-plane APIs.
//!
//! # Design
//! `Transport` owns at most one `ureq::Agent`, the connection handle. It is
//! built on first use with the timeout current at that moment and is dropped
//! again when the call returns, whichever way it returns. A [`HandleGuard`]
//! scopes that lifetime: its `Drop` clears the slot, so no branch of
//! [`Transport::execute`] has to remember to release anything. Verb, headers
//! and body live on the per-call request builder, never on the agent, so a
//! fresh handle carries no state from the previous call.
//!
//! Status handling is split out into [`HttpResponse::classify`] so the policy
//! can be tested without a network.

use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use ureq::{Agent, SendBody};
use url::form_urlencoded;

use crate::error::{Error, Result};
use crate::multipart;

/// Upper bound on a response body read into memory.
pub const MAX_RESPONSE_BYTES: u64 = 1 << 30;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// What, if anything, a request uploads.
///
/// Inline content and a file path are separate variants, so a request can
/// never carry both. Callers holding two optional inputs go through
/// [`RequestBody::from_parts`], which rejects the combination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    None,
    Inline(Vec<u8>),
    File(PathBuf),
}

impl RequestBody {
    /// Pick the body mode from two optional inputs. Empty values count as
    /// absent.
    pub fn from_parts(inline: Option<Vec<u8>>, path: Option<PathBuf>) -> Result<Self> {
        let inline = inline.filter(|bytes| !bytes.is_empty());
        let path = path.filter(|p| !p.as_os_str().is_empty());

        match (inline, path) {
            (Some(_), Some(_)) => Err(Error::InvalidUsage(
                "inline content and a file path cannot be uploaded in the same request"
                    .to_string(),
            )),
            (Some(bytes), None) => Ok(RequestBody::Inline(bytes)),
            (None, Some(path)) => Ok(RequestBody::File(path)),
            (None, None) => Ok(RequestBody::None),
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            RequestBody::None => HttpMethod::Get,
            RequestBody::Inline(_) | RequestBody::File(_) => HttpMethod::Post,
        }
    }
}

/// Ordered query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Display) {
        self.pairs.push((key.into(), value.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// URL-encode the pairs in insertion order, without a leading `?`.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.pairs)
            .finish()
    }

    /// Attach the encoded query to `url`. An empty query leaves it bare.
    pub fn append_to(&self, url: &str) -> String {
        if self.is_empty() {
            return url.to_string();
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{}", self.encode())
    }
}

/// Raw outcome of a request that reached the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Turn a raw response into the body or a failure.
    ///
    /// Statuses in `[400, 600)` fail as [`Error::Http`] when the body is not
    /// JSON and as [`Error::Remote`] when it decodes to an object with an
    /// integer `Code` and a string `Message`. Any other JSON error body, and
    /// every other status, passes through untouched.
    pub fn classify(self) -> Result<Vec<u8>> {
        if !(400..600).contains(&self.status) {
            return Ok(self.body);
        }

        let decoded: Value = match serde_json::from_slice(&self.body) {
            Ok(value) => value,
            Err(_) => return Err(Error::http(self.status, &self.body)),
        };

        match remote_error(&decoded) {
            Some((code, message)) => Err(Error::Remote { code, message }),
            None => Ok(self.body),
        }
    }

    /// Fail with [`Error::Http`] on any status from 400 up, whatever the body.
    /// For servers that are not the daemon and so have no error envelope.
    pub fn require_success(self) -> Result<Vec<u8>> {
        if self.status >= 400 {
            return Err(Error::http(self.status, &self.body));
        }
        Ok(self.body)
    }
}

fn remote_error(envelope: &Value) -> Option<(i64, String)> {
    let code = envelope.get("Code")?.as_i64()?;
    let message = envelope.get("Message")?.as_str()?;
    Some((code, message.to_string()))
}

/// Default request timeout in whole seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Single-handle HTTP transport.
///
/// `execute` takes `&mut self`: one request occupies the handle at a time.
/// Share a `Transport` between threads only behind a lock, or give each
/// caller its own.
pub struct Transport {
    timeout_secs: u64,
    handle: Option<Agent>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("timeout_secs", &self.timeout_secs)
            .field("open_handle", &self.handle.is_some())
            .finish()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_SECS)
    }
}

impl Transport {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            handle: None,
        }
    }

    pub fn timeout(&self) -> u64 {
        self.timeout_secs
    }

    /// Applies from the next call on. Zero means no timeout.
    pub fn set_timeout(&mut self, secs: u64) {
        self.timeout_secs = secs;
    }

    /// True while a connection handle is held. Outside `execute` this is
    /// always false.
    pub fn has_open_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Perform one request against `url` and classify the response.
    ///
    /// Body framing (and the existence check for file uploads) happens before
    /// the handle is acquired, so local failures never reach the network.
    pub fn execute(&mut self, url: &str, body: &RequestBody, query: &Query) -> Result<Vec<u8>> {
        self.send(url, body, query)?.classify()
    }

    /// Perform one request and return the raw status and body, unclassified.
    pub fn send(&mut self, url: &str, body: &RequestBody, query: &Query) -> Result<HttpResponse> {
        let url = query.append_to(url);
        let payload = Payload::encode(body)?;

        let mut handle = HandleGuard::acquire(&mut self.handle, self.timeout_secs);
        let agent = handle.agent();

        debug!(method = ?body.method(), url = %url, "sending request");
        let sent = match payload {
            Payload::Empty => agent.get(&url).call(),
            Payload::Bytes(bytes) => agent
                .post(&url)
                .content_type(multipart::content_type().as_str())
                .send(&bytes[..]),
            Payload::Stream(encoded) => agent
                .post(&url)
                .content_type(encoded.content_type.as_str())
                .send(SendBody::from_owned_reader(encoded.reader)),
        };

        let mut response = sent.map_err(|e| {
            warn!(url = %url, error = %e, "request failed without a response");
            Error::NoResponse(e.to_string())
        })?;

        let status = response.status().as_u16();
        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_to_vec()
            .map_err(|e| {
                warn!(url = %url, status, error = %e, "failed to read response body");
                Error::NoResponse(e.to_string())
            })?;
        debug!(status, bytes = bytes.len(), "received response");

        Ok(HttpResponse {
            status,
            body: bytes,
        })
    }
}

/// Framed form of a [`RequestBody`].
enum Payload {
    Empty,
    Bytes(Vec<u8>),
    Stream(multipart::EncodedBody),
}

impl Payload {
    fn encode(body: &RequestBody) -> Result<Self> {
        Ok(match body {
            RequestBody::None => Payload::Empty,
            RequestBody::Inline(data) => Payload::Bytes(multipart::inline_body(data)),
            RequestBody::File(path) => Payload::Stream(multipart::file_body(path)?),
        })
    }
}

/// Scoped ownership of the transport's connection handle.
struct HandleGuard<'a> {
    slot: &'a mut Option<Agent>,
    timeout_secs: u64,
}

impl<'a> HandleGuard<'a> {
    fn acquire(slot: &'a mut Option<Agent>, timeout_secs: u64) -> Self {
        Self { slot, timeout_secs }
    }

    /// The handle, created with the guard's timeout if absent.
    fn agent(&mut self) -> &Agent {
        let timeout_secs = self.timeout_secs;
        self.slot.get_or_insert_with(|| build_agent(timeout_secs))
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        self.slot.take();
    }
}

/// Zero disables the global timeout, as it does for curl.
fn global_timeout(timeout_secs: u64) -> Option<Duration> {
    (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs))
}

/// Statuses come back as data so [`HttpResponse::classify`] can see them.
fn build_agent(timeout_secs: u64) -> Agent {
    Agent::config_builder()
        .timeout_global(global_timeout(timeout_secs))
        .http_status_as_error(false)
        .build()
        .new_agent()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn from_parts_rejects_both_payloads() {
        let err = RequestBody::from_parts(Some(b"data".to_vec()), Some(PathBuf::from("/tmp/x")))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUsage(_)));
    }

    #[test]
    fn from_parts_picks_single_payload() {
        assert_eq!(
            RequestBody::from_parts(Some(b"data".to_vec()), None).unwrap(),
            RequestBody::Inline(b"data".to_vec())
        );
        assert_eq!(
            RequestBody::from_parts(None, Some(PathBuf::from("a.txt"))).unwrap(),
            RequestBody::File(PathBuf::from("a.txt"))
        );
        assert_eq!(RequestBody::from_parts(None, None).unwrap(), RequestBody::None);
    }

    #[test]
    fn from_parts_treats_empty_values_as_absent() {
        assert_eq!(
            RequestBody::from_parts(Some(Vec::new()), Some(PathBuf::from("a.txt"))).unwrap(),
            RequestBody::File(PathBuf::from("a.txt"))
        );
        assert_eq!(
            RequestBody::from_parts(Some(b"x".to_vec()), Some(PathBuf::new())).unwrap(),
            RequestBody::Inline(b"x".to_vec())
        );
    }

    #[test]
    fn body_mode_selects_method() {
        assert_eq!(RequestBody::None.method(), HttpMethod::Get);
        assert_eq!(RequestBody::Inline(vec![1]).method(), HttpMethod::Post);
        assert_eq!(RequestBody::File(PathBuf::from("f")).method(), HttpMethod::Post);
    }

    #[test]
    fn empty_query_leaves_url_bare() {
        let url = "http://localhost:5001/api/v0/version";
        assert_eq!(Query::new().append_to(url), url);
    }

    #[test]
    fn query_preserves_order_and_encodes() {
        let query = Query::new()
            .with("stream-channels", true)
            .with("arg", "a b&c")
            .with("count", 3);
        assert_eq!(
            query.append_to("http://h/api/v0/add"),
            "http://h/api/v0/add?stream-channels=true&arg=a+b%26c&count=3"
        );
    }

    #[test]
    fn query_extends_existing_query_string() {
        let query = Query::new().with("pin", false);
        assert_eq!(query.append_to("http://h/x?a=1"), "http://h/x?a=1&pin=false");
    }

    #[test]
    fn success_status_passes_body_through() {
        let body = response(200, "not even json").classify().unwrap();
        assert_eq!(body, b"not even json");
    }

    #[test]
    fn redirect_status_passes_body_through() {
        assert!(response(302, "").classify().is_ok());
    }

    #[test]
    fn error_status_with_invalid_json_is_http_error() {
        let err = response(404, "404 page not found").classify().unwrap_err();
        match err {
            Error::Http { status, snippet } => {
                assert_eq!(status, 404);
                assert_eq!(snippet, "404 page not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_status_with_empty_body_is_http_error() {
        let err = response(503, "").classify().unwrap_err();
        assert!(matches!(err, Error::Http { status: 503, .. }));
    }

    #[test]
    fn error_envelope_uses_decoded_code() {
        let err = response(
            500,
            r#"{"Message":"not pinned or pinned indirectly","Code":0,"Type":"error"}"#,
        )
        .classify()
        .unwrap_err();
        match err {
            Error::Remote { code, message } => {
                assert_eq!(code, 0);
                assert_eq!(message, "not pinned or pinned indirectly");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn other_json_error_bodies_pass_through() {
        let body = r#"{"Message":"missing code"}"#;
        assert_eq!(response(400, body).classify().unwrap(), body.as_bytes());

        let body = r#"{"Code":"1","Message":"string code"}"#;
        assert_eq!(response(500, body).classify().unwrap(), body.as_bytes());

        assert_eq!(response(500, "[1,2]").classify().unwrap(), b"[1,2]");
    }

    #[test]
    fn require_success_rejects_any_error_status() {
        let err = response(500, r#"{"Message":"partial"}"#)
            .require_success()
            .unwrap_err();
        assert!(matches!(err, Error::Http { status: 500, .. }));

        let err = response(404, r#"{"Message":"gone","Code":0}"#)
            .require_success()
            .unwrap_err();
        assert!(matches!(err, Error::Http { status: 404, .. }));

        assert_eq!(response(200, "body").require_success().unwrap(), b"body");
    }

    #[test]
    fn zero_timeout_disables_global_timeout() {
        assert_eq!(global_timeout(0), None);
        assert_eq!(global_timeout(3), Some(Duration::from_secs(3)));
    }

    #[test]
    fn transport_starts_without_handle() {
        let transport = Transport::default();
        assert_eq!(transport.timeout(), DEFAULT_TIMEOUT_SECS);
        assert!(!transport.has_open_handle());
    }

    #[test]
    fn guard_releases_handle_on_drop() {
        let mut slot = None;
        {
            let mut guard = HandleGuard::acquire(&mut slot, 1);
            let _ = guard.agent();
            assert!(guard.slot.is_some());
        }
        assert!(slot.is_none());
    }

    #[test]
    fn missing_file_fails_before_handle_is_touched() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = Transport::new(1);
        let err = transport
            .execute(
                "http://127.0.0.1:9/api/v0/add",
                &RequestBody::File(dir.path().join("missing")),
                &Query::new(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
        assert!(!transport.has_open_handle());
    }
}
