//! In-memory stand-in for an IPFS daemon's HTTP API.
//!
//! Serves both the gateway (`/ipfs/{hash}`) and the control-plane
//! (`/api/v0/...`) routes from one router. Content identifiers are a SHA-256
//! digest of the uploaded bytes, so identical uploads get identical ids.
//! Failures use the daemon's `{Message, Code, Type}` envelope, except on the
//! gateway, which answers with plain text.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        DefaultBodyLimit, Path, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const AGENT_VERSION: &str = "mock-ipfs/0.1.0/";
pub const PROTOCOL_VERSION: &str = "ipfs/0.1.0";
pub const DAEMON_VERSION: &str = "0.4.22";
pub const NOT_PINNED: &str = "not pinned or pinned indirectly";

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub struct Daemon {
    blocks: RwLock<HashMap<String, Vec<u8>>>,
    pins: RwLock<HashSet<String>>,
    requests: AtomicUsize,
    peer_id: String,
}

impl Default for Daemon {
    fn default() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            pins: RwLock::new(HashSet::new()),
            requests: AtomicUsize::new(0),
            peer_id: format!("12D3KooW{}", Uuid::new_v4().simple()),
        }
    }
}

impl Daemon {
    /// Number of HTTP requests that reached the router.
    pub fn requests_served(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

pub type Db = Arc<Daemon>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddResponse {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Size")]
    pub size: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Code")]
    pub code: i64,
    #[serde(rename = "Type")]
    pub kind: String,
}

/// Daemon-side failure, rendered as an [`ErrorEnvelope`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: i64,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: 0,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: 1,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            message: self.message,
            code: self.code,
            kind: "error".to_string(),
        };
        (self.status, Json(envelope)).into_response()
    }
}

/// Content identifier for `data`.
pub fn content_id(data: &[u8]) -> String {
    format!("bafkmock{}", hex::encode(Sha256::digest(data)))
}

pub fn app() -> Router {
    app_with_state(Db::default())
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/ipfs/{hash}", get(cat))
        .route("/api/v0/add", post(add))
        .route("/api/v0/ls/{hash}", get(ls).post(ls))
        .route("/api/v0/object/stat/{hash}", get(object_stat).post(object_stat))
        .route("/api/v0/pin/add/{hash}", get(pin_add).post(pin_add))
        .route("/api/v0/pin/rm/{hash}", get(pin_rm).post(pin_rm))
        .route("/api/v0/version", get(version).post(version))
        .route("/api/v0/id", get(id).post(id))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn_with_state(db.clone(), count_requests))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

async fn count_requests(State(db): State<Db>, request: Request, next: Next) -> Response {
    db.requests.fetch_add(1, Ordering::SeqCst);
    debug!(method = %request.method(), uri = %request.uri(), "mock request");
    next.run(request).await
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 page not found")
}

async fn cat(State(db): State<Db>, Path(hash): Path<String>) -> Response {
    match db.blocks.read().await.get(&hash) {
        Some(data) => (StatusCode::OK, data.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("ipfs resolve -r /ipfs/{hash}: merkledag: not found"),
        )
            .into_response(),
    }
}

async fn add(
    State(db): State<Db>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AddResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let upload = file_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("file argument 'path' is required"))?;

    let hash = content_id(&upload.data);
    let size = upload.data.len();
    db.blocks.write().await.insert(hash.clone(), upload.data.to_vec());

    Ok(Json(AddResponse {
        name: upload.filename.unwrap_or_else(|| hash.clone()),
        hash,
        size: size.to_string(),
    }))
}

struct Upload {
    filename: Option<String>,
    data: Bytes,
}

/// The part named `file`, or the first part with no name at all. Other named
/// parts are skipped.
async fn file_field(multipart: &mut Multipart) -> Result<Option<Upload>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if !matches!(field.name(), None | Some("file")) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return Ok(Some(Upload { filename, data }));
    }
    Ok(None)
}

async fn ls(State(db): State<Db>, Path(hash): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    if !db.blocks.read().await.contains_key(&hash) {
        return Err(ApiError::internal("merkledag: not found"));
    }
    Ok(Json(serde_json::json!({
        "Objects": [{ "Hash": hash, "Links": [] }]
    })))
}

async fn object_stat(
    State(db): State<Db>,
    Path(hash): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let blocks = db.blocks.read().await;
    let data = blocks
        .get(&hash)
        .ok_or_else(|| ApiError::internal("merkledag: not found"))?;
    Ok(Json(serde_json::json!({
        "Hash": hash,
        "NumLinks": 0,
        "BlockSize": data.len(),
        "LinksSize": 0,
        "DataSize": data.len(),
        "CumulativeSize": data.len(),
    })))
}

async fn pin_add(
    State(db): State<Db>,
    Path(hash): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !db.blocks.read().await.contains_key(&hash) {
        return Err(ApiError::internal(format!("pin: {hash}: merkledag: not found")));
    }
    db.pins.write().await.insert(hash.clone());
    Ok(Json(serde_json::json!({ "Pins": [hash] })))
}

async fn pin_rm(
    State(db): State<Db>,
    Path(hash): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !db.pins.write().await.remove(&hash) {
        return Err(ApiError::internal(NOT_PINNED));
    }
    Ok(Json(serde_json::json!({ "Pins": [hash] })))
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "Version": DAEMON_VERSION,
        "Commit": "",
        "Repo": "7",
        "System": format!("{}/{}", std::env::consts::ARCH, std::env::consts::OS),
        "Golang": "go1.12.9",
    }))
}

async fn id(State(db): State<Db>) -> Json<serde_json::Value> {
    let public_key = hex::encode(Sha256::digest(db.peer_id.as_bytes()));
    Json(serde_json::json!({
        "ID": db.peer_id,
        "PublicKey": public_key,
        "Addresses": [format!("/ip4/127.0.0.1/tcp/4001/p2p/{}", db.peer_id)],
        "AgentVersion": AGENT_VERSION,
        "ProtocolVersion": PROTOCOL_VERSION,
    }))
}
