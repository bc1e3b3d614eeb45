//! Error types for the IPFS API client.
//!
//! # Design
//! Failures split into two families. `InvalidUsage` and `FileNotFound` are
//! raised before the network is touched and point at the call site; retrying
//! them is pointless. `NoResponse` covers everything where no status line came
//! back (refused connections, DNS failures, timeouts) and may succeed on a
//! later attempt. `Http` and `Remote` are both answers from the daemon: the
//! latter when the body carried the daemon's `{Code, Message}` envelope, the
//! former when it carried something undecodable.

use std::path::PathBuf;

use thiserror::Error;

/// Maximum number of body characters kept in an [`Error::Http`] snippet.
pub const SNIPPET_LIMIT: usize = 200;

/// Errors returned by `IpfsClient` and the underlying transport.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller supplied an impossible request, e.g. inline content and a
    /// file path for the same upload.
    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    /// A path-based upload referenced a file that does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// No status or body came back from the network phase.
    #[error("no response: {0}")]
    NoResponse(String),

    /// 4xx/5xx status with a body that is not valid JSON.
    #[error("HTTP {status}: {snippet}")]
    Http { status: u16, snippet: String },

    /// 4xx/5xx status carrying the daemon's structured error envelope.
    #[error("IPFS error {code}: {message}")]
    Remote { code: i64, message: String },

    /// Reading a local file failed after it was found.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an [`Error::Http`], truncating the body to [`SNIPPET_LIMIT`]
    /// characters.
    pub fn http(status: u16, body: &[u8]) -> Self {
        let snippet = String::from_utf8_lossy(body)
            .chars()
            .take(SNIPPET_LIMIT)
            .collect();
        Error::Http { status, snippet }
    }

    /// True for errors caused by the caller rather than the network or daemon.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::InvalidUsage(_) | Error::FileNotFound(_))
    }

    /// True for errors that may clear up on a later attempt. The client itself
    /// never retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::NoResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
