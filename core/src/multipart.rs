//! Multipart framing for uploads.
//!
//! # Design
//! The add endpoint only ever receives a single file part, so the boundary is
//! a fixed literal rather than a random token. Payloads containing the
//! literal boundary line will be split by the daemon; that limitation is
//! accepted in exchange for byte-stable request bodies.
//!
//! Inline content is framed in memory. Path-based uploads are framed as a
//! reader chain (part header, file, closing delimiter) so the file is
//! streamed to the socket instead of being loaded up front.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Boundary token shared by every multipart body this crate produces.
pub const BOUNDARY: &str = "a831rwxi1a3gzaorw1w2z49dlsor";

/// `Content-Type` header value for multipart bodies framed with [`BOUNDARY`].
pub fn content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// A framed request body ready to be handed to the transport.
pub struct EncodedBody {
    pub content_type: String,
    pub reader: Box<dyn Read + Send + Sync>,
}

impl std::fmt::Debug for EncodedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedBody")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Frame in-memory content as one unnamed file part.
pub fn inline_body(data: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{BOUNDARY}\r\nContent-Type: application/octet-stream\r\nContent-Disposition: file; \r\n\r\n"
    );
    let tail = closing_delimiter();

    let mut body = Vec::with_capacity(head.len() + data.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(tail.as_bytes());
    body
}

/// Frame the file at `path` as a part named `file`, streamed from disk.
///
/// Fails with [`Error::FileNotFound`] if `path` is not an existing regular
/// file.
pub fn file_body(path: &Path) -> Result<EncodedBody> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;

    let head = file_part_header(&file_name(path));
    let reader = Cursor::new(head.into_bytes())
        .chain(file)
        .chain(Cursor::new(closing_delimiter().into_bytes()));

    Ok(EncodedBody {
        content_type: content_type(),
        reader: Box::new(reader),
    })
}

fn file_part_header(filename: &str) -> String {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
}

fn closing_delimiter() -> String {
    format!("\r\n--{BOUNDARY}--\r\n")
}

/// Base name of `path`, with quotes stripped so it fits the header.
fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().replace('"', ""))
        .unwrap_or_default()
}
