// ============================================
// File: crates/s3l-app/src/protocol.rs
// ============================================
//! # Application Envelope
//!
//! ## Creation Reason
//! The secure channel moves an ordered byte stream; this module cuts it
//! into request/response envelopes and defines the JSON payloads of every
//! endpoint.
//!
//! ## Envelope Layout
//! ```text
//! ┌──────────────┬─────────────────────────┬──────────────────┐
//! │ header_len   │ header (JSON AppHeader) │ body             │
//! │ u32 BE       │ header_len bytes        │ body_len bytes   │
//! └──────────────┴─────────────────────────┴──────────────────┘
//! ```
//!
//! `kind = json` bodies are a JSON value; `kind = file_chunk` bodies are
//! raw file bytes addressed by `offset` and `file_name`.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The length limits are checked before allocating: a peer must not be
//!   able to make us reserve gigabytes with a forged length
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope format

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use s3l_transport::ByteChannel;

use crate::error::{AppError, Result};

// ============================================
// Constants
// ============================================

/// Largest accepted JSON header.
pub const MAX_HEADER_LEN: u32 = 4 * 1024;

/// Largest accepted body.
pub const MAX_BODY_LEN: u64 = 1024 * 1024;

/// Upload chunk size (client to server).
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Download chunk size (server to client).
pub const DOWNLOAD_CHUNK_SIZE: usize = 4 * 1024;

/// Uploads at or beyond this offset are dropped.
pub const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

// ============================================
// Endpoint
// ============================================

/// Every endpoint name that can appear in [`AppHeader::endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Creates an empty file that chunks then fill.
    FileUpload,
    /// Client-to-server file chunk; never answered.
    UploadFileChunk,
    /// Asks for a file; answered by its size and then chunks.
    FileDownload,
    /// Server-to-client file chunk.
    DownloadFileChunk,
    /// Lists the user's files.
    ListFiles,
    /// Renames a file.
    MoveFile,
    /// First delete step; answered with a nonce.
    DeleteFileRequest,
    /// Second delete step; carries the nonce and the confirmation.
    DeleteFile,
    /// Server answer to a request.
    Reply,
}

impl Endpoint {
    /// Name used on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FileUpload => "FileUpload",
            Self::UploadFileChunk => "UploadFileChunk",
            Self::FileDownload => "FileDownload",
            Self::DownloadFileChunk => "DownloadFileChunk",
            Self::ListFiles => "ListFiles",
            Self::MoveFile => "MoveFile",
            Self::DeleteFileRequest => "DeleteFileRequest",
            Self::DeleteFile => "DeleteFile",
            Self::Reply => "Reply",
        }
    }

    const ALL: [Self; 9] = [
        Self::FileUpload,
        Self::UploadFileChunk,
        Self::FileDownload,
        Self::DownloadFileChunk,
        Self::ListFiles,
        Self::MoveFile,
        Self::DeleteFileRequest,
        Self::DeleteFile,
        Self::Reply,
    ];
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| AppError::UnknownEndpoint {
                endpoint: s.to_string(),
            })
    }
}

// ============================================
// AppHeader
// ============================================

/// How to interpret an envelope body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    /// A JSON value.
    Json,
    /// Raw file bytes.
    FileChunk,
}

/// JSON header preceding every body.
///
/// Refusals travel in the reply body, so the header carries no status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppHeader {
    /// How to interpret the body.
    pub kind: BodyKind,
    /// [`Endpoint`] name.
    pub endpoint: String,
    /// Exact number of body bytes that follow.
    pub body_len: u64,
    /// Position of a file chunk within its file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// File a chunk belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl AppHeader {
    /// Header for a JSON body.
    #[must_use]
    pub fn json(endpoint: Endpoint, body_len: usize) -> Self {
        Self {
            kind: BodyKind::Json,
            endpoint: endpoint.name().to_string(),
            body_len: body_len as u64,
            offset: None,
            file_name: None,
        }
    }

    /// Header for a file chunk.
    #[must_use]
    pub fn chunk(endpoint: Endpoint, body_len: usize, offset: u64, file_name: &str) -> Self {
        Self {
            kind: BodyKind::FileChunk,
            endpoint: endpoint.name().to_string(),
            body_len: body_len as u64,
            offset: Some(offset),
            file_name: Some(file_name.to_string()),
        }
    }

    /// Parses the endpoint name.
    ///
    /// # Errors
    /// Returns `UnknownEndpoint` for a name outside [`Endpoint`].
    pub fn endpoint(&self) -> Result<Endpoint> {
        self.endpoint.parse()
    }
}

// ============================================
// Envelope
// ============================================

/// A header and its body, as read off the channel.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Decoded header.
    pub header: AppHeader,
    /// `header.body_len` raw bytes.
    pub body: Vec<u8>,
}

impl Envelope {
    /// Decodes a JSON body.
    ///
    /// # Errors
    /// `Protocol` if the body is a file chunk, `Json` if it does not
    /// decode as `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.header.kind != BodyKind::Json {
            return Err(AppError::protocol(format!(
                "expected a JSON body on '{}', got a file chunk",
                self.header.endpoint
            )));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns `(offset, file_name)` of a file chunk.
    ///
    /// # Errors
    /// `Protocol` if the envelope is not a complete file chunk.
    pub fn chunk_position(&self) -> Result<(u64, &str)> {
        match (&self.header.kind, self.header.offset, self.header.file_name.as_deref()) {
            (BodyKind::FileChunk, Some(offset), Some(name)) => Ok((offset, name)),
            _ => Err(AppError::protocol(format!(
                "'{}' is not a file chunk with offset and file name",
                self.header.endpoint
            ))),
        }
    }
}

// ============================================
// Channel I/O
// ============================================

/// Writes one envelope.
///
/// # Errors
/// `Protocol` if the header or body exceeds the limits, otherwise
/// whatever the channel reports.
pub fn write_envelope<C>(io: &mut C, header: &AppHeader, body: &[u8]) -> Result<()>
where
    C: ByteChannel + ?Sized,
    AppError: From<C::Error>,
{
    let header_bytes = serde_json::to_vec(header)?;
    let header_len = u32::try_from(header_bytes.len())
        .ok()
        .filter(|len| *len <= MAX_HEADER_LEN)
        .ok_or_else(|| AppError::protocol("header too large"))?;
    if body.len() as u64 > MAX_BODY_LEN || header.body_len != body.len() as u64 {
        return Err(AppError::protocol("body length mismatch or too large"));
    }

    let mut frame = Vec::with_capacity(4 + header_bytes.len() + body.len());
    frame.extend_from_slice(&header_len.to_be_bytes());
    frame.extend_from_slice(&header_bytes);
    frame.extend_from_slice(body);
    io.write(&frame)?;

    trace!(endpoint = %header.endpoint, body_len = body.len(), "Envelope written");
    Ok(())
}

/// Reads one envelope.
///
/// # Errors
/// `Protocol` for oversize lengths or a header/body mismatch, `Json` for
/// an undecodable header, otherwise whatever the channel reports.
pub fn read_envelope<C>(io: &mut C) -> Result<Envelope>
where
    C: ByteChannel + ?Sized,
    AppError: From<C::Error>,
{
    let len_bytes = io.read(4)?;
    let header_len = u32::from_be_bytes(
        len_bytes
            .as_slice()
            .try_into()
            .map_err(|_| AppError::protocol("short envelope length"))?,
    );
    if header_len == 0 || header_len > MAX_HEADER_LEN {
        return Err(AppError::protocol(format!("header length {header_len} out of range")));
    }

    let header: AppHeader = serde_json::from_slice(&io.read(header_len as usize)?)?;
    if header.body_len > MAX_BODY_LEN {
        return Err(AppError::protocol(format!("body length {} out of range", header.body_len)));
    }
    #[allow(clippy::cast_possible_truncation)]
    let body = if header.body_len == 0 {
        Vec::new()
    } else {
        io.read(header.body_len as usize)?
    };

    trace!(endpoint = %header.endpoint, body_len = body.len(), "Envelope read");
    Ok(Envelope { header, body })
}

/// Writes `value` as a JSON envelope to `endpoint`.
///
/// # Errors
/// See [`write_envelope`].
pub fn write_json<C, T>(io: &mut C, endpoint: Endpoint, value: &T) -> Result<()>
where
    C: ByteChannel + ?Sized,
    AppError: From<C::Error>,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(value)?;
    write_envelope(io, &AppHeader::json(endpoint, body.len()), &body)
}

/// Writes a file chunk envelope to `endpoint`.
///
/// # Errors
/// See [`write_envelope`].
pub fn write_chunk<C>(
    io: &mut C,
    endpoint: Endpoint,
    offset: u64,
    file_name: &str,
    bytes: &[u8],
) -> Result<()>
where
    C: ByteChannel + ?Sized,
    AppError: From<C::Error>,
{
    write_envelope(io, &AppHeader::chunk(endpoint, bytes.len(), offset, file_name), bytes)
}

/// Reads a `Reply` envelope and decodes its JSON body.
///
/// # Errors
/// `Protocol` if the next envelope is not a reply, plus the errors of
/// [`read_envelope`] and [`Envelope::json`].
pub fn read_reply<C, T>(io: &mut C) -> Result<T>
where
    C: ByteChannel + ?Sized,
    AppError: From<C::Error>,
    T: DeserializeOwned,
{
    let envelope = read_envelope(io)?;
    if envelope.header.endpoint()? != Endpoint::Reply {
        return Err(AppError::protocol(format!(
            "expected a reply, got '{}'",
            envelope.header.endpoint
        )));
    }
    envelope.json()
}

// ============================================
// Endpoint Payloads
// ============================================

/// `FileUpload`, `FileDownload` and `DeleteFileRequest` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathParams {
    /// File name inside the user's directory.
    pub path: String,
}

/// `MoveFile` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveParams {
    /// Current name.
    pub old_path: String,
    /// New name.
    pub new_path: String,
}

/// `FileDownload` reply; `size` bytes of chunks follow when `error` is
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadInfo {
    /// File size in bytes.
    pub size: u64,
    /// Random transfer id.
    pub nonce: String,
    /// Refusal text, empty on success.
    pub error: String,
}

/// `DeleteFileRequest` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTicket {
    /// Nonce to send back with the confirmation.
    pub nonce: String,
    /// Refusal text, empty on success.
    pub error: String,
}

/// `DeleteFile` request body. Only `confirm == "y"` deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteConfirm {
    /// Nonce from the [`DeleteTicket`].
    pub nonce: String,
    /// `"y"` to delete, anything else to cancel.
    pub confirm: String,
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use s3l_transport::local_pair;

    use super::*;

    #[test]
    fn test_endpoint_names_parse_back() {
        for endpoint in Endpoint::ALL {
            assert_eq!(endpoint.name().parse::<Endpoint>().unwrap(), endpoint);
        }
        assert!(matches!(
            "Shell".parse::<Endpoint>(),
            Err(AppError::UnknownEndpoint { .. })
        ));
    }

    #[test]
    fn test_header_json_shape() {
        let header = AppHeader::chunk(Endpoint::UploadFileChunk, 3, 65536, "a.txt");
        let json: serde_json::Value = serde_json::to_value(&header).unwrap();
        assert_eq!(json["kind"], "file_chunk");
        assert_eq!(json["endpoint"], "UploadFileChunk");
        assert_eq!(json["offset"], 65536);
        assert_eq!(json["file_name"], "a.txt");

        let json = serde_json::to_value(AppHeader::json(Endpoint::ListFiles, 4)).unwrap();
        assert_eq!(json["kind"], "json");
        assert!(json.get("offset").is_none());
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_header_has_no_status() {
        let json = serde_json::to_value(AppHeader::json(Endpoint::Reply, 2)).unwrap();
        assert!(json.get("status").is_none());
        assert_eq!(json["body_len"], 2);
    }

    #[test]
    fn test_json_envelope_over_channel() {
        let (mut a, mut b) = local_pair();
        let params = MoveParams {
            old_path: "a".into(),
            new_path: "b".into(),
        };
        write_json(&mut a, Endpoint::MoveFile, &params).unwrap();

        let envelope = read_envelope(&mut b).unwrap();
        assert_eq!(envelope.header.endpoint().unwrap(), Endpoint::MoveFile);
        assert_eq!(envelope.json::<MoveParams>().unwrap(), params);
        assert!(envelope.chunk_position().is_err());
    }

    #[test]
    fn test_chunk_envelope_over_channel() {
        let (mut a, mut b) = local_pair();
        write_chunk(&mut a, Endpoint::DownloadFileChunk, 4096, "f", &[7u8; 10]).unwrap();

        let envelope = read_envelope(&mut b).unwrap();
        assert_eq!(envelope.chunk_position().unwrap(), (4096, "f"));
        assert_eq!(envelope.body, vec![7u8; 10]);
        assert!(envelope.json::<String>().is_err());
    }

    #[test]
    fn test_empty_body() {
        let (mut a, mut b) = local_pair();
        write_chunk(&mut a, Endpoint::UploadFileChunk, 0, "f", &[]).unwrap();
        let envelope = read_envelope(&mut b).unwrap();
        assert!(envelope.body.is_empty());
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn test_read_reply_rejects_requests() {
        let (mut a, mut b) = local_pair();
        write_json(&mut a, Endpoint::ListFiles, &()).unwrap();
        assert!(matches!(
            read_reply::<_, String>(&mut b),
            Err(AppError::Protocol { .. })
        ));
    }

    #[test]
    fn test_oversize_header_length_rejected() {
        let (mut a, mut b) = local_pair();
        a.write(&(MAX_HEADER_LEN + 1).to_be_bytes()).unwrap();
        assert!(matches!(read_envelope(&mut b), Err(AppError::Protocol { .. })));
    }

    #[test]
    fn test_oversize_body_length_rejected() {
        let (mut a, mut b) = local_pair();
        let mut header = AppHeader::json(Endpoint::Reply, 0);
        header.body_len = MAX_BODY_LEN + 1;
        let bytes = serde_json::to_vec(&header).unwrap();
        a.write(&(bytes.len() as u32).to_be_bytes()).unwrap();
        a.write(&bytes).unwrap();
        assert!(matches!(read_envelope(&mut b), Err(AppError::Protocol { .. })));
    }

    #[test]
    fn test_closed_channel_is_disconnect() {
        let (mut a, mut b) = local_pair();
        a.close();
        assert!(read_envelope(&mut b).unwrap_err().is_disconnect());
    }
}
