// ============================================
// File: crates/s3l-app/src/controller.rs
// ============================================
//! # File Controller
//!
//! ## Creation Reason
//! Server side of one authenticated session: reads request envelopes,
//! dispatches them to the endpoint handlers and writes the replies.
//!
//! ## Endpoints
//! | Endpoint            | Body                  | Reply                      |
//! |---------------------|-----------------------|----------------------------|
//! | `FileUpload`        | `{path}`              | `""` or an error string    |
//! | `UploadFileChunk`   | file chunk            | none                       |
//! | `FileDownload`      | `{path}`              | `{size, nonce, error}` + chunks |
//! | `ListFiles`         | any                   | space-separated names      |
//! | `MoveFile`          | `{old_path, new_path}`| status string              |
//! | `DeleteFileRequest` | `{path}`              | `{nonce, error}`           |
//! | `DeleteFile`        | `{nonce, confirm}`    | status string              |
//!
//! ## ⚠️ Important Note for Next Developer
//! - A refused request is answered and the session continues; protocol
//!   violations and channel errors end the session
//! - Deletion needs the nonce handed out by the *latest*
//!   `DeleteFileRequest`; any `DeleteFile` consumes it
//!
//! ## Last Modified
//! v0.1.0 - Initial endpoint set

use std::io::Read;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info, warn};

use s3l_transport::ByteChannel;

use crate::directory::User;
use crate::error::{AppError, Result};
use crate::protocol::{
    read_envelope, write_chunk, write_json, DeleteConfirm, DeleteTicket, DownloadInfo, Endpoint,
    Envelope, MoveParams, PathParams, DOWNLOAD_CHUNK_SIZE, MAX_FILE_SIZE,
};
use crate::storage::UserStorage;

/// Random bytes behind each nonce (hex-encoded on the wire).
const NONCE_SIZE: usize = 16;

struct PendingDelete {
    nonce: String,
    name: String,
}

/// Serves one user's requests over `io`.
pub struct Controller<C> {
    io: C,
    user: User,
    storage: UserStorage,
    pending_delete: Option<PendingDelete>,
}

impl<C> Controller<C>
where
    C: ByteChannel,
    AppError: From<C::Error>,
{
    /// Serves `user`, confined to their storage directory.
    pub fn new(io: C, user: User) -> Self {
        let storage = user.storage();
        Self {
            io,
            user,
            storage,
            pending_delete: None,
        }
    }

    /// Handles requests until the client leaves.
    ///
    /// # Errors
    /// Protocol violations and channel failures; a clean disconnect is
    /// `Ok(())`.
    pub fn serve(&mut self) -> Result<()> {
        let id = self.user.record.id;
        info!(client_id = %id, name = %self.user.record.name, "User connected");
        match self.serve_requests() {
            Err(e) if e.is_disconnect() => {
                info!(client_id = %id, "User disconnected");
                Ok(())
            }
            other => other,
        }
    }

    fn serve_requests(&mut self) -> Result<()> {
        loop {
            let envelope = read_envelope(&mut self.io)?;
            self.dispatch(&envelope)?;
        }
    }

    fn dispatch(&mut self, envelope: &Envelope) -> Result<()> {
        let endpoint = envelope.header.endpoint()?;
        debug!(client_id = %self.user.record.id, %endpoint, "Request");
        match endpoint {
            Endpoint::FileUpload => self.file_upload(&envelope.json()?),
            Endpoint::UploadFileChunk => {
                self.upload_chunk(envelope);
                Ok(())
            }
            Endpoint::FileDownload => self.file_download(&envelope.json()?),
            Endpoint::ListFiles => self.list_files(),
            Endpoint::MoveFile => self.move_file(&envelope.json()?),
            Endpoint::DeleteFileRequest => self.delete_request(&envelope.json()?),
            Endpoint::DeleteFile => self.delete_file(&envelope.json()?),
            Endpoint::DownloadFileChunk | Endpoint::Reply => Err(AppError::protocol(format!(
                "'{endpoint}' is not a request"
            ))),
        }
    }

    fn reply<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        write_json(&mut self.io, Endpoint::Reply, value)
    }

    // ========================================
    // Upload
    // ========================================

    fn file_upload(&mut self, params: &PathParams) -> Result<()> {
        match self.storage.create_empty(&params.path) {
            Ok(()) => self.reply(""),
            Err(e) => {
                debug!(file = %params.path, error = %e, "Upload refused");
                self.reply(&refusal(&e, "can't create file"))
            }
        }
    }

    /// Chunks carry no reply, so failures are only logged.
    fn upload_chunk(&mut self, envelope: &Envelope) {
        let (offset, name) = match envelope.chunk_position() {
            Ok(position) => position,
            Err(e) => {
                warn!(error = %e, "Dropping malformed upload chunk");
                return;
            }
        };
        if offset >= MAX_FILE_SIZE {
            debug!(file = %name, offset, "Dropping chunk beyond the size limit");
            return;
        }
        if let Err(e) = self.storage.write_at(name, offset, &envelope.body) {
            warn!(file = %name, offset, error = %e, "Dropping upload chunk");
        }
    }

    // ========================================
    // Download
    // ========================================

    fn file_download(&mut self, params: &PathParams) -> Result<()> {
        let (mut file, size) = match self.storage.open(&params.path) {
            Ok(opened) => opened,
            Err(e) => {
                return self.reply(&DownloadInfo {
                    size: 0,
                    nonce: String::new(),
                    error: refusal(&e, "file not found"),
                })
            }
        };

        self.reply(&DownloadInfo {
            size,
            nonce: new_nonce(),
            error: String::new(),
        })?;

        let mut buffer = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        let mut offset = 0u64;
        while offset < size {
            #[allow(clippy::cast_possible_truncation)]
            let want = (size - offset).min(DOWNLOAD_CHUNK_SIZE as u64) as usize;
            let chunk = &mut buffer[..want];
            file.read_exact(chunk)
                .map_err(|e| AppError::io(format!("reading {}", params.path), e))?;
            write_chunk(&mut self.io, Endpoint::DownloadFileChunk, offset, &params.path, chunk)?;
            offset += want as u64;
        }
        debug!(file = %params.path, size, "Download sent");
        Ok(())
    }

    // ========================================
    // Listing and renaming
    // ========================================

    fn list_files(&mut self) -> Result<()> {
        let names = self.storage.list()?;
        self.reply(&names.join(" "))
    }

    fn move_file(&mut self, params: &MoveParams) -> Result<()> {
        match self.storage.rename(&params.old_path, &params.new_path) {
            Ok(()) => {
                info!(from = %params.old_path, to = %params.new_path, "File renamed");
                self.reply("file renamed")
            }
            Err(e) => self.reply(&refusal(&e, "can't rename file")),
        }
    }

    // ========================================
    // Two-step delete
    // ========================================

    fn delete_request(&mut self, params: &PathParams) -> Result<()> {
        self.pending_delete = None;
        let ticket = match self.storage.resolve(&params.path) {
            Err(e) => DeleteTicket {
                nonce: String::new(),
                error: refusal(&e, "path not valid"),
            },
            Ok(_) if !self.storage.exists(&params.path) => DeleteTicket {
                nonce: String::new(),
                error: "file not found".to_string(),
            },
            Ok(_) => {
                let nonce = new_nonce();
                self.pending_delete = Some(PendingDelete {
                    nonce: nonce.clone(),
                    name: params.path.clone(),
                });
                DeleteTicket {
                    nonce,
                    error: String::new(),
                }
            }
        };
        self.reply(&ticket)
    }

    fn delete_file(&mut self, params: &DeleteConfirm) -> Result<()> {
        let pending = self.pending_delete.take();
        if params.confirm != "y" {
            return self.reply("");
        }
        let Some(pending) = pending.filter(|p| p.nonce == params.nonce) else {
            warn!(client_id = %self.user.record.id, "Delete confirmation with a stale nonce");
            return self.reply("can't delete file");
        };
        match self.storage.remove(&pending.name) {
            Ok(()) => {
                info!(file = %pending.name, "File deleted");
                self.reply("file deleted")
            }
            Err(e) => self.reply(&refusal(&e, "can't delete file")),
        }
    }
}

/// Text sent back for a refused request. Local I/O details stay in the
/// server log.
fn refusal(err: &AppError, fallback: &str) -> String {
    match err {
        AppError::Rejected { reason } => reason.clone(),
        other => {
            warn!(error = %other, "Request failed");
            fallback.to_string()
        }
    }
}

fn new_nonce() -> String {
    let mut bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
