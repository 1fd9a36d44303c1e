// ============================================
// File: crates/s3l-app/src/client.rs
// ============================================
//! # File Client
//!
//! ## Creation Reason
//! Client side of the endpoints in [`crate::controller`]. One method per
//! user action; each returns once the server has answered.
//!
//! ## Main Functionality
//! - `FileClient::connect`: TCP + secure channel from a `ClientConfig`
//! - `upload` / `download`: chunked transfers
//! - `list`, `rename`, two-step `request_delete` / `confirm_delete`
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use s3l_core::{ClientHandshake, IdentityKeyPair, SecureChannel, TrustAnchor};
use s3l_transport::{ByteChannel, TcpChannel};

use crate::config::ClientConfig;
use crate::error::{AppError, Result};
use crate::protocol::{
    read_envelope, read_reply, write_chunk, write_json, DeleteConfirm, DeleteTicket,
    DownloadInfo, Endpoint, MoveParams, PathParams, UPLOAD_CHUNK_SIZE,
};

/// Issues requests over `io` and interprets the replies.
pub struct FileClient<C> {
    io: C,
}

impl FileClient<SecureChannel<TcpChannel>> {
    /// Connects to the server named in `config`.
    ///
    /// The handshake itself runs on the first request.
    ///
    /// # Errors
    /// Key or root certificate loading failures and TCP connect failures.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let identity = IdentityKeyPair::load_pem(&config.client.private_key_path)?;
        let trust = TrustAnchor::load(&config.server.root_ca_path)?;
        let params = ClientHandshake::new(
            Arc::new(identity),
            config.client_id(),
            trust,
            config.server.common_name.clone(),
        );

        let raw = TcpChannel::connect(config.server.address.as_str())?;
        info!(server = %config.server.address, client_id = %config.client_id(), "Connected");
        Ok(Self::new(SecureChannel::client(raw, params)))
    }
}

impl<C> FileClient<C>
where
    C: ByteChannel,
    AppError: From<C::Error>,
{
    /// Wraps an already connected channel.
    pub const fn new(io: C) -> Self {
        Self { io }
    }

    /// Uploads the local file at `path` under its file name.
    ///
    /// Returns the number of bytes sent.
    ///
    /// # Errors
    /// `Io` if the local file cannot be read, `Rejected` if the server
    /// refuses the name.
    pub fn upload(&mut self, path: &Path) -> Result<u64> {
        let name = file_name(path)?;
        let mut file =
            File::open(path).map_err(|e| AppError::io(format!("opening {}", path.display()), e))?;

        write_json(&mut self.io, Endpoint::FileUpload, &PathParams { path: name.clone() })?;
        let error: String = read_reply(&mut self.io)?;
        if !error.is_empty() {
            return Err(AppError::rejected(error));
        }

        let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut offset = 0u64;
        loop {
            let n = file
                .read(&mut buffer)
                .map_err(|e| AppError::io(format!("reading {}", path.display()), e))?;
            if n == 0 {
                break;
            }
            write_chunk(&mut self.io, Endpoint::UploadFileChunk, offset, &name, &buffer[..n])?;
            offset += n as u64;
        }

        debug!(file = %name, size = offset, "Upload sent");
        Ok(offset)
    }

    /// Downloads `name` into `dest_dir`, returning its size.
    ///
    /// # Errors
    /// `Rejected` if the server refuses, `Protocol` if the chunks do not
    /// line up, `Io` if the local file cannot be written (the session
    /// stays usable).
    pub fn download(&mut self, name: &str, dest_dir: &Path) -> Result<u64> {
        write_json(&mut self.io, Endpoint::FileDownload, &PathParams { path: name.to_string() })?;
        let info: DownloadInfo = read_reply(&mut self.io)?;
        if !info.error.is_empty() {
            return Err(AppError::rejected(info.error));
        }

        // Local failures must not leave chunks unread on the channel, so
        // the first one is remembered and the transfer is drained.
        let target = dest_dir.join(name);
        let context = || format!("writing {}", target.display());
        let mut local = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target)
            .map_err(|e| AppError::io(context(), e));

        let mut received = 0u64;
        while received < info.size {
            let envelope = read_envelope(&mut self.io)?;
            if envelope.header.endpoint()? != Endpoint::DownloadFileChunk {
                return Err(AppError::protocol("download interrupted by another message"));
            }
            let (offset, _) = envelope.chunk_position()?;
            if offset != received || received + envelope.body.len() as u64 > info.size {
                return Err(AppError::protocol(format!(
                    "chunk at offset {offset} does not continue {received} of {}",
                    info.size
                )));
            }
            let failed = match local.as_mut() {
                Ok(file) => file.write_all(&envelope.body).err(),
                Err(_) => None,
            };
            if let Some(e) = failed {
                local = Err(AppError::io(context(), e));
            }
            received += envelope.body.len() as u64;
        }
        local?;

        debug!(file = %name, size = received, "Download complete");
        Ok(received)
    }

    /// Names of the files stored on the server.
    ///
    /// # Errors
    /// Channel and protocol errors.
    pub fn list(&mut self) -> Result<Vec<String>> {
        write_json(&mut self.io, Endpoint::ListFiles, &())?;
        let names: String = read_reply(&mut self.io)?;
        Ok(names.split_whitespace().map(str::to_string).collect())
    }

    /// Renames `old` to `new`, returning the server's status line.
    ///
    /// # Errors
    /// Channel and protocol errors.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<String> {
        let params = MoveParams {
            old_path: old.to_string(),
            new_path: new.to_string(),
        };
        write_json(&mut self.io, Endpoint::MoveFile, &params)?;
        read_reply(&mut self.io)
    }

    /// First delete step: returns the nonce that confirms it.
    ///
    /// # Errors
    /// `Rejected` if the server refuses the name.
    pub fn request_delete(&mut self, name: &str) -> Result<String> {
        write_json(&mut self.io, Endpoint::DeleteFileRequest, &PathParams { path: name.to_string() })?;
        let ticket: DeleteTicket = read_reply(&mut self.io)?;
        if !ticket.error.is_empty() {
            return Err(AppError::rejected(ticket.error));
        }
        Ok(ticket.nonce)
    }

    /// Second delete step, returning the server's status line.
    ///
    /// # Errors
    /// Channel and protocol errors.
    pub fn confirm_delete(&mut self, nonce: &str, confirmed: bool) -> Result<String> {
        let params = DeleteConfirm {
            nonce: nonce.to_string(),
            confirm: if confirmed { "y" } else { "n" }.to_string(),
        };
        write_json(&mut self.io, Endpoint::DeleteFile, &params)?;
        read_reply(&mut self.io)
    }

    /// Ends the session.
    pub fn logout(mut self) {
        self.io.close();
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::invalid_command(format!("'{}' has no file name", path.display())))
}

#[cfg(test)]
mod tests {
    use std::thread;

    use s3l_common::ClientId;
    use s3l_core::IdentityKeyPair;
    use s3l_transport::local_pair;

    use super::*;
    use crate::controller::Controller;
    use crate::directory::{User, UserRecord};

    fn spawn_server(base: &Path) -> (FileClient<s3l_transport::LocalChannel>, thread::JoinHandle<Result<()>>) {
        let (server_end, client_end) = local_pair();
        let user = User {
            record: UserRecord {
                id: ClientId::new(1),
                name: "alice".into(),
                base_path: base.to_path_buf(),
                public_key_path: "alice.pub".into(),
            },
            key: IdentityKeyPair::generate().public_key(),
        };
        let handle = thread::spawn(move || Controller::new(server_end, user).serve());
        (FileClient::new(client_end), handle)
    }

    #[test]
    fn test_upload_download_roundtrip() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();

        let content: Vec<u8> = (0..200_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let source = local.path().join("photo.raw");
        std::fs::write(&source, &content).unwrap();

        let (mut client, handle) = spawn_server(remote.path());
        assert_eq!(client.upload(&source).unwrap(), 200_000);
        // The listing is answered after every chunk has been stored.
        assert_eq!(client.list().unwrap(), vec!["photo.raw"]);
        assert_eq!(std::fs::read(remote.path().join("photo.raw")).unwrap(), content);

        assert_eq!(client.download("photo.raw", downloads.path()).unwrap(), 200_000);
        assert_eq!(std::fs::read(downloads.path().join("photo.raw")).unwrap(), content);

        client.logout();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_empty_file_transfers() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let source = local.path().join("empty");
        std::fs::write(&source, b"").unwrap();

        let (mut client, handle) = spawn_server(remote.path());
        assert_eq!(client.upload(&source).unwrap(), 0);
        assert_eq!(client.download("empty", local.path()).unwrap(), 0);
        assert_eq!(std::fs::metadata(local.path().join("empty")).unwrap().len(), 0);

        client.logout();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_rejections_keep_session_alive() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let bad = local.path().join("name with spaces");
        std::fs::write(&bad, b"x").unwrap();

        let (mut client, handle) = spawn_server(remote.path());
        assert!(client.upload(&bad).unwrap_err().is_recoverable());
        assert!(client.download("ghost", local.path()).unwrap_err().is_recoverable());
        assert!(client.request_delete("ghost").unwrap_err().is_recoverable());
        assert!(client.list().unwrap().is_empty());

        client.logout();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_local_failures_keep_session_alive() {
        let remote = tempfile::tempdir().unwrap();
        std::fs::write(remote.path().join("report"), vec![1u8; 9000]).unwrap();

        let (mut client, handle) = spawn_server(remote.path());
        assert!(matches!(
            client.upload(Path::new("/nonexistent/s3l/file")),
            Err(AppError::Io { .. })
        ));
        assert!(matches!(
            client.download("report", Path::new("/nonexistent/s3l")),
            Err(AppError::Io { .. })
        ));
        assert_eq!(client.list().unwrap(), vec!["report"]);
        client.logout();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_rename_and_delete() {
        let remote = tempfile::tempdir().unwrap();
        std::fs::write(remote.path().join("draft"), b"v1").unwrap();

        let (mut client, handle) = spawn_server(remote.path());
        assert_eq!(client.rename("draft", "final").unwrap(), "file renamed");

        let nonce = client.request_delete("final").unwrap();
        assert_eq!(client.confirm_delete(&nonce, false).unwrap(), "");
        assert_eq!(client.list().unwrap(), vec!["final"]);

        let nonce = client.request_delete("final").unwrap();
        assert_eq!(client.confirm_delete(&nonce, true).unwrap(), "file deleted");
        assert!(client.list().unwrap().is_empty());

        client.logout();
        handle.join().unwrap().unwrap();
    }
}
