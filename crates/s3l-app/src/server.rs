// ============================================
// File: crates/s3l-app/src/server.rs
// ============================================
//! # File Server
//!
//! ## Creation Reason
//! Accepts TCP connections and gives each one its own OS thread, secure
//! channel and controller.
//!
//! ## Connection Lifecycle
//! ```text
//! accept ──► TcpChannel ──► SecureChannel::accept ──► user lookup
//!                                 │ (handshake)            │
//!                                 ▼                        ▼
//!                          error: log, drop      Controller::serve
//!                                                          │
//!                                                          ▼
//!                                                 channel dropped (closed)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A failing connection never takes the listener down; only `bind`
//!   and `accept` errors end `run`
//! - The shutdown flag is checked between accepts, so a blocked `accept`
//!   needs one more connection (or process exit) to notice it
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use s3l_core::{Certificate, IdentityDirectory, IdentityKeyPair, SecureChannel, ServerHandshake};
use s3l_transport::{ByteChannel, TcpChannel, TransportError};

use crate::config::ServerConfig;
use crate::controller::Controller;
use crate::directory::UserDirectory;
use crate::error::{AppError, Result};

/// The file server.
///
/// # Lifecycle
/// 1. Create with `FileServer::new(config)` (loads keys, certificate and
///    users) or `FileServer::with_parts`
/// 2. Serve with `run()` or `run_on(listener)`
/// 3. Stop via the handle from `shutdown_handle()`
pub struct FileServer {
    handshake: ServerHandshake,
    users: Arc<UserDirectory>,
    listen_addr: SocketAddr,
    read_timeout: Option<Duration>,
    shutdown: Arc<AtomicBool>,
}

impl FileServer {
    /// Builds a server from its configuration files.
    ///
    /// # Errors
    /// Returns an error if the key, certificate or user directory cannot
    /// be loaded, or if the certificate does not belong to the key.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let identity = IdentityKeyPair::load_pem(&config.identity.private_key_path)?;
        let certificate = Certificate::load(&config.identity.certificate_path)?;
        let users = UserDirectory::load(&config.storage.users_path)?;

        if certificate.public_key()? != identity.public_key() {
            return Err(AppError::config_invalid(
                "identity.certificate_path",
                "certificate does not match the private key",
            ));
        }

        info!(
            key = %identity.public_key().fingerprint(),
            subject = %certificate.common_name().unwrap_or_default(),
            users = users.len(),
            "Server identity loaded"
        );

        let mut server = Self::with_parts(Arc::new(identity), certificate, Arc::new(users));
        server.listen_addr = config.listen_addr();
        server.read_timeout = config.read_timeout();
        Ok(server)
    }

    /// Builds a server from already loaded parts, listening on the default
    /// address with no read timeout.
    #[must_use]
    pub fn with_parts(
        identity: Arc<IdentityKeyPair>,
        certificate: Certificate,
        users: Arc<UserDirectory>,
    ) -> Self {
        let directory: Arc<dyn IdentityDirectory> = users.clone();
        Self {
            handshake: ServerHandshake::new(identity, certificate, directory),
            users,
            listen_addr: ServerConfig::default().listen_addr(),
            read_timeout: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the accept loop once set.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Binds the configured address and serves until shutdown.
    ///
    /// # Errors
    /// Returns `Io` if the address cannot be bound.
    pub fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.listen_addr)
            .map_err(|e| AppError::io(format!("binding {}", self.listen_addr), e))?;
        self.run_on(listener)
    }

    /// Serves connections from `listener` until shutdown.
    ///
    /// # Errors
    /// Returns `Io` if accepting fails for a reason other than an
    /// interrupted call.
    pub fn run_on(&self, listener: TcpListener) -> Result<()> {
        let local = listener
            .local_addr()
            .map_err(|e| AppError::io("reading listener address", e))?;
        info!("S3L file server listening on {}", local);

        for stream in listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => self.spawn_connection(stream),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    return Err(AppError::io("accepting connections", e));
                }
            }
        }

        info!("Server shutdown complete");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        let handshake = self.handshake.clone();
        let users = Arc::clone(&self.users);
        let timeout = self.read_timeout;

        let spawned = thread::Builder::new()
            .name("s3l-connection".to_string())
            .spawn(move || {
                let result = TcpChannel::from_stream(stream)
                    .and_then(|raw| raw.set_read_timeout(timeout).map(|()| raw))
                    .map_err(AppError::from)
                    .and_then(|raw| serve_connection(raw, &handshake, &users));
                match result {
                    Ok(()) => debug!(?peer, "Connection finished"),
                    Err(e) => warn!(?peer, error = %e, "Connection ended with error"),
                }
            });
        if let Err(e) = spawned {
            error!(?peer, error = %e, "Failed to spawn connection thread");
        }
    }
}

/// Runs the handshake on `raw` and serves the authenticated user until
/// they leave.
///
/// # Errors
/// Handshake failures, an id missing from `users`, and session errors.
pub fn serve_connection<C>(raw: C, handshake: &ServerHandshake, users: &UserDirectory) -> Result<()>
where
    C: ByteChannel<Error = TransportError>,
{
    let (channel, client_id) = SecureChannel::accept(raw, handshake)?;
    let user = users
        .get(client_id)
        .cloned()
        .ok_or(AppError::UnknownUser(client_id))?;
    Controller::new(channel, user).serve()
}
