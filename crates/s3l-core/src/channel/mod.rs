// ============================================
// File: crates/s3l-core/src/channel/mod.rs
// ============================================
//! # Secure Channel
//!
//! ## Creation Reason
//! Turns a raw [`ByteChannel`] into an authenticated, encrypted,
//! strictly ordered byte stream. The secure channel is itself a
//! `ByteChannel`, so application code runs unchanged over either.
//!
//! ## Main Functionality
//! - Lazy handshake on first `read` / `write` (eager via `accept`)
//! - `write`: 4096-byte chunks, one sealed Data frame each
//! - `read(n)`: pulls frames until `n` plaintext bytes are buffered
//! - Cooperative Shutdown exchange on `close` and on drop
//!
//! ## Lifecycle
//! ```text
//!   new (pending) ──first use──► handshake ──ok──► Ready ──close──► Closed
//!                                    │                 │
//!                                    └──err──► Closed ◄┘ integrity / peer shutdown
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every error from `read` / `write` closes the channel; there is no
//!   recovery on the same instance
//! - Session keys live only inside `RecordLayer` and are zeroed on drop
//!
//! ## Last Modified
//! v0.1.0 - Initial secure channel

pub mod record;

use std::fmt;

use bytes::BytesMut;
use s3l_common::{ClientId, SequenceNumber};
use s3l_transport::{ByteChannel, TransportError};
use tracing::{debug, info, trace, warn};

use crate::crypto::{IdentityPublicKey, SessionKeys};
use crate::error::{CoreError, Result};
use crate::handshake::{ClientHandshake, HandshakeOutcome, HandshakeState, Role, ServerHandshake};
use crate::protocol::{read_frame, ContentType, MAX_DATA_PAYLOAD};

pub use record::{Record, RecordLayer};

/// Handshake parameters waiting for first use.
enum Pending {
    Client(ClientHandshake),
    Server(ServerHandshake),
}

/// State that exists only once the handshake has succeeded.
struct Session {
    record: RecordLayer,
    peer_key: Option<IdentityPublicKey>,
    client_id: Option<ClientId>,
    sent: SequenceNumber,
    received: SequenceNumber,
}

/// Authenticated, encrypted, ordered stream over a raw channel.
///
/// # Example
/// ```no_run
/// use s3l_core::{SecureChannel, ServerHandshake};
/// use s3l_transport::TcpChannel;
///
/// fn serve(raw: TcpChannel, params: &ServerHandshake) -> s3l_core::Result<()> {
///     let (mut channel, client_id) = SecureChannel::accept(raw, params)?;
///     let greeting = channel.read(5)?;
///     channel.write(&greeting)?;
///     println!("echoed for {client_id}");
///     Ok(())
/// }
/// ```
pub struct SecureChannel<C>
where
    C: ByteChannel<Error = TransportError>,
{
    raw: C,
    role: Role,
    state: HandshakeState,
    pending: Option<Pending>,
    session: Option<Session>,
    read_buffer: BytesMut,
    closed: bool,
}

impl<C> SecureChannel<C>
where
    C: ByteChannel<Error = TransportError>,
{
    // ========================================
    // Construction
    // ========================================

    fn with_pending(raw: C, role: Role, pending: Option<Pending>) -> Self {
        Self {
            raw,
            role,
            state: HandshakeState::Start,
            pending,
            session: None,
            read_buffer: BytesMut::new(),
            closed: false,
        }
    }

    /// Client channel; the handshake runs on first `read` / `write`.
    #[must_use]
    pub fn client(raw: C, params: ClientHandshake) -> Self {
        Self::with_pending(raw, Role::Client, Some(Pending::Client(params)))
    }

    /// Server channel; the handshake runs on first `read` / `write`.
    #[must_use]
    pub fn server(raw: C, params: ServerHandshake) -> Self {
        Self::with_pending(raw, Role::Server, Some(Pending::Server(params)))
    }

    /// Server channel with the handshake already run, returning the
    /// authenticated client id.
    ///
    /// # Errors
    /// Any handshake error; the raw channel is closed on failure.
    pub fn accept(raw: C, params: &ServerHandshake) -> Result<(Self, ClientId)> {
        let mut channel = Self::server(raw, params.clone());
        channel.handshake()?;
        let client_id = channel
            .client_id()
            .ok_or_else(|| CoreError::invalid_state("accept", channel.state))?;
        Ok((channel, client_id))
    }

    /// Ready channel from already-derived keys; no handshake is run.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the record layer cannot be keyed.
    pub fn from_keys(raw: C, role: Role, keys: SessionKeys) -> Result<Self> {
        let mut channel = Self::with_pending(raw, role, None);
        channel.session = Some(Session {
            record: RecordLayer::new(keys, role)?,
            peer_key: None,
            client_id: None,
            sent: SequenceNumber::new(),
            received: SequenceNumber::new(),
        });
        channel.state = HandshakeState::Ready;
        Ok(channel)
    }

    // ========================================
    // Accessors
    // ========================================

    /// Role fixed at construction.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// `Start` until the handshake runs, then `Ready` or `Aborted`.
    #[must_use]
    pub const fn state(&self) -> HandshakeState {
        self.state
    }

    /// Authenticated client id, once the handshake has run.
    #[must_use]
    pub fn client_id(&self) -> Option<ClientId> {
        self.session.as_ref().and_then(|s| s.client_id)
    }

    /// Peer's long-term key, once the handshake has run.
    #[must_use]
    pub fn peer_key(&self) -> Option<IdentityPublicKey> {
        self.session.as_ref().and_then(|s| s.peer_key)
    }

    /// Plaintext bytes received but not yet returned by `read`.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.read_buffer.len()
    }

    // ========================================
    // Handshake
    // ========================================

    /// Runs the handshake now if it has not run yet.
    ///
    /// # Errors
    /// - `ChannelClosed` after `close` or a previous fatal error
    /// - any handshake error (the channel is then closed)
    pub fn handshake(&mut self) -> Result<()> {
        if self.closed {
            return Err(CoreError::ChannelClosed);
        }
        if self.session.is_some() {
            return Ok(());
        }
        let Some(pending) = self.pending.take() else {
            return Err(CoreError::invalid_state("handshake", self.state));
        };

        let result = match &pending {
            Pending::Client(params) => params.run(&mut self.raw),
            Pending::Server(params) => params.run(&mut self.raw),
        };
        match result.and_then(|outcome| self.install(outcome)) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = HandshakeState::Aborted;
                Err(self.abort(e))
            }
        }
    }

    fn install(&mut self, outcome: HandshakeOutcome) -> Result<()> {
        let HandshakeOutcome {
            keys,
            peer_key,
            client_id,
        } = outcome;
        self.session = Some(Session {
            record: RecordLayer::new(keys, self.role)?,
            peer_key: Some(peer_key),
            client_id: Some(client_id),
            sent: SequenceNumber::new(),
            received: SequenceNumber::new(),
        });
        self.state = HandshakeState::Ready;
        info!(
            role = %self.role,
            client_id = %client_id,
            peer = %peer_key.fingerprint(),
            "Secure channel established"
        );
        Ok(())
    }

    // ========================================
    // Data Transfer
    // ========================================

    /// Encrypts and sends `bytes` as one or more Data frames.
    ///
    /// # Errors
    /// `ChannelClosed`, handshake, sequence exhaustion or transport
    /// errors. Any error closes the channel.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.handshake()?;
        for chunk in bytes.chunks(MAX_DATA_PAYLOAD) {
            if let Err(e) = self.send_chunk(chunk) {
                return Err(self.abort(e));
            }
        }
        Ok(())
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let state = self.state;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CoreError::invalid_state("write", state))?;
        let seq = session.sent.advance()?;
        let frame = session.record.seal_data(chunk, seq)?;
        self.raw.write(&frame)?;
        trace!(seq, len = chunk.len(), "Data frame sent");
        Ok(())
    }

    /// Returns exactly `n` plaintext bytes, pulling frames as needed.
    ///
    /// # Errors
    /// - `EndOfStream` if the peer shut the stream down
    /// - `AuthenticationFailure` / `SequenceViolation` on tampering
    /// - `UnexpectedMessageType`, `HandshakeRejected`, framing or
    ///   transport errors
    ///
    /// Any error closes the channel.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        self.handshake()?;
        while self.read_buffer.len() < n {
            match self.pull_record() {
                Ok(Record::Data(bytes)) => self.read_buffer.extend_from_slice(&bytes),
                Ok(Record::Shutdown) => {
                    self.answer_shutdown();
                    return Err(CoreError::EndOfStream);
                }
                Err(e) => return Err(self.abort(e)),
            }
        }
        Ok(self.read_buffer.split_to(n).to_vec())
    }

    fn pull_record(&mut self) -> Result<Record> {
        let (header, body) = read_frame(&mut self.raw)?;
        let state = self.state;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CoreError::invalid_state("read", state))?;

        match header.content_type {
            ContentType::Data | ContentType::Shutdown => {
                let record = session.record.open(&header, &body, session.received)?;
                session.received.advance()?;
                trace!(seq = header.sequence_number, content_type = %header.content_type, "Frame opened");
                Ok(record)
            }
            ContentType::BadConnection => Err(CoreError::HandshakeRejected),
            received => Err(CoreError::UnexpectedMessageType {
                expected: ContentType::Data.name(),
                received,
            }),
        }
    }

    fn answer_shutdown(&mut self) {
        info!(role = %self.role, "Peer shut the stream down");
        if let Some(session) = self.session.as_ref() {
            // Best effort: the peer may close before reading the reply.
            if let Ok(frame) = session.record.seal_shutdown(session.sent.value()) {
                let _ = self.raw.write(&frame);
            }
        }
        self.release();
    }

    // ========================================
    // Teardown
    // ========================================

    /// Closes the channel after a fatal error and hands the error back.
    fn abort(&mut self, error: CoreError) -> CoreError {
        if error.is_integrity_violation() {
            warn!(role = %self.role, error = %error, "Integrity check failed, closing channel");
        } else {
            debug!(role = %self.role, error = %error, "Closing channel after error");
        }
        self.release();
        error
    }

    fn release(&mut self) {
        self.closed = true;
        self.session = None;
        self.pending = None;
        self.read_buffer.clear();
        self.raw.close();
    }

    /// Sends a Shutdown (if ready), waits for one frame back, then closes
    /// the raw channel. Failures during the exchange are ignored. Calling
    /// it again has no effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(session) = self.session.as_ref() {
            if let Ok(frame) = session.record.seal_shutdown(session.sent.value()) {
                if self.raw.write(&frame).is_ok() {
                    let _ = read_frame(&mut self.raw);
                }
            }
        }
        debug!(role = %self.role, "Secure channel closed");
        self.release();
    }

    /// `true` once the channel (or its raw channel) is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed || self.raw.is_closed()
    }
}

impl<C> ByteChannel for SecureChannel<C>
where
    C: ByteChannel<Error = TransportError>,
{
    type Error = CoreError;

    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        SecureChannel::read(self, n)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        SecureChannel::write(self, bytes)
    }

    fn is_closed(&self) -> bool {
        SecureChannel::is_closed(self)
    }

    fn close(&mut self) {
        SecureChannel::close(self);
    }
}

impl<C> Drop for SecureChannel<C>
where
    C: ByteChannel<Error = TransportError>,
{
    fn drop(&mut self) {
        self.close();
    }
}

impl<C> fmt::Debug for SecureChannel<C>
where
    C: ByteChannel<Error = TransportError>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("client_id", &self.client_id())
            .field("buffered", &self.read_buffer.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
