// ============================================
// File: crates/s3l-core/src/handshake/client.rs
// ============================================
//! # Client Handshake
//!
//! ## Procedure
//! 1. Generate an X25519 ephemeral and a random IV, send signed ClientHello
//! 2. Read ServerHello (BadConnection here means the server refused us)
//! 3. Validate the certificate against the trust root and expected CN,
//!    then the ServerHello signature under the certificate key
//! 4. DH + HKDF into `auth_key` / `symmetric_key`
//! 5. Send ClientFinished (signature + MAC) and report `Ready`
//!
//! ## Last Modified
//! v0.1.0 - Initial client handshake

use std::fmt;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use s3l_common::ClientId;
use s3l_transport::{ByteChannel, TransportError};
use tracing::{debug, warn};

use super::{HandshakeOutcome, HandshakeProgress, HandshakeState, Role};
use crate::crypto::{derive_key_block, EphemeralKeyPair, IdentityKeyPair, TrustAnchor};
use crate::error::{CoreError, Result};
use crate::protocol::{
    read_frame, write_message, ClientFinished, ClientHello, ContentType, ServerHello, WireMessage,
    IV_SIZE,
};

/// Client-side handshake parameters, reusable across connections.
#[derive(Clone)]
pub struct ClientHandshake {
    identity: Arc<IdentityKeyPair>,
    client_id: ClientId,
    trust: TrustAnchor,
    server_name: String,
}

impl ClientHandshake {
    /// Creates client parameters.
    ///
    /// # Arguments
    /// * `identity` - the client's long-term signing key
    /// * `client_id` - id the server knows this key under
    /// * `trust` - root the server certificate must chain to
    /// * `server_name` - expected certificate common name
    #[must_use]
    pub fn new(
        identity: Arc<IdentityKeyPair>,
        client_id: ClientId,
        trust: TrustAnchor,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            client_id,
            trust,
            server_name: server_name.into(),
        }
    }

    /// Identity announced in ClientHello.
    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Runs the handshake to completion over `raw`.
    ///
    /// # Errors
    /// - `HandshakeRejected` if the server answers with BadConnection
    /// - `CertificateInvalid` / `AuthenticationFailure` on failed checks
    /// - `UnexpectedMessageType`, framing or transport errors
    pub fn run<C>(&self, raw: &mut C) -> Result<HandshakeOutcome>
    where
        C: ByteChannel<Error = TransportError> + ?Sized,
    {
        let mut progress = HandshakeProgress::new(Role::Client);
        match self.drive(raw, &mut progress) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(
                    client_id = %self.client_id,
                    state = %progress.state(),
                    error = %e,
                    "Client handshake aborted"
                );
                progress.abort();
                Err(e)
            }
        }
    }

    fn drive<C>(&self, raw: &mut C, progress: &mut HandshakeProgress) -> Result<HandshakeOutcome>
    where
        C: ByteChannel<Error = TransportError> + ?Sized,
    {
        // Step 1: ClientHello
        let ephemeral = EphemeralKeyPair::generate();
        let client_dh = ephemeral.public_key_bytes();
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let hello = ClientHello::create(&self.identity, self.client_id, iv, client_dh.to_vec());
        write_message(raw, &hello, 0)?;
        progress.advance(HandshakeState::HelloSent)?;
        debug!(client_id = %self.client_id, "ClientHello sent");

        // Step 2: ServerHello
        let (header, body) = read_frame(raw)?;
        match header.content_type {
            ContentType::ServerHello => {}
            ContentType::BadConnection => return Err(CoreError::HandshakeRejected),
            received => {
                return Err(CoreError::UnexpectedMessageType {
                    expected: ContentType::ServerHello.name(),
                    received,
                })
            }
        }
        let server_hello = ServerHello::deserialize(&header, &body)?;
        progress.advance(HandshakeState::HelloReceived)?;

        // Step 3: authenticate the server
        let server_key = self
            .trust
            .validate_peer_certificate(&server_hello.certificate, &self.server_name)?;
        server_hello.verify(&server_key, &client_dh)?;
        debug!(server = %self.server_name, key = %server_key.fingerprint(), "ServerHello verified");

        // Step 4: key agreement
        let shared = ephemeral.exchange(&server_hello.dh_pubkey)?;
        let keys = derive_key_block(&shared, &client_dh, &server_hello.dh_pubkey, iv)?;

        // Step 5: ClientFinished
        let finished = ClientFinished::create(
            &self.identity,
            keys.auth_key(),
            self.client_id,
            iv,
            &client_dh,
            &server_hello.dh_pubkey,
        )?;
        write_message(raw, &finished, 0)?;
        progress.advance(HandshakeState::Finished)?;
        progress.advance(HandshakeState::Ready)?;
        debug!(client_id = %self.client_id, "Client handshake complete");

        Ok(HandshakeOutcome {
            keys,
            peer_key: server_key,
            client_id: self.client_id,
        })
    }
}

impl fmt::Debug for ClientHandshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandshake")
            .field("client_id", &self.client_id)
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}
