// ============================================
// File: crates/s3l-core/src/handshake/server.rs
// ============================================
//! # Server Handshake
//!
//! ## Procedure
//! 1. Read ClientHello, look the client id up in the directory and verify
//!    the hello signature
//! 2. DH + HKDF into the session keys
//! 3. Send ServerHello (DH key, transcript signature, certificate)
//! 4. Read ClientFinished; it must repeat the hello's id and IV and carry
//!    a valid signature and MAC
//!
//! ## Error Handling
//! Any failure is answered with a best-effort BadConnection frame before
//! the error is returned. Keys are never returned from a failed run.
//!
//! ## Last Modified
//! v0.1.0 - Initial server handshake

use std::fmt;
use std::sync::Arc;

use s3l_transport::{ByteChannel, TransportError};
use tracing::{debug, warn};

use super::{HandshakeOutcome, HandshakeProgress, HandshakeState, IdentityDirectory, Role};
use crate::crypto::{derive_key_block, Certificate, EphemeralKeyPair, IdentityKeyPair};
use crate::error::{CoreError, Result};
use crate::protocol::{
    read_frame, write_message, BadConnectionMessage, ClientFinished, ClientHello, ContentType,
    FrameHeader, ServerHello, WireMessage,
};

/// Server-side handshake parameters, shared by every connection.
#[derive(Clone)]
pub struct ServerHandshake {
    identity: Arc<IdentityKeyPair>,
    certificate: Certificate,
    directory: Arc<dyn IdentityDirectory>,
}

impl ServerHandshake {
    /// Creates server parameters.
    ///
    /// `certificate` must bind `identity`'s public key; clients check the
    /// ServerHello signature against it.
    #[must_use]
    pub fn new(
        identity: Arc<IdentityKeyPair>,
        certificate: Certificate,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self {
            identity,
            certificate,
            directory,
        }
    }

    /// Runs the handshake to completion over `raw`.
    ///
    /// # Errors
    /// - `AuthenticationFailure` for unknown clients, bad signatures, bad
    ///   MAC or a ClientFinished that does not match the hello
    /// - `UnexpectedMessageType`, framing or transport errors
    pub fn run<C>(&self, raw: &mut C) -> Result<HandshakeOutcome>
    where
        C: ByteChannel<Error = TransportError> + ?Sized,
    {
        let mut progress = HandshakeProgress::new(Role::Server);
        match self.drive(raw, &mut progress) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(state = %progress.state(), error = %e, "Server handshake aborted");
                progress.abort();
                if !e.is_end_of_stream() {
                    // Best effort: the peer may already be gone.
                    let _ = write_message(raw, &BadConnectionMessage, 0);
                }
                Err(e)
            }
        }
    }

    fn drive<C>(&self, raw: &mut C, progress: &mut HandshakeProgress) -> Result<HandshakeOutcome>
    where
        C: ByteChannel<Error = TransportError> + ?Sized,
    {
        // Step 1: ClientHello
        let (header, body) = read_frame(raw)?;
        expect_type(&header, ContentType::ClientHello)?;
        let hello = ClientHello::deserialize(&header, &body)?;
        progress.advance(HandshakeState::HelloReceived)?;

        let client_key = self
            .directory
            .public_key(hello.client_id)
            .ok_or_else(|| CoreError::auth(format!("unknown client id {}", hello.client_id)))?;
        hello.verify(&client_key)?;
        debug!(client_id = %hello.client_id, key = %client_key.fingerprint(), "ClientHello verified");

        // Step 2: key agreement
        let ephemeral = EphemeralKeyPair::generate();
        let server_dh = ephemeral.public_key_bytes();
        let shared = ephemeral.exchange(&hello.dh_pubkey)?;
        let keys = derive_key_block(&shared, &hello.dh_pubkey, &server_dh, hello.iv)?;

        // Step 3: ServerHello
        let server_hello = ServerHello::create(
            &self.identity,
            server_dh.to_vec(),
            &hello.dh_pubkey,
            self.certificate.as_pem().to_vec(),
        );
        write_message(raw, &server_hello, 0)?;
        progress.advance(HandshakeState::HelloSent)?;
        debug!(client_id = %hello.client_id, "ServerHello sent");

        // Step 4: ClientFinished
        let (header, body) = read_frame(raw)?;
        expect_type(&header, ContentType::ClientFinished)?;
        let finished = ClientFinished::deserialize(&header, &body)?;
        progress.advance(HandshakeState::Finished)?;

        if finished.client_id != hello.client_id {
            return Err(CoreError::auth("ClientFinished names another client"));
        }
        if finished.iv != hello.iv {
            return Err(CoreError::auth("ClientFinished IV differs from ClientHello"));
        }
        finished.verify(&client_key, keys.auth_key(), &hello.dh_pubkey, &server_dh)?;
        progress.advance(HandshakeState::Ready)?;
        debug!(client_id = %hello.client_id, "Server handshake complete");

        Ok(HandshakeOutcome {
            keys,
            peer_key: client_key,
            client_id: hello.client_id,
        })
    }
}

fn expect_type(header: &FrameHeader, expected: ContentType) -> Result<()> {
    if header.content_type == expected {
        Ok(())
    } else {
        Err(CoreError::UnexpectedMessageType {
            expected: expected.name(),
            received: header.content_type,
        })
    }
}

impl fmt::Debug for ServerHandshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandshake")
            .field("certificate", &self.certificate)
            .finish_non_exhaustive()
    }
}
