// ============================================
// File: crates/s3l-core/src/protocol/messages.rs
// ============================================
//! # Protocol Messages
//!
//! ## Creation Reason
//! Typed bodies for the six S3L message kinds, each with a strict
//! encode/decode pair and, where the message is authenticated, the exact
//! byte string its signature or MAC covers.
//!
//! ## Wire Formats (bodies, after the 8-byte header)
//! ```text
//! ClientHello     iv[16] | client_id u64 | dh_len u32 | dh | sig_len u32 | sig
//! ServerHello     dh_len u32 | dh | sig_len u32 | sig | cert_len u32 | cert (PEM)
//! ClientFinished  client_id u64 | iv[16] | sig_len u32 | sig | mac[32]
//! Data            bytes_len u16 | bytes | mac[32]      (bytes_len+bytes encrypted)
//! Shutdown        mac[32]
//! BadConnection   (empty)
//! ```
//!
//! ## Authenticated Regions
//! - ClientHello signature: `iv | client_id | dh_len | dh`
//! - ServerHello signature: `server_dh | client_dh`
//! - ClientFinished signature: `client_dh | server_dh`
//! - ClientFinished MAC: `client_id | iv | sig`
//! - Data / Shutdown MAC: `header | ciphertext` (see `channel::record`)
//!
//! ## ⚠️ Important Note for Next Developer
//! - `deserialize` must stay the strict inverse of `serialize`: no
//!   trailing bytes, header length equal to the body length
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use std::fmt;

use s3l_common::ClientId;

use super::codec::WireBuffer;
use super::header::{ContentType, FrameHeader};
use super::{HEADER_SIZE, IV_SIZE, MAC_SIZE};
use crate::crypto::{mac, IdentityKeyPair, IdentityPublicKey};
use crate::error::{CoreError, Result};

// ============================================
// WireMessage
// ============================================

/// A message body with a fixed content type.
pub trait WireMessage: Sized {
    /// Tag written into the header.
    const CONTENT_TYPE: ContentType;

    /// Appends the body fields in wire order.
    fn encode_body(&self, buf: &mut WireBuffer);

    /// Pops the body fields in wire order.
    ///
    /// # Errors
    /// Returns `Underflow` on truncated input.
    fn decode_body(buf: &mut WireBuffer) -> Result<Self>;

    /// Encoded body size in bytes.
    fn body_len(&self) -> usize {
        let mut buf = WireBuffer::new();
        self.encode_body(&mut buf);
        buf.remaining()
    }

    /// Produces `[header][body]` with the header length filled in.
    ///
    /// # Errors
    /// Returns `MalformedFrame` if the body does not fit a frame.
    fn serialize(&self, sequence_number: u32) -> Result<Vec<u8>> {
        let mut body = WireBuffer::new();
        self.encode_body(&mut body);
        let header = FrameHeader::for_body(Self::CONTENT_TYPE, body.remaining(), sequence_number)?;

        let mut frame = WireBuffer::with_capacity(HEADER_SIZE + body.remaining());
        header.encode(&mut frame);
        frame.push_bytes(body.as_slice());
        Ok(frame.into_vec())
    }

    /// Parses a body previously split off by its header.
    ///
    /// # Errors
    /// - `UnexpectedMessageType` if the header carries another tag
    /// - `MalformedFrame` on length disagreement or trailing bytes
    /// - `Underflow` on truncation
    fn deserialize(header: &FrameHeader, body: &[u8]) -> Result<Self> {
        if header.content_type != Self::CONTENT_TYPE {
            return Err(CoreError::UnexpectedMessageType {
                expected: Self::CONTENT_TYPE.name(),
                received: header.content_type,
            });
        }
        if usize::from(header.length) != body.len() {
            return Err(CoreError::malformed(format!(
                "header announces {} body bytes, got {}",
                header.length,
                body.len()
            )));
        }
        let mut buf = WireBuffer::from(body);
        let message = Self::decode_body(&mut buf)?;
        buf.finish(Self::CONTENT_TYPE.name())?;
        Ok(message)
    }
}

fn push_prefixed(buf: &mut WireBuffer, bytes: &[u8]) {
    // Oversized fields make the frame itself too large, which serialize rejects.
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    buf.push(len).push_bytes(bytes);
}

fn pop_prefixed(buf: &mut WireBuffer) -> Result<Vec<u8>> {
    let len = buf.pop::<u32>()?;
    let len = usize::try_from(len).map_err(|_| CoreError::malformed("length field too large"))?;
    buf.pop_bytes(len)
}

fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

// ============================================
// ClientHello
// ============================================

/// Client's opening message: fresh IV, identity and ephemeral DH key,
/// signed with the client's long-term key.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Seeds the session's counter-mode cipher.
    pub iv: [u8; IV_SIZE],
    /// Identity the server looks up in its directory.
    pub client_id: ClientId,
    /// Ephemeral DH public key.
    pub dh_pubkey: Vec<u8>,
    /// Signature over [`ClientHello::data_to_sign`].
    pub signature: Vec<u8>,
}

impl ClientHello {
    /// Builds and signs a hello.
    #[must_use]
    pub fn create(
        identity: &IdentityKeyPair,
        client_id: ClientId,
        iv: [u8; IV_SIZE],
        dh_pubkey: Vec<u8>,
    ) -> Self {
        let mut hello = Self {
            iv,
            client_id,
            dh_pubkey,
            signature: Vec::new(),
        };
        hello.signature = identity.sign(&hello.data_to_sign()).to_vec();
        hello
    }

    /// `iv | client_id | dh_len | dh`
    #[must_use]
    pub fn data_to_sign(&self) -> Vec<u8> {
        let mut buf = WireBuffer::new();
        buf.push_bytes(&self.iv).push(self.client_id.value());
        push_prefixed(&mut buf, &self.dh_pubkey);
        buf.into_vec()
    }

    /// Checks the signature under the client's long-term key.
    ///
    /// # Errors
    /// Returns `AuthenticationFailure` on mismatch.
    pub fn verify(&self, client_key: &IdentityPublicKey) -> Result<()> {
        client_key
            .verify(&self.data_to_sign(), &self.signature)
            .map_err(|_| CoreError::auth("ClientHello signature"))
    }
}

impl WireMessage for ClientHello {
    const CONTENT_TYPE: ContentType = ContentType::ClientHello;

    fn encode_body(&self, buf: &mut WireBuffer) {
        buf.push_bytes(&self.iv).push(self.client_id.value());
        push_prefixed(buf, &self.dh_pubkey);
        push_prefixed(buf, &self.signature);
    }

    fn decode_body(buf: &mut WireBuffer) -> Result<Self> {
        let iv = buf.pop_array::<IV_SIZE>()?;
        let client_id = ClientId::new(buf.pop::<u64>()?);
        let dh_pubkey = pop_prefixed(buf)?;
        let signature = pop_prefixed(buf)?;
        Ok(Self {
            iv,
            client_id,
            dh_pubkey,
            signature,
        })
    }
}

impl fmt::Debug for ClientHello {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHello")
            .field("client_id", &self.client_id)
            .field("dh_pubkey_len", &self.dh_pubkey.len())
            .field("signature_len", &self.signature.len())
            .finish_non_exhaustive()
    }
}

// ============================================
// ServerHello
// ============================================

/// Server's answer: its ephemeral DH key, a signature binding both DH
/// keys, and the certificate that vouches for the signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerHello {
    /// Ephemeral DH public key.
    pub dh_pubkey: Vec<u8>,
    /// Signature over `server_dh | client_dh`.
    pub signature: Vec<u8>,
    /// PEM-encoded server certificate.
    pub certificate: Vec<u8>,
}

impl ServerHello {
    /// Builds and signs a hello answering `client_dh`.
    #[must_use]
    pub fn create(
        identity: &IdentityKeyPair,
        dh_pubkey: Vec<u8>,
        client_dh: &[u8],
        certificate: Vec<u8>,
    ) -> Self {
        let signature = identity
            .sign(&Self::data_to_sign(&dh_pubkey, client_dh))
            .to_vec();
        Self {
            dh_pubkey,
            signature,
            certificate,
        }
    }

    /// `server_dh | client_dh`
    #[must_use]
    pub fn data_to_sign(server_dh: &[u8], client_dh: &[u8]) -> Vec<u8> {
        concat(&[server_dh, client_dh])
    }

    /// Checks the signature under the certificate's key.
    ///
    /// # Errors
    /// Returns `AuthenticationFailure` on mismatch.
    pub fn verify(&self, server_key: &IdentityPublicKey, client_dh: &[u8]) -> Result<()> {
        server_key
            .verify(&Self::data_to_sign(&self.dh_pubkey, client_dh), &self.signature)
            .map_err(|_| CoreError::auth("ServerHello signature"))
    }
}

impl WireMessage for ServerHello {
    const CONTENT_TYPE: ContentType = ContentType::ServerHello;

    fn encode_body(&self, buf: &mut WireBuffer) {
        push_prefixed(buf, &self.dh_pubkey);
        push_prefixed(buf, &self.signature);
        push_prefixed(buf, &self.certificate);
    }

    fn decode_body(buf: &mut WireBuffer) -> Result<Self> {
        let dh_pubkey = pop_prefixed(buf)?;
        let signature = pop_prefixed(buf)?;
        let certificate = pop_prefixed(buf)?;
        Ok(Self {
            dh_pubkey,
            signature,
            certificate,
        })
    }
}

impl fmt::Debug for ServerHello {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHello")
            .field("dh_pubkey_len", &self.dh_pubkey.len())
            .field("signature_len", &self.signature.len())
            .field("certificate_len", &self.certificate.len())
            .finish()
    }
}

// ============================================
// ClientFinished
// ============================================

/// Binds the client identity to this exact transcript: a signature over
/// both DH keys plus a MAC under the freshly derived auth key.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientFinished {
    /// Must repeat the ClientHello's identity.
    pub client_id: ClientId,
    /// Must repeat the ClientHello's IV.
    pub iv: [u8; IV_SIZE],
    /// Signature over `client_dh | server_dh`.
    pub signature: Vec<u8>,
    /// HMAC over `client_id | iv | signature`.
    pub mac: [u8; MAC_SIZE],
}

impl ClientFinished {
    /// Builds, signs and MACs the finish message.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the auth key is rejected by HMAC.
    pub fn create(
        identity: &IdentityKeyPair,
        auth_key: &[u8],
        client_id: ClientId,
        iv: [u8; IV_SIZE],
        client_dh: &[u8],
        server_dh: &[u8],
    ) -> Result<Self> {
        let signature = identity
            .sign(&Self::data_to_sign(client_dh, server_dh))
            .to_vec();
        let mut finished = Self {
            client_id,
            iv,
            signature,
            mac: [0u8; MAC_SIZE],
        };
        finished.mac = mac::compute(auth_key, &[&finished.data_to_mac()])?;
        Ok(finished)
    }

    /// `client_dh | server_dh`
    #[must_use]
    pub fn data_to_sign(client_dh: &[u8], server_dh: &[u8]) -> Vec<u8> {
        concat(&[client_dh, server_dh])
    }

    /// `client_id | iv | signature`
    #[must_use]
    pub fn data_to_mac(&self) -> Vec<u8> {
        let mut buf = WireBuffer::new();
        buf.push(self.client_id.value())
            .push_bytes(&self.iv)
            .push_bytes(&self.signature);
        buf.into_vec()
    }

    /// Checks the signature, then the MAC (constant time).
    ///
    /// # Errors
    /// Returns `AuthenticationFailure` if either check fails.
    pub fn verify(
        &self,
        client_key: &IdentityPublicKey,
        auth_key: &[u8],
        client_dh: &[u8],
        server_dh: &[u8],
    ) -> Result<()> {
        client_key
            .verify(&Self::data_to_sign(client_dh, server_dh), &self.signature)
            .map_err(|_| CoreError::auth("ClientFinished signature"))?;
        mac::verify(auth_key, &[&self.data_to_mac()], &self.mac)
            .map_err(|_| CoreError::auth("ClientFinished MAC"))
    }
}

impl WireMessage for ClientFinished {
    const CONTENT_TYPE: ContentType = ContentType::ClientFinished;

    fn encode_body(&self, buf: &mut WireBuffer) {
        buf.push(self.client_id.value()).push_bytes(&self.iv);
        push_prefixed(buf, &self.signature);
        buf.push_bytes(&self.mac);
    }

    fn decode_body(buf: &mut WireBuffer) -> Result<Self> {
        let client_id = ClientId::new(buf.pop::<u64>()?);
        let iv = buf.pop_array::<IV_SIZE>()?;
        let signature = pop_prefixed(buf)?;
        let mac = buf.pop_array::<MAC_SIZE>()?;
        Ok(Self {
            client_id,
            iv,
            signature,
            mac,
        })
    }
}

impl fmt::Debug for ClientFinished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFinished")
            .field("client_id", &self.client_id)
            .field("signature_len", &self.signature.len())
            .finish_non_exhaustive()
    }
}

// ============================================
// DataMessage
// ============================================

/// One chunk of the application stream, in its decrypted form.
#[derive(Clone, PartialEq, Eq)]
pub struct DataMessage {
    /// Plaintext chunk.
    pub bytes: Vec<u8>,
    /// HMAC over `header | ciphertext`.
    pub mac: [u8; MAC_SIZE],
}

impl DataMessage {
    /// Wraps a chunk; the MAC is filled in when the frame is sealed.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mac: [0u8; MAC_SIZE],
        }
    }

    /// `bytes_len | bytes`: the region the record layer encrypts.
    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        let len = u16::try_from(self.bytes.len()).unwrap_or(u16::MAX);
        let mut buf = WireBuffer::with_capacity(2 + self.bytes.len());
        buf.push(len).push_bytes(&self.bytes);
        buf.into_vec()
    }
}

impl WireMessage for DataMessage {
    const CONTENT_TYPE: ContentType = ContentType::Data;

    fn encode_body(&self, buf: &mut WireBuffer) {
        buf.push_bytes(&self.payload()).push_bytes(&self.mac);
    }

    fn decode_body(buf: &mut WireBuffer) -> Result<Self> {
        let len = usize::from(buf.pop::<u16>()?);
        let bytes = buf.pop_bytes(len)?;
        let mac = buf.pop_array::<MAC_SIZE>()?;
        Ok(Self { bytes, mac })
    }
}

impl fmt::Debug for DataMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataMessage")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

// ============================================
// ShutdownMessage
// ============================================

/// Authenticated end-of-stream marker; the MAC covers the header alone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShutdownMessage {
    /// HMAC over the header.
    pub mac: [u8; MAC_SIZE],
}

impl WireMessage for ShutdownMessage {
    const CONTENT_TYPE: ContentType = ContentType::Shutdown;

    fn encode_body(&self, buf: &mut WireBuffer) {
        buf.push_bytes(&self.mac);
    }

    fn decode_body(buf: &mut WireBuffer) -> Result<Self> {
        Ok(Self {
            mac: buf.pop_array::<MAC_SIZE>()?,
        })
    }
}

// ============================================
// BadConnectionMessage
// ============================================

/// Header-only protocol violation notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BadConnectionMessage;

impl WireMessage for BadConnectionMessage {
    const CONTENT_TYPE: ContentType = ContentType::BadConnection;

    fn encode_body(&self, _buf: &mut WireBuffer) {}

    fn decode_body(_buf: &mut WireBuffer) -> Result<Self> {
        Ok(Self)
    }
}

// ============================================
// Message
// ============================================

/// Any S3L message, selected by the header's content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// See [`ClientHello`].
    ClientHello(ClientHello),
    /// See [`ServerHello`].
    ServerHello(ServerHello),
    /// See [`ShutdownMessage`].
    Shutdown(ShutdownMessage),
    /// See [`DataMessage`].
    Data(DataMessage),
    /// See [`BadConnectionMessage`].
    BadConnection(BadConnectionMessage),
    /// See [`ClientFinished`].
    ClientFinished(ClientFinished),
}

impl Message {
    /// Decodes `body` with the decoder chosen by `header.content_type`.
    ///
    /// # Errors
    /// Propagates the chosen decoder's error.
    pub fn decode(header: &FrameHeader, body: &[u8]) -> Result<Self> {
        Ok(match header.content_type {
            ContentType::ClientHello => Self::ClientHello(ClientHello::deserialize(header, body)?),
            ContentType::ServerHello => Self::ServerHello(ServerHello::deserialize(header, body)?),
            ContentType::Shutdown => Self::Shutdown(ShutdownMessage::deserialize(header, body)?),
            ContentType::Data => Self::Data(DataMessage::deserialize(header, body)?),
            ContentType::BadConnection => {
                Self::BadConnection(BadConnectionMessage::deserialize(header, body)?)
            }
            ContentType::ClientFinished => {
                Self::ClientFinished(ClientFinished::deserialize(header, body)?)
            }
        })
    }

    /// Content type of the wrapped message.
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        match self {
            Self::ClientHello(_) => ContentType::ClientHello,
            Self::ServerHello(_) => ContentType::ServerHello,
            Self::Shutdown(_) => ContentType::Shutdown,
            Self::Data(_) => ContentType::Data,
            Self::BadConnection(_) => ContentType::BadConnection,
            Self::ClientFinished(_) => ContentType::ClientFinished,
        }
    }

    /// Serializes the wrapped message.
    ///
    /// # Errors
    /// Returns `MalformedFrame` if the body does not fit a frame.
    pub fn serialize(&self, sequence_number: u32) -> Result<Vec<u8>> {
        match self {
            Self::ClientHello(m) => m.serialize(sequence_number),
            Self::ServerHello(m) => m.serialize(sequence_number),
            Self::Shutdown(m) => m.serialize(sequence_number),
            Self::Data(m) => m.serialize(sequence_number),
            Self::BadConnection(m) => m.serialize(sequence_number),
            Self::ClientFinished(m) => m.serialize(sequence_number),
        }
    }
}

// ============================================
// Tests
// ============================================
