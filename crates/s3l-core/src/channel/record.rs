// ============================================
// File: crates/s3l-core/src/channel/record.rs
// ============================================
//! # Record Layer
//!
//! ## Creation Reason
//! Seals and opens the two post-handshake frame kinds.
//!
//! ## Sealed Frame Layout
//! ```text
//! ┌──────────────┬──────────────────────────────┬───────────┐
//! │ header (8 B) │ ciphertext                   │ mac (32 B) │
//! └──────────────┴──────────────────────────────┴───────────┘
//!   Data:     ciphertext = AES-CTR(bytes_len u16 | bytes)
//!   Shutdown: ciphertext = (empty)
//!   mac = HMAC-SHA256(auth_key, header | ciphertext)
//! ```
//!
//! ## Opening Order
//! 1. MAC over header and ciphertext (constant time)
//! 2. Sequence number against the expected value
//! 3. Decrypt, advancing the receive keystream
//!
//! Nothing touches the keystream until both checks pass.
//!
//! ## Last Modified
//! v0.1.0 - Initial record layer

use std::fmt;

use s3l_common::SequenceNumber;

use crate::crypto::{mac, Direction, SessionCipher, SessionKeys};
use crate::error::{CoreError, Result};
use crate::handshake::Role;
use crate::protocol::{ContentType, FrameHeader, WireBuffer, HEADER_SIZE, MAC_SIZE};

/// A successfully opened frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Decrypted application bytes.
    Data(Vec<u8>),
    /// Authenticated end of stream.
    Shutdown,
}

/// Per-session sealing state: keys plus one keystream per direction.
pub struct RecordLayer {
    keys: SessionKeys,
    outbound: SessionCipher,
    inbound: SessionCipher,
}

impl RecordLayer {
    /// Creates the record layer for the endpoint playing `role`.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the cipher cannot be keyed.
    pub fn new(keys: SessionKeys, role: Role) -> Result<Self> {
        let (out_dir, in_dir) = match role {
            Role::Client => (Direction::ClientToServer, Direction::ServerToClient),
            Role::Server => (Direction::ServerToClient, Direction::ClientToServer),
        };
        let outbound = SessionCipher::new(keys.symmetric_key(), keys.iv(), out_dir)?;
        let inbound = SessionCipher::new(keys.symmetric_key(), keys.iv(), in_dir)?;
        Ok(Self {
            keys,
            outbound,
            inbound,
        })
    }

    /// Seals one Data frame carrying `chunk`.
    ///
    /// # Errors
    /// Returns `MalformedFrame` if the chunk cannot fit a frame.
    pub fn seal_data(&mut self, chunk: &[u8], sequence_number: u32) -> Result<Vec<u8>> {
        let bytes_len = u16::try_from(chunk.len())
            .map_err(|_| CoreError::malformed(format!("{} byte chunk exceeds frame limit", chunk.len())))?;
        // Header first: a rejected size must not consume keystream.
        let header = FrameHeader::for_body(ContentType::Data, 2 + chunk.len() + MAC_SIZE, sequence_number)?;

        let mut payload = WireBuffer::with_capacity(2 + chunk.len());
        payload.push(bytes_len).push_bytes(chunk);
        let mut ciphertext = payload.into_vec();
        self.outbound.apply(&mut ciphertext)?;

        self.assemble(&header, &ciphertext)
    }

    /// Seals a Shutdown frame. `sequence_number` is the sender's next
    /// outgoing value; the caller does not advance it.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the MAC cannot be computed.
    pub fn seal_shutdown(&self, sequence_number: u32) -> Result<Vec<u8>> {
        let header = FrameHeader::for_body(ContentType::Shutdown, MAC_SIZE, sequence_number)?;
        self.assemble(&header, &[])
    }

    fn assemble(&self, header: &FrameHeader, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let header_bytes = header.to_bytes();
        let tag = mac::compute(self.keys.auth_key(), &[&header_bytes, ciphertext])?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + ciphertext.len() + MAC_SIZE);
        frame.extend_from_slice(&header_bytes);
        frame.extend_from_slice(ciphertext);
        frame.extend_from_slice(&tag);
        Ok(frame)
    }

    /// Authenticates, sequence-checks and decrypts one sealed frame.
    ///
    /// # Errors
    /// - `MalformedFrame` for short bodies or inconsistent inner lengths
    /// - `AuthenticationFailure` on MAC mismatch
    /// - `SequenceViolation` if the header's number is not `expected`
    /// - `UnexpectedMessageType` for unsealed content types
    pub fn open(
        &mut self,
        header: &FrameHeader,
        body: &[u8],
        expected: SequenceNumber,
    ) -> Result<Record> {
        if !header.content_type.is_sealed() {
            return Err(CoreError::UnexpectedMessageType {
                expected: ContentType::Data.name(),
                received: header.content_type,
            });
        }
        if body.len() < MAC_SIZE {
            return Err(CoreError::malformed(format!(
                "sealed {} body of {} bytes is shorter than its MAC",
                header.content_type,
                body.len()
            )));
        }
        let (ciphertext, tag) = body.split_at(body.len() - MAC_SIZE);
        mac::verify(self.keys.auth_key(), &[&header.to_bytes(), ciphertext], tag)
            .map_err(|_| CoreError::auth(format!("{} MAC mismatch", header.content_type)))?;

        if !expected.matches(header.sequence_number) {
            return Err(CoreError::SequenceViolation {
                expected: expected.value(),
                received: header.sequence_number,
            });
        }

        match header.content_type {
            ContentType::Shutdown if ciphertext.is_empty() => Ok(Record::Shutdown),
            ContentType::Shutdown => Err(CoreError::malformed("Shutdown carries a payload")),
            _ => {
                let mut plaintext = ciphertext.to_vec();
                self.inbound.apply(&mut plaintext)?;
                let mut buf = WireBuffer::from(plaintext);
                let len = usize::from(buf.pop::<u16>()?);
                let bytes = buf.pop_bytes(len)?;
                buf.finish("Data payload")?;
                Ok(Record::Data(bytes))
            }
        }
    }
}

impl fmt::Debug for RecordLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordLayer")
            .field("outbound", &self.outbound.direction())
            .field("inbound", &self.inbound.direction())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(value: u32) -> SequenceNumber {
        SequenceNumber::from_raw(value)
    }

    fn pair() -> (RecordLayer, RecordLayer) {
        let keys = SessionKeys::new([1; 16], [2; 16], [3; 16]);
        (
            RecordLayer::new(keys.clone(), Role::Client).unwrap(),
            RecordLayer::new(keys, Role::Server).unwrap(),
        )
    }

    fn split(frame: &[u8]) -> (FrameHeader, &[u8]) {
        (FrameHeader::decode(&frame[..HEADER_SIZE]).unwrap(), &frame[HEADER_SIZE..])
    }

    #[test]
    fn test_data_frames_open_in_order() {
        let (mut client, mut server) = pair();
        let first = client.seal_data(b"hello", 0).unwrap();
        let second = client.seal_data(b"world", 1).unwrap();

        let (h, b) = split(&first);
        assert_eq!(usize::from(h.length), 2 + 5 + MAC_SIZE);
        assert_eq!(server.open(&h, b, seq(0)).unwrap(), Record::Data(b"hello".to_vec()));
        let (h, b) = split(&second);
        assert_eq!(server.open(&h, b, seq(1)).unwrap(), Record::Data(b"world".to_vec()));
    }

    #[test]
    fn test_ciphertext_hides_plaintext() {
        let (mut client, _) = pair();
        let frame = client.seal_data(&[0u8; 64], 0).unwrap();
        assert_ne!(&frame[HEADER_SIZE + 2..HEADER_SIZE + 66], &[0u8; 64][..]);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let (mut client, mut server) = pair();
        let mut frame = client.seal_data(b"payload", 0).unwrap();
        frame[HEADER_SIZE + 3] ^= 0x01;
        let (h, b) = split(&frame);
        assert!(matches!(server.open(&h, b, seq(0)), Err(CoreError::AuthenticationFailure { .. })));
    }

    #[test]
    fn test_tampered_header_rejected() {
        let (mut client, mut server) = pair();
        let frame = client.seal_data(b"payload", 4).unwrap();
        let (mut h, b) = split(&frame);
        h.sequence_number = 5;
        assert!(matches!(server.open(&h, b, seq(5)), Err(CoreError::AuthenticationFailure { .. })));
    }

    #[test]
    fn test_replayed_frame_is_sequence_violation() {
        let (mut client, mut server) = pair();
        let frame = client.seal_data(b"once", 0).unwrap();
        let (h, b) = split(&frame);
        server.open(&h, b, seq(0)).unwrap();
        assert!(matches!(
            server.open(&h, b, seq(1)),
            Err(CoreError::SequenceViolation { expected: 1, received: 0 })
        ));
    }

    #[test]
    fn test_shutdown_round_trip_and_short_body() {
        let (client, mut server) = pair();
        let frame = client.seal_shutdown(7).unwrap();
        assert_eq!(frame.len(), HEADER_SIZE + MAC_SIZE);
        let (h, b) = split(&frame);
        assert_eq!(server.open(&h, b, seq(7)).unwrap(), Record::Shutdown);
        assert!(server.open(&h, &b[..10], seq(7)).unwrap_err().is_malformed());
    }

    #[test]
    fn test_wrong_direction_keys_do_not_decrypt() {
        let (mut client, _) = pair();
        let (mut other_client, _) = pair();
        let frame = client.seal_data(b"abc", 0).unwrap();
        let (h, b) = split(&frame);
        // A peer with the client's own inbound stream reads garbage or
        // fails the inner length check; it never yields the plaintext.
        let opened = other_client.open(&h, b, seq(0));
        assert_ne!(opened.ok(), Some(Record::Data(b"abc".to_vec())));
    }
}
