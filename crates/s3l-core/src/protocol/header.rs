// ============================================
// File: crates/s3l-core/src/protocol/header.rs
// ============================================
//! # Frame Header
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬──────────────┬─────────┬───────────────────┐
//! │ content_type │    length    │ version │  sequence_number  │
//! │    (u8)      │    (u16)     │  (u8)   │       (u32)       │
//! └──────────────┴──────────────┴─────────┴───────────────────┘
//!        1              2            1              4          = 8 bytes
//! ```
//! All fields big-endian. `length` counts the body bytes that follow,
//! including a trailing MAC when the body has one.
//!
//! ## Last Modified
//! v0.1.0 - Initial header definition

use std::fmt;

use super::codec::WireBuffer;
use super::{HEADER_SIZE, PROTOCOL_VERSION};
use crate::error::{CoreError, Result};

// ============================================
// ContentType
// ============================================

/// Tag selecting the decoder for a frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    /// Client's opening handshake message.
    ClientHello = 0,
    /// Server's handshake answer.
    ServerHello = 1,
    /// Authenticated end-of-stream marker.
    Shutdown = 2,
    /// Encrypted application bytes.
    Data = 3,
    /// Protocol violation notice, header only.
    BadConnection = 4,
    /// Client's closing handshake message.
    ClientFinished = 5,
}

impl ContentType {
    /// Converts a byte to a `ContentType`.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::ClientHello),
            1 => Some(Self::ServerHello),
            2 => Some(Self::Shutdown),
            3 => Some(Self::Data),
            4 => Some(Self::BadConnection),
            5 => Some(Self::ClientFinished),
            _ => None,
        }
    }

    /// Byte representation.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Frames of this type carry a MAC under the session auth key.
    #[must_use]
    pub const fn is_sealed(self) -> bool {
        matches!(self, Self::Data | Self::Shutdown)
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClientHello => "ClientHello",
            Self::ServerHello => "ServerHello",
            Self::Shutdown => "Shutdown",
            Self::Data => "Data",
            Self::BadConnection => "BadConnection",
            Self::ClientFinished => "ClientFinished",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for ContentType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_byte(value).ok_or(value)
    }
}

impl From<ContentType> for u8 {
    fn from(content_type: ContentType) -> Self {
        content_type.as_byte()
    }
}

// ============================================
// FrameHeader
// ============================================

/// Fixed prefix of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Body decoder selector.
    pub content_type: ContentType,
    /// Exact body length in bytes.
    pub length: u16,
    /// Protocol version, always `PROTOCOL_VERSION` on frames we emit.
    pub version: u8,
    /// Sender's sequence number (0 for handshake frames).
    pub sequence_number: u32,
}

impl FrameHeader {
    /// Creates a header for the current protocol version.
    #[must_use]
    pub const fn new(content_type: ContentType, length: u16, sequence_number: u32) -> Self {
        Self {
            content_type,
            length,
            version: PROTOCOL_VERSION,
            sequence_number,
        }
    }

    /// Creates a header whose `length` is `body_len`, checking it fits.
    ///
    /// # Errors
    /// Returns `MalformedFrame` if `body_len` exceeds `u16::MAX`.
    pub fn for_body(content_type: ContentType, body_len: usize, sequence_number: u32) -> Result<Self> {
        let length = u16::try_from(body_len).map_err(|_| {
            CoreError::malformed(format!("{content_type} body of {body_len} bytes exceeds frame limit"))
        })?;
        Ok(Self::new(content_type, length, sequence_number))
    }

    /// Appends the 8 header bytes to `buf`.
    pub fn encode(&self, buf: &mut WireBuffer) {
        buf.push(self.content_type.as_byte())
            .push(self.length)
            .push(self.version)
            .push(self.sequence_number);
    }

    /// Returns the 8 header bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.content_type.as_byte();
        out[1..3].copy_from_slice(&self.length.to_be_bytes());
        out[3] = self.version;
        out[4..8].copy_from_slice(&self.sequence_number.to_be_bytes());
        out
    }

    /// Parses exactly `HEADER_SIZE` bytes.
    ///
    /// # Errors
    /// - `Underflow` / `MalformedFrame` on a short or long slice
    /// - `MalformedFrame` on an unknown content type or foreign version
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = WireBuffer::from(bytes);
        let raw_type = buf.pop::<u8>()?;
        let length = buf.pop::<u16>()?;
        let version = buf.pop::<u8>()?;
        let sequence_number = buf.pop::<u32>()?;
        buf.finish("frame header")?;

        let content_type = ContentType::from_byte(raw_type)
            .ok_or_else(|| CoreError::malformed(format!("unknown content type 0x{raw_type:02x}")))?;
        if version != PROTOCOL_VERSION {
            return Err(CoreError::malformed(format!(
                "unsupported protocol version {version}, expected {PROTOCOL_VERSION}"
            )));
        }

        Ok(Self {
            content_type,
            length,
            version,
            sequence_number,
        })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_numbering() {
        assert_eq!(ContentType::ClientHello.as_byte(), 0);
        assert_eq!(ContentType::ClientFinished.as_byte(), 5);
        assert_eq!(ContentType::from_byte(3), Some(ContentType::Data));
        assert_eq!(ContentType::from_byte(6), None);
        assert_eq!(ContentType::try_from(9), Err(9));
        assert!(ContentType::Shutdown.is_sealed());
        assert!(!ContentType::ServerHello.is_sealed());
    }

    #[test]
    fn test_header_layout() {
        let header = FrameHeader::new(ContentType::Data, 0x1234, 0xDEAD_BEEF);
        assert_eq!(
            header.to_bytes(),
            [3, 0x12, 0x34, PROTOCOL_VERSION, 0xDE, 0xAD, 0xBE, 0xEF]
        );

        let mut buf = WireBuffer::new();
        header.encode(&mut buf);
        assert_eq!(buf.as_slice(), &header.to_bytes());
        assert_eq!(FrameHeader::decode(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn test_decode_rejects_bad_headers() {
        let mut bytes = FrameHeader::new(ContentType::Data, 1, 0).to_bytes();
        bytes[0] = 0x7F;
        assert!(matches!(FrameHeader::decode(&bytes), Err(CoreError::MalformedFrame { .. })));

        let mut bytes = FrameHeader::new(ContentType::Data, 1, 0).to_bytes();
        bytes[3] = PROTOCOL_VERSION + 1;
        assert!(matches!(FrameHeader::decode(&bytes), Err(CoreError::MalformedFrame { .. })));

        assert!(FrameHeader::decode(&[0u8; 5]).unwrap_err().is_malformed());
        assert!(FrameHeader::decode(&[0u8; 9]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_for_body_limits() {
        assert_eq!(
            FrameHeader::for_body(ContentType::ServerHello, 700, 0).unwrap().length,
            700
        );
        assert!(FrameHeader::for_body(ContentType::Data, 70_000, 0).is_err());
    }
}
