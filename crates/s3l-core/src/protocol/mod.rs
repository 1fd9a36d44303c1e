// ============================================
// File: crates/s3l-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the S3L wire format: how bytes are pushed and popped, the
//! header that prefixes every frame, and the six message bodies.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`codec`]: `WireBuffer`, big-endian push/pop with underflow checks
//! - [`header`]: `ContentType` and the 8-byte `FrameHeader`
//! - [`messages`]: message structs, `WireMessage` and the `Message` sum type
//! - [`framing`]: two-phase frame reads and plain frame writes
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │                                                             │
//! │  Client ─────────────── ClientHello ─────────────────► Server│
//! │  Client ◄────────────── ServerHello ────────────────── Server│
//! │  Client ─────────────── ClientFinished ──────────────► Server│
//! │                                                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Record Phase                             │
//! │                                                             │
//! │  Client ═══════ Data (AES-CTR + HMAC) ═══════════════ Server│
//! │  Client ═══════ Shutdown (HMAC) ═════════════════════ Server│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format Principles
//! - Big-endian byte order for every multi-byte integer
//! - Every variable-length field is preceded by its own length field
//! - Header `length` is the exact byte count of the body that follows
//!
//! ## ⚠️ Important Note for Next Developer
//! - ANY layout change requires bumping `PROTOCOL_VERSION`
//! - Readers must consume the header before the body, never peek
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod framing;
pub mod header;
pub mod messages;

pub use codec::{WireBuffer, WireInt};
pub use framing::{read_frame, write_message};
pub use header::{ContentType, FrameHeader};
pub use messages::{
    BadConnectionMessage, ClientFinished, ClientHello, DataMessage, Message, ServerHello,
    ShutdownMessage, WireMessage,
};

// ============================================
// Constants
// ============================================

/// Version byte carried in every header.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Size of a record MAC (HMAC-SHA256) in bytes.
pub const MAC_SIZE: usize = 32;

/// Size of the cipher IV in bytes.
pub const IV_SIZE: usize = 16;

/// Largest plaintext chunk carried by one Data frame.
pub const MAX_DATA_PAYLOAD: usize = 4096;

/// Largest body a header can describe.
pub const MAX_BODY_SIZE: usize = u16::MAX as usize;
