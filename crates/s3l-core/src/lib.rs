// ============================================
// File: crates/s3l-core/src/lib.rs
// ============================================
//! # S3L Core - Protocol, Handshake & Secure Channel
//!
//! ## Creation Reason
//! Everything that makes a raw byte pipe secure lives here: the wire
//! framing, the mutually authenticated handshake and the encrypted,
//! ordered stream built from its keys.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - `WireBuffer`: big-endian push/pop codec
//! - `FrameHeader`: the 8-byte prefix of every frame
//! - `Message`: closed sum type over the six message kinds
//!
//! ### Crypto Module ([`crypto`])
//! - Ed25519 identities, X25519 ephemerals, HKDF key block split
//! - HMAC-SHA256 with constant-time verification
//! - AES-128-CTR running keystreams
//! - X.509 validation against a single trust root
//!
//! ### Handshake Module ([`handshake`])
//! - Client and server procedures plus the state machine they walk
//!
//! ### Channel Module ([`channel`])
//! - `SecureChannel`: lazy handshake, chunked sealed writes, ordered reads,
//!   cooperative shutdown
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  s3l-app                            │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     s3l-core  ─────────► s3l-transport              │
//! │     You are here                                    │
//! │         │                                           │
//! │         ▼                                           │
//! │     s3l-common                                      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Guarantees
//! - **Confidentiality**: AES-128-CTR, one keystream per direction
//! - **Integrity**: HMAC-SHA256 over header and ciphertext of every record
//! - **Authenticity**: Ed25519 signatures on both hellos and the finish,
//!   server certificate chained to a configured root
//! - **Forward Secrecy**: fresh X25519 ephemerals per connection
//! - **Ordering**: strict per-direction sequence numbers
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL key types MUST zeroize on drop
//! - NEVER log key material; use `IdentityPublicKey::fingerprint` for ids
//! - Wire layouts are byte-exact; both signer and verifier build the same
//!   `data_to_sign` / `data_to_mac` buffers
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channel;
pub mod crypto;
pub mod error;
pub mod handshake;
pub mod protocol;

pub use channel::SecureChannel;
pub use crypto::{Certificate, EphemeralKeyPair, IdentityKeyPair, IdentityPublicKey, SessionKeys, TrustAnchor};
pub use error::{CoreError, Result};
pub use handshake::{
    ClientHandshake, HandshakeOutcome, HandshakeState, IdentityDirectory, MemoryDirectory, Role,
    ServerHandshake,
};
pub use protocol::{ContentType, FrameHeader, Message, WireBuffer, WireMessage};
