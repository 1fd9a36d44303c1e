// ============================================
// File: crates/s3l-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Wraps the RustCrypto / dalek primitives S3L consumes behind small,
//! typed helpers so the handshake and record layer never touch raw
//! crate APIs.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: Ed25519 identities, X25519 ephemerals, session key block
//! - [`kdf`]: HKDF-SHA256 key block derivation
//! - [`mac`]: HMAC-SHA256 compute / constant-time verify
//! - [`cipher`]: AES-128-CTR running keystream per direction
//! - [`certs`]: X.509 parsing and single-root chain validation
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │  Client                                        Server       │
//! │    │  ClientHello (iv, id, X25519, Ed25519 sig) ──────►│     │
//! │    │◄──── ServerHello (X25519, Ed25519 sig, cert PEM)  │     │
//! │    │  ClientFinished (sig, HMAC under auth_key) ──────►│     │
//! │    │                                                   │     │
//! │    │   X25519 ──► HKDF-SHA256 ──► auth_key | sym_key   │     │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Record Phase                             │
//! │   sym_key + iv ──► AES-128-CTR ──► ciphertext               │
//! │   auth_key ──► HMAC-SHA256(header | ciphertext) ──► mac     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL implementations come from RustCrypto / dalek
//! - ALL secret-bearing types implement Zeroize
//! - MAC comparison MUST stay constant time
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod certs;
pub mod cipher;
pub mod kdf;
pub mod keys;
pub mod mac;

pub use certs::{Certificate, TrustAnchor};
pub use cipher::{Direction, SessionCipher};
pub use kdf::derive_key_block;
pub use keys::{EphemeralKeyPair, IdentityKeyPair, IdentityPublicKey, SessionKeys};

// ============================================
// Constants
// ============================================

/// Size of Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of Ed25519 signature in bytes.
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Size of X25519 public key in bytes.
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of the HMAC key split from the key block.
pub const AUTH_KEY_SIZE: usize = 16;

/// Size of the AES-128 key split from the key block.
pub const SYMMETRIC_KEY_SIZE: usize = 16;

/// Size of the derived key block.
pub const KEY_BLOCK_SIZE: usize = AUTH_KEY_SIZE + SYMMETRIC_KEY_SIZE;

/// HKDF salt for key block derivation.
pub const HKDF_SALT: &[u8] = b"S3L-v1 key block";
