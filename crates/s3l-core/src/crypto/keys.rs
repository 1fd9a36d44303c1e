// ============================================
// File: crates/s3l-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Key types used by the S3L handshake and record layer, with secret
//! material zeroed on drop and compared in constant time.
//!
//! ## Main Functionality
//! - `IdentityKeyPair`: long-term Ed25519 signing key (PKCS#8 PEM on disk)
//! - `IdentityPublicKey`: its public half (SPKI PEM on disk)
//! - `EphemeralKeyPair`: per-handshake X25519 key
//! - `SessionKeys`: `auth_key`, `symmetric_key` and the session IV
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  IdentityKeyPair (Long-term)                               │
//! │  ├─ Loaded from PEM at startup                             │
//! │  └─ Signs hello / finished transcripts                     │
//! │                                                            │
//! │  EphemeralKeyPair (Per-handshake)                          │
//! │  ├─ Generated fresh for each handshake                     │
//! │  └─ Consumed by `exchange`                                 │
//! │                                                            │
//! │  SessionKeys (Per-session)                                 │
//! │  ├─ Derived once the DH exchange succeeds                  │
//! │  └─ Zeroed when the channel is dropped                     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private keys and session keys must NEVER be logged
//! - Public keys are logged only through `fingerprint()`
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;
use std::path::Path;

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{AUTH_KEY_SIZE, ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE, SYMMETRIC_KEY_SIZE, X25519_PUBLIC_KEY_SIZE};
use crate::error::{CoreError, Result};
use crate::protocol::IV_SIZE;

fn read_pem(path: &Path) -> Result<Zeroizing<String>> {
    std::fs::read_to_string(path)
        .map(Zeroizing::new)
        .map_err(|e| CoreError::invalid_key(format!("cannot read {}: {e}", path.display())))
}

// ============================================
// IdentityKeyPair (Ed25519)
// ============================================

/// Long-term Ed25519 identity key pair for signing.
///
/// # Example
/// ```
/// use s3l_core::IdentityKeyPair;
///
/// let identity = IdentityKeyPair::generate();
/// let signature = identity.sign(b"hello");
/// assert!(identity.public_key().verify(b"hello", &signature).is_ok());
/// ```
pub struct IdentityKeyPair {
    signing_key: SigningKey,
}

impl IdentityKeyPair {
    /// Generates a new random identity key pair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Creates a key pair from a raw 32-byte seed.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the length is wrong.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut seed: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::invalid_key(format!("Ed25519 seed must be 32 bytes, got {}", bytes.len()))
        })?;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }

    /// Parses a PKCS#8 PEM private key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the PEM is not an Ed25519 PKCS#8 key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| CoreError::invalid_key(format!("PKCS#8 private key: {e}")))?;
        Ok(Self { signing_key })
    }

    /// Loads a PKCS#8 PEM private key from disk.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the file is unreadable or not a key.
    pub fn load_pem(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_pkcs8_pem(&read_pem(path.as_ref())?)
    }

    /// Encodes the private key as PKCS#8 PEM.
    ///
    /// # Errors
    /// Returns `InvalidKey` if encoding fails.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CoreError::invalid_key(format!("PKCS#8 encoding: {e}")))
    }

    /// Returns the public key component.
    #[must_use]
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.signing_key.verifying_key())
    }

    /// Signs `message`, returning the 64-byte signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; ED25519_SIGNATURE_SIZE] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        f.debug_struct("IdentityKeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ============================================
// IdentityPublicKey
// ============================================

/// Public half of an Ed25519 identity.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IdentityPublicKey(VerifyingKey);

impl IdentityPublicKey {
    /// Creates a public key from its 32 raw bytes.
    ///
    /// # Errors
    /// Returns `InvalidKey` on a wrong length or an invalid point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; ED25519_PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CoreError::invalid_key(format!("Ed25519 public key must be 32 bytes, got {}", bytes.len()))
        })?;
        VerifyingKey::from_bytes(&raw)
            .map(Self)
            .map_err(|_| CoreError::invalid_key("invalid Ed25519 public key"))
    }

    /// Parses an SPKI PEM public key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the PEM is not an Ed25519 public key.
    pub fn from_public_key_pem(pem: &str) -> Result<Self> {
        VerifyingKey::from_public_key_pem(pem)
            .map(Self)
            .map_err(|e| CoreError::invalid_key(format!("SPKI public key: {e}")))
    }

    /// Loads an SPKI PEM public key from disk.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the file is unreadable or not a key.
    pub fn load_pem(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_public_key_pem(&read_pem(path.as_ref())?)
    }

    /// Encodes the key as SPKI PEM.
    ///
    /// # Errors
    /// Returns `InvalidKey` if encoding fails.
    pub fn to_public_key_pem(&self) -> Result<String> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CoreError::invalid_key(format!("SPKI encoding: {e}")))
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ED25519_PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Verifies `signature` over `message`.
    ///
    /// # Errors
    /// Returns `AuthenticationFailure` on a malformed or wrong signature.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Signature::from_slice(signature)
            .map_err(|_| CoreError::auth("malformed signature"))?;
        self.0
            .verify(message, &signature)
            .map_err(|_| CoreError::auth("signature mismatch"))
    }

    /// Short hex digest of the key, safe for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityPublicKey({})", self.fingerprint())
    }
}

impl fmt::Display for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.as_bytes()))
    }
}

// ============================================
// EphemeralKeyPair (X25519)
// ============================================

/// Single-use X25519 key pair; `exchange` consumes it.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Generates a new random ephemeral key pair.
    #[must_use]
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Returns the public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; X25519_PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Performs the DH exchange with the peer's public key.
    ///
    /// # Errors
    /// - `InvalidKey` if `peer_public` is not 32 bytes
    /// - `AuthenticationFailure` if the peer key is a low-order point
    ///   (all-zero shared secret)
    pub fn exchange(self, peer_public: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
        let peer: [u8; X25519_PUBLIC_KEY_SIZE] = peer_public.try_into().map_err(|_| {
            CoreError::invalid_key(format!(
                "X25519 public key must be 32 bytes, got {}",
                peer_public.len()
            ))
        })?;
        let shared = self.secret.diffie_hellman(&X25519PublicKey::from(peer));
        if !shared.was_contributory() {
            return Err(CoreError::auth("non-contributory DH share"));
        }
        Ok(Zeroizing::new(shared.to_bytes()))
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &hex::encode(&self.public.as_bytes()[..4]))
            .finish_non_exhaustive()
    }
}

// ============================================
// SessionKeys
// ============================================

/// Secrets derived by a successful handshake.
///
/// # Security
/// - Zeroed on drop
/// - Never printed
/// - Constant-time comparison
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    auth_key: [u8; AUTH_KEY_SIZE],
    symmetric_key: [u8; SYMMETRIC_KEY_SIZE],
    iv: [u8; IV_SIZE],
}

impl SessionKeys {
    /// Packages already-derived key material.
    #[must_use]
    pub fn new(
        auth_key: [u8; AUTH_KEY_SIZE],
        symmetric_key: [u8; SYMMETRIC_KEY_SIZE],
        iv: [u8; IV_SIZE],
    ) -> Self {
        Self {
            auth_key,
            symmetric_key,
            iv,
        }
    }

    /// HMAC key.
    #[must_use]
    pub fn auth_key(&self) -> &[u8; AUTH_KEY_SIZE] {
        &self.auth_key
    }

    /// AES-128 key.
    #[must_use]
    pub fn symmetric_key(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.symmetric_key
    }

    /// Counter-mode IV announced in the ClientHello.
    #[must_use]
    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKeys([REDACTED])")
    }
}

impl PartialEq for SessionKeys {
    fn eq(&self, other: &Self) -> bool {
        (self.auth_key[..].ct_eq(&other.auth_key[..])
            & self.symmetric_key[..].ct_eq(&other.symmetric_key[..])
            & self.iv[..].ct_eq(&other.iv[..]))
        .into()
    }
}

impl Eq for SessionKeys {}

// ============================================
// Tests
// ============================================
