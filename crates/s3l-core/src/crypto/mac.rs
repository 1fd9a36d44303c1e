// ============================================
// File: crates/s3l-core/src/crypto/mac.rs
// ============================================
//! # HMAC-SHA256
//!
//! MACs are computed over a list of byte slices so callers can cover
//! `header | ciphertext` without concatenating first.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CoreError, Result};
use crate::protocol::MAC_SIZE;

type HmacSha256 = Hmac<Sha256>;

fn keyed(key: &[u8], parts: &[&[u8]]) -> Result<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|_| CoreError::invalid_key("HMAC key rejected"))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}

/// Computes `HMAC-SHA256(key, parts[0] | parts[1] | ...)`.
///
/// # Errors
/// Returns `InvalidKey` if the key is rejected.
pub fn compute(key: &[u8], parts: &[&[u8]]) -> Result<[u8; MAC_SIZE]> {
    Ok(keyed(key, parts)?.finalize().into_bytes().into())
}

/// Recomputes the MAC and compares it with `expected` in constant time.
///
/// # Errors
/// Returns `AuthenticationFailure` on mismatch (including wrong length).
pub fn verify(key: &[u8], parts: &[&[u8]], expected: &[u8]) -> Result<()> {
    keyed(key, parts)?
        .verify_slice(expected)
        .map_err(|_| CoreError::auth("MAC mismatch"))
}
