// ============================================
// File: crates/s3l-core/src/crypto/kdf.rs
// ============================================
//! # Key Derivation
//!
//! Turns the X25519 shared secret into the 32-byte key block both peers
//! split into `auth_key` and `symmetric_key`.
//!
//! ```text
//! key_block = HKDF-SHA256(
//!     ikm:  shared_secret,
//!     salt: "S3L-v1 key block",
//!     info: client_dh || server_dh
//! )
//! auth_key      = key_block[0..16]
//! symmetric_key = key_block[16..32]
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial key derivation

use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use super::keys::SessionKeys;
use super::{AUTH_KEY_SIZE, HKDF_SALT, KEY_BLOCK_SIZE, SYMMETRIC_KEY_SIZE};
use crate::error::{CoreError, Result};
use crate::protocol::IV_SIZE;

/// Derives the session key block and packages it with the handshake IV.
///
/// # Arguments
/// * `shared_secret` - 32-byte X25519 output
/// * `client_dh` / `server_dh` - both ephemeral public keys, binding the
///   keys to this transcript
/// * `iv` - IV announced in the ClientHello
///
/// # Errors
/// Returns `InvalidKey` if HKDF refuses the output length.
pub fn derive_key_block(
    shared_secret: &[u8; 32],
    client_dh: &[u8],
    server_dh: &[u8],
    iv: [u8; IV_SIZE],
) -> Result<SessionKeys> {
    let mut info = Zeroizing::new(Vec::with_capacity(client_dh.len() + server_dh.len()));
    info.extend_from_slice(client_dh);
    info.extend_from_slice(server_dh);

    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared_secret);
    let mut block = Zeroizing::new([0u8; KEY_BLOCK_SIZE]);
    hk.expand(&info, block.as_mut_slice())
        .map_err(|_| CoreError::invalid_key("HKDF expansion failed"))?;

    // Temporaries are scrubbed on every exit path; only `SessionKeys`
    // keeps the material.
    let mut auth_key = Zeroizing::new([0u8; AUTH_KEY_SIZE]);
    let mut symmetric_key = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
    auth_key.copy_from_slice(&block[..AUTH_KEY_SIZE]);
    symmetric_key.copy_from_slice(&block[AUTH_KEY_SIZE..]);

    debug!(info_len = info.len(), "Session key block derived");
    Ok(SessionKeys::new(*auth_key, *symmetric_key, iv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_key_block(&[7; 32], b"client", b"server", [1; IV_SIZE]).unwrap();
        let b = derive_key_block(&[7; 32], b"client", b"server", [1; IV_SIZE]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_transcript_binding() {
        let base = derive_key_block(&[7; 32], b"client", b"server", [1; IV_SIZE]).unwrap();
        let swapped = derive_key_block(&[7; 32], b"server", b"client", [1; IV_SIZE]).unwrap();
        let other_secret = derive_key_block(&[8; 32], b"client", b"server", [1; IV_SIZE]).unwrap();
        assert_ne!(base.auth_key(), swapped.auth_key());
        assert_ne!(base.symmetric_key(), other_secret.symmetric_key());
    }

    #[test]
    fn test_split_matches_hkdf_output() {
        let keys = derive_key_block(&[5; 32], b"cdh", b"sdh", [2; IV_SIZE]).unwrap();

        let mut expected = [0u8; KEY_BLOCK_SIZE];
        Hkdf::<Sha256>::new(Some(HKDF_SALT), &[5; 32])
            .expand(b"cdhsdh", &mut expected)
            .unwrap();
        assert_eq!(&keys.auth_key()[..], &expected[..AUTH_KEY_SIZE]);
        assert_eq!(&keys.symmetric_key()[..], &expected[AUTH_KEY_SIZE..]);
        assert_eq!(keys.iv(), &[2; IV_SIZE]);
    }

    #[test]
    fn test_split_halves_differ() {
        let keys = derive_key_block(&[3; 32], b"c", b"s", [0; IV_SIZE]).unwrap();
        assert_ne!(keys.auth_key(), keys.symmetric_key());
    }
}
