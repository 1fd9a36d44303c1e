// ============================================
// File: crates/s3l-core/src/crypto/cipher.rs
// ============================================
//! # Session Cipher
//!
//! ## Creation Reason
//! AES-128-CTR used as one running keystream per direction. Every sealed
//! frame consumes the next bytes of the stream, so both peers must
//! process frames in the same order (guaranteed by the sequence check).
//!
//! ## Direction Separation
//! ```text
//! client -> server : iv
//! server -> client : iv with bit 7 of byte 0 flipped
//! ```
//! Both directions share one key, so the IVs must differ or the two
//! streams would reuse keystream.
//!
//! ## Last Modified
//! v0.1.0 - Initial cipher wrapper

use std::fmt;

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;

use super::SYMMETRIC_KEY_SIZE;
use crate::error::{CoreError, Result};
use crate::protocol::IV_SIZE;

/// Which way a keystream flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Frames written by the client.
    ClientToServer,
    /// Frames written by the server.
    ServerToClient,
}

impl Direction {
    /// IV for this direction derived from the handshake IV.
    #[must_use]
    pub fn iv(self, session_iv: &[u8; IV_SIZE]) -> [u8; IV_SIZE] {
        let mut iv = *session_iv;
        if self == Self::ServerToClient {
            iv[0] ^= 0x80;
        }
        iv
    }
}

/// Running AES-128-CTR keystream.
pub struct SessionCipher {
    direction: Direction,
    inner: Ctr128BE<Aes128>,
}

impl SessionCipher {
    /// Creates the keystream for `direction`.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the key or IV has the wrong size.
    pub fn new(
        key: &[u8; SYMMETRIC_KEY_SIZE],
        session_iv: &[u8; IV_SIZE],
        direction: Direction,
    ) -> Result<Self> {
        let inner = Ctr128BE::<Aes128>::new_from_slices(key, &direction.iv(session_iv))
            .map_err(|_| CoreError::invalid_key("AES-128-CTR key/IV length"))?;
        Ok(Self { direction, inner })
    }

    /// XORs the next `data.len()` keystream bytes into `data`.
    ///
    /// # Errors
    /// Returns `InvalidKey` once the 2^128-block counter is exhausted.
    pub fn apply(&mut self, data: &mut [u8]) -> Result<()> {
        self.inner
            .try_apply_keystream(data)
            .map_err(|_| CoreError::invalid_key("keystream exhausted"))
    }

    /// Direction this keystream serves.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }
}

impl fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCipher")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stream_matches_one_shot() {
        let key = [1u8; 16];
        let iv = [2u8; 16];
        let plaintext = b"split across several updates".to_vec();

        let mut one_shot = plaintext.clone();
        SessionCipher::new(&key, &iv, Direction::ClientToServer)
            .unwrap()
            .apply(&mut one_shot)
            .unwrap();

        let mut running = SessionCipher::new(&key, &iv, Direction::ClientToServer).unwrap();
        let mut pieces = plaintext.clone();
        let (a, b) = pieces.split_at_mut(5);
        running.apply(a).unwrap();
        running.apply(b).unwrap();
        assert_eq!(pieces, one_shot);

        let mut decrypt = SessionCipher::new(&key, &iv, Direction::ClientToServer).unwrap();
        decrypt.apply(&mut one_shot).unwrap();
        assert_eq!(one_shot, plaintext);
    }

    #[test]
    fn test_directions_use_distinct_keystreams() {
        let key = [9u8; 16];
        let iv = [0u8; 16];
        let mut up = [0u8; 32];
        let mut down = [0u8; 32];
        SessionCipher::new(&key, &iv, Direction::ClientToServer).unwrap().apply(&mut up).unwrap();
        SessionCipher::new(&key, &iv, Direction::ServerToClient).unwrap().apply(&mut down).unwrap();
        assert_ne!(up, down);
        assert_eq!(Direction::ServerToClient.iv(&iv)[0], 0x80);
        assert_eq!(Direction::ClientToServer.iv(&iv), iv);
    }

    #[test]
    fn test_nist_sp800_38a_f5_1() {
        let key: [u8; 16] = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap().try_into().unwrap();
        let iv: [u8; 16] = hex::decode("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff").unwrap().try_into().unwrap();
        let mut block = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        SessionCipher::new(&key, &iv, Direction::ClientToServer).unwrap().apply(&mut block).unwrap();
        assert_eq!(hex::encode(block), "874d6191b620e3261bef6864990db6ce");
    }
}
