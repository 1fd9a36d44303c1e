// ============================================
// File: crates/s3l-core/src/protocol/codec.rs
// ============================================
//! # Wire Codec
//!
//! ## Creation Reason
//! Every S3L message serializes through one growable buffer. Writers push
//! to the back, readers pop from the front, and a pop that asks for more
//! than is left fails instead of panicking.
//!
//! ## Main Functionality
//! - `WireInt`: the fixed-width integers the protocol uses (u8..u64)
//! - `WireBuffer::push` / `push_bytes`: append big-endian / raw bytes
//! - `WireBuffer::pop` / `pop_bytes` / `pop_array`: consume from the front
//!
//! ## ⚠️ Important Note for Next Developer
//! - `push_bytes` writes NO length prefix; push the length yourself first
//! - `bytes::Buf` getters panic on underflow, so every pop checks
//!   `remaining()` before touching them
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CoreError, Result};

// ============================================
// WireInt
// ============================================

/// Fixed-width integer that can travel on the wire big-endian.
pub trait WireInt: Sized + Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Appends `self` big-endian.
    fn put(self, buf: &mut BytesMut);

    /// Consumes `SIZE` bytes. Callers guarantee they are available.
    fn get(buf: &mut BytesMut) -> Self;
}

macro_rules! impl_wire_int {
    ($($ty:ty => $put:ident, $get:ident);* $(;)?) => {
        $(
            impl WireInt for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn put(self, buf: &mut BytesMut) {
                    buf.$put(self);
                }

                fn get(buf: &mut BytesMut) -> Self {
                    buf.$get()
                }
            }
        )*
    };
}

impl_wire_int! {
    u8 => put_u8, get_u8;
    u16 => put_u16, get_u16;
    u32 => put_u32, get_u32;
    u64 => put_u64, get_u64;
}

// ============================================
// WireBuffer
// ============================================

/// Growable byte buffer with big-endian push/pop.
///
/// # Example
/// ```
/// use s3l_core::protocol::WireBuffer;
///
/// let mut buf = WireBuffer::new();
/// buf.push(7u16).push_bytes(b"abc");
///
/// let mut reader = WireBuffer::from(buf.into_vec());
/// assert_eq!(reader.pop::<u16>().unwrap(), 7);
/// assert_eq!(reader.pop_bytes(3).unwrap(), b"abc");
/// assert!(reader.pop::<u8>().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireBuffer {
    buf: BytesMut,
}

impl WireBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes not yet popped.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing is left to pop.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Unconsumed bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the buffer, returning the unconsumed bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    // ========================================
    // Push
    // ========================================

    /// Appends an integer big-endian.
    pub fn push<T: WireInt>(&mut self, value: T) -> &mut Self {
        value.put(&mut self.buf);
        self
    }

    /// Appends raw bytes with no length prefix.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // ========================================
    // Pop
    // ========================================

    fn ensure(&self, requested: usize) -> Result<()> {
        if self.buf.len() < requested {
            return Err(CoreError::Underflow {
                requested,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Consumes `T::SIZE` bytes and decodes them big-endian.
    ///
    /// # Errors
    /// Returns `Underflow` if fewer than `T::SIZE` bytes remain.
    pub fn pop<T: WireInt>(&mut self) -> Result<T> {
        self.ensure(T::SIZE)?;
        Ok(T::get(&mut self.buf))
    }

    /// Consumes exactly `n` bytes.
    ///
    /// # Errors
    /// Returns `Underflow` if fewer than `n` bytes remain.
    pub fn pop_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.ensure(n)?;
        Ok(self.buf.split_to(n).to_vec())
    }

    /// Consumes exactly `N` bytes into an array.
    ///
    /// # Errors
    /// Returns `Underflow` if fewer than `N` bytes remain.
    pub fn pop_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Fails if any bytes are left; `what` names the structure being parsed.
    ///
    /// # Errors
    /// Returns `MalformedFrame` on trailing bytes.
    pub fn finish(&self, what: &str) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CoreError::malformed(format!(
                "{} trailing bytes after {what}",
                self.buf.len()
            )))
        }
    }
}

impl From<Vec<u8>> for WireBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            buf: BytesMut::from(&bytes[..]),
        }
    }
}

impl From<&[u8]> for WireBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(bytes),
        }
    }
}

impl AsRef<[u8]> for WireBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_big_endian() {
        let mut buf = WireBuffer::new();
        buf.push(0x01u8)
            .push(0x0203u16)
            .push(0x0405_0607u32)
            .push(0x0809_0a0b_0c0d_0e0fu64);
        assert_eq!(
            buf.as_slice(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]
        );
    }

    #[test]
    fn test_pop_in_push_order() {
        let mut buf = WireBuffer::new();
        buf.push(42u64).push_bytes(&[9; 16]).push(3u32).push_bytes(b"xyz");

        let mut reader = WireBuffer::from(buf.into_vec());
        assert_eq!(reader.pop::<u64>().unwrap(), 42);
        assert_eq!(reader.pop_array::<16>().unwrap(), [9; 16]);
        let len = reader.pop::<u32>().unwrap() as usize;
        assert_eq!(reader.pop_bytes(len).unwrap(), b"xyz");
        assert!(reader.finish("test").is_ok());
    }

    #[test]
    fn test_underflow_is_an_error_and_consumes_nothing() {
        let mut reader = WireBuffer::from(vec![0xAA, 0xBB, 0xCC]);
        match reader.pop::<u32>() {
            Err(CoreError::Underflow { requested, available }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            other => panic!("expected underflow, got {other:?}"),
        }
        assert_eq!(reader.remaining(), 3);
        assert!(reader.pop_bytes(4).is_err());
        assert!(reader.pop_array::<8>().is_err());
        assert_eq!(reader.pop::<u16>().unwrap(), 0xAABB);
    }

    #[test]
    fn test_zero_length_pop() {
        let mut reader = WireBuffer::new();
        assert!(reader.pop_bytes(0).unwrap().is_empty());
        assert!(reader.finish("empty").is_ok());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let reader = WireBuffer::from(vec![1u8]);
        assert!(matches!(
            reader.finish("header"),
            Err(CoreError::MalformedFrame { .. })
        ));
    }
}
