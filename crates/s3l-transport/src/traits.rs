// ============================================
// File: crates/s3l-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Abstracts the raw pipe under the secure channel so the protocol code
//! never cares whether bytes travel over TCP or an in-process queue.
//!
//! ## Main Functionality
//! - `ByteChannel`: blocking exact-length read, write-all, close
//!
//! ## ⚠️ Important Note for Next Developer
//! - `read(n)` returns exactly `n` bytes or an error, never a short read
//! - `close()` must be idempotent and must not fail
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::error::Error as StdError;

/// A reliable, ordered, blocking byte pipe.
///
/// The associated `Error` lets layered channels (for example the secure
/// channel, which is itself a `ByteChannel`) report their own error type.
///
/// # Example
/// ```
/// use s3l_transport::{local_pair, ByteChannel};
///
/// let (mut a, mut b) = local_pair();
/// a.write(b"ping").unwrap();
/// assert_eq!(b.read(4).unwrap(), b"ping");
/// ```
pub trait ByteChannel: Send {
    /// Error type reported by this channel.
    type Error: StdError + Send + Sync + 'static;

    /// Reads exactly `n` bytes, blocking until they are available.
    ///
    /// # Errors
    /// Fails if the channel is closed before `n` bytes arrive or the
    /// underlying medium reports an error.
    fn read(&mut self, n: usize) -> Result<Vec<u8>, Self::Error>;

    /// Writes every byte of `bytes`, blocking until done.
    ///
    /// # Errors
    /// Fails if the channel is closed or the underlying medium reports an
    /// error.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Returns `true` once the channel has been closed.
    fn is_closed(&self) -> bool;

    /// Closes the channel. Calling it more than once has no further effect.
    fn close(&mut self);
}

impl<C: ByteChannel + ?Sized> ByteChannel for Box<C> {
    type Error = C::Error;

    fn read(&mut self, n: usize) -> Result<Vec<u8>, Self::Error> {
        (**self).read(n)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(bytes)
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }

    fn close(&mut self) {
        (**self).close();
    }
}
