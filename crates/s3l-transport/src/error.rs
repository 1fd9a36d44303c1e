// ============================================
// File: crates/s3l-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Errors produced by raw byte channels, independent of the protocol
//! running on top of them.
//!
//! ## Error Categories
//! 1. **Closed**: the channel (or its peer) has been shut down
//! 2. **Configuration**: unparsable addresses
//! 3. **System**: wrapped `std::io::Error` with context
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The channel was closed locally or by the peer.
    #[error("Channel closed")]
    Closed,

    /// Invalid socket address.
    #[error("Invalid address: {addr}")]
    InvalidAddress {
        /// The invalid address string
        addr: String,
    },

    /// Operation timed out.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// What operation timed out
        operation: String,
    },

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Maps an I/O error raised while `context` was running, turning the
    /// "peer went away" kinds into `Closed` and timeouts into `Timeout`.
    pub fn from_io(context: impl Into<String>, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => Self::Closed,
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout {
                operation: context.into(),
            },
            _ => Self::io(context, source),
        }
    }

    /// Returns `true` if the error means the channel can no longer be used.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Io { source, .. } => matches!(source.kind(), io::ErrorKind::Interrupted),
            _ => false,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::from_io("unspecified I/O operation", err)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_closed() {
        let err: TransportError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(err.is_closed());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = TransportError::from_io("reading", io::Error::new(io::ErrorKind::TimedOut, "t"));
        assert!(matches!(err, TransportError::Timeout { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_io_keeps_context() {
        let err = TransportError::from_io(
            "connecting",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("connecting"));
    }
}
