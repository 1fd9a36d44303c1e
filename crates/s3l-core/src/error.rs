// ============================================
// File: crates/s3l-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! One error enum for the codec, the handshake and the secure channel.
//! Every variant is fatal for the channel instance that produced it:
//! callers tear the connection down and, if they want, reconnect.
//!
//! ## Error Categories
//! 1. **Framing**: `Underflow`, `MalformedFrame`
//! 2. **Integrity**: `AuthenticationFailure`, `CertificateInvalid`,
//!    `SequenceViolation`
//! 3. **Protocol flow**: `UnexpectedMessageType`, `HandshakeRejected`,
//!    `InvalidState`
//! 4. **Lifecycle**: `EndOfStream`, `ChannelClosed`
//! 5. **Wrapped**: `Transport`, `Common`
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - MAC and signature failures share `AuthenticationFailure` on purpose:
//!   the peer must not learn which check tripped
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use s3l_common::CommonError;
use s3l_transport::TransportError;

use crate::protocol::ContentType;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for framing, handshake and channel operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Framing Errors
    // ========================================

    /// A pop from the wire buffer asked for more bytes than remain.
    #[error("Buffer underflow: requested {requested} bytes, {available} available")]
    Underflow {
        /// Bytes requested
        requested: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Header/body disagreement, truncation, trailing bytes, bad version.
    #[error("Malformed frame: {reason}")]
    MalformedFrame {
        /// What's wrong with the frame
        reason: String,
    },

    // ========================================
    // Integrity Errors
    // ========================================

    /// MAC or signature mismatch.
    #[error("Authentication failure: {reason}")]
    AuthenticationFailure {
        /// Which stage rejected the data (never the data itself)
        reason: String,
    },

    /// Certificate chain, validity window or subject name rejected.
    #[error("Invalid certificate: {reason}")]
    CertificateInvalid {
        /// Why the certificate was rejected
        reason: String,
    },

    /// A record arrived out of order or was replayed.
    #[error("Sequence violation: expected {expected}, received {received}")]
    SequenceViolation {
        /// Sequence number the receiver expected
        expected: u32,
        /// Sequence number carried by the frame
        received: u32,
    },

    // ========================================
    // Protocol Flow Errors
    // ========================================

    /// A well-formed frame that is not valid in the current state.
    #[error("Unexpected message: expected {expected}, received {received}")]
    UnexpectedMessageType {
        /// What the current state accepts
        expected: &'static str,
        /// What actually arrived
        received: ContentType,
    },

    /// The peer answered the handshake with BadConnection.
    #[error("Handshake rejected by peer")]
    HandshakeRejected,

    /// Operation not valid in the current state.
    #[error("Invalid state for operation: {operation} in state {state}")]
    InvalidState {
        /// What operation was attempted
        operation: String,
        /// State the machine was in
        state: String,
    },

    /// Key material could not be parsed or loaded.
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// Why the key was rejected
        reason: String,
    },

    // ========================================
    // Lifecycle
    // ========================================

    /// The peer sent an authenticated Shutdown.
    #[error("End of stream: peer closed the channel")]
    EndOfStream,

    /// The channel was already closed locally.
    #[error("Secure channel is closed")]
    ChannelClosed,

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Underlying raw channel failure.
    #[error("Underlying I/O failure: {0}")]
    Transport(#[from] TransportError),

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `MalformedFrame` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Creates an `AuthenticationFailure` error.
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailure {
            reason: reason.into(),
        }
    }

    /// Creates a `CertificateInvalid` error.
    pub fn certificate(reason: impl Into<String>) -> Self {
        Self::CertificateInvalid {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidKey` error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(operation: impl Into<String>, state: impl ToString) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the peer's data failed an authenticity or
    /// ordering check.
    #[must_use]
    pub const fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailure { .. }
                | Self::CertificateInvalid { .. }
                | Self::SequenceViolation { .. }
        )
    }

    /// Returns `true` if the error means "the stream is over" rather than
    /// "something went wrong".
    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(
            self,
            Self::EndOfStream | Self::ChannelClosed | Self::Transport(TransportError::Closed)
        )
    }

    /// Returns `true` for framing errors (truncated or inconsistent bytes).
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Underflow { .. } | Self::MalformedFrame { .. })
    }

    /// Returns `false` only for raw-channel timeouts and interruptions.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(err) => !err.is_retryable(),
            _ => true,
        }
    }
}

// ============================================
// Tests
// ============================================
