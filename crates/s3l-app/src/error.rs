// ============================================
// File: crates/s3l-app/src/error.rs
// ============================================
//! # Application Error Types
//!
//! ## Creation Reason
//! Errors raised by the file-transfer layer: configuration, the user
//! directory, the envelope codec and the endpoints, plus the wrapped
//! errors of the channel underneath.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Rejected` is a *reply*: the server refused a request and the
//!   session is still usable. So is a client-side `Io` failure; see
//!   `AppError::is_recoverable`.
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::path::Path;

use thiserror::Error;

use s3l_common::{ClientId, CommonError};
use s3l_core::CoreError;
use s3l_transport::TransportError;

/// Result type for application operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // ========================================
    // Configuration Errors
    // ========================================

    /// Configuration or users file unreadable or unparsable.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File that failed to load
        path: String,
        /// Reader or parser message
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted name of the offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    // ========================================
    // Session Errors
    // ========================================

    /// Authenticated id missing from the user directory.
    #[error("Unknown user: {0}")]
    UnknownUser(ClientId),

    /// Peer broke the envelope protocol.
    #[error("Protocol violation: {reason}")]
    Protocol {
        /// Description of the violation
        reason: String,
    },

    /// Endpoint name outside the known set.
    #[error("Unknown endpoint: '{endpoint}'")]
    UnknownEndpoint {
        /// Name as received
        endpoint: String,
    },

    /// Server answered with a refusal; the session continues.
    #[error("Server refused the request: {reason}")]
    Rejected {
        /// Refusal text sent by the server
        reason: String,
    },

    /// Unparsable shell input or option value.
    #[error("Invalid command: {reason}")]
    InvalidCommand {
        /// What was wrong with the input
        reason: String,
    },

    /// Local file or terminal I/O failure.
    #[error("I/O error while {context}: {source}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// JSON header or body that does not decode.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================
    // Lower Layers
    // ========================================

    /// Shared type error.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Secure channel or handshake error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Raw channel error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AppError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Protocol` error.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    /// Creates a `Rejected` error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidCommand` error.
    pub fn invalid_command(reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for configuration errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Returns `true` when the peer ended the session (cleanly or by
    /// dropping the connection) rather than misbehaving.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        match self {
            Self::Core(e) => e.is_end_of_stream(),
            Self::Transport(e) => e.is_closed(),
            _ => false,
        }
    }

    /// Returns `true` if the session can carry on after this error:
    /// refusals, bad commands and local file problems.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::InvalidCommand { .. } | Self::Io { .. }
        )
    }
}
