// ============================================
// File: crates/s3l-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Main Functionality
//! - `ClientId`: numeric identity a client announces in its hello
//! - `SequenceNumber`: per-direction frame counter that refuses to wrap
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

// ============================================
// ClientId
// ============================================

/// Numeric client identifier, carried as a big-endian `u64` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u64);

impl ClientId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| CommonError::invalid_input("client_id", e.to_string()))
    }
}

impl From<u64> for ClientId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ClientId> for u64 {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

// ============================================
// SequenceNumber
// ============================================

/// Strictly increasing frame counter.
///
/// Each direction of a secure channel owns one. The counter starts at zero
/// and advances by exactly one per frame; reaching `u32::MAX` ends the
/// session instead of wrapping back to a value the peer has already seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    /// Creates a counter starting at 0.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Creates a counter from a raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the current value without advancing.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns the current value and advances the counter by one.
    ///
    /// # Errors
    /// Returns `SequenceExhausted` once the counter sits at `u32::MAX`.
    pub fn advance(&mut self) -> Result<u32> {
        let current = self.0;
        self.0 = current
            .checked_add(1)
            .ok_or(CommonError::SequenceExhausted)?;
        Ok(current)
    }

    /// Checks whether `received` is exactly the value this counter expects next.
    #[must_use]
    pub const fn matches(&self, received: u32) -> bool {
        self.0 == received
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================
// Tests
// ============================================
