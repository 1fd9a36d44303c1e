// ============================================
// File: crates/s3l-common/src/lib.rs
// ============================================
//! # S3L Common - Shared Types
//!
//! ## Creation Reason
//! Holds the small value types that every S3L crate agrees on, so that
//! the wire layer, the secure channel and the application speak about the
//! same client identifiers and sequence counters.
//!
//! ## Main Functionality
//! - [`types`]: `ClientId` and the non-wrapping `SequenceNumber`
//! - [`error`]: `CommonError` and its result alias
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  s3l-app                            │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     s3l-core  ─────────► s3l-transport              │
//! │         │                                           │
//! │         ▼                                           │
//! │     s3l-common  ◄── You are here                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Leaf crate: no internal dependencies, keep it that way
//! - `SequenceNumber` must never wrap; exhausting it is an error
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

pub use error::{CommonError, Result};
pub use types::{ClientId, SequenceNumber};
