// ============================================
// File: crates/s3l-transport/src/lib.rs
// ============================================
//! # S3L Transport - Raw Byte Channels
//!
//! ## Creation Reason
//! The secure channel is built on nothing more than a blocking, reliable
//! byte pipe. This crate defines that capability and ships the two pipes
//! the system uses: a TCP socket and an in-process endpoint pair.
//!
//! ## Main Functionality
//! - [`traits`]: the `ByteChannel` capability
//! - [`tcp`]: `TcpChannel` over `std::net::TcpStream`
//! - [`local`]: `LocalChannel` endpoint pairs for tests and in-process use
//! - [`error`]: `TransportError`
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  s3l-app                            │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     s3l-core  ─────────► s3l-transport              │
//! │                          You are here ◄──           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All operations block the calling thread; timeouts belong to the
//!   concrete channel (see `TcpChannel::set_read_timeout`)
//! - A channel instance is meant for a single owner at a time
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod local;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use local::{pair as local_pair, LocalChannel};
pub use tcp::TcpChannel;
pub use traits::ByteChannel;
