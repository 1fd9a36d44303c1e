// ============================================
// File: crates/s3l-app/src/lib.rs
// ============================================
//! # S3L App - File Transfer over the Secure Channel
//!
//! ## Creation Reason
//! A small per-user file store served over `SecureChannel`: the server
//! authenticates each client by id and key, then lets it upload,
//! download, list, rename and delete files inside its own directory.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: `ServerConfig` / `ClientConfig` (TOML)
//! - [`directory`]: users file, id to key and base directory
//! - [`storage`]: name validation and confined file operations
//! - [`protocol`]: length-prefixed JSON envelopes and endpoint payloads
//! - [`controller`]: server-side endpoint handlers for one session
//! - [`client`]: `FileClient`, the request side of every endpoint
//! - [`shell`]: interactive command loop of `s3l-client`
//! - [`server`]: thread-per-connection TCP server
//! - [`keyfile`]: key generation and public key display
//!
//! ## Architecture Overview
//! ```text
//! s3l-client                                    s3l-server
//! ┌──────────────┐                              ┌──────────────────┐
//! │ shell        │                              │ FileServer       │
//! │   │          │                              │   │ per thread   │
//! │ FileClient   │ ◄──── envelopes ───────────► │ Controller       │
//! │   │          │                              │   │              │
//! │ SecureChannel│ ◄──── S3L frames over TCP ──►│ SecureChannel    │
//! └──────────────┘                              └──────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Everything above `protocol` is generic over `ByteChannel`, so tests
//!   run the endpoints over a plain local pair
//!
//! ## Last Modified
//! v0.1.0 - Initial application layer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod config;
pub mod controller;
pub mod directory;
pub mod error;
pub mod keyfile;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod shell;
pub mod storage;

pub use client::FileClient;
pub use config::{ClientConfig, ServerConfig};
pub use directory::{User, UserDirectory, UserRecord};
pub use error::{AppError, Result};
pub use logging::init_logging;
pub use server::{serve_connection, FileServer};
