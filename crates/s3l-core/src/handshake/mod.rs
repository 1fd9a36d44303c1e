// ============================================
// File: crates/s3l-core/src/handshake/mod.rs
// ============================================
//! # Handshake
//!
//! ## Creation Reason
//! Runs the S3L mutual-authentication handshake over a raw channel and
//! hands the derived session keys to the secure channel.
//!
//! ## Main Functionality
//! - [`client`]: `ClientHandshake` (hello, verify server, finished)
//! - [`server`]: `ServerHandshake` (verify client, hello, check finished)
//! - `HandshakeState` / `HandshakeProgress`: per-role state machine
//! - `IdentityDirectory`: client id to long-term public key lookup
//!
//! ## Message Flow
//! ```text
//! Client                                              Server
//!   │  Start                                    Start    │
//!   │ ── ClientHello(iv, id, dh_c, sig_c) ─────────────► │
//!   │  HelloSent                        HelloReceived    │
//!   │ ◄──────────── ServerHello(dh_s, sig_s, cert) ───── │
//!   │  HelloReceived                        HelloSent    │
//!   │ ── ClientFinished(id, iv, sig, mac) ─────────────► │
//!   │  Finished -> Ready              Finished -> Ready  │
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Keys leave this module only after every check has passed
//! - All handshake frames use sequence number 0
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake state machine

pub mod client;
pub mod server;

use std::collections::HashMap;
use std::fmt;

use s3l_common::ClientId;

use crate::crypto::{IdentityPublicKey, SessionKeys};
use crate::error::{CoreError, Result};

pub use client::ClientHandshake;
pub use server::ServerHandshake;

// ============================================
// Role
// ============================================

/// Which side of the handshake this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Connects and sends ClientHello.
    Client,
    /// Accepts and sends ServerHello.
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
        }
    }
}

// ============================================
// HandshakeState
// ============================================

/// Handshake state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    /// Nothing exchanged yet.
    #[default]
    Start,
    /// Own hello written.
    HelloSent,
    /// Peer hello read and parsed.
    HelloReceived,
    /// ClientFinished written (client) or read (server).
    Finished,
    /// Keys committed; data may flow.
    Ready,
    /// A check failed; terminal.
    Aborted,
}

impl HandshakeState {
    /// Successor of `self` for `role`, or `None` at a terminal state.
    #[must_use]
    pub const fn successor(self, role: Role) -> Option<Self> {
        match (role, self) {
            (Role::Client, Self::Start) => Some(Self::HelloSent),
            (Role::Client, Self::HelloSent) => Some(Self::HelloReceived),
            (Role::Server, Self::Start) => Some(Self::HelloReceived),
            (Role::Server, Self::HelloReceived) => Some(Self::HelloSent),
            (Role::Client, Self::HelloReceived) | (Role::Server, Self::HelloSent) => {
                Some(Self::Finished)
            }
            (_, Self::Finished) => Some(Self::Ready),
            _ => None,
        }
    }

    /// `true` for `Ready` and `Aborted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Aborted)
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::HelloSent => write!(f, "HelloSent"),
            Self::HelloReceived => write!(f, "HelloReceived"),
            Self::Finished => write!(f, "Finished"),
            Self::Ready => write!(f, "Ready"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

// ============================================
// HandshakeProgress
// ============================================

/// Tracks one handshake run and rejects out-of-order transitions.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeProgress {
    role: Role,
    state: HandshakeState,
}

impl HandshakeProgress {
    /// Starts a run for `role`.
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self {
            role,
            state: HandshakeState::Start,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> HandshakeState {
        self.state
    }

    /// Moves to `next`.
    ///
    /// # Errors
    /// Returns `InvalidState` and moves to `Aborted` if `next` is not the
    /// role's successor of the current state.
    pub fn advance(&mut self, next: HandshakeState) -> Result<()> {
        if self.state.successor(self.role) == Some(next) {
            self.state = next;
            Ok(())
        } else {
            let from = self.state;
            self.state = HandshakeState::Aborted;
            Err(CoreError::invalid_state(
                format!("{} transition to {next}", self.role),
                from,
            ))
        }
    }

    /// Moves to `Aborted` from any state.
    pub fn abort(&mut self) {
        self.state = HandshakeState::Aborted;
    }
}

// ============================================
// HandshakeOutcome
// ============================================

/// Everything a successful handshake yields.
#[derive(Debug)]
pub struct HandshakeOutcome {
    /// Derived secrets plus the session IV.
    pub keys: SessionKeys,
    /// The peer's long-term key (server: from the directory; client:
    /// from the validated certificate).
    pub peer_key: IdentityPublicKey,
    /// Authenticated client identity.
    pub client_id: ClientId,
}

// ============================================
// IdentityDirectory
// ============================================

/// Maps client ids to their long-term public keys.
pub trait IdentityDirectory: Send + Sync {
    /// Key registered for `client_id`, if any.
    fn public_key(&self, client_id: ClientId) -> Option<IdentityPublicKey>;
}

/// In-memory directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    keys: HashMap<ClientId, IdentityPublicKey>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a client key.
    pub fn insert(&mut self, client_id: ClientId, key: IdentityPublicKey) {
        self.keys.insert(client_id, key);
    }

    /// Builder form of [`MemoryDirectory::insert`].
    #[must_use]
    pub fn with(mut self, client_id: ClientId, key: IdentityPublicKey) -> Self {
        self.insert(client_id, key);
        self
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl IdentityDirectory for MemoryDirectory {
    fn public_key(&self, client_id: ClientId) -> Option<IdentityPublicKey> {
        self.keys.get(&client_id).copied()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::IdentityKeyPair;

    #[test]
    fn test_client_walks_its_order() {
        let mut progress = HandshakeProgress::new(Role::Client);
        for next in [
            HandshakeState::HelloSent,
            HandshakeState::HelloReceived,
            HandshakeState::Finished,
            HandshakeState::Ready,
        ] {
            progress.advance(next).unwrap();
        }
        assert_eq!(progress.state(), HandshakeState::Ready);
        assert!(progress.state().is_terminal());
    }

    #[test]
    fn test_server_walks_its_order() {
        let mut progress = HandshakeProgress::new(Role::Server);
        progress.advance(HandshakeState::HelloReceived).unwrap();
        progress.advance(HandshakeState::HelloSent).unwrap();
        progress.advance(HandshakeState::Finished).unwrap();
        progress.advance(HandshakeState::Ready).unwrap();
    }

    #[test]
    fn test_illegal_transition_aborts() {
        let mut progress = HandshakeProgress::new(Role::Server);
        let err = progress.advance(HandshakeState::HelloSent).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
        assert_eq!(progress.state(), HandshakeState::Aborted);
        assert!(progress.advance(HandshakeState::HelloReceived).is_err());
    }

    #[test]
    fn test_ready_has_no_successor() {
        assert_eq!(HandshakeState::Ready.successor(Role::Client), None);
        assert_eq!(HandshakeState::Aborted.successor(Role::Server), None);
    }

    #[test]
    fn test_memory_directory_lookup() {
        let key = IdentityKeyPair::generate().public_key();
        let dir = MemoryDirectory::new().with(ClientId::new(7), key);
        assert_eq!(dir.public_key(ClientId::new(7)), Some(key));
        assert_eq!(dir.public_key(ClientId::new(8)), None);
        assert_eq!(dir.len(), 1);
    }
}
