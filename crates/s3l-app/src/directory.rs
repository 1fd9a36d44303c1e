// ============================================
// File: crates/s3l-app/src/directory.rs
// ============================================
//! # User Directory
//!
//! ## Creation Reason
//! The server needs two things per client id: the Ed25519 key that
//! authenticates the handshake, and the directory that holds the user's
//! files. Both come from one TOML file.
//!
//! ## File Format
//! ```toml
//! [[users]]
//! id = 1
//! name = "alice"
//! base_path = "/srv/s3l/alice"
//! public_key_path = "/etc/s3l/users/alice.pub"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Relative paths are resolved against the directory containing the
//!   users file
//! - Duplicate ids are a configuration error, not "last one wins"
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use s3l_common::ClientId;
use s3l_core::{IdentityDirectory, IdentityPublicKey};

use crate::error::{AppError, Result};
use crate::storage::UserStorage;

/// One `[[users]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Id announced in the handshake.
    pub id: ClientId,
    /// Display name, used in logs.
    pub name: String,
    /// Directory holding the user's files.
    pub base_path: PathBuf,
    /// SPKI PEM Ed25519 public key.
    pub public_key_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// A known user: record plus loaded public key.
#[derive(Debug, Clone)]
pub struct User {
    /// Entry from the users file.
    pub record: UserRecord,
    /// Key loaded from `record.public_key_path`.
    pub key: IdentityPublicKey,
}

impl User {
    /// Storage rooted at the user's base path.
    #[must_use]
    pub fn storage(&self) -> UserStorage {
        UserStorage::new(&self.record.base_path)
    }
}

/// Client id to user lookup.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: HashMap<ClientId, User>,
}

impl UserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the users file and every public key it references.
    ///
    /// # Errors
    /// Returns `ConfigLoad` if the file or a key cannot be read, or
    /// `ConfigInvalid` for duplicate ids.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| AppError::config_load(path, e.to_string()))?;
        let file: UsersFile =
            toml::from_str(&content).map_err(|e| AppError::config_load(path, e.to_string()))?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));

        let mut directory = Self::new();
        for mut record in file.users {
            record.base_path = resolve(root, &record.base_path);
            record.public_key_path = resolve(root, &record.public_key_path);
            let key = IdentityPublicKey::load_pem(&record.public_key_path)
                .map_err(|e| AppError::config_load(&record.public_key_path, e.to_string()))?;
            directory.insert(record, key)?;
        }

        info!(path = %path.display(), users = directory.len(), "User directory loaded");
        Ok(directory)
    }

    /// Adds a user.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the id is already taken.
    pub fn insert(&mut self, record: UserRecord, key: IdentityPublicKey) -> Result<()> {
        if self.users.contains_key(&record.id) {
            return Err(AppError::config_invalid(
                "users.id",
                format!("duplicate id {}", record.id),
            ));
        }
        debug!(client_id = %record.id, name = %record.name, key = %key.fingerprint(), "User registered");
        self.users.insert(record.id, User { record, key });
        Ok(())
    }

    /// Looks up a user by id.
    #[must_use]
    pub fn get(&self, id: ClientId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Number of users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` with no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl IdentityDirectory for UserDirectory {
    fn public_key(&self, client_id: ClientId) -> Option<IdentityPublicKey> {
        self.users.get(&client_id).map(|user| user.key)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
