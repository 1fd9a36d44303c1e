// ============================================
// File: crates/s3l-app/src/keyfile.rs
// ============================================
//! # Key Files
//!
//! ## Creation Reason
//! Operator helpers behind `s3l-server keygen` and `s3l-server pubkey`:
//! write a fresh Ed25519 identity as PEM files and print a public key in
//! a copy-pasteable encoding.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The private key file is created with mode 0600 on Unix
//! - Existing files are never overwritten
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::Engine;
use tracing::info;

use s3l_core::{IdentityKeyPair, IdentityPublicKey};

use crate::error::{AppError, Result};

/// Encoding for printed public keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// Lowercase hex of the raw 32 bytes.
    Hex,
    /// Standard base64 of the raw 32 bytes.
    Base64,
    /// SPKI PEM.
    Pem,
}

impl FromStr for KeyFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            "pem" => Ok(Self::Pem),
            other => Err(AppError::invalid_command(format!(
                "unknown key format '{other}' (expected hex, base64 or pem)"
            ))),
        }
    }
}

/// Encodes `key` for display.
///
/// # Errors
/// Only PEM encoding can fail.
pub fn encode_public_key(key: &IdentityPublicKey, format: KeyFormat) -> Result<String> {
    Ok(match format {
        KeyFormat::Hex => hex::encode(key.as_bytes()),
        KeyFormat::Base64 => base64::engine::general_purpose::STANDARD.encode(key.as_bytes()),
        KeyFormat::Pem => key.to_public_key_pem()?,
    })
}

/// Default public key path for a private key at `private_path`:
/// the same path with `.pub` appended to the extension.
#[must_use]
pub fn public_path_for(private_path: &Path) -> PathBuf {
    let mut name = private_path.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

/// Writes `identity` as a PKCS#8 PEM private key and an SPKI PEM public
/// key.
///
/// # Errors
/// `Io` if either file already exists or cannot be written.
pub fn write_keypair(identity: &IdentityKeyPair, private_path: &Path, public_path: &Path) -> Result<()> {
    for path in [private_path, public_path] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io(format!("creating {}", parent.display()), e))?;
        }
    }

    let private_pem = identity.to_pkcs8_pem()?;
    write_new(private_path, private_pem.as_bytes(), true)?;
    let public_pem = identity.public_key().to_public_key_pem()?;
    write_new(public_path, public_pem.as_bytes(), false)?;

    info!(
        private = %private_path.display(),
        public = %public_path.display(),
        key = %identity.public_key().fingerprint(),
        "Key pair written"
    );
    Ok(())
}

fn write_new(path: &Path, contents: &[u8], secret: bool) -> Result<()> {
    let context = || format!("writing {}", path.display());
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if secret {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = secret;

    let mut file = options.open(path).map_err(|e| AppError::io(context(), e))?;
    file.write_all(contents).map_err(|e| AppError::io(context(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_files_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let private_path = dir.path().join("keys/server.key");
        let public_path = public_path_for(&private_path);
        assert_eq!(public_path, dir.path().join("keys/server.key.pub"));

        let identity = IdentityKeyPair::generate();
        write_keypair(&identity, &private_path, &public_path).unwrap();

        let loaded = IdentityKeyPair::load_pem(&private_path).unwrap();
        assert_eq!(loaded.public_key(), identity.public_key());
        assert_eq!(IdentityPublicKey::load_pem(&public_path).unwrap(), identity.public_key());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let private_path = dir.path().join("id.key");
        write_keypair(&IdentityKeyPair::generate(), &private_path, &public_path_for(&private_path)).unwrap();
        let mode = fs::metadata(&private_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let private_path = dir.path().join("id.key");
        fs::write(&private_path, "keep me").unwrap();

        let err = write_keypair(&IdentityKeyPair::generate(), &private_path, &dir.path().join("id.pub"))
            .unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
        assert_eq!(fs::read_to_string(&private_path).unwrap(), "keep me");
    }

    #[test]
    fn test_encodings() {
        let key = IdentityKeyPair::from_bytes(&[7u8; 32]).unwrap().public_key();
        let encoded = encode_public_key(&key, KeyFormat::Hex).unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(hex::decode(&encoded).unwrap(), key.as_bytes());

        let b64 = encode_public_key(&key, KeyFormat::Base64).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
        assert_eq!(decoded, key.as_bytes());

        assert!(encode_public_key(&key, KeyFormat::Pem).unwrap().starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("HEX".parse::<KeyFormat>().unwrap(), KeyFormat::Hex);
        assert_eq!("base64".parse::<KeyFormat>().unwrap(), KeyFormat::Base64);
        assert!("rot13".parse::<KeyFormat>().is_err());
    }
}
