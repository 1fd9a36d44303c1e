// ============================================
// File: crates/s3l-app/src/config.rs
// ============================================
//! # Configuration
//!
//! ## Creation Reason
//! TOML configuration for the file server and the interactive client.
//!
//! ## Main Functionality
//! - `ServerConfig`: listen address, identity files, user directory,
//!   limits, logging
//! - `ClientConfig`: client id and key, server address and expected
//!   certificate name, trust root, logging
//!
//! ## Configuration Files
//! ```toml
//! # server.toml
//! [network]
//! listen_addr = "0.0.0.0:9000"
//!
//! [identity]
//! private_key_path = "/etc/s3l/server.key"
//! certificate_path = "/etc/s3l/server.pem"
//!
//! [storage]
//! users_path = "/etc/s3l/users.toml"
//!
//! [limits]
//! read_timeout_secs = 300
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ```toml
//! # client.toml
//! [client]
//! id = 1
//! private_key_path = "alice.key"
//!
//! [server]
//! address = "127.0.0.1:9000"
//! common_name = "server"
//! root_ca_path = "ca.pem"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Relative paths are used as written (relative to the working
//!   directory), not to the configuration file
//! - Missing sections fall back to their defaults
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration structure

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use s3l_common::ClientId;

use crate::error::{AppError, Result};

// ============================================
// ServerConfig
// ============================================

/// File server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listener settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Signing key and certificate.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// User directory location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigLoad` if the file cannot be read or parsed, or
    /// `ConfigInvalid` if a value is out of range.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading server configuration from {}", path.display());

        let content = read_config_file(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| AppError::config_load(path, e.to_string()))?;
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    /// Same as [`ServerConfig::load`].
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| AppError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.identity.validate()?;
        self.storage.validate()?;
        self.limits.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::config_invalid("serialization", e.to_string()))
    }

    /// Address the server binds.
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        self.network.listen_addr
    }

    /// Read timeout for accepted connections, `None` for no timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.limits.read_timeout_secs.map(Duration::from_secs)
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address the TCP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9000))
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

// ============================================
// IdentityConfig
// ============================================

/// Server identity section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// PKCS#8 PEM Ed25519 private key.
    #[serde(default = "default_private_key_path")]
    pub private_key_path: PathBuf,

    /// PEM certificate binding the key above.
    #[serde(default = "default_certificate_path")]
    pub certificate_path: PathBuf,
}

fn default_private_key_path() -> PathBuf {
    PathBuf::from("/etc/s3l/server.key")
}

fn default_certificate_path() -> PathBuf {
    PathBuf::from("/etc/s3l/server.pem")
}

impl IdentityConfig {
    fn validate(&self) -> Result<()> {
        if self.private_key_path.as_os_str().is_empty() {
            return Err(AppError::config_invalid(
                "identity.private_key_path",
                "must not be empty",
            ));
        }
        if self.certificate_path.as_os_str().is_empty() {
            return Err(AppError::config_invalid(
                "identity.certificate_path",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            private_key_path: default_private_key_path(),
            certificate_path: default_certificate_path(),
        }
    }
}

// ============================================
// StorageConfig
// ============================================

/// Storage section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// TOML user directory (`[[users]]` entries).
    #[serde(default = "default_users_path")]
    pub users_path: PathBuf,
}

fn default_users_path() -> PathBuf {
    PathBuf::from("/etc/s3l/users.toml")
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.users_path.as_os_str().is_empty() {
            return Err(AppError::config_invalid("storage.users_path", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            users_path: default_users_path(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Idle read timeout per connection. Absent means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_secs: Option<u64>,
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.read_timeout_secs == Some(0) {
            return Err(AppError::config_invalid(
                "limits.read_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

// ============================================
// ClientConfig
// ============================================

/// Interactive client configuration.
///
/// The `[client]` section is required in files; `Default` fills it with
/// placeholder values that validate but name no real identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Who this client is.
    pub client: ClientSection,

    /// Which server to talk to and how to recognize it.
    #[serde(default)]
    pub server: ServerSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigLoad` if the file cannot be read or parsed, or
    /// `ConfigInvalid` if a value is out of range.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading client configuration from {}", path.display());

        let content = read_config_file(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| AppError::config_load(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    /// Same as [`ClientConfig::load`].
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| AppError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.client.private_key_path.as_os_str().is_empty() {
            return Err(AppError::config_invalid(
                "client.private_key_path",
                "must not be empty",
            ));
        }
        self.server.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Id announced in the handshake.
    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.client.id
    }
}

/// `[client]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    /// Id the server knows this client's public key under.
    pub id: ClientId,

    /// PKCS#8 PEM Ed25519 private key.
    #[serde(default = "default_client_key_path")]
    pub private_key_path: PathBuf,
}

const fn default_client_id() -> ClientId {
    ClientId::new(1)
}

fn default_client_key_path() -> PathBuf {
    PathBuf::from("/etc/s3l/client.key")
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            id: default_client_id(),
            private_key_path: default_client_key_path(),
        }
    }
}

/// `[server]` section of the client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// `host:port` to connect to.
    #[serde(default = "default_server_address")]
    pub address: String,

    /// Expected subject common name of the server certificate.
    #[serde(default = "default_common_name")]
    pub common_name: String,

    /// Root certificate the server certificate must chain to.
    #[serde(default = "default_root_ca_path")]
    pub root_ca_path: PathBuf,
}

fn default_server_address() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_common_name() -> String {
    "server".to_string()
}

fn default_root_ca_path() -> PathBuf {
    PathBuf::from("/etc/s3l/ca.pem")
}

impl ServerSection {
    fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(AppError::config_invalid("server.address", "must not be empty"));
        }
        if self.common_name.is_empty() {
            return Err(AppError::config_invalid("server.common_name", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            common_name: default_common_name(),
            root_ca_path: default_root_ca_path(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(AppError::config_invalid(
                "logging.level",
                format!("'{}' is not one of {}", self.level, LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| AppError::config_load(path, e.to_string()))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr().port(), 9000);
        assert!(config.read_timeout().is_none());
    }

    #[test]
    fn test_server_config_format() {
        let toml = r#"
            [network]
            listen_addr = "127.0.0.1:9443"

            [identity]
            private_key_path = "keys/server.key"
            certificate_path = "keys/server.pem"

            [storage]
            users_path = "users.toml"

            [limits]
            read_timeout_secs = 30

            [logging]
            level = "debug"
        "#;

        let config = ServerConfig::from_str(toml).unwrap();
        assert_eq!(config.listen_addr().port(), 9443);
        assert_eq!(config.identity.private_key_path, PathBuf::from("keys/server.key"));
        assert_eq!(config.storage.users_path, PathBuf::from("users.toml"));
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = ServerConfig::from_str("[logging]\nlevel = \"warn\"\n").unwrap();
        assert_eq!(config.listen_addr(), default_listen_addr());
        assert_eq!(config.storage.users_path, default_users_path());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ServerConfig::from_str("[limits]\nread_timeout_secs = 0\n").unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("limits.read_timeout_secs"));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let err = ServerConfig::from_str("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_server_config_roundtrips_through_toml() {
        let config = ServerConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = ServerConfig::from_str(&text).unwrap();
        assert_eq!(parsed.listen_addr(), config.listen_addr());
    }

    #[test]
    fn test_client_config_format() {
        let toml = r#"
            [client]
            id = 42
            private_key_path = "alice.key"

            [server]
            address = "files.example.com:9000"
            common_name = "files"
            root_ca_path = "ca.pem"
        "#;

        let config = ClientConfig::from_str(toml).unwrap();
        assert_eq!(config.client_id(), ClientId::new(42));
        assert_eq!(config.server.address, "files.example.com:9000");
        assert_eq!(config.server.common_name, "files");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_client_config() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.client_id(), ClientId::new(1));
        assert_eq!(config.client.private_key_path, PathBuf::from("/etc/s3l/client.key"));
        assert_eq!(config.server.address, "127.0.0.1:9000");
        assert_eq!(config.server.common_name, "server");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_client_key_path_defaults() {
        let config = ClientConfig::from_str("[client]\nid = 3\n").unwrap();
        assert_eq!(config.client_id(), ClientId::new(3));
        assert_eq!(config.client.private_key_path, default_client_key_path());
    }

    #[test]
    fn test_client_config_requires_client_section() {
        let err = ClientConfig::from_str("[server]\naddress = \"x:1\"\n").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ServerConfig::load("/nonexistent/s3l/server.toml").unwrap_err();
        assert!(matches!(err, AppError::ConfigLoad { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        fs::write(&path, "[client]\nid = 7\nprivate_key_path = \"k.pem\"\n").unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.client_id(), ClientId::new(7));
        assert_eq!(config.server.common_name, "server");
    }
}
