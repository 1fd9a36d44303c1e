// ============================================
// File: crates/s3l-app/src/bin/s3l-server.rs
// ============================================
//! # S3L File Server Entry Point
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading and server execution
//! - Key generation and public key display for operators
//!
//! ## Usage
//! ```bash
//! s3l-server keygen --out /etc/s3l/server.key   # writes server.key + server.key.pub
//! s3l-server validate                           # check the config file
//! s3l-server pubkey --format base64             # show the configured public key
//! s3l-server run                                # serve
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use s3l_app::keyfile::{encode_public_key, public_path_for, write_keypair, KeyFormat};
use s3l_app::{init_logging, FileServer, ServerConfig, UserDirectory};
use s3l_core::{Certificate, IdentityKeyPair};

// ============================================
// CLI Definition
// ============================================

/// S3L secure file server
#[derive(Parser, Debug)]
#[command(name = "s3l-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start serving
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/s3l/server.toml")]
        config: PathBuf,
    },

    /// Validate the configuration file and the files it references
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/s3l/server.toml")]
        config: PathBuf,
    },

    /// Generate an Ed25519 identity (PKCS#8 private key + SPKI public key)
    Keygen {
        /// Private key output path
        #[arg(short, long)]
        out: PathBuf,

        /// Public key output path (default: <out>.pub)
        #[arg(long)]
        public_out: Option<PathBuf>,
    },

    /// Show the configured server public key
    Pubkey {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/s3l/server.toml")]
        config: PathBuf,

        /// Output format: hex (default), base64, pem
        #[arg(long, default_value = "hex")]
        format: String,
    },
}

// ============================================
// Main
// ============================================

fn main() {
    let cli = Cli::parse();

    // `run` logs at the configured level, everything else at info.
    let level = match &cli.command {
        Commands::Run { config } => configured_log_level(config),
        _ => "info".to_string(),
    };
    init_logging(&level);

    let result = match cli.command {
        Commands::Run { config } => cmd_run(config),
        Commands::Validate { config } => cmd_validate(config),
        Commands::Keygen { out, public_out } => cmd_keygen(out, public_out),
        Commands::Pubkey { config, format } => cmd_pubkey(config, &format),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Loads the configuration and serves until killed.
fn cmd_run(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_or_default_config(&config_path)?;
    let server = FileServer::new(&config).context("failed to initialize the server")?;
    info!("Starting S3L file server v{}", env!("CARGO_PKG_VERSION"));
    server.run()?;
    Ok(())
}

/// Validates the configuration and everything it points at.
fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ServerConfig::load(&config_path)?;

    let identity = IdentityKeyPair::load_pem(&config.identity.private_key_path)
        .with_context(|| format!("private key {}", config.identity.private_key_path.display()))?;
    let certificate = Certificate::load(&config.identity.certificate_path)
        .with_context(|| format!("certificate {}", config.identity.certificate_path.display()))?;
    let users = UserDirectory::load(&config.storage.users_path)?;

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:       {}", config.listen_addr());
    println!();
    println!("Identity:");
    println!("   Public key:   {}", identity.public_key());
    println!("   Certificate:  CN={}", certificate.common_name()?);
    if certificate.public_key()? != identity.public_key() {
        println!("   ⚠️  Certificate does not match the private key");
    }
    println!();
    println!("Storage:");
    println!("   Users:        {}", users.len());
    println!();
    println!("Limits:");
    match config.read_timeout() {
        Some(timeout) => println!("   Read timeout: {}s", timeout.as_secs()),
        None => println!("   Read timeout: none"),
    }
    println!();

    Ok(())
}

/// Writes a fresh identity to disk.
fn cmd_keygen(out: PathBuf, public_out: Option<PathBuf>) -> anyhow::Result<()> {
    let public_out = public_out.unwrap_or_else(|| public_path_for(&out));
    let identity = IdentityKeyPair::generate();
    write_keypair(&identity, &out, &public_out)?;

    println!("Private key:  {}", out.display());
    println!("Public key:   {}", public_out.display());
    println!("Fingerprint:  {}", identity.public_key().fingerprint());
    Ok(())
}

/// Prints the configured public key.
fn cmd_pubkey(config_path: PathBuf, format: &str) -> anyhow::Result<()> {
    let format: KeyFormat = format.parse()?;
    let config = load_or_default_config(&config_path)?;
    let identity = IdentityKeyPair::load_pem(&config.identity.private_key_path)
        .with_context(|| format!("private key {}", config.identity.private_key_path.display()))?;

    println!("{}", encode_public_key(&identity.public_key(), format)?.trim_end());
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Log level from the config file, or `info` if it cannot be read.
fn configured_log_level(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| ServerConfig::from_str(&text).ok())
        .map_or_else(|| "info".to_string(), |config| config.logging.level)
}

/// Loads config or falls back to defaults when the file is absent.
fn load_or_default_config(path: &Path) -> anyhow::Result<ServerConfig> {
    if path.exists() {
        Ok(ServerConfig::load(path)?)
    } else {
        info!("Config file {} not found, using defaults", path.display());
        Ok(ServerConfig::default())
    }
}
