// ============================================
// File: crates/s3l-app/src/bin/s3l-client.rs
// ============================================
//! # S3L File Client Entry Point
//!
//! Connects to the configured server and starts the interactive shell.
//!
//! ```bash
//! s3l-client --config client.toml
//! >>> upload report.pdf
//! >>> list
//! >>> logout
//! ```

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use s3l_app::{init_logging, shell, ClientConfig, FileClient};

/// S3L secure file client
#[derive(Parser, Debug)]
#[command(name = "s3l-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "client.toml")]
    config: PathBuf,

    /// Directory downloads are written to
    #[arg(short, long, default_value = ".")]
    download_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = ClientConfig::load(&cli.config)?;
    init_logging(&config.logging.level);

    let client = FileClient::connect(&config)
        .with_context(|| format!("cannot connect to {}", config.server.address))?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    shell::run(client, &mut stdin.lock(), &mut stdout.lock(), &cli.download_dir)?;
    Ok(())
}
