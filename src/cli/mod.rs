// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod exchange;
pub mod keys;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fabstir E2E Chat CLI
#[derive(Parser, Debug)]
#[command(name = "fabstir-e2e-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Key exchange and message encryption tools for Fabstir E2E chat", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "E2E_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new secp256k1 key pair
    Keygen,

    /// Print the public key for a private key
    PublicKey(keys::PublicKeyArgs),

    /// Derive the session key shared with a peer
    Derive(keys::DeriveArgs),

    /// Encrypt a message with a session key
    Encrypt(keys::EncryptArgs),

    /// Decrypt a message with a session key
    Decrypt(keys::DecryptArgs),

    /// Manage key exchange records in the file store
    #[command(subcommand)]
    Exchange(exchange::ExchangeCommand),

    /// Run the two-user key exchange end to end in memory
    Demo,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Keygen => keys::keygen(),
        Commands::PublicKey(args) => keys::public_key(args),
        Commands::Derive(args) => keys::derive(args),
        Commands::Encrypt(args) => keys::encrypt(args),
        Commands::Decrypt(args) => keys::decrypt(args),
        Commands::Exchange(command) => exchange::run(command, cli.config.as_deref()).await,
        Commands::Demo => exchange::demo().await,
    }
}
