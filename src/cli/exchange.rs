// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::ChatCryptoConfig;
use crate::crypto::KeyPair;
use crate::exchange::{ExchangeOutcome, KeyExchangeCoordinator};
use crate::store::{
    FileKeyExchangeStore, InMemoryKeyExchangeStore, KeyExchange, KeyExchangeStore, UserId,
};

#[derive(Subcommand, Debug)]
pub enum ExchangeCommand {
    /// Publish your public key for a conversation
    Init(InitArgs),

    /// Show the exchange record for a pair of users
    Show(PairArgs),

    /// List pending exchanges for a user
    Pending(UserArgs),

    /// List active exchanges for a user
    Active(UserArgs),

    /// Delete the exchange record for a pair of users
    Delete(PairArgs),
}

/// Store location shared by every exchange subcommand
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// JSON store file (overrides `store_path` from config)
    #[arg(long)]
    pub store: Option<PathBuf>,
}

/// Arguments for exchange init
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Your user id
    #[arg(long)]
    pub self_id: UserId,

    /// The other participant's user id
    #[arg(long)]
    pub peer_id: UserId,

    /// Private key hex (can also be set via E2E_PRIVATE_KEY env var)
    #[arg(long, env = "E2E_PRIVATE_KEY")]
    pub private_key: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Arguments naming a pair of users
#[derive(Args, Debug)]
pub struct PairArgs {
    #[arg(long)]
    pub user_a: UserId,

    #[arg(long)]
    pub user_b: UserId,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Arguments naming one user
#[derive(Args, Debug)]
pub struct UserArgs {
    #[arg(long)]
    pub user: UserId,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Run an exchange subcommand against the file store
pub async fn run(command: ExchangeCommand, config_path: Option<&Path>) -> Result<()> {
    let config = ChatCryptoConfig::load(config_path)?;

    match command {
        ExchangeCommand::Init(args) => {
            let coordinator = open_coordinator(&config, &args.store).await?;
            let key_pair = KeyPair::from_private_key_hex(&args.private_key)
                .context("Failed to load private key")?;

            match coordinator
                .establish(args.self_id, args.peer_id, &key_pair)
                .await?
            {
                ExchangeOutcome::Ready(session) => {
                    println!("✅ Key exchange {} is active", session.exchange_id());
                    println!("  Session key: {}", session.key().to_hex());
                }
                ExchangeOutcome::Pending(record) => {
                    println!(
                        "⏳ Key exchange {} is pending; waiting for user {} to publish a key",
                        record.id, args.peer_id
                    );
                }
            }
        }
        ExchangeCommand::Show(args) => {
            let coordinator = open_coordinator(&config, &args.store).await?;
            let record = coordinator
                .store()
                .get_by_users(args.user_a, args.user_b)
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        ExchangeCommand::Pending(args) => {
            let coordinator = open_coordinator(&config, &args.store).await?;
            let records = coordinator.pending_for(args.user).await?;
            print_records("Pending", args.user, &records);
        }
        ExchangeCommand::Active(args) => {
            let coordinator = open_coordinator(&config, &args.store).await?;
            let records = coordinator.active_for(args.user).await?;
            print_records("Active", args.user, &records);
        }
        ExchangeCommand::Delete(args) => {
            let coordinator = open_coordinator(&config, &args.store).await?;
            coordinator
                .store()
                .delete_by_users(args.user_a, args.user_b)
                .await?;
            println!(
                "🗑️  Deleted key exchange for users {} and {}",
                args.user_a, args.user_b
            );
        }
    }

    Ok(())
}

async fn open_coordinator(
    config: &ChatCryptoConfig,
    args: &StoreArgs,
) -> Result<KeyExchangeCoordinator<FileKeyExchangeStore>> {
    let path = args
        .store
        .clone()
        .or_else(|| config.key_exchange.store_path.clone())
        .ok_or_else(|| anyhow!("No store file: pass --store or set E2E_STORE_PATH"))?;

    let store = FileKeyExchangeStore::open(&path)
        .await
        .with_context(|| format!("Failed to open key exchange store {}", path.display()))?;
    info!("📂 Using key exchange store {}", path.display());

    Ok(KeyExchangeCoordinator::with_config(
        Arc::new(store),
        config.coordinator_config(),
    ))
}

fn print_records(label: &str, user: UserId, records: &[KeyExchange]) {
    if records.is_empty() {
        println!("{} exchanges for user {}: none", label, user);
        return;
    }

    println!("{} exchanges for user {}:", label, user);
    for record in records {
        let peer = record
            .peer_of(user)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  #{} with user {} ({}, updated {})",
            record.id,
            peer,
            record.status,
            record.updated_at.to_rfc3339()
        );
    }
}

/// Two users exchange keys through an in-memory store and trade a message
pub async fn demo() -> Result<()> {
    const ALICE: UserId = 1;
    const BOB: UserId = 2;

    let store = Arc::new(InMemoryKeyExchangeStore::new());
    let coordinator = KeyExchangeCoordinator::new(store);

    let alice_keys = KeyPair::generate();
    let bob_keys = KeyPair::generate();

    println!("🚀 Key exchange demo: user {} and user {}", ALICE, BOB);

    let first = coordinator.establish(ALICE, BOB, &alice_keys).await?;
    if let ExchangeOutcome::Pending(record) = &first {
        println!("  1. User {} published; exchange {} is {}", ALICE, record.id, record.status);
    }

    let bob_session = match coordinator.establish(BOB, ALICE, &bob_keys).await? {
        ExchangeOutcome::Ready(session) => session,
        ExchangeOutcome::Pending(record) => {
            return Err(anyhow!("exchange {} still pending after both keys", record.id))
        }
    };
    println!(
        "  2. User {} published; exchange {} is active",
        BOB,
        bob_session.exchange_id()
    );

    let record = coordinator.store().get_by_users(ALICE, BOB).await?;
    let alice_session = coordinator.session_from(&record, ALICE, &alice_keys)?;

    let ciphertext = alice_session.encrypt("hello")?;
    println!("  3. User {} sent: {}", ALICE, ciphertext);

    let plaintext = bob_session.decrypt(&ciphertext)?;
    println!("  4. User {} read: {}", BOB, plaintext);

    if plaintext != "hello" {
        return Err(anyhow!("demo round trip produced {:?}", plaintext));
    }
    println!("✅ Both sides derived the same session key");
    Ok(())
}
