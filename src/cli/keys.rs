// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Args;

use crate::crypto::{
    compute_shared_secret, decrypt_message, decrypt_message_with_aad, derive_session_key,
    encrypt_message, encrypt_message_with_aad, KeyPair, PublicKeyHex, SymmetricKey,
};
use crate::store::CanonicalPair;

/// Arguments for public-key command
#[derive(Args, Debug)]
pub struct PublicKeyArgs {
    /// Private key hex (can also be set via E2E_PRIVATE_KEY env var)
    #[arg(long, env = "E2E_PRIVATE_KEY")]
    pub private_key: String,
}

/// Arguments for derive command
#[derive(Args, Debug)]
pub struct DeriveArgs {
    /// Own private key hex (can also be set via E2E_PRIVATE_KEY env var)
    #[arg(long, env = "E2E_PRIVATE_KEY")]
    pub private_key: String,

    /// Peer's uncompressed public key hex
    #[arg(long)]
    pub peer_public_key: String,
}

/// Arguments for encrypt command
#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Session key hex (64 chars)
    #[arg(long, env = "E2E_SESSION_KEY")]
    pub session_key: String,

    /// Message to encrypt
    #[arg(long)]
    pub message: String,

    /// Bind the ciphertext to a conversation, as "<user>,<user>"
    #[arg(long, value_delimiter = ',', num_args = 2)]
    pub pair: Option<Vec<u64>>,
}

/// Arguments for decrypt command
#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Session key hex (64 chars)
    #[arg(long, env = "E2E_SESSION_KEY")]
    pub session_key: String,

    /// Base64 ciphertext
    #[arg(long)]
    pub ciphertext: String,

    /// Conversation the ciphertext is bound to, as "<user>,<user>"
    #[arg(long, value_delimiter = ',', num_args = 2)]
    pub pair: Option<Vec<u64>>,
}

/// Generate a key pair and print both halves
pub fn keygen() -> Result<()> {
    let key_pair = KeyPair::generate();

    println!("🔑 Generated secp256k1 key pair");
    println!("  Private key: 0x{}", hex::encode(key_pair.private_key_bytes().as_slice()));
    println!("  Public key:  {}", key_pair.public_key_hex());
    println!();
    println!("⚠️  Keep the private key local; only the public key is published.");
    Ok(())
}

pub fn public_key(args: PublicKeyArgs) -> Result<()> {
    let key_pair = KeyPair::from_private_key_hex(&args.private_key)
        .context("Failed to load private key")?;
    println!("{}", key_pair.public_key_hex());
    Ok(())
}

/// Run ECDH + HKDF and print the resulting session key
pub fn derive(args: DeriveArgs) -> Result<()> {
    let key_pair = KeyPair::from_private_key_hex(&args.private_key)
        .context("Failed to load private key")?;
    let peer = PublicKeyHex::parse(&args.peer_public_key).context("Invalid peer public key")?;

    let shared = compute_shared_secret(&key_pair, &peer)?;
    let session_key = derive_session_key(&shared)?;

    println!("🔐 Session key: {}", session_key.to_hex());
    Ok(())
}

pub fn encrypt(args: EncryptArgs) -> Result<()> {
    let key = SymmetricKey::from_hex(&args.session_key).context("Invalid session key")?;

    let ciphertext = match parse_pair(args.pair)? {
        Some(pair) => encrypt_message_with_aad(&args.message, &key, &pair.context_label())?,
        None => encrypt_message(&args.message, &key)?,
    };

    println!("{}", ciphertext);
    Ok(())
}

pub fn decrypt(args: DecryptArgs) -> Result<()> {
    let key = SymmetricKey::from_hex(&args.session_key).context("Invalid session key")?;

    let plaintext = match parse_pair(args.pair)? {
        Some(pair) => decrypt_message_with_aad(&args.ciphertext, &key, &pair.context_label())?,
        None => decrypt_message(&args.ciphertext, &key)?,
    };

    println!("{}", plaintext);
    Ok(())
}

fn parse_pair(pair: Option<Vec<u64>>) -> Result<Option<CanonicalPair>> {
    match pair.as_deref() {
        None => Ok(None),
        Some([a, b]) => Ok(Some(CanonicalPair::new(*a, *b)?)),
        Some(other) => anyhow::bail!("--pair takes two user ids, got {}", other.len()),
    }
}
