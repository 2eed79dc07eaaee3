// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-End Encryption Primitives
//!
//! Everything that touches key material for a conversation:
//!
//! - **Keys**: secp256k1 key pair generation/restoration and the public key wire format
//! - **ECDH**: static-static key agreement between two users' key pairs
//! - **Session Key**: HKDF-SHA256 derivation of the conversation key
//! - **Encryption**: XChaCha20-Poly1305 message encryption
//!
//! ## Security Considerations
//!
//! - Private keys, shared secrets and session keys are never persisted or logged
//! - Shared secrets and session keys are zeroized on drop
//! - Nonces are random per message
//! - Decryption fails loudly on a wrong key or tampered payload
//!
//! ## Protocol Flow
//!
//! 1. Each user generates a key pair and publishes the public half through the key exchange store
//! 2. Once both halves are published, each side computes ECDH with the peer's public key
//! 3. Both sides derive the same session key with HKDF-SHA256
//! 4. Messages are encrypted with the session key before they reach the relay

pub mod ecdh;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod session_key;

pub use ecdh::{compute_shared_secret, compute_shared_secret_raw, SharedSecret};
pub use encryption::{
    decrypt_message, decrypt_message_with_aad, decrypt_with_aead, encrypt_message,
    encrypt_message_with_aad, encrypt_with_aead,
};
pub use error::CryptoError;
pub use keys::{KeyPair, PublicKeyHex};
pub use session_key::{derive_session_key, SymmetricKey};
