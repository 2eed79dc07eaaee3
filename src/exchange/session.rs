// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Established conversation handle
//!
//! Pairs a derived session key with the conversation it belongs to. Every
//! ciphertext is bound to the canonical pair through the AEAD associated
//! data, so a message lifted from one conversation will not decrypt in
//! another even if the same key were reused.

use crate::crypto::{decrypt_message_with_aad, encrypt_message_with_aad, CryptoError, SymmetricKey};
use crate::store::{CanonicalPair, ExchangeId, UserId};

/// Encryption context for one conversation, held in memory only
#[derive(Debug, Clone)]
pub struct ChatSession {
    exchange_id: ExchangeId,
    pair: CanonicalPair,
    self_id: UserId,
    key: SymmetricKey,
}

impl ChatSession {
    pub fn new(
        exchange_id: ExchangeId,
        pair: CanonicalPair,
        self_id: UserId,
        key: SymmetricKey,
    ) -> Self {
        Self {
            exchange_id,
            pair,
            self_id,
            key,
        }
    }

    pub fn exchange_id(&self) -> ExchangeId {
        self.exchange_id
    }

    pub fn pair(&self) -> CanonicalPair {
        self.pair
    }

    pub fn self_id(&self) -> UserId {
        self.self_id
    }

    pub fn peer_id(&self) -> Option<UserId> {
        self.pair.peer_of(self.self_id)
    }

    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    /// Encrypt an outgoing message for this conversation
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        encrypt_message_with_aad(plaintext, &self.key, &self.pair.context_label())
    }

    /// Decrypt an incoming message for this conversation
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        decrypt_message_with_aad(ciphertext, &self.key, &self.pair.context_label())
    }
}
