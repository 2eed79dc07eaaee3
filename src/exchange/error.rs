// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the key exchange coordinator

use crate::crypto::CryptoError;
use crate::store::{ExchangeId, StoreError, UserId};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while establishing an encrypted conversation
///
/// Store and crypto errors pass through unmodified. Any of these leaves the
/// conversation in the "encryption not ready" state.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The peer has not published a public key yet
    #[error("Key exchange {id} is still pending; encryption not ready")]
    NotReady { id: ExchangeId },

    /// The record holds a different public key for this user, e.g. after the
    /// device regenerated its key pair
    #[error("User {user} already published a different public key for key exchange {id}")]
    StalePublicKey { id: ExchangeId, user: UserId },

    /// The user is not one of the two participants
    #[error("User {user} is not a participant of key exchange {id}")]
    NotParticipant { id: ExchangeId, user: UserId },

    /// The supplied keys do not match the ones published in the record
    #[error("Supplied public keys do not match key exchange {id}")]
    KeyNotInExchange { id: ExchangeId },

    /// Polling gave up before the peer published a key
    #[error("Key exchange between {self_id} and {peer_id} not active after {waited:?}")]
    Timeout {
        self_id: UserId,
        peer_id: UserId,
        waited: Duration,
    },
}

impl ExchangeError {
    /// Whether the failure came from a cryptographic check
    pub fn is_crypto(&self) -> bool {
        matches!(self, ExchangeError::Crypto(_))
    }
}
