// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for key exchange persistence

use super::types::{ExchangeId, UserId};
use std::fmt;
use thiserror::Error;

/// How a missing record was looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeLookup {
    Id(ExchangeId),
    Users { low: UserId, high: UserId },
}

impl fmt::Display for ExchangeLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeLookup::Id(id) => write!(f, "id {}", id),
            ExchangeLookup::Users { low, high } => write!(f, "users {} and {}", low, high),
        }
    }
}

/// Errors raised by a [`KeyExchangeStore`](super::KeyExchangeStore)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No exchange record for the requested id or pair
    #[error("Key exchange not found for {0}")]
    NotFound(ExchangeLookup),

    /// A second record for a canonical pair, or a record out of canonical
    /// order. Indicates a canonicalization bug, never a normal outcome.
    #[error("Key exchange conflict for users {low} and {high}: {reason}")]
    Conflict {
        low: UserId,
        high: UserId,
        reason: String,
    },

    /// Both sides of the pair are the same user
    #[error("User {0} cannot exchange keys with themselves")]
    InvalidPair(UserId),

    /// Backend temporarily unreachable (I/O, network)
    #[error("Key exchange store unavailable: {0}")]
    Unavailable(String),

    /// Persisted data could not be decoded
    #[error("Key exchange store data is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}
