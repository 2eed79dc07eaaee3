// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Exchange Store
//!
//! Server-side persistence of exchange progress: one record per unordered
//! pair of users, holding each side's public key once published.
//!
//! ## Invariants
//!
//! - Records are written in canonical order (`user_low_id < user_high_id`)
//! - A unique index on the canonical pair keeps exactly one record per pair
//! - `create` is create-or-merge and atomic per pair, so simultaneous
//!   initiation from both users yields one record carrying both keys
//! - Status is derived from the key slots and only moves `pending → active`
//!
//! Lookups by users re-canonicalize their arguments and hit the pair index;
//! there is no either-order query.

pub mod error;
pub mod file;
pub mod memory;
mod table;
pub mod types;

pub use error::{ExchangeLookup, StoreError};
pub use file::FileKeyExchangeStore;
pub use memory::InMemoryKeyExchangeStore;
pub use types::{CanonicalPair, ExchangeId, ExchangeStatus, KeyExchange, Slot, UserId};

use crate::crypto::PublicKeyHex;
use async_trait::async_trait;

/// Trait for key exchange storage backends
#[async_trait]
pub trait KeyExchangeStore: Send + Sync {
    /// Create the record for `{caller, peer}` or merge into the existing one
    ///
    /// `caller_public_key` goes in `caller`'s slot. If the record exists and
    /// that slot is empty the key is merged and the status recomputed;
    /// otherwise the existing record is returned unchanged.
    async fn create(
        &self,
        caller: UserId,
        peer: UserId,
        caller_public_key: &PublicKeyHex,
    ) -> Result<KeyExchange, StoreError>;

    /// Look up the record for a pair in either argument order
    async fn get_by_users(&self, user_a: UserId, user_b: UserId)
        -> Result<KeyExchange, StoreError>;

    /// Look up a record by id
    async fn get_by_id(&self, id: ExchangeId) -> Result<KeyExchange, StoreError>;

    /// Replace an existing record (status is recomputed from its key slots)
    async fn update(&self, exchange: &KeyExchange) -> Result<(), StoreError>;

    /// Delete a record by id
    async fn delete(&self, id: ExchangeId) -> Result<(), StoreError>;

    /// Delete the record for a pair in either argument order
    async fn delete_by_users(&self, user_a: UserId, user_b: UserId) -> Result<(), StoreError>;

    /// Pending records involving `user`, ordered by id
    async fn get_pending_exchanges(&self, user: UserId) -> Result<Vec<KeyExchange>, StoreError>;

    /// Active records involving `user`, ordered by id
    async fn get_active_exchanges(&self, user: UserId) -> Result<Vec<KeyExchange>, StoreError>;

    /// Number of stored records
    async fn count(&self) -> Result<usize, StoreError>;
}
