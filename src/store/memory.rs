// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory key exchange store
//!
//! Thread-safe handle over a shared record table. Clones share state, so a
//! single store can back many concurrent coordinators.

use super::table::ExchangeTable;
use super::types::{ExchangeId, ExchangeStatus, KeyExchange, UserId};
use super::{KeyExchangeStore, StoreError};
use crate::crypto::PublicKeyHex;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory storage for key exchange records
#[derive(Clone)]
pub struct InMemoryKeyExchangeStore {
    table: Arc<RwLock<ExchangeTable>>,
}

impl InMemoryKeyExchangeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(ExchangeTable::new())),
        }
    }

    /// Remove every record
    ///
    /// Used for testing or shutdown scenarios
    pub async fn clear(&self) {
        *self.table.write().await = ExchangeTable::new();
        debug!("🧹 Cleared all key exchanges");
    }
}

impl Default for InMemoryKeyExchangeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyExchangeStore for InMemoryKeyExchangeStore {
    async fn create(
        &self,
        caller: UserId,
        peer: UserId,
        caller_public_key: &PublicKeyHex,
    ) -> Result<KeyExchange, StoreError> {
        // check-then-write under one write guard
        let mut table = self.table.write().await;
        let (record, _) = table.create_or_merge(caller, peer, caller_public_key, Utc::now())?;
        Ok(record)
    }

    async fn get_by_users(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<KeyExchange, StoreError> {
        self.table.read().await.get_by_users(user_a, user_b)
    }

    async fn get_by_id(&self, id: ExchangeId) -> Result<KeyExchange, StoreError> {
        self.table.read().await.get_by_id(id)
    }

    async fn update(&self, exchange: &KeyExchange) -> Result<(), StoreError> {
        self.table.write().await.update(exchange, Utc::now())
    }

    async fn delete(&self, id: ExchangeId) -> Result<(), StoreError> {
        self.table.write().await.delete(id).map(|_| ())
    }

    async fn delete_by_users(&self, user_a: UserId, user_b: UserId) -> Result<(), StoreError> {
        self.table
            .write()
            .await
            .delete_by_users(user_a, user_b)
            .map(|_| ())
    }

    async fn get_pending_exchanges(&self, user: UserId) -> Result<Vec<KeyExchange>, StoreError> {
        Ok(self
            .table
            .read()
            .await
            .list_for_user(user, ExchangeStatus::Pending))
    }

    async fn get_active_exchanges(&self, user: UserId) -> Result<Vec<KeyExchange>, StoreError> {
        Ok(self
            .table
            .read()
            .await
            .list_for_user(user, ExchangeStatus::Active))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().await.len())
    }
}
