// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! File-backed key exchange store
//!
//! Keeps the table in memory and writes a JSON snapshot after every
//! mutation. Writes go to a temp file that is synced and then renamed over
//! the snapshot, so a crash leaves either the old or the new state on disk.
//!
//! Mutations are applied to a copy of the table and committed only once
//! the snapshot is on disk; a failed write leaves memory and disk in
//! agreement.

use super::table::{ExchangeTable, TableSnapshot};
use super::types::{ExchangeId, ExchangeStatus, KeyExchange, UserId};
use super::{KeyExchangeStore, StoreError};
use crate::crypto::PublicKeyHex;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Key exchange store persisted to a single JSON file
#[derive(Clone)]
pub struct FileKeyExchangeStore {
    path: PathBuf,
    table: Arc<Mutex<ExchangeTable>>,
}

impl FileKeyExchangeStore {
    /// Open the store at `path`, loading existing records if the file exists
    ///
    /// # Errors
    ///
    /// - `StoreError::Corrupt` if the file cannot be decoded
    /// - `StoreError::Conflict` if it holds two records for one pair
    /// - `StoreError::Unavailable` on I/O failure
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let table = if fs::try_exists(&path).await? {
            let contents = fs::read_to_string(&path).await?;
            let snapshot: TableSnapshot = serde_json::from_str(&contents)?;
            let table = ExchangeTable::from_snapshot(snapshot)?;
            info!(
                "📂 Loaded {} key exchanges from {}",
                table.len(),
                path.display()
            );
            table
        } else {
            debug!("No key exchange file at {}, starting empty", path.display());
            ExchangeTable::new()
        };

        Ok(Self {
            path,
            table: Arc::new(Mutex::new(table)),
        })
    }

    /// Location of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the snapshot file, never equal to it
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn persist(&self, table: &ExchangeTable) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !fs::try_exists(parent).await? {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(&table.snapshot())?;

        // Write atomically using a temp file
        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.path).await?;
        debug!("💾 Persisted {} key exchanges", table.len());
        Ok(())
    }

    /// Apply `op` to a copy of the table, persist, then commit
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut ExchangeTable) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.table.lock().await;
        let mut next = guard.clone();
        let (value, changed) = op(&mut next)?;

        if changed {
            self.persist(&next).await?;
            *guard = next;
        }
        Ok(value)
    }
}

#[async_trait]
impl KeyExchangeStore for FileKeyExchangeStore {
    async fn create(
        &self,
        caller: UserId,
        peer: UserId,
        caller_public_key: &PublicKeyHex,
    ) -> Result<KeyExchange, StoreError> {
        self.mutate(|table| table.create_or_merge(caller, peer, caller_public_key, Utc::now()))
            .await
    }

    async fn get_by_users(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<KeyExchange, StoreError> {
        self.table.lock().await.get_by_users(user_a, user_b)
    }

    async fn get_by_id(&self, id: ExchangeId) -> Result<KeyExchange, StoreError> {
        self.table.lock().await.get_by_id(id)
    }

    async fn update(&self, exchange: &KeyExchange) -> Result<(), StoreError> {
        self.mutate(|table| table.update(exchange, Utc::now()).map(|()| ((), true)))
            .await
    }

    async fn delete(&self, id: ExchangeId) -> Result<(), StoreError> {
        self.mutate(|table| table.delete(id).map(|_| ((), true)))
            .await
    }

    async fn delete_by_users(&self, user_a: UserId, user_b: UserId) -> Result<(), StoreError> {
        self.mutate(|table| table.delete_by_users(user_a, user_b).map(|_| ((), true)))
            .await
    }

    async fn get_pending_exchanges(&self, user: UserId) -> Result<Vec<KeyExchange>, StoreError> {
        Ok(self
            .table
            .lock()
            .await
            .list_for_user(user, ExchangeStatus::Pending))
    }

    async fn get_active_exchanges(&self, user: UserId) -> Result<Vec<KeyExchange>, StoreError> {
        Ok(self
            .table
            .lock()
            .await
            .list_for_user(user, ExchangeStatus::Active))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table.lock().await.len())
    }
}
