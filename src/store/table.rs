// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Record table shared by the store backends
//!
//! Holds the records keyed by id plus a unique index on the canonical pair.
//! Every mutation goes through here so both backends enforce the same
//! one-row-per-pair invariant. Callers provide the locking.

use super::types::{CanonicalPair, ExchangeId, ExchangeStatus, KeyExchange, KeyMerge, UserId};
use super::{ExchangeLookup, StoreError};
use crate::crypto::PublicKeyHex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub(crate) struct ExchangeTable {
    records: BTreeMap<ExchangeId, KeyExchange>,
    by_pair: HashMap<CanonicalPair, ExchangeId>,
    next_id: ExchangeId,
}

/// On-disk form of the table
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TableSnapshot {
    pub next_id: ExchangeId,
    pub exchanges: Vec<KeyExchange>,
}

impl ExchangeTable {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Rebuild from a snapshot, re-validating canonical order and uniqueness
    pub fn from_snapshot(snapshot: TableSnapshot) -> Result<Self, StoreError> {
        let mut table = Self::new();

        for mut record in snapshot.exchanges {
            let pair = record.pair()?;
            if table.records.contains_key(&record.id) {
                return Err(StoreError::Corrupt(format!(
                    "duplicate key exchange id {}",
                    record.id
                )));
            }
            if let Some(existing) = table.by_pair.get(&pair) {
                return Err(StoreError::Conflict {
                    low: pair.low(),
                    high: pair.high(),
                    reason: format!("records {} and {} share a pair", existing, record.id),
                });
            }

            record.refresh_status();
            let after = record.id.checked_add(1).ok_or_else(|| {
                StoreError::Corrupt(format!("key exchange id {} is out of range", record.id))
            })?;
            table.next_id = table.next_id.max(after);
            table.by_pair.insert(pair, record.id);
            table.records.insert(record.id, record);
        }

        table.next_id = table.next_id.max(snapshot.next_id);
        Ok(table)
    }

    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            next_id: self.next_id,
            exchanges: self.records.values().cloned().collect(),
        }
    }

    /// Create-or-merge on the canonical pair
    ///
    /// Returns the record and whether anything changed.
    pub fn create_or_merge(
        &mut self,
        caller: UserId,
        peer: UserId,
        caller_key: &PublicKeyHex,
        now: DateTime<Utc>,
    ) -> Result<(KeyExchange, bool), StoreError> {
        let pair = CanonicalPair::new(caller, peer)?;

        if let Some(&id) = self.by_pair.get(&pair) {
            let record = self.records.get_mut(&id).ok_or_else(|| StoreError::Conflict {
                low: pair.low(),
                high: pair.high(),
                reason: format!("pair index points at missing record {}", id),
            })?;

            let changed = match record.merge_key(caller, caller_key) {
                KeyMerge::Filled => {
                    record.updated_at = now;
                    info!(
                        "🔐 Key exchange {} for {} now {} (user {} published {}…)",
                        id,
                        pair,
                        record.status,
                        caller,
                        caller_key.fingerprint()
                    );
                    true
                }
                KeyMerge::Unchanged => false,
                KeyMerge::Mismatch => {
                    warn!(
                        "⚠️ User {} offered a different public key for exchange {}; keeping the published one",
                        caller, id
                    );
                    false
                }
            };

            return Ok((record.clone(), changed));
        }

        let id = self.next_id;
        self.next_id += 1;

        let record = KeyExchange::pending(id, pair, caller, caller_key.clone(), now);
        self.by_pair.insert(pair, id);
        self.records.insert(id, record.clone());

        info!(
            "📥 Key exchange {} created for {} (user {} published {}…)",
            id,
            pair,
            caller,
            caller_key.fingerprint()
        );
        Ok((record, true))
    }

    pub fn get_by_id(&self, id: ExchangeId) -> Result<KeyExchange, StoreError> {
        self.records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(ExchangeLookup::Id(id)))
    }

    pub fn get_by_users(&self, user_a: UserId, user_b: UserId) -> Result<KeyExchange, StoreError> {
        let pair = CanonicalPair::new(user_a, user_b)?;
        self.by_pair
            .get(&pair)
            .and_then(|id| self.records.get(id))
            .cloned()
            .ok_or(StoreError::NotFound(ExchangeLookup::Users {
                low: pair.low(),
                high: pair.high(),
            }))
    }

    /// Full replace of an existing record
    pub fn update(&mut self, exchange: &KeyExchange, now: DateTime<Utc>) -> Result<(), StoreError> {
        let pair = exchange.pair()?;
        let existing = self
            .records
            .get(&exchange.id)
            .ok_or(StoreError::NotFound(ExchangeLookup::Id(exchange.id)))?;

        if existing.pair()? != pair {
            return Err(StoreError::Conflict {
                low: pair.low(),
                high: pair.high(),
                reason: format!("update would move record {} to a different pair", exchange.id),
            });
        }
        if self.by_pair.get(&pair) != Some(&exchange.id) {
            return Err(StoreError::Conflict {
                low: pair.low(),
                high: pair.high(),
                reason: format!("pair is indexed under a record other than {}", exchange.id),
            });
        }
        // slots only fill; a published key is never cleared or replaced
        let slots = [
            (&existing.public_key_low, &exchange.public_key_low),
            (&existing.public_key_high, &exchange.public_key_high),
        ];
        if slots
            .iter()
            .any(|(published, proposed)| published.is_some() && published != proposed)
        {
            warn!(
                "⚠️ Rejected update to key exchange {}: published key would change",
                exchange.id
            );
            return Err(StoreError::Conflict {
                low: pair.low(),
                high: pair.high(),
                reason: format!(
                    "update would clear or replace a published key in record {}",
                    exchange.id
                ),
            });
        }

        let mut replacement = exchange.clone();
        replacement.created_at = existing.created_at;
        replacement.updated_at = now;
        replacement.refresh_status();

        info!(
            "📝 Key exchange {} for {} updated (status: {})",
            replacement.id, pair, replacement.status
        );
        self.records.insert(replacement.id, replacement);
        Ok(())
    }

    pub fn delete(&mut self, id: ExchangeId) -> Result<KeyExchange, StoreError> {
        let record = self
            .records
            .remove(&id)
            .ok_or(StoreError::NotFound(ExchangeLookup::Id(id)))?;

        // the record passed the canonical check on insert
        if let Ok(pair) = record.pair() {
            self.by_pair.remove(&pair);
        }
        info!(
            "🗑️  Key exchange {} deleted (users {} and {})",
            id, record.user_low_id, record.user_high_id
        );
        Ok(record)
    }

    pub fn delete_by_users(
        &mut self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<KeyExchange, StoreError> {
        let record = self.get_by_users(user_a, user_b)?;
        self.delete(record.id)
    }

    pub fn list_for_user(&self, user: UserId, status: ExchangeStatus) -> Vec<KeyExchange> {
        self.records
            .values()
            .filter(|record| record.status == status && record.involves(user))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
