// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key exchange record types

use super::StoreError;
use crate::crypto::PublicKeyHex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate user identifier
pub type UserId = u64;

/// Surrogate key of a key exchange record
pub type ExchangeId = u64;

/// Unordered pair of users normalized so that `low < high`
///
/// The only constructor orders its arguments, so exactly one value exists
/// for each unordered pair regardless of who initiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPair {
    low: UserId,
    high: UserId,
}

/// Which side of a canonical pair a user occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Low,
    High,
}

impl CanonicalPair {
    /// Canonicalize two user ids; a user cannot pair with themselves
    pub fn new(user_a: UserId, user_b: UserId) -> Result<Self, StoreError> {
        if user_a == user_b {
            return Err(StoreError::InvalidPair(user_a));
        }
        Ok(Self {
            low: user_a.min(user_b),
            high: user_a.max(user_b),
        })
    }

    pub fn low(&self) -> UserId {
        self.low
    }

    pub fn high(&self) -> UserId {
        self.high
    }

    /// Slot held by `user`, or `None` if they are not in the pair
    pub fn slot_of(&self, user: UserId) -> Option<Slot> {
        if user == self.low {
            Some(Slot::Low)
        } else if user == self.high {
            Some(Slot::High)
        } else {
            None
        }
    }

    /// The other member of the pair
    pub fn peer_of(&self, user: UserId) -> Option<UserId> {
        match self.slot_of(user)? {
            Slot::Low => Some(self.high),
            Slot::High => Some(self.low),
        }
    }

    /// Stable byte label for binding ciphertexts to this conversation
    pub fn context_label(&self) -> Vec<u8> {
        format!("conversation:{}:{}", self.low, self.high).into_bytes()
    }
}

impl fmt::Display for CanonicalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.low, self.high)
    }
}

/// Progress of a key exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeStatus {
    /// Only one participant has published a public key
    Pending,
    /// Both public keys are present
    Active,
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeStatus::Pending => f.write_str("pending"),
            ExchangeStatus::Active => f.write_str("active"),
        }
    }
}

/// Result of merging a caller's public key into an existing record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyMerge {
    /// The caller's slot was empty and now holds the key
    Filled,
    /// The slot already held this exact key
    Unchanged,
    /// The slot holds a different key (caller regenerated their pair)
    Mismatch,
}

/// Server-side record of the key exchange between two users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchange {
    pub id: ExchangeId,
    pub user_low_id: UserId,
    pub user_high_id: UserId,
    #[serde(with = "key_slot", default)]
    pub public_key_low: Option<PublicKeyHex>,
    #[serde(with = "key_slot", default)]
    pub public_key_high: Option<PublicKeyHex>,
    pub status: ExchangeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KeyExchange {
    pub(crate) fn pending(
        id: ExchangeId,
        pair: CanonicalPair,
        caller: UserId,
        caller_key: PublicKeyHex,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            id,
            user_low_id: pair.low(),
            user_high_id: pair.high(),
            public_key_low: None,
            public_key_high: None,
            status: ExchangeStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        record.merge_key(caller, &caller_key);
        record
    }

    /// Canonical pair of this record
    ///
    /// Fails with `Conflict` if the stored ids are not in canonical order.
    pub fn pair(&self) -> Result<CanonicalPair, StoreError> {
        let pair = CanonicalPair::new(self.user_low_id, self.user_high_id)?;
        if pair.low() != self.user_low_id {
            return Err(StoreError::Conflict {
                low: pair.low(),
                high: pair.high(),
                reason: format!("record {} is not stored in canonical order", self.id),
            });
        }
        Ok(pair)
    }

    pub fn involves(&self, user: UserId) -> bool {
        user == self.user_low_id || user == self.user_high_id
    }

    pub fn is_active(&self) -> bool {
        self.status == ExchangeStatus::Active
    }

    /// The other participant
    pub fn peer_of(&self, user: UserId) -> Option<UserId> {
        if user == self.user_low_id {
            Some(self.user_high_id)
        } else if user == self.user_high_id {
            Some(self.user_low_id)
        } else {
            None
        }
    }

    /// Public key published by `user`, if any
    pub fn public_key_for(&self, user: UserId) -> Option<&PublicKeyHex> {
        if user == self.user_low_id {
            self.public_key_low.as_ref()
        } else if user == self.user_high_id {
            self.public_key_high.as_ref()
        } else {
            None
        }
    }

    /// Public key published by the peer of `self_user`, if any
    pub fn peer_public_key(&self, self_user: UserId) -> Option<&PublicKeyHex> {
        self.peer_of(self_user)
            .and_then(|peer| self.public_key_for(peer))
    }

    /// Recompute status from the key slots
    pub(crate) fn refresh_status(&mut self) {
        self.status = if self.public_key_low.is_some() && self.public_key_high.is_some() {
            ExchangeStatus::Active
        } else {
            ExchangeStatus::Pending
        };
    }

    /// Put `key` in `caller`'s slot if it is empty
    pub(crate) fn merge_key(&mut self, caller: UserId, key: &PublicKeyHex) -> KeyMerge {
        let slot = if caller == self.user_low_id {
            &mut self.public_key_low
        } else {
            &mut self.public_key_high
        };

        let outcome = match slot {
            None => {
                *slot = Some(key.clone());
                KeyMerge::Filled
            }
            Some(existing) if existing == key => KeyMerge::Unchanged,
            Some(_) => KeyMerge::Mismatch,
        };

        self.refresh_status();
        outcome
    }
}

/// Serialize an empty key slot as `""` on the wire
mod key_slot {
    use crate::crypto::PublicKeyHex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<PublicKeyHex>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(key) => serializer.serialize_str(key.as_str()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<PublicKeyHex>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => PublicKeyHex::parse(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
