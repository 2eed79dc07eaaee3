// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Exchange Coordinator
//!
//! Client-side orchestration of the exchange between two users:
//!
//! 1. `initiate` publishes our public key into the canonical pair record
//! 2. once the record is `active`, `complete` runs ECDH with the peer's key
//! 3. `derive_session_key` turns the shared secret into the conversation key
//!
//! The coordinator holds no key material. Key pairs are passed in on every
//! call, which keeps it safe to share across tasks and deterministic to test.
//!
//! Transient store failures are retried with linear backoff. Cryptographic
//! failures are deterministic and never retried.

use super::{ChatSession, ExchangeError};
use crate::crypto::{self, KeyPair, PublicKeyHex, SharedSecret, SymmetricKey};
use crate::store::{CanonicalPair, KeyExchange, KeyExchangeStore, StoreError, UserId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Retry and polling settings for the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Extra attempts after a transient store failure
    pub max_retries: u32,
    /// Delay before retry `n` is `n * retry_backoff`
    pub retry_backoff: Duration,
    /// Delay between polls in `wait_until_active`
    pub poll_interval: Duration,
    /// Give up waiting for the peer after this long
    pub activation_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
            poll_interval: Duration::from_secs(1),
            activation_timeout: Duration::from_secs(60),
        }
    }
}

/// Result of trying to establish an encrypted conversation
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// Both keys are published and the session key is derived
    Ready(ChatSession),
    /// Only our key is published; encryption not ready yet
    Pending(KeyExchange),
}

/// Orchestrates key exchange between users over a [`KeyExchangeStore`]
pub struct KeyExchangeCoordinator<S: KeyExchangeStore + ?Sized> {
    store: Arc<S>,
    config: CoordinatorConfig,
}

impl<S: KeyExchangeStore + ?Sized> Clone for KeyExchangeCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: KeyExchangeStore + ?Sized> KeyExchangeCoordinator<S> {
    /// Create a coordinator with default retry and polling settings
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: CoordinatorConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Publish our public key for the conversation with `peer_id`
    ///
    /// Creates the record or merges into the existing one. Repeating the call
    /// returns the same record without creating another.
    ///
    /// # Errors
    ///
    /// - `ExchangeError::StalePublicKey` if the record already holds a
    ///   different key for `self_id`
    /// - store errors, unmodified, after transient retries are exhausted
    pub async fn initiate(
        &self,
        self_id: UserId,
        peer_id: UserId,
        self_public_key: &PublicKeyHex,
    ) -> Result<KeyExchange, ExchangeError> {
        let pair = CanonicalPair::new(self_id, peer_id)?;
        debug!(
            "🤝 User {} initiating key exchange for {} with key {}…",
            self_id,
            pair,
            self_public_key.fingerprint()
        );

        let record = self
            .with_retry("create", || {
                self.store.create(self_id, peer_id, self_public_key)
            })
            .await?;

        if record.public_key_for(self_id) != Some(self_public_key) {
            warn!(
                "⚠️ Key exchange {} holds a different public key for user {}",
                record.id, self_id
            );
            return Err(ExchangeError::StalePublicKey {
                id: record.id,
                user: self_id,
            });
        }

        info!(
            "🤝 Key exchange {} for {} is {}",
            record.id, pair, record.status
        );
        Ok(record)
    }

    /// Compute the ECDH shared secret for an active exchange
    ///
    /// `own` and `peer_public_key` must be the two keys published in
    /// `exchange`.
    ///
    /// # Errors
    ///
    /// - `ExchangeError::NotReady` while the exchange is pending
    /// - `ExchangeError::KeyNotInExchange` if the keys are not the published ones
    /// - `ExchangeError::Crypto` if the peer key is not a valid curve point
    pub fn complete(
        &self,
        exchange: &KeyExchange,
        own: &KeyPair,
        peer_public_key: &PublicKeyHex,
    ) -> Result<SharedSecret, ExchangeError> {
        if !exchange.is_active() {
            return Err(ExchangeError::NotReady { id: exchange.id });
        }

        let own_public = own.public_key_hex();
        let published = [
            exchange.public_key_low.as_ref(),
            exchange.public_key_high.as_ref(),
        ];
        let matches_pair = own_public != *peer_public_key
            && published.contains(&Some(&own_public))
            && published.contains(&Some(peer_public_key));
        if !matches_pair {
            return Err(ExchangeError::KeyNotInExchange { id: exchange.id });
        }

        let secret = crypto::compute_shared_secret(own, peer_public_key)?;
        debug!("🔑 Shared secret computed for key exchange {}", exchange.id);
        Ok(secret)
    }

    /// Compute the shared secret as `self_id`, reading the peer key from the record
    pub fn complete_for(
        &self,
        exchange: &KeyExchange,
        self_id: UserId,
        own: &KeyPair,
    ) -> Result<SharedSecret, ExchangeError> {
        if !exchange.involves(self_id) {
            return Err(ExchangeError::NotParticipant {
                id: exchange.id,
                user: self_id,
            });
        }
        if exchange.public_key_for(self_id) != Some(&own.public_key_hex()) {
            return Err(ExchangeError::StalePublicKey {
                id: exchange.id,
                user: self_id,
            });
        }

        let peer_public_key = exchange
            .peer_public_key(self_id)
            .ok_or(ExchangeError::NotReady { id: exchange.id })?;
        self.complete(exchange, own, peer_public_key)
    }

    /// Derive the conversation key from a shared secret
    pub fn derive_session_key(
        &self,
        shared_secret: &SharedSecret,
    ) -> Result<SymmetricKey, ExchangeError> {
        Ok(crypto::derive_session_key(shared_secret)?)
    }

    /// Initiate and, if the peer has already published, derive the session
    pub async fn establish(
        &self,
        self_id: UserId,
        peer_id: UserId,
        own: &KeyPair,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        let record = self.initiate(self_id, peer_id, &own.public_key_hex()).await?;

        if !record.is_active() {
            info!(
                "⏳ Key exchange {} waiting for user {}; encryption not ready",
                record.id, peer_id
            );
            return Ok(ExchangeOutcome::Pending(record));
        }

        Ok(ExchangeOutcome::Ready(self.session_from(&record, self_id, own)?))
    }

    /// Initiate, then poll until the peer publishes and derive the session
    pub async fn establish_and_wait(
        &self,
        self_id: UserId,
        peer_id: UserId,
        own: &KeyPair,
    ) -> Result<ChatSession, ExchangeError> {
        let record = self.initiate(self_id, peer_id, &own.public_key_hex()).await?;
        let record = if record.is_active() {
            record
        } else {
            self.wait_until_active(self_id, peer_id).await?
        };
        self.session_from(&record, self_id, own)
    }

    /// Build the in-memory session for an active record
    pub fn session_from(
        &self,
        exchange: &KeyExchange,
        self_id: UserId,
        own: &KeyPair,
    ) -> Result<ChatSession, ExchangeError> {
        let secret = self.complete_for(exchange, self_id, own)?;
        let key = self.derive_session_key(&secret)?;
        info!(
            "🔐 Session ready for key exchange {} (user {})",
            exchange.id, self_id
        );
        Ok(ChatSession::new(exchange.id, exchange.pair()?, self_id, key))
    }

    /// Poll the store until the exchange for the pair becomes active
    ///
    /// # Errors
    ///
    /// `ExchangeError::Timeout` after `activation_timeout`; store errors
    /// (including `NotFound` if nobody initiated) surface unmodified.
    pub async fn wait_until_active(
        &self,
        self_id: UserId,
        peer_id: UserId,
    ) -> Result<KeyExchange, ExchangeError> {
        let started = Instant::now();

        loop {
            let record = self
                .with_retry("get_by_users", || self.store.get_by_users(self_id, peer_id))
                .await?;
            if record.is_active() {
                debug!(
                    "Key exchange {} became active after {:?}",
                    record.id,
                    started.elapsed()
                );
                return Ok(record);
            }

            let waited = started.elapsed();
            if waited >= self.config.activation_timeout {
                warn!(
                    "⏰ Key exchange {} still pending after {:?}",
                    record.id, waited
                );
                return Err(ExchangeError::Timeout {
                    self_id,
                    peer_id,
                    waited,
                });
            }

            sleep(self.config.poll_interval).await;
        }
    }

    /// Pending exchanges involving `user`
    pub async fn pending_for(&self, user: UserId) -> Result<Vec<KeyExchange>, ExchangeError> {
        Ok(self
            .with_retry("get_pending_exchanges", || {
                self.store.get_pending_exchanges(user)
            })
            .await?)
    }

    /// Active exchanges involving `user`
    pub async fn active_for(&self, user: UserId) -> Result<Vec<KeyExchange>, ExchangeError> {
        Ok(self
            .with_retry("get_active_exchanges", || {
                self.store.get_active_exchanges(user)
            })
            .await?)
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_backoff * attempt;
                    warn!(
                        "🔁 Store {} failed ({}), retry {}/{} in {:?}",
                        operation, err, attempt, self.config.max_retries, delay
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
