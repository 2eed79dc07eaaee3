// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Coordinator retry, polling and completion checks

use async_trait::async_trait;
use fabstir_e2e_chat::crypto::{KeyPair, PublicKeyHex};
use fabstir_e2e_chat::exchange::{CoordinatorConfig, ExchangeError, KeyExchangeCoordinator};
use fabstir_e2e_chat::store::{
    ExchangeId, InMemoryKeyExchangeStore, KeyExchange, KeyExchangeStore, StoreError, UserId,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store that fails `create` and `get_by_users` a fixed number of times
struct FlakyStore {
    inner: InMemoryKeyExchangeStore,
    failures_left: AtomicU32,
    calls: AtomicU32,
    failure: StoreError,
}

impl FlakyStore {
    fn new(failures: u32, failure: StoreError) -> Self {
        Self {
            inner: InMemoryKeyExchangeStore::new(),
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            failure,
        }
    }

    fn trip(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tripped = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(self.failure.clone())
        } else {
            Ok(())
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyExchangeStore for FlakyStore {
    async fn create(
        &self,
        caller: UserId,
        peer: UserId,
        caller_public_key: &PublicKeyHex,
    ) -> Result<KeyExchange, StoreError> {
        self.trip()?;
        self.inner.create(caller, peer, caller_public_key).await
    }

    async fn get_by_users(&self, user_a: UserId, user_b: UserId) -> Result<KeyExchange, StoreError> {
        self.trip()?;
        self.inner.get_by_users(user_a, user_b).await
    }

    async fn get_by_id(&self, id: ExchangeId) -> Result<KeyExchange, StoreError> {
        self.inner.get_by_id(id).await
    }

    async fn update(&self, exchange: &KeyExchange) -> Result<(), StoreError> {
        self.inner.update(exchange).await
    }

    async fn delete(&self, id: ExchangeId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn delete_by_users(&self, user_a: UserId, user_b: UserId) -> Result<(), StoreError> {
        self.inner.delete_by_users(user_a, user_b).await
    }

    async fn get_pending_exchanges(&self, user: UserId) -> Result<Vec<KeyExchange>, StoreError> {
        self.inner.get_pending_exchanges(user).await
    }

    async fn get_active_exchanges(&self, user: UserId) -> Result<Vec<KeyExchange>, StoreError> {
        self.inner.get_active_exchanges(user).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }
}

fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        max_retries: 3,
        retry_backoff: Duration::from_millis(1),
        poll_interval: Duration::from_millis(10),
        activation_timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let store = Arc::new(FlakyStore::new(
        2,
        StoreError::Unavailable("connection reset".to_string()),
    ));
    let coordinator = KeyExchangeCoordinator::with_config(Arc::clone(&store), fast_config());
    let alice = KeyPair::generate();

    let record = coordinator
        .initiate(1, 2, &alice.public_key_hex())
        .await
        .unwrap();

    assert_eq!(record.public_key_low, Some(alice.public_key_hex()));
    assert_eq!(store.calls(), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let store = Arc::new(FlakyStore::new(
        10,
        StoreError::Unavailable("database down".to_string()),
    ));
    let coordinator = KeyExchangeCoordinator::with_config(Arc::clone(&store), fast_config());

    let err = coordinator
        .initiate(1, 2, &KeyPair::generate().public_key_hex())
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::Store(StoreError::Unavailable(_))));
    // first attempt plus max_retries
    assert_eq!(store.calls(), 4);
}

#[tokio::test]
async fn test_non_transient_errors_are_not_retried() {
    let store = Arc::new(FlakyStore::new(
        1,
        StoreError::Corrupt("bad row".to_string()),
    ));
    let coordinator = KeyExchangeCoordinator::with_config(Arc::clone(&store), fast_config());

    let err = coordinator
        .initiate(1, 2, &KeyPair::generate().public_key_hex())
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::Store(StoreError::Corrupt(_))));
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_wait_until_active_sees_late_peer() {
    let store = Arc::new(InMemoryKeyExchangeStore::new());
    let coordinator = KeyExchangeCoordinator::with_config(
        Arc::clone(&store),
        CoordinatorConfig {
            activation_timeout: Duration::from_secs(5),
            ..fast_config()
        },
    );
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    coordinator
        .initiate(1, 2, &alice.public_key_hex())
        .await
        .unwrap();

    let peer = coordinator.clone();
    let bob_public = bob.public_key_hex();
    let publisher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        peer.initiate(2, 1, &bob_public).await
    });

    let record = coordinator.wait_until_active(1, 2).await.unwrap();
    assert!(record.is_active());
    publisher.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_wait_until_active_times_out() {
    let store = Arc::new(InMemoryKeyExchangeStore::new());
    let coordinator = KeyExchangeCoordinator::with_config(store, fast_config());
    let alice = KeyPair::generate();

    coordinator
        .initiate(1, 2, &alice.public_key_hex())
        .await
        .unwrap();

    match coordinator.wait_until_active(1, 2).await {
        Err(ExchangeError::Timeout {
            self_id,
            peer_id,
            waited,
        }) => {
            assert_eq!((self_id, peer_id), (1, 2));
            assert!(waited >= Duration::from_millis(200));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_wait_without_record_is_not_found() {
    let coordinator = KeyExchangeCoordinator::with_config(
        Arc::new(InMemoryKeyExchangeStore::new()),
        fast_config(),
    );

    let err = coordinator.wait_until_active(1, 2).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Store(ref e) if e.is_not_found()));
}

#[tokio::test]
async fn test_complete_rejects_pending_exchange() {
    let coordinator = KeyExchangeCoordinator::new(Arc::new(InMemoryKeyExchangeStore::new()));
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let record = coordinator
        .initiate(1, 2, &alice.public_key_hex())
        .await
        .unwrap();

    assert!(matches!(
        coordinator.complete(&record, &alice, &bob.public_key_hex()),
        Err(ExchangeError::NotReady { .. })
    ));
}

#[tokio::test]
async fn test_complete_rejects_foreign_keys() {
    let coordinator = KeyExchangeCoordinator::new(Arc::new(InMemoryKeyExchangeStore::new()));
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let mallory = KeyPair::generate();

    coordinator
        .initiate(1, 2, &alice.public_key_hex())
        .await
        .unwrap();
    let record = coordinator
        .initiate(2, 1, &bob.public_key_hex())
        .await
        .unwrap();

    assert!(matches!(
        coordinator.complete(&record, &mallory, &bob.public_key_hex()),
        Err(ExchangeError::KeyNotInExchange { .. })
    ));
    assert!(matches!(
        coordinator.complete(&record, &alice, &mallory.public_key_hex()),
        Err(ExchangeError::KeyNotInExchange { .. })
    ));
    assert!(matches!(
        coordinator.complete_for(&record, 3, &mallory),
        Err(ExchangeError::NotParticipant { user: 3, .. })
    ));
    assert!(matches!(
        coordinator.complete_for(&record, 1, &mallory),
        Err(ExchangeError::StalePublicKey { user: 1, .. })
    ));
}

#[tokio::test]
async fn test_regenerated_key_is_reported_stale() {
    let coordinator = KeyExchangeCoordinator::new(Arc::new(InMemoryKeyExchangeStore::new()));
    let old_device = KeyPair::generate();
    let new_device = KeyPair::generate();

    coordinator
        .initiate(1, 2, &old_device.public_key_hex())
        .await
        .unwrap();
    let err = coordinator
        .initiate(1, 2, &new_device.public_key_hex())
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::StalePublicKey { user: 1, .. }));
}

#[tokio::test]
async fn test_pending_and_active_listing() {
    let coordinator = KeyExchangeCoordinator::new(Arc::new(InMemoryKeyExchangeStore::new()));
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    coordinator.initiate(1, 2, &alice.public_key_hex()).await.unwrap();
    coordinator.initiate(1, 3, &alice.public_key_hex()).await.unwrap();
    coordinator.initiate(2, 1, &bob.public_key_hex()).await.unwrap();

    let pending = coordinator.pending_for(1).await.unwrap();
    let active = coordinator.active_for(1).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].peer_of(1), Some(3));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].peer_of(1), Some(2));
}
