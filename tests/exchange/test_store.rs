// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Store contract, exercised against both backends

use fabstir_e2e_chat::crypto::KeyPair;
use fabstir_e2e_chat::store::{
    ExchangeLookup, ExchangeStatus, FileKeyExchangeStore, InMemoryKeyExchangeStore,
    KeyExchangeStore, StoreError,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

async fn check_simultaneous_initiation(store: &dyn KeyExchangeStore) {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let first = store.create(1, 2, &alice.public_key_hex()).await.unwrap();
    assert_eq!(first.status, ExchangeStatus::Pending);

    let second = store.create(2, 1, &bob.public_key_hex()).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.status, ExchangeStatus::Active);
    assert_eq!(second.user_low_id, 1);
    assert_eq!(second.user_high_id, 2);
    assert_eq!(second.public_key_low, Some(alice.public_key_hex()));
    assert_eq!(second.public_key_high, Some(bob.public_key_hex()));

    assert_eq!(store.count().await.unwrap(), 1);
}

async fn check_canonical_ordering(store: &dyn KeyExchangeStore) {
    let key = KeyPair::generate().public_key_hex();

    let record = store.create(9, 4, &key).await.unwrap();
    assert_eq!((record.user_low_id, record.user_high_id), (4, 9));
    assert_eq!(record.public_key_high, Some(key.clone()));
    assert_eq!(record.public_key_low, None);

    let by_forward = store.get_by_users(4, 9).await.unwrap();
    let by_reverse = store.get_by_users(9, 4).await.unwrap();
    assert_eq!(by_forward, by_reverse);
    assert_eq!(by_forward.id, record.id);
}

async fn check_status_queries(store: &dyn KeyExchangeStore) {
    let k = |_: u8| KeyPair::generate().public_key_hex();

    // 1-2 active, 1-3 pending (published by 1), 4-1 pending (published by 4)
    store.create(1, 2, &k(0)).await.unwrap();
    store.create(2, 1, &k(1)).await.unwrap();
    store.create(1, 3, &k(2)).await.unwrap();
    store.create(4, 1, &k(3)).await.unwrap();

    let pending = store.get_pending_exchanges(1).await.unwrap();
    let pairs: Vec<_> = pending
        .iter()
        .map(|r| (r.user_low_id, r.user_high_id))
        .collect();
    assert_eq!(pairs, vec![(1, 3), (1, 4)]);

    let active = store.get_active_exchanges(1).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].peer_of(1), Some(2));

    assert!(store.get_pending_exchanges(2).await.unwrap().is_empty());
    assert_eq!(store.get_active_exchanges(2).await.unwrap().len(), 1);
    assert!(store.get_active_exchanges(99).await.unwrap().is_empty());
}

async fn check_delete(store: &dyn KeyExchangeStore) {
    let key = KeyPair::generate().public_key_hex();
    let record = store.create(5, 6, &key).await.unwrap();

    assert_ok!(store.delete(record.id).await);

    assert_eq!(
        store.get_by_id(record.id).await,
        Err(StoreError::NotFound(ExchangeLookup::Id(record.id)))
    );
    assert!(store.get_by_users(5, 6).await.unwrap_err().is_not_found());
    assert!(store.get_by_users(6, 5).await.unwrap_err().is_not_found());
    assert_err!(store.delete(record.id).await);

    // the pair can be initiated again afterwards
    let again = store.create(6, 5, &key).await.unwrap();
    assert_ne!(again.id, record.id);
    assert_ok!(store.delete_by_users(6, 5).await);
    assert_eq!(store.count().await.unwrap(), 0);
}

async fn check_first_key_wins(store: &dyn KeyExchangeStore) {
    let original = KeyPair::generate().public_key_hex();
    let replacement = KeyPair::generate().public_key_hex();

    store.create(7, 8, &original).await.unwrap();
    let record = store.create(7, 8, &replacement).await.unwrap();

    assert_eq!(record.public_key_low, Some(original));
    assert_eq!(record.status, ExchangeStatus::Pending);
    assert_eq!(store.count().await.unwrap(), 1);
}

async fn check_update(store: &dyn KeyExchangeStore) {
    let alice = KeyPair::generate().public_key_hex();
    let bob = KeyPair::generate().public_key_hex();

    let mut record = store.create(10, 11, &alice).await.unwrap();
    let created_at = record.created_at;
    record.public_key_high = Some(bob.clone());
    // status is recomputed by the store
    record.status = ExchangeStatus::Pending;
    assert_ok!(store.update(&record).await);

    let stored = store.get_by_id(record.id).await.unwrap();
    assert_eq!(stored.status, ExchangeStatus::Active);
    assert_eq!(stored.public_key_high, Some(bob));
    assert_eq!(stored.created_at, created_at);
    assert!(stored.updated_at >= created_at);

    let mut missing = stored.clone();
    missing.id = 10_000;
    assert!(store.update(&missing).await.unwrap_err().is_not_found());
}

async fn check_update_cannot_regress(store: &dyn KeyExchangeStore) {
    let alice = KeyPair::generate().public_key_hex();
    let bob = KeyPair::generate().public_key_hex();
    let mallory = KeyPair::generate().public_key_hex();

    store.create(1, 2, &alice).await.unwrap();
    let active = store.create(2, 1, &bob).await.unwrap();
    assert!(active.is_active());

    let mut cleared = active.clone();
    cleared.public_key_high = None;
    assert!(matches!(
        store.update(&cleared).await,
        Err(StoreError::Conflict { low: 1, high: 2, .. })
    ));

    let mut replaced = active.clone();
    replaced.public_key_low = Some(mallory.clone());
    replaced.public_key_high = Some(mallory);
    assert!(matches!(
        store.update(&replaced).await,
        Err(StoreError::Conflict { .. })
    ));

    let stored = store.get_by_id(active.id).await.unwrap();
    assert_eq!(stored.status, ExchangeStatus::Active);
    assert_eq!(stored.public_key_low, Some(alice));
    assert_eq!(stored.public_key_high, Some(bob));
}

async fn check_invalid_pair(store: &dyn KeyExchangeStore) {
    let key = KeyPair::generate().public_key_hex();
    assert_eq!(
        store.create(3, 3, &key).await,
        Err(StoreError::InvalidPair(3))
    );
    assert_eq!(store.get_by_users(3, 3).await, Err(StoreError::InvalidPair(3)));
}

#[tokio::test]
async fn test_memory_store_contract() {
    check_simultaneous_initiation(&InMemoryKeyExchangeStore::new()).await;
    check_canonical_ordering(&InMemoryKeyExchangeStore::new()).await;
    check_status_queries(&InMemoryKeyExchangeStore::new()).await;
    check_delete(&InMemoryKeyExchangeStore::new()).await;
    check_first_key_wins(&InMemoryKeyExchangeStore::new()).await;
    check_update(&InMemoryKeyExchangeStore::new()).await;
    check_update_cannot_regress(&InMemoryKeyExchangeStore::new()).await;
    check_invalid_pair(&InMemoryKeyExchangeStore::new()).await;
}

#[tokio::test]
async fn test_file_store_contract() {
    let dir = TempDir::new().unwrap();
    let open = |name: &str| FileKeyExchangeStore::open(dir.path().join(name));

    check_simultaneous_initiation(&open("a.json").await.unwrap()).await;
    check_canonical_ordering(&open("b.json").await.unwrap()).await;
    check_status_queries(&open("c.json").await.unwrap()).await;
    check_delete(&open("d.json").await.unwrap()).await;
    check_first_key_wins(&open("e.json").await.unwrap()).await;
    check_update(&open("f.json").await.unwrap()).await;
    check_invalid_pair(&open("g.json").await.unwrap()).await;
    check_update_cannot_regress(&open("h.json").await.unwrap()).await;
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exchanges.json");
    let alice = KeyPair::generate().public_key_hex();
    let bob = KeyPair::generate().public_key_hex();

    {
        let store = FileKeyExchangeStore::open(&path).await.unwrap();
        store.create(1, 2, &alice).await.unwrap();
        store.create(2, 1, &bob).await.unwrap();
    }

    let store = FileKeyExchangeStore::open(&path).await.unwrap();
    let record = store.get_by_users(2, 1).await.unwrap();
    assert!(record.is_active());
    assert_eq!(record.public_key_for(1), Some(&alice));
    assert_eq!(record.public_key_for(2), Some(&bob));
}

async fn check_concurrent_initiation(store: Arc<dyn KeyExchangeStore>) {
    let alice = KeyPair::generate().public_key_hex();
    let bob = KeyPair::generate().public_key_hex();

    let mut handles = Vec::new();
    for i in 0..50 {
        let store = Arc::clone(&store);
        let (caller, peer, key) = if i % 2 == 0 {
            (1, 2, alice.clone())
        } else {
            (2, 1, bob.clone())
        };
        handles.push(tokio::spawn(async move {
            store.create(caller, peer, &key).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    assert_eq!(store.count().await.unwrap(), 1);
    let record = store.get_by_users(1, 2).await.unwrap();
    assert_eq!(record.status, ExchangeStatus::Active);
    assert_eq!(record.public_key_low, Some(alice));
    assert_eq!(record.public_key_high, Some(bob));
}

#[tokio::test]
async fn test_concurrent_initiation_yields_one_record() {
    check_concurrent_initiation(Arc::new(InMemoryKeyExchangeStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_initiation_on_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exchanges.json");

    let store = FileKeyExchangeStore::open(&path).await.unwrap();
    check_concurrent_initiation(Arc::new(store)).await;

    // what reached disk matches what was served
    let reopened = FileKeyExchangeStore::open(&path).await.unwrap();
    assert_eq!(reopened.count().await.unwrap(), 1);
    assert!(reopened.get_by_users(2, 1).await.unwrap().is_active());
}
