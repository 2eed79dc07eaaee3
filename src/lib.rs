// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod crypto;
pub mod exchange;
pub mod store;
pub mod version;

// Re-export the types a chat client needs to get from key pair to session
pub use config::{ChatCryptoConfig, KeyExchangeSettings};
pub use crypto::{CryptoError, KeyPair, PublicKeyHex, SharedSecret, SymmetricKey};
pub use exchange::{
    ChatSession, CoordinatorConfig, ExchangeError, ExchangeOutcome, KeyExchangeCoordinator,
};
pub use store::{
    CanonicalPair, ExchangeStatus, FileKeyExchangeStore, InMemoryKeyExchangeStore, KeyExchange,
    KeyExchangeStore, StoreError, UserId,
};
