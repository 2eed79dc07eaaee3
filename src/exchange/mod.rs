// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key exchange orchestration between two users
//!
//! State machine observed per conversation: `pending` (one public key
//! published) → `active` (both published). There is no way back to
//! `pending`; key rotation is not modeled.

pub mod coordinator;
pub mod error;
pub mod session;

pub use coordinator::{CoordinatorConfig, ExchangeOutcome, KeyExchangeCoordinator};
pub use error::ExchangeError;
pub use session::ChatSession;
