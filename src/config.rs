// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the key exchange layer
//!
//! Loaded from a TOML file and then overridden from the environment:
//!
//! ```toml
//! [key_exchange]
//! store_path = "./data/key_exchanges.json"
//! max_retries = 3
//! retry_backoff_ms = 200
//! poll_interval_ms = 1000
//! activation_timeout_secs = 60
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `E2E_STORE_PATH` | `store_path` |
//! | `E2E_MAX_RETRIES` | `max_retries` |
//! | `E2E_RETRY_BACKOFF_MS` | `retry_backoff_ms` |
//! | `E2E_POLL_INTERVAL_MS` | `poll_interval_ms` |
//! | `E2E_ACTIVATION_TIMEOUT_SECS` | `activation_timeout_secs` |

use crate::exchange::CoordinatorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// `[key_exchange]` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyExchangeSettings {
    /// JSON snapshot for the file-backed store; in-memory when unset
    pub store_path: Option<PathBuf>,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub poll_interval_ms: u64,
    pub activation_timeout_secs: u64,
}

impl Default for KeyExchangeSettings {
    fn default() -> Self {
        Self {
            store_path: None,
            max_retries: 3,
            retry_backoff_ms: 200,
            poll_interval_ms: 1000,
            activation_timeout_secs: 60,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatCryptoConfig {
    pub key_exchange: KeyExchangeSettings,
}

impl ChatCryptoConfig {
    /// Parse configuration from TOML text; missing sections take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse key exchange configuration")
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `E2E_*` environment variables
    pub fn apply_env(&mut self) {
        let settings = &mut self.key_exchange;

        if let Ok(val) = std::env::var("E2E_STORE_PATH") {
            if !val.trim().is_empty() {
                settings.store_path = Some(PathBuf::from(val.trim()));
            }
        }
        override_number("E2E_MAX_RETRIES", &mut settings.max_retries);
        override_number("E2E_RETRY_BACKOFF_MS", &mut settings.retry_backoff_ms);
        override_number("E2E_POLL_INTERVAL_MS", &mut settings.poll_interval_ms);
        override_number(
            "E2E_ACTIVATION_TIMEOUT_SECS",
            &mut settings.activation_timeout_secs,
        );
    }

    /// Retry and polling settings for the coordinator
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let settings = &self.key_exchange;
        CoordinatorConfig {
            max_retries: settings.max_retries,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            activation_timeout: Duration::from_secs(settings.activation_timeout_secs),
        }
    }
}

fn override_number<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(val) = std::env::var(var) {
        match val.trim().parse() {
            Ok(num) => *target = num,
            Err(_) => warn!("Ignoring {}={:?}: not a valid number", var, val),
        }
    }
}
