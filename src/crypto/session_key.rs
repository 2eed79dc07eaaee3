// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Key Derivation
//!
//! Turns an ECDH shared secret into the 256-bit symmetric key used for
//! every message in a conversation. Derivation is HKDF-SHA256 with no salt
//! and a fixed info label, so both participants derive the identical key
//! from the identical secret.

use super::{CryptoError, SharedSecret};
use hkdf::Hkdf;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a symmetric session key in bytes
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// HKDF info label bound into every session key
pub const SESSION_KEY_INFO: &[u8] = b"fabstir-e2e-chat/session-key/v1";

/// 256-bit symmetric key for XChaCha20-Poly1305
///
/// Never persisted. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_LEN]);

impl SymmetricKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex key, with or without a `0x` prefix
    pub fn from_hex(input: &str) -> Result<Self, CryptoError> {
        let trimmed = input.trim();
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_str)?;

        if bytes.len() != SYMMETRIC_KEY_LEN {
            return Err(CryptoError::invalid_key(
                "symmetric_key",
                format!(
                    "expected {} bytes, got {}",
                    SYMMETRIC_KEY_LEN,
                    bytes.len()
                ),
            ));
        }

        let mut key = [0u8; SYMMETRIC_KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    /// Hex encoding of the key (for operator tooling only)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Derive the conversation key from an ECDH shared secret
pub fn derive_session_key(shared_secret: &SharedSecret) -> Result<SymmetricKey, CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret.as_bytes());
    let mut derived = [0u8; SYMMETRIC_KEY_LEN];
    hkdf.expand(SESSION_KEY_INFO, &mut derived)
        .map_err(|e| CryptoError::KeyDerivationFailed {
            operation: "derive_session_key".to_string(),
            reason: format!("HKDF expansion failed: {}", e),
        })?;

    Ok(SymmetricKey(derived))
}
