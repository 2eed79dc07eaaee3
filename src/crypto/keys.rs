// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! secp256k1 Key Pairs
//!
//! Generates and restores the per-device key pair used for the chat key
//! exchange, and defines the public key wire encoding shared with the
//! server.
//!
//! ## Wire Format
//!
//! Public keys travel as the uncompressed SEC1 point (`0x04 || X || Y`,
//! 65 bytes) hex-encoded in lowercase without a prefix, so every encoded
//! key is exactly 130 characters. Parsing accepts an optional `0x` prefix
//! and either letter case, and always re-encodes canonically.
//!
//! ## Security Considerations
//!
//! - The private scalar never leaves the device and is never serialized here
//! - `k256::SecretKey` zeroizes its memory on drop
//! - `Debug` output of a [`KeyPair`] redacts the private key

use super::CryptoError;
use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Length of a raw private scalar in bytes
pub const PRIVATE_KEY_LEN: usize = 32;

/// Length of an uncompressed SEC1 public key in bytes
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of a hex-encoded uncompressed public key
pub const PUBLIC_KEY_HEX_LEN: usize = PUBLIC_KEY_LEN * 2;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// Hex-encoded uncompressed secp256k1 public key
///
/// Construction always validates that the point lies on the curve, so a
/// `PublicKeyHex` held anywhere in the crate is known to be usable for ECDH.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKeyHex(String);

impl PublicKeyHex {
    /// Parse and validate a hex-encoded uncompressed public key
    pub fn parse(input: &str) -> Result<Self, CryptoError> {
        let trimmed = input.trim();
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        if hex_str.len() != PUBLIC_KEY_HEX_LEN {
            return Err(CryptoError::invalid_key(
                "public_key",
                format!(
                    "expected {} hex characters, got {}",
                    PUBLIC_KEY_HEX_LEN,
                    hex_str.len()
                ),
            ));
        }

        let bytes = hex::decode(hex_str).map_err(|e| {
            CryptoError::invalid_key("public_key", format!("hex decode error: {}", e))
        })?;
        let public = decode_uncompressed(&bytes)?;
        Ok(Self::from_public_key(&public))
    }

    pub(crate) fn from_public_key(public: &PublicKey) -> Self {
        Self(hex::encode(public.to_encoded_point(false).as_bytes()))
    }

    /// Decode into a curve point
    pub fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        let bytes = hex::decode(&self.0)?;
        decode_uncompressed(&bytes)
    }

    /// The canonical hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn fingerprint(&self) -> &str {
        // skip the 04 tag so different keys produce different prefixes
        &self.0[2..18]
    }
}

impl fmt::Display for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyHex({}…)", self.fingerprint())
    }
}

impl FromStr for PublicKeyHex {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PublicKeyHex {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PublicKeyHex> for String {
    fn from(value: PublicKeyHex) -> Self {
        value.0
    }
}

fn decode_uncompressed(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.len() != PUBLIC_KEY_LEN || bytes[0] != UNCOMPRESSED_TAG {
        return Err(CryptoError::invalid_key(
            "public_key",
            format!(
                "expected {}-byte uncompressed SEC1 point, got {} bytes",
                PUBLIC_KEY_LEN,
                bytes.len()
            ),
        ));
    }

    PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| CryptoError::invalid_key("public_key", "point is not on secp256k1"))
}

/// A device's secp256k1 key pair
///
/// Immutable once built; pass it by reference to every operation that
/// needs it instead of storing it inside a service.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair from OS entropy
    ///
    /// The private scalar is sampled uniformly from `[1, n)`. An entropy
    /// source failure aborts inside the RNG and is not recoverable.
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Restore a key pair from a previously generated 32-byte scalar
    ///
    /// # Errors
    ///
    /// `CryptoError::InvalidKey` when the input is not 32 bytes, is zero, or
    /// is not below the curve order.
    pub fn from_private_key(bytes: &[u8]) -> Result<Self, CryptoError> {
        // SecretKey::from_slice left-pads short input, so pin the length here
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(CryptoError::invalid_key(
                "private_key",
                format!(
                    "expected {} bytes, got {}",
                    PRIVATE_KEY_LEN,
                    bytes.len()
                ),
            ));
        }

        let secret = SecretKey::from_slice(bytes).map_err(|_| {
            CryptoError::invalid_key("private_key", "not a valid secp256k1 scalar")
        })?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Restore a key pair from a hex scalar, with or without a `0x` prefix
    pub fn from_private_key_hex(input: &str) -> Result<Self, CryptoError> {
        let trimmed = input.trim();
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_str).map_err(|e| {
            CryptoError::invalid_key("private_key", format!("hex decode error: {}", e))
        })?;
        Self::from_private_key(&bytes)
    }

    /// Raw private scalar, for device-local persistence only
    ///
    /// The copy is wiped when the returned buffer is dropped.
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
        let mut out = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Public key in the server wire encoding
    pub fn public_key_hex(&self) -> PublicKeyHex {
        PublicKeyHex::from_public_key(&self.public)
    }

    /// Public key as a curve point
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .field("private_key", &"<redacted>")
            .finish()
    }
}
