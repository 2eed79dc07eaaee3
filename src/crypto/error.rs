// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Error type for every cryptographic operation in the chat layer, with
//! enough context to tell which key or which step failed.
//!
//! ## Error Variants
//!
//! - **InvalidKey**: malformed private scalar or public point (wrong size, off-curve, zero)
//! - **DecryptionFailed**: AEAD tag mismatch (wrong key, tampered ciphertext, wrong context)
//! - **KeyDerivationFailed**: ECDH or HKDF failure
//! - **InvalidNonce**: nonce of the wrong size handed to the AEAD layer
//! - **InvalidPayload**: ciphertext envelope could not be decoded (bad base64, truncated)
//! - **Other**: unexpected library failure
//!
//! Cryptographic failures are deterministic: retrying with the same inputs
//! produces the same error, so callers never retry them.

use std::fmt;

/// Error type for key handling, key agreement and message encryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid cryptographic key
    ///
    /// Raised when a private key is not a valid secp256k1 scalar, or a public
    /// key does not decode to a point on the curve.
    InvalidKey {
        /// Type of key that failed (e.g., "private_key", "peer_public_key")
        key_type: String,
        /// Specific failure reason
        reason: String,
    },

    /// AEAD decryption failed
    ///
    /// The ciphertext was not produced under this key (or this context), or
    /// it was modified in transit. Plaintext is never returned in this case.
    DecryptionFailed {
        /// Which operation was being performed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Key derivation failed (ECDH or HKDF)
    KeyDerivationFailed {
        /// Which key derivation operation failed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Invalid nonce size
    ///
    /// XChaCha20-Poly1305 requires exactly 24-byte nonces.
    InvalidNonce {
        /// Expected nonce size (always 24 for XChaCha20)
        expected_size: usize,
        /// Actual nonce size provided
        actual_size: usize,
    },

    /// Ciphertext envelope validation failed
    InvalidPayload {
        /// Which field failed validation
        field: String,
        /// Specific failure reason
        reason: String,
    },

    /// Generic error for library errors or unexpected failures
    Other(String),
}

impl CryptoError {
    pub(crate) fn invalid_key(key_type: &str, reason: impl Into<String>) -> Self {
        CryptoError::InvalidKey {
            key_type: key_type.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decryption_failed(operation: &str, reason: impl Into<String>) -> Self {
        CryptoError::DecryptionFailed {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKey { key_type, reason } => {
                write!(f, "Invalid key ({}): {}", key_type, reason)
            }
            CryptoError::DecryptionFailed { operation, reason } => {
                write!(f, "Decryption failed during {}: {}", operation, reason)
            }
            CryptoError::KeyDerivationFailed { operation, reason } => {
                write!(f, "Key derivation failed during {}: {}", operation, reason)
            }
            CryptoError::InvalidNonce {
                expected_size,
                actual_size,
            } => {
                write!(
                    f,
                    "Invalid nonce size: expected {} bytes, got {} bytes",
                    expected_size, actual_size
                )
            }
            CryptoError::InvalidPayload { field, reason } => {
                write!(f, "Invalid payload field '{}': {}", field, reason)
            }
            CryptoError::Other(msg) => {
                write!(f, "Crypto error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CryptoError {}

// Conversion from hex decode errors
impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::InvalidKey {
            key_type: "hex_key".to_string(),
            reason: format!("hex decode error: {}", err),
        }
    }
}

// Conversion from base64 decode errors (ciphertext envelope)
impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::InvalidPayload {
            field: "ciphertext".to_string(),
            reason: format!("base64 decode error: {}", err),
        }
    }
}

// Conversion from k256 errors (elliptic curve operations)
impl From<k256::elliptic_curve::Error> for CryptoError {
    fn from(err: k256::elliptic_curve::Error) -> Self {
        CryptoError::InvalidKey {
            key_type: "unknown".to_string(),
            reason: format!("k256 error: {}", err),
        }
    }
}

// Conversion from chacha20poly1305 errors
impl From<chacha20poly1305::aead::Error> for CryptoError {
    fn from(err: chacha20poly1305::aead::Error) -> Self {
        CryptoError::DecryptionFailed {
            operation: "AEAD".to_string(),
            reason: format!("chacha20poly1305 error: {}", err),
        }
    }
}
