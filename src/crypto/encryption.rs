// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Message Encryption (XChaCha20-Poly1305)
//!
//! Authenticated encryption for chat payloads. The Poly1305 tag makes a
//! wrong key or a tampered payload a detectable error instead of garbled
//! plaintext.
//!
//! **Ciphertext Format** (pinned on both ends, not self-describing):
//! ```text
//! base64_standard( nonce (24 bytes) | ciphertext | tag (16 bytes) )
//! ```
//!
//! A fresh random nonce is drawn for every message. Keys are always passed
//! in by the caller; nothing here holds key state.

use super::{CryptoError, SymmetricKey};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};

/// XChaCha20 nonce size in bytes
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag size in bytes
pub const TAG_LEN: usize = 16;

/// Decrypt data using XChaCha20-Poly1305 AEAD
///
/// # Arguments
///
/// * `ciphertext` - Encrypted data (includes authentication tag)
/// * `nonce` - 24-byte nonce used at encryption time
/// * `aad` - Additional authenticated data (can be empty)
/// * `key` - 32-byte encryption key
///
/// # Errors
///
/// Returns error if:
/// - Authentication tag verification fails (wrong key, tampered data, wrong AAD)
/// - Nonce size is not 24 bytes
/// - Key size is not 32 bytes
pub fn decrypt_with_aead(
    ciphertext: &[u8],
    nonce: &[u8],
    aad: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = build_cipher(nonce, key)?;
    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(XNonce::from_slice(nonce), payload)
        .map_err(|_| CryptoError::decryption_failed("aead_decrypt", "authentication tag mismatch"))
}

/// Encrypt data using XChaCha20-Poly1305 AEAD
///
/// Returns the ciphertext with the 16-byte authentication tag appended.
///
/// **CRITICAL**: Never reuse the same nonce with the same key.
pub fn encrypt_with_aead(
    plaintext: &[u8],
    nonce: &[u8],
    aad: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = build_cipher(nonce, key)?;
    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(XNonce::from_slice(nonce), payload)
        .map_err(|e| CryptoError::Other(format!("Encryption failed: {}", e)))
}

fn build_cipher(nonce: &[u8], key: &[u8]) -> Result<XChaCha20Poly1305, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::InvalidNonce {
            expected_size: NONCE_LEN,
            actual_size: nonce.len(),
        });
    }

    XChaCha20Poly1305::new_from_slice(key).map_err(|_| {
        CryptoError::invalid_key(
            "symmetric_key",
            format!("expected 32 bytes, got {}", key.len()),
        )
    })
}

/// Encrypt a UTF-8 message under a session key
pub fn encrypt_message(plaintext: &str, key: &SymmetricKey) -> Result<String, CryptoError> {
    encrypt_message_with_aad(plaintext, key, &[])
}

/// Decrypt a message produced by [`encrypt_message`]
///
/// # Errors
///
/// - `CryptoError::InvalidPayload` if the envelope is not valid base64 or is truncated
/// - `CryptoError::DecryptionFailed` on wrong key, tampering, or non-UTF-8 plaintext
pub fn decrypt_message(ciphertext: &str, key: &SymmetricKey) -> Result<String, CryptoError> {
    decrypt_message_with_aad(ciphertext, key, &[])
}

/// Encrypt a message, binding `aad` into the authentication tag
///
/// The same `aad` must be presented on decryption.
pub fn encrypt_message_with_aad(
    plaintext: &str,
    key: &SymmetricKey,
    aad: &[u8],
) -> Result<String, CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let sealed = encrypt_with_aead(plaintext.as_bytes(), &nonce, aad, key.as_bytes())?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + sealed.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&sealed);
    Ok(STANDARD.encode(envelope))
}

/// Decrypt a message produced by [`encrypt_message_with_aad`]
pub fn decrypt_message_with_aad(
    ciphertext: &str,
    key: &SymmetricKey,
    aad: &[u8],
) -> Result<String, CryptoError> {
    let envelope = STANDARD.decode(ciphertext.trim())?;

    if envelope.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::InvalidPayload {
            field: "ciphertext".to_string(),
            reason: format!(
                "expected at least {} bytes, got {}",
                NONCE_LEN + TAG_LEN,
                envelope.len()
            ),
        });
    }

    let (nonce, sealed) = envelope.split_at(NONCE_LEN);
    let plaintext = decrypt_with_aead(sealed, nonce, aad, key.as_bytes())
        .map_err(|_| CryptoError::decryption_failed("decrypt_message", "authentication tag mismatch"))?;

    String::from_utf8(plaintext).map_err(|e| {
        CryptoError::decryption_failed("decrypt_message", format!("plaintext is not valid UTF-8: {}", e))
    })
}
