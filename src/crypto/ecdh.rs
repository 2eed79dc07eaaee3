// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDH Key Agreement
//!
//! Static-static Elliptic Curve Diffie-Hellman over secp256k1. Each side
//! multiplies its own private scalar with the peer's public point; both
//! arrive at the same point and keep its x-coordinate as the shared secret.

use super::{CryptoError, KeyPair, PublicKeyHex};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Shared secret produced by ECDH (x-coordinate of the shared point)
///
/// Lives only in process memory and is zeroized on drop. Feed it to
/// [`derive_session_key`](super::derive_session_key) rather than using it
/// as a cipher key directly.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Raw 32-byte secret
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// SharedSecret does not implement Clone/Debug to prevent leakage.

/// Compute the ECDH shared secret between our key pair and a peer's public key
///
/// For any two key pairs `(dA, QA)` and `(dB, QB)`:
/// `compute_shared_secret(A, QB) == compute_shared_secret(B, QA)`.
///
/// # Errors
///
/// `CryptoError::InvalidKey` if the peer key does not decode to a valid
/// curve point.
pub fn compute_shared_secret(
    own: &KeyPair,
    peer_public: &PublicKeyHex,
) -> Result<SharedSecret, CryptoError> {
    let peer = peer_public.to_public_key().map_err(as_peer_key_error)?;

    // shared_point = peer_pub * own_secret
    let shared = k256::ecdh::diffie_hellman(own.secret().to_nonzero_scalar(), peer.as_affine());

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(shared.raw_secret_bytes());
    Ok(SharedSecret(bytes))
}

/// Same as [`compute_shared_secret`] but takes raw key material
///
/// `private_key` is the 32-byte scalar, `peer_public_hex` the wire encoding.
pub fn compute_shared_secret_raw(
    private_key: &[u8],
    peer_public_hex: &str,
) -> Result<SharedSecret, CryptoError> {
    let own = KeyPair::from_private_key(private_key)?;
    let peer = PublicKeyHex::parse(peer_public_hex).map_err(as_peer_key_error)?;
    compute_shared_secret(&own, &peer)
}

fn as_peer_key_error(err: CryptoError) -> CryptoError {
    match err {
        CryptoError::InvalidKey { reason, .. } => CryptoError::InvalidKey {
            key_type: "peer_public_key".to_string(),
            reason,
        },
        other => other,
    }
}
