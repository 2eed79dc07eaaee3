// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key pair generation and public key wire format

use fabstir_e2e_chat::crypto::{CryptoError, KeyPair, PublicKeyHex};

#[test]
fn test_generated_public_key_is_uncompressed_hex() {
    let key_pair = KeyPair::generate();
    let public = key_pair.public_key_hex();

    assert_eq!(public.as_str().len(), 130);
    assert!(public.as_str().starts_with("04"));
    assert!(public
        .as_str()
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_generated_keys_are_distinct() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    assert_ne!(*a.private_key_bytes(), *b.private_key_bytes());
    assert_ne!(a.public_key_hex(), b.public_key_hex());
}

#[test]
fn test_restore_from_private_key_gives_same_public_key() {
    let original = KeyPair::generate();
    let restored = KeyPair::from_private_key(original.private_key_bytes().as_slice()).unwrap();
    assert_eq!(restored.public_key_hex(), original.public_key_hex());

    let from_hex =
        KeyPair::from_private_key_hex(&format!("0x{}", hex::encode(original.private_key_bytes().as_slice())))
            .unwrap();
    assert_eq!(from_hex.public_key_hex(), original.public_key_hex());
}

#[test]
fn test_private_key_one_maps_to_generator() {
    let mut scalar = [0u8; 32];
    scalar[31] = 1;
    let key_pair = KeyPair::from_private_key(&scalar).unwrap();

    // secp256k1 generator point G
    let expected = concat!(
        "04",
        "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8"
    );
    assert_eq!(key_pair.public_key_hex().as_str(), expected);
}

#[test]
fn test_invalid_private_keys_rejected() {
    let zero = [0u8; 32];
    let short = [1u8; 31];
    let order_or_above = [0xffu8; 32];

    for bytes in [&zero[..], &short[..], &order_or_above[..]] {
        match KeyPair::from_private_key(bytes) {
            Err(CryptoError::InvalidKey { key_type, .. }) => assert_eq!(key_type, "private_key"),
            other => panic!("expected InvalidKey, got {:?}", other),
        }
    }

    assert!(KeyPair::from_private_key_hex("not hex").is_err());
}

#[test]
fn test_public_key_parse_normalizes_case_and_prefix() {
    let key_pair = KeyPair::generate();
    let canonical = key_pair.public_key_hex();

    let shouted = format!("0x{}", canonical.as_str().to_uppercase());
    let parsed: PublicKeyHex = shouted.parse().unwrap();
    assert_eq!(parsed, canonical);
}

#[test]
fn test_public_key_parse_rejects_bad_input() {
    let key_pair = KeyPair::generate();
    let valid = key_pair.public_key_hex().as_str().to_string();

    // compressed form
    let compressed = format!("02{}", &valid[2..66]);
    assert!(PublicKeyHex::parse(&compressed).is_err());

    // wrong tag
    let wrong_tag = format!("05{}", &valid[2..]);
    assert!(PublicKeyHex::parse(&wrong_tag).is_err());

    // off-curve point: flip the last y byte
    let mut off_curve = valid.clone();
    let last = if off_curve.ends_with('0') { "1" } else { "0" };
    off_curve.replace_range(129..130, last);
    assert!(PublicKeyHex::parse(&off_curve).is_err());

    assert!(PublicKeyHex::parse("").is_err());
    assert!(PublicKeyHex::parse(&"zz".repeat(65)).is_err());
}

#[test]
fn test_public_key_serde_uses_plain_string() {
    let key_pair = KeyPair::generate();
    let public = key_pair.public_key_hex();

    let json = serde_json::to_string(&public).unwrap();
    assert_eq!(json, format!("\"{}\"", public.as_str()));

    let back: PublicKeyHex = serde_json::from_str(&json).unwrap();
    assert_eq!(back, public);

    assert!(serde_json::from_str::<PublicKeyHex>("\"04abcd\"").is_err());
}

#[test]
fn test_key_pair_debug_redacts_private_key() {
    let key_pair = KeyPair::generate();
    let debug = format!("{:?}", key_pair);
    assert!(debug.contains("<redacted>"));
    assert!(!debug.contains(&hex::encode(key_pair.private_key_bytes().as_slice())));
}
