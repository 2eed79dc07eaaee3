// Version information for the Fabstir E2E chat crypto layer

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-secp256k1-key-exchange-2025-11-03";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Build date
pub const BUILD_DATE: &str = "2025-11-03";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "end-to-end-encryption",
    "ecdh-key-exchange",
    "secp256k1",
    "hkdf-sha256-session-keys",
    "xchacha20-poly1305",
    "canonical-pair-exchanges",
    "file-backed-exchange-store",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir E2E Chat {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info as JSON
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
