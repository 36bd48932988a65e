//! Static fixtures.
//!
//! The key files are throwaway keys generated for tests only.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value, json};

/// Service-account key document with a PKCS#8 RSA private key.
pub const SERVICE_ACCOUNT_KEY: &str = include_str!("../testdata/fake-sa-key.json");

/// Unencrypted OpenSSH ed25519 private key.
pub const ED25519_KEY: &str = include_str!("../testdata/id_ed25519");

/// PKCS#1 RSA private key.
pub const RSA_PKCS1_KEY: &str = include_str!("../testdata/id_rsa.pem");

/// Unix time of [`fixed_time`].
pub const FIXED_TIMESTAMP: i64 = 1_709_296_200;

/// 2024-03-01T12:30:00Z
pub fn fixed_time() -> DateTime<Utc> {
    Utc.timestamp_opt(FIXED_TIMESTAMP, 0).unwrap()
}

/// A builder entry that resolves without warnings or errors.
///
/// Authenticates with a token and boots from an image id.
pub fn base_config() -> Map<String, Value> {
    let value = json!({
        "token": "test_token",
        "folder_id": "hashicorp",
        "source_image_id": "foo",
        "ssh_username": "root",
        "image_family": "bar",
        "image_product_ids": ["test-license"],
        "zone": "ru-central1-a",
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}
