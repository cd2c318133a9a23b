//! Token helpers shared by unit tests.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

pub(crate) const TEST_SECRET: &str = "unit-test-secret-0123456789abcdefghij";

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub(crate) fn sign_token(claims: serde_json::Value) -> String {
    sign_token_with(Algorithm::HS256, TEST_SECRET, claims)
}

pub(crate) fn sign_token_with(alg: Algorithm, secret: &str, claims: serde_json::Value) -> String {
    encode(
        &Header::new(alg),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap_or_default()
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
