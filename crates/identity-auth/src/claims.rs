//! Unverified access-token claim parsing
//!
//! The refresh scheduler needs the `exp` claim out of the access token to
//! know when to renew. The signature is NOT checked — verification is the
//! server's job, and nothing here is an authorization decision. The parsed
//! expiry drives timer arithmetic and nothing else.
//!
//! A token whose payload cannot be decoded, or that carries no `exp`
//! claim, reports no expiry; the scheduler treats that as already expired
//! and refreshes immediately.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::time::{SystemTime, UNIX_EPOCH};

/// Extract the `exp` claim (unix seconds) from a JWT-shaped access token.
///
/// Returns None for anything that isn't three dot-separated segments with a
/// base64url JSON payload carrying a numeric `exp`.
pub fn expires_at(token: &str) -> Option<u64> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;
    // A JWT has exactly header.payload.signature
    segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    // Tolerate padded encoders: base64url payloads are unpadded per the
    // JWS spec, but strip '=' rather than reject
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    claims.get("exp")?.as_u64()
}

/// Whether the token is expired (or unparseable, which counts as expired)
/// at the given unix-seconds instant.
pub fn is_expired_at(token: &str, now_secs: u64) -> bool {
    match expires_at(token) {
        Some(exp) => exp <= now_secs,
        None => true,
    }
}

/// Whether the token is expired right now.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_unix_secs())
}

/// Current wall-clock time as unix seconds.
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
