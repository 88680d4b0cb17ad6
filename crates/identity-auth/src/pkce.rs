//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used when initiating a
//! redirect-based OAuth flow. The verifier stays on this client, keyed by
//! the server-issued state, and is sent only during the final code
//! exchange; the challenge travels to the authorization server so it can
//! verify the exchange request came from the same party that initiated the
//! flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Generate a cryptographically random PKCE code verifier.
///
/// Produces a 64-byte random value encoded as URL-safe base64 (no padding),
/// 86 characters. RFC 7636 requires 43-128 characters from the unreserved
/// set; identity servers enforce the same bounds on the callback request,
/// so the length sits comfortably inside the window.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
///
/// The authorization server compares this against the challenge carried in
/// the authorize request to verify the code exchange is legitimate.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
