//! Error taxonomy for authentication operations
//!
//! Every public operation resolves with a typed payload or fails with one
//! of these variants. `code()` exposes a stable machine-readable string for
//! hosts that surface errors across a serialization boundary; the Display
//! impl carries the human-readable message.

/// Errors from authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Credential errors
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("invalid two-factor code: {0}")]
    InvalidTwoFactorCode(String),

    #[error("invalid recovery code: {0}")]
    InvalidRecoveryCode(String),

    // Token errors
    #[error("access token invalid: {0}")]
    TokenInvalid(String),

    #[error("access token expired")]
    TokenExpired,

    #[error("refresh token rejected: {0}")]
    RefreshRejected(String),

    #[error("no refresh token available")]
    RefreshTokenMissing,

    // Ceremony errors
    #[error("passkeys unsupported on this platform: {0}")]
    PasskeyUnsupported(String),

    #[error("passkey ceremony cancelled")]
    CeremonyCancelled,

    #[error("passkey ceremony timed out")]
    CeremonyTimeout,

    #[error("credential already registered on this authenticator")]
    DuplicateCredential,

    #[error("passkey ceremony failed: {0}")]
    CeremonyFailed(String),

    // Flow-integrity errors
    #[error("oauth state missing, already used, or tampered")]
    OAuthStateInvalid,

    #[error("oauth state expired")]
    OAuthStateExpired,

    #[error("oauth provider mismatch: flow started with {started}, completed with {completed}")]
    OAuthProviderMismatch { started: String, completed: String },

    // Transport errors
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("server error ({status}): {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },

    // Local errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("not authenticated")]
    NotAuthenticated,
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredentials(_) => "invalid_credentials",
            Error::InvalidTwoFactorCode(_) => "invalid_2fa_code",
            Error::InvalidRecoveryCode(_) => "invalid_recovery_code",
            Error::TokenInvalid(_) => "token_invalid",
            Error::TokenExpired => "token_expired",
            Error::RefreshRejected(_) => "refresh_rejected",
            Error::RefreshTokenMissing => "refresh_token_missing",
            Error::PasskeyUnsupported(_) => "passkey_unsupported",
            Error::CeremonyCancelled => "ceremony_cancelled",
            Error::CeremonyTimeout => "ceremony_timeout",
            Error::DuplicateCredential => "duplicate_credential",
            Error::CeremonyFailed(_) => "ceremony_failed",
            Error::OAuthStateInvalid => "oauth_state_invalid",
            Error::OAuthStateExpired => "oauth_state_expired",
            Error::OAuthProviderMismatch { .. } => "oauth_provider_mismatch",
            Error::Timeout => "timeout",
            Error::Network(_) => "network_error",
            Error::Server { .. } => "server_error",
            Error::Storage(_) => "storage",
            Error::Decode(_) => "decode_error",
            Error::NotAuthenticated => "not_authenticated",
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::InvalidCredentials("x".into()).code(), "invalid_credentials");
        assert_eq!(Error::OAuthStateExpired.code(), "oauth_state_expired");
        assert_eq!(Error::Timeout.code(), "timeout");
        assert_eq!(
            Error::Server {
                status: 500,
                code: "internal".into(),
                message: "boom".into()
            }
            .code(),
            "server_error"
        );
    }

    #[test]
    fn provider_mismatch_names_both_providers() {
        let err = Error::OAuthProviderMismatch {
            started: "google".into(),
            completed: "github".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("google") && msg.contains("github"), "got: {msg}");
    }
}
