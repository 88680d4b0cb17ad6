//! Identity-server client library
//!
//! Provides the building blocks the session engine composes: PKCE verifier
//! and challenge generation, unverified token-claim parsing for refresh
//! scheduling, the remote operation surface (`IdentityApi` trait plus the
//! reqwest-backed `RestClient`), the error taxonomy with stable machine
//! codes, and the pluggable Credential Store with its cross-context change
//! notification. This crate is a standalone library with no dependency on
//! the session engine — it can be tested and used independently.
//!
//! Credential flow:
//! 1. Engine calls `pkce::generate_verifier()` + `pkce::compute_challenge()`
//! 2. Server issues an authorization URL + opaque state via
//!    `IdentityApi::oauth_authorize`
//! 3. Engine completes via `IdentityApi::oauth_callback` with the verifier
//! 4. Tokens stored via `storage::CredentialStore::store_tokens()`
//! 5. Scheduler reads `claims::expires_at()` and calls `IdentityApi::refresh`

pub mod api;
pub mod claims;
pub mod error;
pub mod pkce;
pub mod rest;
pub mod storage;
pub mod types;

pub use api::{ApiFuture, IdentityApi};
pub use error::{Error, Result};
pub use pkce::{compute_challenge, generate_verifier};
pub use rest::{DEFAULT_TIMEOUT, RestClient};
pub use storage::{
    CookieAttributes, CookieJar, CookieStorage, CredentialStore, FileStorage, MemoryStorage,
    SameSite, StorageBackend, StorageChange, StorageEvents, StorageHub, TabStorage, keys,
};
pub use types::{
    AuthTokens, LinkedAccount, LoginOutcome, LoginRequest, OAuthAuthorizeRequest,
    OAuthAuthorizeResponse, OAuthCallbackRequest, OAuthMode, PasskeySummary, RecoveryCodes,
    RegisterOutcome, RegisterRequest, SessionPayload, TwoFactorSetup, User,
};
