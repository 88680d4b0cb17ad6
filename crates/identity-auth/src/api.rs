//! Remote identity-server operation surface
//!
//! One trait method per server operation from the engine's point of view.
//! The engine holds `Arc<dyn IdentityApi>` so tests can substitute fakes
//! that count calls and script responses; `RestClient` is the production
//! implementation. Methods use `Pin<Box<dyn Future>>` return types for
//! dyn-compatibility.
//!
//! Semantics the engine relies on:
//! - `login` returns either a full session or a temporary-token marker
//!   when a second factor is required.
//! - `refresh` failures are terminal for the session; the caller forces
//!   logout rather than retrying.
//! - `logout` is best-effort server-side revocation; callers proceed on
//!   failure.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{
    AssertionResult, AuthTokens, AuthenticationChallenge, LinkedAccount, LoginOutcome,
    LoginRequest, OAuthAuthorizeRequest, OAuthAuthorizeResponse, OAuthCallbackRequest,
    PasskeySummary, RecoveryCodes, RegisterOutcome, RegisterRequest, RegistrationChallenge,
    RegistrationResult, SessionPayload, TwoFactorSetup,
};

/// Boxed future alias for trait methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The fixed-shape remote operations the engine consumes.
pub trait IdentityApi: Send + Sync {
    // Core session
    fn login(&self, request: LoginRequest) -> ApiFuture<'_, LoginOutcome>;
    fn register(&self, request: RegisterRequest) -> ApiFuture<'_, RegisterOutcome>;
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> ApiFuture<'a, AuthTokens>;
    fn logout<'a>(&'a self, access: &'a str, refresh: &'a str) -> ApiFuture<'a, ()>;

    // OAuth (redirect-based third-party login)
    fn oauth_authorize<'a>(
        &'a self,
        provider: &'a str,
        request: OAuthAuthorizeRequest,
        access: Option<&'a str>,
    ) -> ApiFuture<'a, OAuthAuthorizeResponse>;
    fn oauth_callback<'a>(
        &'a self,
        provider: &'a str,
        request: OAuthCallbackRequest,
    ) -> ApiFuture<'a, SessionPayload>;
    fn oauth_link<'a>(
        &'a self,
        provider: &'a str,
        request: OAuthCallbackRequest,
        access: &'a str,
    ) -> ApiFuture<'a, LinkedAccount>;
    fn oauth_unlink<'a>(&'a self, provider: &'a str, access: &'a str) -> ApiFuture<'a, ()>;
    fn linked_accounts<'a>(&'a self, access: &'a str) -> ApiFuture<'a, Vec<LinkedAccount>>;

    // Passkeys
    fn passkey_register_begin<'a>(&'a self, access: &'a str)
    -> ApiFuture<'a, RegistrationChallenge>;
    fn passkey_register_complete<'a>(
        &'a self,
        access: &'a str,
        result: RegistrationResult,
        name: &'a str,
    ) -> ApiFuture<'a, PasskeySummary>;
    fn passkey_auth_begin<'a>(
        &'a self,
        email: Option<&'a str>,
    ) -> ApiFuture<'a, AuthenticationChallenge>;
    fn passkey_auth_complete(&self, result: AssertionResult) -> ApiFuture<'_, SessionPayload>;
    fn passkey_list<'a>(&'a self, access: &'a str) -> ApiFuture<'a, Vec<PasskeySummary>>;
    fn passkey_remove<'a>(&'a self, access: &'a str, passkey_id: &'a str) -> ApiFuture<'a, ()>;

    // Step-up second factor
    fn two_factor_setup_begin<'a>(&'a self, access: &'a str) -> ApiFuture<'a, TwoFactorSetup>;
    fn two_factor_setup_verify<'a>(
        &'a self,
        access: &'a str,
        code: &'a str,
    ) -> ApiFuture<'a, RecoveryCodes>;
    fn two_factor_verify_login<'a>(
        &'a self,
        temporary_token: &'a str,
        code: &'a str,
        is_recovery_code: bool,
    ) -> ApiFuture<'a, SessionPayload>;
    fn two_factor_disable<'a>(&'a self, access: &'a str, password: &'a str) -> ApiFuture<'a, ()>;
    fn two_factor_regenerate_recovery<'a>(
        &'a self,
        access: &'a str,
        password: &'a str,
    ) -> ApiFuture<'a, RecoveryCodes>;

    // Account maintenance
    fn change_password<'a>(
        &'a self,
        access: &'a str,
        current_password: &'a str,
        new_password: &'a str,
    ) -> ApiFuture<'a, ()>;
    fn password_reset_request<'a>(&'a self, email: &'a str) -> ApiFuture<'a, ()>;
    fn password_reset_confirm<'a>(
        &'a self,
        token: &'a str,
        new_password: &'a str,
    ) -> ApiFuture<'a, ()>;
    fn verify_email<'a>(&'a self, token: &'a str) -> ApiFuture<'a, ()>;
    fn resend_verification<'a>(&'a self, email: &'a str) -> ApiFuture<'a, ()>;
}
