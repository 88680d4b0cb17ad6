//! Shared fakes for engine tests: a scripted `IdentityApi` and a scripted
//! platform `Authenticator`. Responses are queued per operation; an
//! unscripted call fails loudly so a test never silently exercises the
//! wrong path.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use identity_auth::api::{ApiFuture, IdentityApi};
use identity_auth::error::{Error, Result};
use identity_auth::types::{
    AssertionResult, AuthTokens, AuthenticationChallenge, CredParam, LinkedAccount, LoginOutcome,
    LoginRequest, OAuthAuthorizeRequest, OAuthAuthorizeResponse, OAuthCallbackRequest,
    PasskeySummary, RecoveryCodes, RegisterOutcome, RegisterRequest, RegistrationChallenge,
    RegistrationResult, RpEntity, SessionPayload, TwoFactorSetup, UserEntity,
};
use platform::{
    AssertionRequest, Authenticator, CreatedCredential, CredentialAssertion,
    CredentialCreationRequest,
};

/// Unsigned JWT-shaped token carrying only an `exp` claim.
pub fn token_with_exp(exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#).as_bytes());
    format!("{header}.{payload}.sig")
}

pub fn tokens_with_exp(exp: u64) -> AuthTokens {
    AuthTokens {
        access_token: token_with_exp(exp),
        refresh_token: Some(format!("rt_{exp}")),
        token_type: "bearer".into(),
        expires_in: None,
    }
}

pub fn sample_user(id: &str) -> identity_auth::types::User {
    identity_auth::types::User {
        id: id.into(),
        email: format!("{id}@example.com"),
        email_verified: true,
        username: None,
        display_name: None,
        two_factor_enabled: false,
    }
}

pub fn session_payload(user_id: &str, exp: u64) -> SessionPayload {
    SessionPayload {
        user: sample_user(user_id),
        tokens: tokens_with_exp(exp),
    }
}

pub fn registration_challenge() -> RegistrationChallenge {
    RegistrationChallenge {
        challenge: URL_SAFE_NO_PAD.encode(b"reg-challenge"),
        rp: RpEntity {
            id: "app.example.com".into(),
            name: "Example".into(),
        },
        user: UserEntity {
            id: URL_SAFE_NO_PAD.encode(b"u-1"),
            name: "u-1@example.com".into(),
            display_name: "User One".into(),
        },
        pub_key_cred_params: vec![CredParam {
            alg: -7,
            cred_type: "public-key".into(),
        }],
        exclude_credentials: Vec::new(),
        authenticator_selection: None,
        timeout: Some(60_000),
    }
}

pub fn authentication_challenge() -> AuthenticationChallenge {
    AuthenticationChallenge {
        challenge: URL_SAFE_NO_PAD.encode(b"auth-challenge"),
        rp_id: "app.example.com".into(),
        allow_credentials: Vec::new(),
        user_verification: Some("preferred".into()),
        timeout: Some(60_000),
    }
}

fn pop<T>(queue: &Mutex<VecDeque<Result<T>>>, op: &str) -> Result<T> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(Error::Network(format!("fake: unscripted call to {op}"))))
}

/// Scripted identity server.
#[derive(Default)]
pub struct FakeApi {
    refresh_count: AtomicUsize,
    logout_count: AtomicUsize,
    refresh_delay: Mutex<Option<Duration>>,

    login_queue: Mutex<VecDeque<Result<LoginOutcome>>>,
    register_queue: Mutex<VecDeque<Result<RegisterOutcome>>>,
    refresh_queue: Mutex<VecDeque<Result<AuthTokens>>>,
    oauth_authorize_queue: Mutex<VecDeque<Result<OAuthAuthorizeResponse>>>,
    oauth_callback_queue: Mutex<VecDeque<Result<SessionPayload>>>,
    oauth_link_queue: Mutex<VecDeque<Result<LinkedAccount>>>,
    linked_accounts_queue: Mutex<VecDeque<Result<Vec<LinkedAccount>>>>,
    passkey_register_begin_queue: Mutex<VecDeque<Result<RegistrationChallenge>>>,
    passkey_register_complete_queue: Mutex<VecDeque<Result<PasskeySummary>>>,
    passkey_auth_begin_queue: Mutex<VecDeque<Result<AuthenticationChallenge>>>,
    passkey_auth_complete_queue: Mutex<VecDeque<Result<SessionPayload>>>,
    passkey_list_queue: Mutex<VecDeque<Result<Vec<PasskeySummary>>>>,
    setup_begin_queue: Mutex<VecDeque<Result<TwoFactorSetup>>>,
    recovery_codes_queue: Mutex<VecDeque<Result<RecoveryCodes>>>,
    verify_login_queue: Mutex<VecDeque<Result<SessionPayload>>>,

    pub last_login: Mutex<Option<LoginRequest>>,
    pub last_oauth_authorize: Mutex<Option<(String, OAuthAuthorizeRequest, Option<String>)>>,
    pub last_oauth_callback: Mutex<Option<(String, OAuthCallbackRequest)>>,
    pub last_oauth_link: Mutex<Option<(String, OAuthCallbackRequest, String)>>,
    pub last_verify_login: Mutex<Option<(String, String, bool)>>,
    pub last_register_complete: Mutex<Option<(RegistrationResult, String)>>,
    pub last_auth_complete: Mutex<Option<AssertionResult>>,
}

impl FakeApi {
    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.logout_count.load(Ordering::SeqCst)
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = Some(delay);
    }

    pub fn push_login(&self, outcome: Result<LoginOutcome>) {
        self.login_queue.lock().unwrap().push_back(outcome);
    }

    pub fn push_register(&self, outcome: Result<RegisterOutcome>) {
        self.register_queue.lock().unwrap().push_back(outcome);
    }

    pub fn push_refresh(&self, tokens: Result<AuthTokens>) {
        self.refresh_queue.lock().unwrap().push_back(tokens);
    }

    pub fn push_oauth_authorize(&self, response: Result<OAuthAuthorizeResponse>) {
        self.oauth_authorize_queue.lock().unwrap().push_back(response);
    }

    pub fn push_oauth_callback(&self, payload: Result<SessionPayload>) {
        self.oauth_callback_queue.lock().unwrap().push_back(payload);
    }

    pub fn push_oauth_link(&self, account: Result<LinkedAccount>) {
        self.oauth_link_queue.lock().unwrap().push_back(account);
    }

    pub fn push_linked_accounts(&self, accounts: Result<Vec<LinkedAccount>>) {
        self.linked_accounts_queue.lock().unwrap().push_back(accounts);
    }

    pub fn push_passkey_register_begin(&self, challenge: Result<RegistrationChallenge>) {
        self.passkey_register_begin_queue
            .lock()
            .unwrap()
            .push_back(challenge);
    }

    pub fn push_passkey_register_complete(&self, summary: Result<PasskeySummary>) {
        self.passkey_register_complete_queue
            .lock()
            .unwrap()
            .push_back(summary);
    }

    pub fn push_passkey_auth_begin(&self, challenge: Result<AuthenticationChallenge>) {
        self.passkey_auth_begin_queue
            .lock()
            .unwrap()
            .push_back(challenge);
    }

    pub fn push_passkey_auth_complete(&self, payload: Result<SessionPayload>) {
        self.passkey_auth_complete_queue
            .lock()
            .unwrap()
            .push_back(payload);
    }

    pub fn push_passkey_list(&self, passkeys: Result<Vec<PasskeySummary>>) {
        self.passkey_list_queue.lock().unwrap().push_back(passkeys);
    }

    pub fn push_setup_begin(&self, setup: Result<TwoFactorSetup>) {
        self.setup_begin_queue.lock().unwrap().push_back(setup);
    }

    pub fn push_recovery_codes(&self, codes: Result<RecoveryCodes>) {
        self.recovery_codes_queue.lock().unwrap().push_back(codes);
    }

    pub fn push_verify_login(&self, payload: Result<SessionPayload>) {
        self.verify_login_queue.lock().unwrap().push_back(payload);
    }
}

impl IdentityApi for FakeApi {
    fn login(&self, request: LoginRequest) -> ApiFuture<'_, LoginOutcome> {
        *self.last_login.lock().unwrap() = Some(request);
        Box::pin(async move { pop(&self.login_queue, "login") })
    }

    fn register(&self, _request: RegisterRequest) -> ApiFuture<'_, RegisterOutcome> {
        Box::pin(async move { pop(&self.register_queue, "register") })
    }

    fn refresh<'a>(&'a self, _refresh_token: &'a str) -> ApiFuture<'a, AuthTokens> {
        Box::pin(async move {
            let delay = *self.refresh_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.refresh_count.fetch_add(1, Ordering::SeqCst);
            pop(&self.refresh_queue, "refresh")
        })
    }

    fn logout<'a>(&'a self, _access: &'a str, _refresh: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.logout_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn oauth_authorize<'a>(
        &'a self,
        provider: &'a str,
        request: OAuthAuthorizeRequest,
        access: Option<&'a str>,
    ) -> ApiFuture<'a, OAuthAuthorizeResponse> {
        *self.last_oauth_authorize.lock().unwrap() =
            Some((provider.into(), request, access.map(String::from)));
        Box::pin(async move { pop(&self.oauth_authorize_queue, "oauth_authorize") })
    }

    fn oauth_callback<'a>(
        &'a self,
        provider: &'a str,
        request: OAuthCallbackRequest,
    ) -> ApiFuture<'a, SessionPayload> {
        *self.last_oauth_callback.lock().unwrap() = Some((provider.into(), request));
        Box::pin(async move { pop(&self.oauth_callback_queue, "oauth_callback") })
    }

    fn oauth_link<'a>(
        &'a self,
        provider: &'a str,
        request: OAuthCallbackRequest,
        access: &'a str,
    ) -> ApiFuture<'a, LinkedAccount> {
        *self.last_oauth_link.lock().unwrap() = Some((provider.into(), request, access.into()));
        Box::pin(async move { pop(&self.oauth_link_queue, "oauth_link") })
    }

    fn oauth_unlink<'a>(&'a self, _provider: &'a str, _access: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn linked_accounts<'a>(&'a self, _access: &'a str) -> ApiFuture<'a, Vec<LinkedAccount>> {
        Box::pin(async move { pop(&self.linked_accounts_queue, "linked_accounts") })
    }

    fn passkey_register_begin<'a>(
        &'a self,
        _access: &'a str,
    ) -> ApiFuture<'a, RegistrationChallenge> {
        Box::pin(async move { pop(&self.passkey_register_begin_queue, "passkey_register_begin") })
    }

    fn passkey_register_complete<'a>(
        &'a self,
        _access: &'a str,
        result: RegistrationResult,
        name: &'a str,
    ) -> ApiFuture<'a, PasskeySummary> {
        *self.last_register_complete.lock().unwrap() = Some((result, name.into()));
        Box::pin(async move {
            pop(
                &self.passkey_register_complete_queue,
                "passkey_register_complete",
            )
        })
    }

    fn passkey_auth_begin<'a>(
        &'a self,
        _email: Option<&'a str>,
    ) -> ApiFuture<'a, AuthenticationChallenge> {
        Box::pin(async move { pop(&self.passkey_auth_begin_queue, "passkey_auth_begin") })
    }

    fn passkey_auth_complete(&self, result: AssertionResult) -> ApiFuture<'_, SessionPayload> {
        *self.last_auth_complete.lock().unwrap() = Some(result);
        Box::pin(async move { pop(&self.passkey_auth_complete_queue, "passkey_auth_complete") })
    }

    fn passkey_list<'a>(&'a self, _access: &'a str) -> ApiFuture<'a, Vec<PasskeySummary>> {
        Box::pin(async move { pop(&self.passkey_list_queue, "passkey_list") })
    }

    fn passkey_remove<'a>(&'a self, _access: &'a str, _passkey_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn two_factor_setup_begin<'a>(&'a self, _access: &'a str) -> ApiFuture<'a, TwoFactorSetup> {
        Box::pin(async move { pop(&self.setup_begin_queue, "two_factor_setup_begin") })
    }

    fn two_factor_setup_verify<'a>(
        &'a self,
        _access: &'a str,
        _code: &'a str,
    ) -> ApiFuture<'a, RecoveryCodes> {
        Box::pin(async move { pop(&self.recovery_codes_queue, "two_factor_setup_verify") })
    }

    fn two_factor_verify_login<'a>(
        &'a self,
        temporary_token: &'a str,
        code: &'a str,
        is_recovery_code: bool,
    ) -> ApiFuture<'a, SessionPayload> {
        *self.last_verify_login.lock().unwrap() =
            Some((temporary_token.into(), code.into(), is_recovery_code));
        Box::pin(async move { pop(&self.verify_login_queue, "two_factor_verify_login") })
    }

    fn two_factor_disable<'a>(&'a self, _access: &'a str, _password: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn two_factor_regenerate_recovery<'a>(
        &'a self,
        _access: &'a str,
        _password: &'a str,
    ) -> ApiFuture<'a, RecoveryCodes> {
        Box::pin(async move { pop(&self.recovery_codes_queue, "two_factor_regenerate_recovery") })
    }

    fn change_password<'a>(
        &'a self,
        _access: &'a str,
        _current_password: &'a str,
        _new_password: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn password_reset_request<'a>(&'a self, _email: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn password_reset_confirm<'a>(
        &'a self,
        _token: &'a str,
        _new_password: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn verify_email<'a>(&'a self, _token: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn resend_verification<'a>(&'a self, _email: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }
}

/// Scripted platform authenticator.
#[derive(Default)]
pub struct FakeAuthenticator {
    create_queue: Mutex<VecDeque<platform::Result<CreatedCredential>>>,
    get_queue: Mutex<VecDeque<platform::Result<CredentialAssertion>>>,
    pub last_creation: Mutex<Option<CredentialCreationRequest>>,
    pub last_assertion: Mutex<Option<AssertionRequest>>,
}

impl FakeAuthenticator {
    pub fn push_create(&self, result: platform::Result<CreatedCredential>) {
        self.create_queue.lock().unwrap().push_back(result);
    }

    pub fn push_get(&self, result: platform::Result<CredentialAssertion>) {
        self.get_queue.lock().unwrap().push_back(result);
    }
}

impl Authenticator for FakeAuthenticator {
    fn create_credential(
        &self,
        request: CredentialCreationRequest,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = platform::Result<CreatedCredential>> + Send + '_>,
    > {
        *self.last_creation.lock().unwrap() = Some(request);
        Box::pin(async move {
            self.create_queue.lock().unwrap().pop_front().unwrap_or(Err(
                platform::AuthenticatorError::Failed("fake: unscripted create".into()),
            ))
        })
    }

    fn get_credential(
        &self,
        request: AssertionRequest,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = platform::Result<CredentialAssertion>> + Send + '_>,
    > {
        *self.last_assertion.lock().unwrap() = Some(request);
        Box::pin(async move {
            self.get_queue.lock().unwrap().pop_front().unwrap_or(Err(
                platform::AuthenticatorError::Failed("fake: unscripted get".into()),
            ))
        })
    }
}
