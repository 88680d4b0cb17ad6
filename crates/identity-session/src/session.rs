//! Session context: the aggregate root
//!
//! Composes the store, the event bus, the token lifecycle manager, the
//! OAuth controller, the passkey ceremony client, and the step-up
//! coordinator behind one handle, and is the single place session state
//! transitions are committed. Every authentication path that produces
//! tokens — direct login, register auto-login, OAuth callback, passkey
//! assertion, step-up verification, silent refresh — funnels through the
//! same commit routine: persist tokens and user, update the view, re-arm
//! the scheduler.
//!
//! Environment wiring is explicit: listeners are registered during
//! `initialize` and torn down during `cleanup`; nothing relies on a UI
//! framework's scope semantics. A token-refresh-failed emission always
//! forces logout (idempotent when already logged out), and a watcher task
//! converges this context's view onto commits and logouts performed by
//! sibling contexts of the same origin.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use identity_auth::api::IdentityApi;
use identity_auth::claims;
use identity_auth::error::{Error, Result};
use identity_auth::storage::{CredentialStore, keys};
use identity_auth::types::{
    LinkedAccount, LoginOutcome, LoginRequest, OAuthMode, PasskeySummary, RecoveryCodes,
    RegisterOutcome, RegisterRequest, SessionPayload, TwoFactorSetup, User,
};
use platform::{Authenticator, Navigator, NoopNavigator, VisibilitySignal};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{EventBus, EventKind, Subscription};
use crate::oauth::{DEFAULT_REDIRECT_URI, DEFAULT_STATE_TTL, OAuthFlow, OAuthOutcome, OAuthRedirect};
use crate::passkey::PasskeyCeremony;
use crate::refresh::{DEFAULT_REFRESH_BUFFER, TokenLifecycle};
use crate::two_factor::StepUp;

/// Engine tuning. The host constructs this directly; no file or
/// environment loading happens here.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Renewal is scheduled this far ahead of the access token's expiry
    pub refresh_buffer: Duration,
    /// Fallback OAuth redirect target, echoed unchanged on completion
    pub oauth_redirect_uri: String,
    /// Freshness window for OAuth attempt records
    pub oauth_state_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            oauth_redirect_uri: DEFAULT_REDIRECT_URI.into(),
            oauth_state_ttl: DEFAULT_STATE_TTL,
        }
    }
}

/// Host-environment wiring. Every field has a headless-safe default.
pub struct PlatformHooks {
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub navigator: Arc<dyn Navigator>,
    pub visibility: Option<VisibilitySignal>,
}

impl Default for PlatformHooks {
    fn default() -> Self {
        Self {
            authenticator: None,
            navigator: Arc::new(NoopNavigator),
            visibility: None,
        }
    }
}

/// Last operation failure, surfaced on the session view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub code: String,
    pub message: String,
}

impl From<&Error> for SessionError {
    fn from(e: &Error) -> Self {
        Self {
            code: e.code().into(),
            message: e.to_string(),
        }
    }
}

/// The authenticated-state view consumers read.
///
/// Exactly one live `Session` per context; mutated only through the
/// context's operations.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<SessionError>,
}

/// Outcome of a first-factor login.
#[derive(Debug, Clone)]
pub enum LoginResult {
    Authenticated(User),
    /// A temporary token is now held by the step-up coordinator; the
    /// session stays unauthenticated until `verify_two_factor` succeeds
    TwoFactorRequired,
}

/// Outcome of registration.
#[derive(Debug, Clone)]
pub enum RegisterResult {
    Authenticated(User),
    /// The account exists but must verify its email before logging in
    VerificationRequired(User),
}

/// Outcome of an OAuth completion.
#[derive(Debug, Clone)]
pub enum CompletedOAuth {
    Authenticated {
        user: User,
        return_url: Option<String>,
    },
    Linked {
        account: LinkedAccount,
        return_url: Option<String>,
    },
}

struct SessionInner {
    api: Arc<dyn IdentityApi>,
    store: CredentialStore,
    bus: EventBus,
    lifecycle: TokenLifecycle,
    oauth: OAuthFlow,
    passkeys: PasskeyCeremony,
    step_up: Mutex<StepUp>,
    state: Mutex<Session>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// The aggregate root. Cloning shares the same session.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

impl SessionContext {
    pub fn new(
        api: Arc<dyn IdentityApi>,
        store: CredentialStore,
        hooks: PlatformHooks,
        config: EngineConfig,
    ) -> Self {
        Self::with_bus(api, store, hooks, config, EventBus::new())
    }

    /// Construct against an externally owned event bus (e.g. one wired to
    /// a host-level broadcast sink).
    pub fn with_bus(
        api: Arc<dyn IdentityApi>,
        store: CredentialStore,
        hooks: PlatformHooks,
        config: EngineConfig,
        bus: EventBus,
    ) -> Self {
        let lifecycle = TokenLifecycle::new(
            api.clone(),
            store.clone(),
            bus.clone(),
            config.refresh_buffer,
            hooks.visibility.clone(),
        );
        let oauth = OAuthFlow::new(
            api.clone(),
            store.clone(),
            hooks.navigator.clone(),
            config.oauth_redirect_uri.clone(),
            config.oauth_state_ttl,
        );
        let passkeys = PasskeyCeremony::new(api.clone(), hooks.authenticator.clone());

        Self {
            inner: Arc::new(SessionInner {
                api,
                store,
                bus,
                lifecycle,
                oauth,
                passkeys,
                step_up: Mutex::new(StepUp::new()),
                state: Mutex::new(Session::default()),
                watcher: Mutex::new(None),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Restore the session from the store, arm the scheduler, and attach
    /// the environment listeners. Called once per context.
    ///
    /// A valid cached token restores the authenticated view and emits
    /// login; an expired one hands the decision to the scheduler's
    /// immediate-renewal path (the view converges when the refresh lands).
    pub fn initialize(&self) -> Result<()> {
        self.attach_listeners();
        self.spawn_watcher();

        let Some(token) = self.inner.store.access_token()? else {
            debug!("no cached session");
            return Ok(());
        };

        if claims::is_expired(&token) {
            info!("cached access token expired, attempting silent renewal");
            self.inner.lifecycle.initialize(&token);
            return Ok(());
        }

        let user = self.inner.store.user()?;
        let user_id = user.as_ref().map(|u| u.id.clone());
        {
            let mut state = self.lock_state();
            state.user = user;
            state.access_token = Some(token.clone());
            state.is_authenticated = true;
            state.error = None;
        }
        self.inner.lifecycle.initialize(&token);
        self.inner.bus.emit(
            EventKind::Login,
            serde_json::json!({ "user_id": user_id, "restored": true }),
        );
        info!("session restored from store");
        Ok(())
    }

    /// Detach everything `initialize` attached and cancel the scheduler.
    pub fn cleanup(&self) {
        self.inner.lifecycle.cleanup();
        if let Some(task) = self
            .inner
            .watcher
            .lock()
            .expect("watcher slot poisoned")
            .take()
        {
            task.abort();
        }
        for subscription in self
            .inner
            .subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .drain(..)
        {
            subscription.unsubscribe();
        }
    }

    /// Snapshot of the current view.
    pub fn session(&self) -> Session {
        self.lock_state().clone()
    }

    /// The bus this context emits on.
    pub fn events(&self) -> EventBus {
        self.inner.bus.clone()
    }

    /// The token lifecycle manager (schedule observation).
    pub fn lifecycle(&self) -> &TokenLifecycle {
        &self.inner.lifecycle
    }

    /// Whether a step-up verification is pending.
    pub fn two_factor_pending(&self) -> bool {
        self.inner
            .step_up
            .lock()
            .expect("step-up coordinator poisoned")
            .is_pending()
    }

    // --- First factor ---

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult> {
        self.set_loading(true);
        self.inner
            .step_up
            .lock()
            .expect("step-up coordinator poisoned")
            .reset();

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            device_id: self.inner.store.device_id().ok(),
        };

        match self.inner.api.login(request).await {
            Ok(LoginOutcome::Session(payload)) => {
                let user = self.commit_session(payload)?;
                self.inner
                    .bus
                    .emit(EventKind::Login, serde_json::json!({ "user_id": &user.id }));
                info!(user_id = %user.id, "login succeeded");
                Ok(LoginResult::Authenticated(user))
            }
            Ok(LoginOutcome::TwoFactorRequired { temporary_token }) => {
                // The temporary token never touches the credential store
                self.inner
                    .step_up
                    .lock()
                    .expect("step-up coordinator poisoned")
                    .begin(temporary_token);
                self.set_loading(false);
                info!("first factor accepted, second factor required");
                Ok(LoginResult::TwoFactorRequired)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Exchange a second-factor code (TOTP, or a recovery code) for full
    /// session tokens. Failure keeps the temporary token for a retry.
    pub async fn verify_two_factor(&self, code: &str, is_recovery_code: bool) -> Result<User> {
        let temporary_token = self
            .inner
            .step_up
            .lock()
            .expect("step-up coordinator poisoned")
            .start_verifying()?;
        self.set_loading(true);

        match self
            .inner
            .api
            .two_factor_verify_login(&temporary_token, code, is_recovery_code)
            .await
        {
            Ok(payload) => {
                let user = self.commit_session(payload)?;
                self.inner
                    .bus
                    .emit(EventKind::Login, serde_json::json!({ "user_id": &user.id }));
                info!(user_id = %user.id, "step-up verification succeeded");
                Ok(user)
            }
            Err(e) => {
                self.inner
                    .step_up
                    .lock()
                    .expect("step-up coordinator poisoned")
                    .verification_failed();
                Err(self.fail(e))
            }
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResult> {
        self.set_loading(true);
        match self.inner.api.register(request).await {
            Ok(RegisterOutcome::Session(payload)) => {
                let user = self.commit_session(payload)?;
                self.inner
                    .bus
                    .emit(EventKind::Register, serde_json::json!({ "user_id": &user.id }));
                Ok(RegisterResult::Authenticated(user))
            }
            Ok(RegisterOutcome::VerificationPending { user }) => {
                self.set_loading(false);
                self.inner
                    .bus
                    .emit(EventKind::Register, serde_json::json!({ "user_id": &user.id }));
                info!("registration accepted, email verification required");
                Ok(RegisterResult::VerificationRequired(user))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Best-effort server-side revocation, then unconditional local
    /// teardown.
    pub async fn logout(&self) {
        let access = self.inner.store.access_token().unwrap_or(None);
        let refresh = self.inner.store.refresh_token().unwrap_or(None);
        if let (Some(access), Some(refresh)) = (access, refresh) {
            if let Err(e) = self.inner.api.logout(&access, &refresh).await {
                debug!(error = %e, "server-side revocation failed, proceeding");
            }
        }

        self.inner.lifecycle.cleanup();
        if let Err(e) = self.inner.store.clear_session() {
            warn!(error = %e, "could not clear stored session");
        }
        self.inner
            .step_up
            .lock()
            .expect("step-up coordinator poisoned")
            .reset();
        *self.lock_state() = Session::default();
        self.inner.bus.emit(EventKind::Logout, serde_json::json!({}));
        info!("logged out");
    }

    // --- OAuth ---

    pub async fn start_oauth_login(
        &self,
        provider: &str,
        redirect_uri: Option<&str>,
        return_url: Option<String>,
    ) -> Result<OAuthRedirect> {
        self.inner
            .oauth
            .start(provider, OAuthMode::Login, redirect_uri, return_url, None)
            .await
            .map_err(|e| self.fail(e))
    }

    pub async fn start_oauth_link(
        &self,
        provider: &str,
        redirect_uri: Option<&str>,
    ) -> Result<OAuthRedirect> {
        let access = self.require_access_token()?;
        self.inner
            .oauth
            .start(provider, OAuthMode::Link, redirect_uri, None, Some(&access))
            .await
            .map_err(|e| self.fail(e))
    }

    /// Process the provider redirect. Login mode commits the session;
    /// link mode leaves the existing session untouched apart from the
    /// linked-accounts projection.
    pub async fn complete_oauth(
        &self,
        provider: &str,
        code: &str,
        state: &str,
    ) -> Result<CompletedOAuth> {
        let access = self.inner.store.access_token()?;
        let completion = self
            .inner
            .oauth
            .complete(provider, code, state, access.as_deref())
            .await
            .map_err(|e| self.fail(e))?;

        match completion.outcome {
            OAuthOutcome::Session(payload) => {
                let user = self.commit_session(payload)?;
                self.inner
                    .bus
                    .emit(EventKind::Login, serde_json::json!({ "user_id": &user.id }));
                Ok(CompletedOAuth::Authenticated {
                    user,
                    return_url: completion.return_url,
                })
            }
            OAuthOutcome::Linked(account) => {
                self.inner.bus.emit(
                    EventKind::AccountLinked,
                    serde_json::json!({
                        "provider": &account.provider,
                        "provider_user_id": &account.provider_user_id,
                    }),
                );
                Ok(CompletedOAuth::Linked {
                    account,
                    return_url: completion.return_url,
                })
            }
        }
    }

    /// On-demand projection of the provider identities attached to the
    /// account. Never cached; the server is authoritative.
    pub async fn linked_accounts(&self) -> Result<Vec<LinkedAccount>> {
        let access = self.require_access_token()?;
        self.inner.api.linked_accounts(&access).await
    }

    pub async fn unlink_account(&self, provider: &str) -> Result<()> {
        let access = self.require_access_token()?;
        self.inner.api.oauth_unlink(provider, &access).await?;
        self.inner.bus.emit(
            EventKind::AccountUnlinked,
            serde_json::json!({ "provider": provider }),
        );
        Ok(())
    }

    // --- Passkeys ---

    pub async fn register_passkey(&self, name: &str) -> Result<PasskeySummary> {
        let access = self.require_access_token()?;
        let summary = self
            .inner
            .passkeys
            .register(&access, name)
            .await
            .map_err(|e| self.fail(e))?;
        self.inner.bus.emit(
            EventKind::PasskeyAdded,
            serde_json::json!({ "passkey_id": &summary.id, "name": &summary.name }),
        );
        Ok(summary)
    }

    pub async fn login_with_passkey(&self, email: Option<&str>) -> Result<User> {
        self.set_loading(true);
        match self.inner.passkeys.authenticate(email).await {
            Ok(payload) => {
                let user = self.commit_session(payload)?;
                self.inner
                    .bus
                    .emit(EventKind::Login, serde_json::json!({ "user_id": &user.id }));
                Ok(user)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub async fn list_passkeys(&self) -> Result<Vec<PasskeySummary>> {
        let access = self.require_access_token()?;
        self.inner.api.passkey_list(&access).await
    }

    pub async fn remove_passkey(&self, passkey_id: &str) -> Result<()> {
        let access = self.require_access_token()?;
        self.inner.api.passkey_remove(&access, passkey_id).await?;
        self.inner.bus.emit(
            EventKind::PasskeyRemoved,
            serde_json::json!({ "passkey_id": passkey_id }),
        );
        Ok(())
    }

    // --- Two-factor management ---

    pub async fn begin_two_factor_setup(&self) -> Result<TwoFactorSetup> {
        let access = self.require_access_token()?;
        self.inner.api.two_factor_setup_begin(&access).await
    }

    pub async fn confirm_two_factor_setup(&self, code: &str) -> Result<RecoveryCodes> {
        let access = self.require_access_token()?;
        let codes = self.inner.api.two_factor_setup_verify(&access, code).await?;
        self.update_user(|user| user.two_factor_enabled = true);
        self.inner
            .bus
            .emit(EventKind::TwoFactorEnabled, serde_json::json!({}));
        Ok(codes)
    }

    /// Requires the caller's current password; gated on a live session.
    pub async fn disable_two_factor(&self, password: &str) -> Result<()> {
        let access = self.require_access_token()?;
        self.inner.api.two_factor_disable(&access, password).await?;
        self.update_user(|user| user.two_factor_enabled = false);
        self.inner
            .bus
            .emit(EventKind::TwoFactorDisabled, serde_json::json!({}));
        Ok(())
    }

    pub async fn regenerate_recovery_codes(&self, password: &str) -> Result<RecoveryCodes> {
        let access = self.require_access_token()?;
        self.inner
            .api
            .two_factor_regenerate_recovery(&access, password)
            .await
    }

    // --- Account maintenance ---

    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        let access = self.require_access_token()?;
        self.inner.api.change_password(&access, current, new).await?;
        self.inner
            .bus
            .emit(EventKind::PasswordChanged, serde_json::json!({}));
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.inner.api.password_reset_request(email).await
    }

    pub async fn confirm_password_reset(&self, token: &str, new_password: &str) -> Result<()> {
        self.inner
            .api
            .password_reset_confirm(token, new_password)
            .await?;
        self.inner
            .bus
            .emit(EventKind::PasswordReset, serde_json::json!({}));
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<()> {
        self.inner.api.verify_email(token).await?;
        self.update_user(|user| user.email_verified = true);
        self.inner
            .bus
            .emit(EventKind::EmailVerified, serde_json::json!({}));
        Ok(())
    }

    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        self.inner.api.resend_verification(email).await
    }

    // --- Internals ---

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Session> {
        self.inner.state.lock().expect("session state poisoned")
    }

    /// The one place tokens become a live session.
    ///
    /// The user is persisted before the tokens: the access-token write is
    /// the change sibling contexts converge on, so everything else must
    /// already be in the store when it lands.
    fn commit_session(&self, payload: SessionPayload) -> Result<User> {
        self.inner.store.store_user(&payload.user)?;
        self.inner.store.store_tokens(&payload.tokens)?;
        {
            let mut state = self.lock_state();
            state.user = Some(payload.user.clone());
            state.access_token = Some(payload.tokens.access_token.clone());
            state.is_authenticated = true;
            state.is_loading = false;
            state.error = None;
        }
        self.inner
            .step_up
            .lock()
            .expect("step-up coordinator poisoned")
            .complete();
        self.inner.lifecycle.initialize(&payload.tokens.access_token);
        Ok(payload.user)
    }

    fn require_access_token(&self) -> Result<String> {
        self.inner
            .store
            .access_token()?
            .ok_or(Error::NotAuthenticated)
    }

    fn set_loading(&self, loading: bool) {
        let mut state = self.lock_state();
        state.is_loading = loading;
        if loading {
            state.error = None;
        }
    }

    /// Apply a mutation to the in-view user and persist it.
    fn update_user(&self, mutate: impl FnOnce(&mut User)) {
        let updated = {
            let mut state = self.lock_state();
            match state.user.as_mut() {
                Some(user) => {
                    mutate(user);
                    Some(user.clone())
                }
                None => None,
            }
        };
        if let Some(user) = updated {
            if let Err(e) = self.inner.store.store_user(&user) {
                warn!(error = %e, "could not persist user update");
            }
        }
    }

    /// Record the failure on the view and hand the error back.
    fn fail(&self, e: Error) -> Error {
        {
            let mut state = self.lock_state();
            state.is_loading = false;
            state.error = Some(SessionError::from(&e));
        }
        e
    }

    fn attach_listeners(&self) {
        let mut subscriptions = self
            .inner
            .subscriptions
            .lock()
            .expect("subscriptions poisoned");
        if !subscriptions.is_empty() {
            return;
        }

        // Terminal refresh failure cascades into forced logout
        let weak = Arc::downgrade(&self.inner);
        subscriptions.push(self.inner.bus.on(EventKind::TokenRefreshFailed, move |_| {
            if let Some(inner) = weak.upgrade() {
                force_logout(&inner);
            }
        }));

        // Silent refresh keeps the view current with the store
        let weak = Arc::downgrade(&self.inner);
        subscriptions.push(self.inner.bus.on(EventKind::TokenRefreshed, move |_| {
            if let Some(inner) = weak.upgrade() {
                converge_view(&inner);
            }
        }));
    }

    /// Watch sibling-context mutations of the access token and converge
    /// this context's view and schedule onto them.
    fn spawn_watcher(&self) {
        let mut slot = self.inner.watcher.lock().expect("watcher slot poisoned");
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let mut events = self.inner.store.subscribe();
        *slot = Some(tokio::spawn(async move {
            while let Some(change) = events.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                if change.key != keys::ACCESS_TOKEN {
                    continue;
                }
                match change.value {
                    Some(token) => {
                        debug!("sibling context committed a session, converging");
                        converge_view(&inner);
                        inner.lifecycle.initialize(&token);
                    }
                    None => {
                        info!("sibling context logged out");
                        force_logout(&inner);
                    }
                }
            }
        }));
    }
}

/// Refresh the view from whatever the store currently holds.
fn converge_view(inner: &SessionInner) {
    let token = match inner.store.access_token() {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "could not read store while converging view");
            return;
        }
    };
    let user = inner.store.user().unwrap_or(None);
    let mut state = inner.state.lock().expect("session state poisoned");
    match token {
        Some(token) => {
            state.access_token = Some(token);
            if user.is_some() {
                state.user = user;
            }
            state.is_authenticated = true;
            state.error = None;
        }
        None => {
            *state = Session::default();
        }
    }
}

/// Tear the session down locally. Idempotent: a refresh-failure emission
/// against an already logged-out session leaves state unchanged.
fn force_logout(inner: &SessionInner) {
    let already_out = {
        let state = inner.state.lock().expect("session state poisoned");
        !state.is_authenticated && state.access_token.is_none()
    };
    let stored = inner.store.access_token().unwrap_or(None);
    if already_out && stored.is_none() {
        debug!("forced logout requested but session already cleared");
        return;
    }

    inner.lifecycle.cleanup();
    if let Err(e) = inner.store.clear_session() {
        warn!(error = %e, "could not clear stored session");
    }
    inner
        .step_up
        .lock()
        .expect("step-up coordinator poisoned")
        .reset();
    *inner.state.lock().expect("session state poisoned") = Session::default();
    inner
        .bus
        .emit(EventKind::Logout, serde_json::json!({ "forced": true }));
    info!("forced logout");
}
