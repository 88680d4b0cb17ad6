//! Redirect-based OAuth flow with PKCE
//!
//! First half: generate per-attempt proof material, ask the server for an
//! authorization URL plus an opaque state value, persist the attempt
//! record keyed by that state, and hand the URL to the navigator — the
//! user agent then leaves the application entirely. Second half, on the
//! redirect-target page: look up and delete the record, validate freshness
//! and provider, and exchange the authorization code (login mode) or link
//! the provider identity to the current session (link mode).
//!
//! The stored record is the sole client-side replay defense: it is
//! consumed on first read, successful or not, so a duplicated navigation
//! event can never complete the same flow twice, and a record older than
//! the freshness window is rejected outright. A stale or consumed attempt
//! cannot be resumed — callers restart with a fresh `start`.

use std::sync::Arc;
use std::time::Duration;

use identity_auth::api::IdentityApi;
use identity_auth::claims;
use identity_auth::error::{Error, Result};
use identity_auth::pkce;
use identity_auth::storage::{CredentialStore, keys};
use identity_auth::types::{
    LinkedAccount, OAuthAuthorizeRequest, OAuthCallbackRequest, OAuthMode, SessionPayload,
};
use platform::Navigator;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Attempt records older than this are rejected at completion.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

/// Fallback redirect target when the caller does not supply one. Whatever
/// value is used at start is echoed unchanged on completion.
pub const DEFAULT_REDIRECT_URI: &str = "/auth/callback";

/// Per-attempt proof material, keyed in the store by the server-issued
/// state value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkceRecord {
    pub provider: String,
    pub code_verifier: String,
    pub redirect_uri: String,
    pub mode: OAuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    /// Unix seconds at record creation
    pub created_at: u64,
}

/// Where the user agent was sent, plus the state key for the attempt.
#[derive(Debug, Clone)]
pub struct OAuthRedirect {
    pub authorization_url: String,
    pub state: String,
}

/// What a completed flow produced.
#[derive(Debug, Clone)]
pub enum OAuthOutcome {
    /// Login mode: tokens and user, committed like a direct login
    Session(SessionPayload),
    /// Link mode: the new provider identity; session tokens untouched
    Linked(LinkedAccount),
}

/// Completion result with the return URL captured at start, if any.
#[derive(Debug, Clone)]
pub struct OAuthCompletion {
    pub outcome: OAuthOutcome,
    pub return_url: Option<String>,
}

/// The flow controller. Owned by the session context; stateless between
/// calls apart from the records it keeps in the credential store.
pub struct OAuthFlow {
    api: Arc<dyn IdentityApi>,
    store: CredentialStore,
    navigator: Arc<dyn Navigator>,
    default_redirect_uri: String,
    state_ttl_secs: u64,
}

impl OAuthFlow {
    pub fn new(
        api: Arc<dyn IdentityApi>,
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
        default_redirect_uri: impl Into<String>,
        state_ttl: Duration,
    ) -> Self {
        Self {
            api,
            store,
            navigator,
            default_redirect_uri: default_redirect_uri.into(),
            state_ttl_secs: state_ttl.as_secs(),
        }
    }

    /// Initiate a flow: derive the challenge, obtain the authorization URL
    /// and state, persist the attempt record, navigate.
    ///
    /// Link mode carries the caller's access token on the authorize call
    /// so the server can bind the flow to the existing account.
    pub async fn start(
        &self,
        provider: &str,
        mode: OAuthMode,
        redirect_uri: Option<&str>,
        return_url: Option<String>,
        access: Option<&str>,
    ) -> Result<OAuthRedirect> {
        if mode == OAuthMode::Link && access.is_none() {
            return Err(Error::NotAuthenticated);
        }

        let verifier = pkce::generate_verifier();
        let challenge = pkce::compute_challenge(&verifier);
        let redirect_uri = redirect_uri
            .unwrap_or(&self.default_redirect_uri)
            .to_string();

        let response = self
            .api
            .oauth_authorize(
                provider,
                OAuthAuthorizeRequest {
                    redirect_uri: redirect_uri.clone(),
                    code_challenge: challenge,
                    code_challenge_method: "S256".into(),
                    mode,
                },
                access,
            )
            .await?;

        let record = PkceRecord {
            provider: provider.to_string(),
            code_verifier: verifier,
            redirect_uri,
            mode,
            return_url,
            created_at: claims::now_unix_secs(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| Error::Storage(format!("serializing attempt record: {e}")))?;
        self.store
            .set(&format!("{}{}", keys::PKCE_PREFIX, response.state), &json)?;

        info!(provider, mode = %mode, "oauth flow started");
        self.navigator.navigate(&response.authorization_url);

        Ok(OAuthRedirect {
            authorization_url: response.authorization_url,
            state: response.state,
        })
    }

    /// Complete a flow from the redirect-target page.
    ///
    /// Link mode needs the caller's access token for the link operation.
    pub async fn complete(
        &self,
        provider: &str,
        code: &str,
        state: &str,
        access: Option<&str>,
    ) -> Result<OAuthCompletion> {
        let record = self.take_record(state)?;

        let age = claims::now_unix_secs().saturating_sub(record.created_at);
        if age > self.state_ttl_secs {
            debug!(provider, age, "attempt record past freshness window");
            return Err(Error::OAuthStateExpired);
        }
        if record.provider != provider {
            return Err(Error::OAuthProviderMismatch {
                started: record.provider,
                completed: provider.to_string(),
            });
        }

        let request = OAuthCallbackRequest {
            code: code.to_string(),
            state: state.to_string(),
            // Echoed unchanged from the value used at start
            redirect_uri: record.redirect_uri,
            code_verifier: record.code_verifier,
        };

        let outcome = match record.mode {
            OAuthMode::Login => {
                let payload = self.api.oauth_callback(provider, request).await?;
                info!(provider, "oauth login completed");
                OAuthOutcome::Session(payload)
            }
            OAuthMode::Link => {
                let access = access.ok_or(Error::NotAuthenticated)?;
                let account = self.api.oauth_link(provider, request, access).await?;
                info!(provider, "provider identity linked");
                OAuthOutcome::Linked(account)
            }
        };

        Ok(OAuthCompletion {
            outcome,
            return_url: record.return_url,
        })
    }

    /// Read and delete the attempt record for a state value.
    ///
    /// Deletion happens before any validation so the state key is used at
    /// most once no matter how the completion goes.
    fn take_record(&self, state: &str) -> Result<PkceRecord> {
        let key = format!("{}{state}", keys::PKCE_PREFIX);
        let raw = self.store.get(&key)?;
        self.store.remove(&key)?;
        let raw = raw.ok_or(Error::OAuthStateInvalid)?;
        serde_json::from_str(&raw).map_err(|_| Error::OAuthStateInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeApi, session_payload};
    use identity_auth::storage::MemoryStorage;
    use std::sync::Mutex;

    struct RecordingNavigator(Mutex<Vec<String>>);

    impl Navigator for RecordingNavigator {
        fn navigate(&self, url: &str) {
            self.0.lock().unwrap().push(url.to_string());
        }
    }

    fn authorize_response(state: &str) -> identity_auth::types::OAuthAuthorizeResponse {
        identity_auth::types::OAuthAuthorizeResponse {
            provider: "google".into(),
            authorization_url: format!("https://accounts.example.com/authorize?state={state}"),
            state: state.into(),
        }
    }

    fn linked_account() -> LinkedAccount {
        LinkedAccount {
            provider: "google".into(),
            provider_user_id: "g-123".into(),
            provider_email: Some("a@b.com".into()),
            provider_username: None,
            linked_at: None,
        }
    }

    fn flow(api: Arc<FakeApi>, store: CredentialStore) -> (OAuthFlow, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator(Mutex::new(Vec::new())));
        let flow = OAuthFlow::new(
            api,
            store,
            navigator.clone(),
            DEFAULT_REDIRECT_URI,
            DEFAULT_STATE_TTL,
        );
        (flow, navigator)
    }

    fn stored_record(store: &CredentialStore, state: &str) -> Option<PkceRecord> {
        store
            .get(&format!("{}{state}", keys::PKCE_PREFIX))
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    fn write_record(store: &CredentialStore, state: &str, record: &PkceRecord) {
        store
            .set(
                &format!("{}{state}", keys::PKCE_PREFIX),
                &serde_json::to_string(record).unwrap(),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn start_persists_record_and_navigates() {
        let api = Arc::new(FakeApi::default());
        api.push_oauth_authorize(Ok(authorize_response("st-1")));
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        let (flow, navigator) = flow(api.clone(), store.clone());

        let redirect = flow
            .start("google", OAuthMode::Login, None, None, None)
            .await
            .unwrap();

        assert_eq!(redirect.state, "st-1");
        let record = stored_record(&store, "st-1").expect("record persisted");
        assert_eq!(record.provider, "google");
        assert_eq!(record.mode, OAuthMode::Login);
        assert_eq!(record.redirect_uri, DEFAULT_REDIRECT_URI);
        assert!(record.code_verifier.len() >= 43);

        // The challenge sent to the server derives from the stored verifier
        let (_, request, access) = api.last_oauth_authorize.lock().unwrap().take().unwrap();
        assert_eq!(
            request.code_challenge,
            pkce::compute_challenge(&record.code_verifier)
        );
        assert_eq!(request.code_challenge_method, "S256");
        assert!(access.is_none());

        assert_eq!(
            navigator.0.lock().unwrap().as_slice(),
            [redirect.authorization_url.as_str()]
        );
    }

    #[tokio::test]
    async fn link_start_requires_and_carries_access_token() {
        let api = Arc::new(FakeApi::default());
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        let (flow, _) = flow(api.clone(), store);

        let denied = flow
            .start("google", OAuthMode::Link, None, None, None)
            .await;
        assert!(matches!(denied, Err(Error::NotAuthenticated)), "got {denied:?}");

        api.push_oauth_authorize(Ok(authorize_response("st-link")));
        flow.start("google", OAuthMode::Link, None, None, Some("at_live"))
            .await
            .unwrap();
        let (_, request, access) = api.last_oauth_authorize.lock().unwrap().take().unwrap();
        assert_eq!(request.mode, OAuthMode::Link);
        assert_eq!(access.as_deref(), Some("at_live"));
    }

    #[tokio::test]
    async fn complete_exchanges_code_with_stored_verifier() {
        let api = Arc::new(FakeApi::default());
        api.push_oauth_authorize(Ok(authorize_response("st-2")));
        api.push_oauth_callback(Ok(session_payload("u-1", claims::now_unix_secs() + 3600)));
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        let (flow, _) = flow(api.clone(), store.clone());

        flow.start("google", OAuthMode::Login, Some("https://app/cb"), None, None)
            .await
            .unwrap();
        let verifier = stored_record(&store, "st-2").unwrap().code_verifier;

        let completion = flow
            .complete("google", "code-x", "st-2", None)
            .await
            .unwrap();
        assert!(matches!(completion.outcome, OAuthOutcome::Session(_)));

        let (provider, request) = api.last_oauth_callback.lock().unwrap().take().unwrap();
        assert_eq!(provider, "google");
        assert_eq!(request.code, "code-x");
        assert_eq!(request.code_verifier, verifier);
        assert_eq!(request.redirect_uri, "https://app/cb", "echoed unchanged");

        assert!(stored_record(&store, "st-2").is_none(), "record consumed");
    }

    #[tokio::test]
    async fn second_completion_for_same_state_fails() {
        let api = Arc::new(FakeApi::default());
        api.push_oauth_authorize(Ok(authorize_response("st-3")));
        api.push_oauth_callback(Ok(session_payload("u-1", claims::now_unix_secs() + 3600)));
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        let (flow, _) = flow(api, store);

        flow.start("google", OAuthMode::Login, None, None, None)
            .await
            .unwrap();
        flow.complete("google", "code-x", "st-3", None)
            .await
            .unwrap();

        let again = flow.complete("google", "code-x", "st-3", None).await;
        assert!(matches!(again, Err(Error::OAuthStateInvalid)), "got {again:?}");
    }

    #[tokio::test]
    async fn unknown_state_fails() {
        let api = Arc::new(FakeApi::default());
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        let (flow, _) = flow(api, store);

        let result = flow.complete("google", "code", "never-issued", None).await;
        assert!(matches!(result, Err(Error::OAuthStateInvalid)), "got {result:?}");
    }

    #[tokio::test]
    async fn freshness_window_boundary() {
        let api = Arc::new(FakeApi::default());
        api.push_oauth_callback(Ok(session_payload("u-1", claims::now_unix_secs() + 3600)));
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        let (flow, _) = flow(api, store.clone());

        let record = |age: u64| PkceRecord {
            provider: "google".into(),
            code_verifier: "v".repeat(43),
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            mode: OAuthMode::Login,
            return_url: None,
            created_at: claims::now_unix_secs() - age,
        };

        // 10 minutes and 1 second old: rejected, record still consumed
        write_record(&store, "st-old", &record(601));
        let expired = flow.complete("google", "code", "st-old", None).await;
        assert!(matches!(expired, Err(Error::OAuthStateExpired)), "got {expired:?}");
        assert!(stored_record(&store, "st-old").is_none());

        // 9 minutes 59 seconds old: accepted
        write_record(&store, "st-fresh", &record(599));
        flow.complete("google", "code", "st-fresh", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn provider_mismatch_fails_and_consumes() {
        let api = Arc::new(FakeApi::default());
        api.push_oauth_authorize(Ok(authorize_response("st-4")));
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        let (flow, _) = flow(api, store.clone());

        flow.start("google", OAuthMode::Login, None, None, None)
            .await
            .unwrap();

        let mismatch = flow.complete("github", "code", "st-4", None).await;
        match mismatch {
            Err(Error::OAuthProviderMismatch { started, completed }) => {
                assert_eq!(started, "google");
                assert_eq!(completed, "github");
            }
            other => panic!("expected provider mismatch, got {other:?}"),
        }
        assert!(stored_record(&store, "st-4").is_none(), "consumed on mismatch");
    }

    #[tokio::test]
    async fn link_completion_calls_link_operation() {
        let api = Arc::new(FakeApi::default());
        api.push_oauth_authorize(Ok(authorize_response("st-5")));
        api.push_oauth_link(Ok(linked_account()));
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        let (flow, _) = flow(api.clone(), store);

        flow.start(
            "google",
            OAuthMode::Link,
            None,
            Some("/settings".into()),
            Some("at_live"),
        )
        .await
        .unwrap();

        let completion = flow
            .complete("google", "code-l", "st-5", Some("at_live"))
            .await
            .unwrap();
        match completion.outcome {
            OAuthOutcome::Linked(account) => assert_eq!(account.provider_user_id, "g-123"),
            other => panic!("expected linked outcome, got {other:?}"),
        }
        assert_eq!(completion.return_url.as_deref(), Some("/settings"));

        let (_, _, access) = api.last_oauth_link.lock().unwrap().take().unwrap();
        assert_eq!(access, "at_live");
    }
}
