//! Client-side authentication session engine
//!
//! Keeps a client continuously authenticated against a remote identity
//! server: silent token renewal ahead of expiry, redirect-based OAuth with
//! PKCE that survives full navigations, passkey ceremonies against the
//! platform authenticator, step-up second-factor exchanges, and multi-tab
//! convergence over the credential store's change notifications.
//!
//! Session lifecycle:
//! 1. Host builds a `SessionContext` from an `IdentityApi`, a
//!    `CredentialStore`, and its `PlatformHooks`
//! 2. `initialize()` restores any cached session and arms the
//!    `TokenLifecycle` scheduler
//! 3. Authentication paths (login, OAuth completion, passkey assertion,
//!    step-up verification) commit tokens through the context
//! 4. The scheduler renews silently; a terminal failure forces logout
//! 5. `cleanup()` detaches timers and environment listeners

pub mod events;
pub mod oauth;
pub mod passkey;
pub mod refresh;
pub mod session;
pub mod two_factor;

#[cfg(test)]
pub(crate) mod testutil;

pub use events::{AuthEvent, BroadcastSink, EventBus, EventKind, EventSink, Subscription};
pub use oauth::{OAuthCompletion, OAuthFlow, OAuthOutcome, OAuthRedirect, PkceRecord};
pub use passkey::PasskeyCeremony;
pub use refresh::{DEFAULT_REFRESH_BUFFER, RefreshState, TokenLifecycle};
pub use session::{
    CompletedOAuth, EngineConfig, LoginResult, PlatformHooks, RegisterResult, Session,
    SessionContext, SessionError,
};
pub use two_factor::{StepUp, StepUpState};
