//! Host-environment abstractions for the identity session engine
//!
//! The engine must run without any UI framework, so everything the host
//! environment normally provides implicitly — the platform credential
//! ceremony, user-agent navigation, page-visibility changes — is modelled
//! as an explicit seam here. Hosts register concrete implementations at
//! construction time and tear them down with the session; tests substitute
//! fakes.
//!
//! Traits use `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn Authenticator>`), matching how the rest of the workspace holds
//! its pluggable collaborators.

pub mod authenticator;
pub mod navigator;
pub mod visibility;

pub use authenticator::{
    AssertionRequest, Authenticator, AuthenticatorError, AuthenticatorSelection, CeremonyUser,
    CreatedCredential, CredentialAssertion, CredentialCreationRequest, RelyingParty, Result,
};
pub use navigator::{Navigator, NoopNavigator};
pub use visibility::VisibilitySignal;
