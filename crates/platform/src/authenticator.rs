//! Platform credential-ceremony abstraction
//!
//! The engine never talks to authenticator hardware or a browser credential
//! API directly. It hands a fully-decoded binary request to an
//! `Authenticator` implementation and gets a binary result back; all
//! textual-to-binary translation happens in the ceremony codec on the
//! engine side. Implementations wrap whatever the host has: a WebAuthn
//! bridge, a CTAP transport, or a software authenticator in tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Errors from the platform ceremony call.
///
/// Callers are expected to offer a fallback credential method on most of
/// these rather than blindly retry, so each platform-level rejection keeps
/// its own variant instead of collapsing into a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticatorError {
    /// No authenticator available, or the host cannot perform ceremonies at all
    #[error("platform authenticator unsupported: {0}")]
    NotSupported(String),

    /// The user dismissed the ceremony dialog
    #[error("ceremony cancelled by user")]
    Cancelled,

    /// The ceremony did not complete within the platform timeout
    #[error("ceremony timed out")]
    TimedOut,

    /// Registration hit a credential already present on the authenticator
    #[error("credential already registered on this authenticator")]
    DuplicateCredential,

    /// Anything else the platform reports
    #[error("ceremony failed: {0}")]
    Failed(String),
}

/// Result alias for ceremony operations.
pub type Result<T> = std::result::Result<T, AuthenticatorError>;

/// Relying-party identity presented during registration.
#[derive(Debug, Clone)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

/// The account the new credential will be bound to.
///
/// `id` is the server's opaque user handle, already decoded to bytes.
#[derive(Debug, Clone)]
pub struct CeremonyUser {
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

/// Authenticator-selection policy for registration.
#[derive(Debug, Clone, Default)]
pub struct AuthenticatorSelection {
    /// "platform" or "cross-platform"; None lets the platform choose
    pub attachment: Option<String>,
    /// "required", "preferred", or "discouraged"
    pub resident_key: Option<String>,
    /// User-verification requirement, e.g. "preferred"
    pub user_verification: String,
}

/// Fully-decoded request for the platform "create credential" operation.
#[derive(Debug, Clone)]
pub struct CredentialCreationRequest {
    pub challenge: Vec<u8>,
    pub relying_party: RelyingParty,
    pub user: CeremonyUser,
    /// Accepted COSE algorithm identifiers (e.g. -7 for ES256)
    pub algorithms: Vec<i32>,
    /// Credential ids the authenticator must refuse to re-register
    pub exclude_credentials: Vec<Vec<u8>>,
    pub selection: AuthenticatorSelection,
    pub timeout: Option<Duration>,
}

/// Result of a successful registration ceremony.
#[derive(Debug, Clone)]
pub struct CreatedCredential {
    pub id: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub transports: Vec<String>,
}

/// Fully-decoded request for the platform "get credential" operation.
#[derive(Debug, Clone)]
pub struct AssertionRequest {
    pub challenge: Vec<u8>,
    pub relying_party_id: String,
    /// Allow-list of credential ids; empty means any discoverable credential
    pub allow_credentials: Vec<Vec<u8>>,
    pub user_verification: String,
    pub timeout: Option<Duration>,
}

/// Result of a successful authentication ceremony.
#[derive(Debug, Clone)]
pub struct CredentialAssertion {
    pub id: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub signature: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}

/// Abstraction over the host's credential ceremony capability.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Authenticator>`). Both calls suspend until the user completes
/// or abandons the ceremony; the engine treats every error as terminal for
/// the current attempt and never retries on its own.
pub trait Authenticator: Send + Sync {
    /// Run the registration ceremony and produce an attestation.
    fn create_credential(
        &self,
        request: CredentialCreationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CreatedCredential>> + Send + '_>>;

    /// Run the authentication ceremony and produce a signed assertion.
    fn get_credential(
        &self,
        request: AssertionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CredentialAssertion>> + Send + '_>>;
}
