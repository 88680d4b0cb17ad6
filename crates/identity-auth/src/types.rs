//! Wire types for the remote identity server
//!
//! Field-named JSON request/response bodies for every server operation.
//! Auth endpoints use snake_case fields; the passkey challenge documents
//! follow the WebAuthn JSON convention (camelCase, `clientDataJSON`)
//! because they round-trip through standard ceremony tooling.

use serde::{Deserialize, Serialize};

/// The authenticated account as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub two_factor_enabled: bool,
}

/// Token pair returned by login-shaped operations and refresh.
///
/// `expires_in` is a delta in seconds from the response time; the embedded
/// `exp` claim inside `access_token` is what actually drives scheduling.
/// `refresh_token` is opaque and never parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "bearer".into()
}

/// Tokens plus the user they belong to — the payload every successful
/// authentication path terminates in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user: User,
    pub tokens: AuthTokens,
}

/// First-factor login request.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Outcome of a first-factor login: either a full session, or a
/// capability-restricted temporary token when a second factor is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoginOutcome {
    Session(SessionPayload),
    TwoFactorRequired { temporary_token: String },
}

/// Registration request.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Outcome of registration: auto-login unless the server requires email
/// verification first.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RegisterOutcome {
    Session(SessionPayload),
    VerificationPending { user: User },
}

/// OAuth flow mode: authenticate, or attach a provider identity to the
/// session that initiated the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthMode {
    Login,
    Link,
}

impl std::fmt::Display for OAuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuthMode::Login => f.write_str("login"),
            OAuthMode::Link => f.write_str("link"),
        }
    }
}

/// Request for the authorize operation.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthAuthorizeRequest {
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub mode: OAuthMode,
}

/// Authorize response: where to send the user agent, and the opaque state
/// the server will expect back.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthAuthorizeResponse {
    pub provider: String,
    pub authorization_url: String,
    pub state: String,
}

/// Request for callback/link completion.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthCallbackRequest {
    pub code: String,
    pub state: String,
    pub redirect_uri: String,
    pub code_verifier: String,
}

/// A provider identity attached to the account. Read-mostly projection of
/// server state; never authoritative on the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkedAccount {
    pub provider: String,
    pub provider_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_at: Option<String>,
}

/// Wrapper for the linked-accounts listing.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedAccountsResponse {
    pub links: Vec<LinkedAccount>,
}

// --- Passkey ceremony documents (WebAuthn JSON convention) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpEntity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// Base64url-encoded opaque user handle
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredParam {
    pub alg: i32,
    #[serde(rename = "type")]
    pub cred_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDescriptor {
    /// Base64url-encoded credential id
    pub id: String,
    #[serde(rename = "type")]
    pub cred_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SelectionCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<String>,
}

/// Server-issued registration challenge document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationChallenge {
    /// Base64url-encoded challenge bytes
    pub challenge: String,
    pub rp: RpEntity,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<CredParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_credentials: Vec<CredentialDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<SelectionCriteria>,
    /// Milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Server-issued authentication challenge document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationChallenge {
    pub challenge: String,
    pub rp_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_credentials: Vec<CredentialDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Attestation produced by the registration ceremony, re-encoded for
/// transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    pub attestation_object: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResult {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub cred_type: String,
    pub response: AttestationResponse,
}

/// Assertion produced by the authentication ceremony, re-encoded for
/// transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    pub authenticator_data: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub cred_type: String,
    pub response: AssertionResponse,
}

/// A registered passkey as the server lists it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PasskeySummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
}

// --- Two-factor ---

/// Material for enrolling an authenticator app.
#[derive(Debug, Clone, Deserialize)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub qr_code: String,
    pub manual_entry_key: String,
}

/// Single-use backup credentials returned at enable/regenerate time.
#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryCodes {
    pub recovery_codes: Vec<String>,
}
