//! Passkey ceremony client
//!
//! Translates server-issued challenge documents into the binary exchange
//! the platform authenticator expects, and relays the signed result back
//! to the server. Registration and authentication are symmetric: begin
//! (fetch document) → decode → platform ceremony → encode → complete.
//!
//! All textual↔binary translation lives in the `codec` module as pure
//! functions, so the orchestration itself carries no encoding detail and
//! tests drive it with fake binary payloads. Platform rejections keep
//! their category (unsupported, cancelled, timed out, duplicate) because
//! callers offer a fallback credential method instead of retrying.

use std::sync::Arc;
use std::time::Duration;

use identity_auth::api::IdentityApi;
use identity_auth::error::{Error, Result};
use identity_auth::types::{
    AssertionResponse, AssertionResult, AttestationResponse, AuthenticationChallenge,
    PasskeySummary, RegistrationChallenge, RegistrationResult, SessionPayload,
};
use platform::{
    AssertionRequest, Authenticator, AuthenticatorError, AuthenticatorSelection, CeremonyUser,
    CreatedCredential, CredentialAssertion, CredentialCreationRequest, RelyingParty,
};
use tracing::info;

/// Textual↔binary translation for ceremony payloads.
pub mod codec {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use identity_auth::error::{Error, Result};

    /// Decode a base64url document field to bytes. Tolerates padded input.
    pub fn decode_field(value: &str) -> Result<Vec<u8>> {
        URL_SAFE_NO_PAD
            .decode(value.trim_end_matches('='))
            .map_err(|e| Error::Decode(format!("ceremony field not base64url: {e}")))
    }

    /// Encode binary ceremony output for transport.
    pub fn encode_field(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// User-verification requirement applied when the document leaves it out.
const DEFAULT_USER_VERIFICATION: &str = "preferred";

/// The ceremony orchestrator. Owned by the session context.
pub struct PasskeyCeremony {
    api: Arc<dyn IdentityApi>,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl PasskeyCeremony {
    pub fn new(api: Arc<dyn IdentityApi>, authenticator: Option<Arc<dyn Authenticator>>) -> Self {
        Self { api, authenticator }
    }

    fn authenticator(&self) -> Result<&Arc<dyn Authenticator>> {
        self.authenticator
            .as_ref()
            .ok_or_else(|| Error::PasskeyUnsupported("no platform authenticator attached".into()))
    }

    /// Register a new passkey for the authenticated user under the given
    /// friendly name.
    pub async fn register(&self, access: &str, name: &str) -> Result<PasskeySummary> {
        let authenticator = self.authenticator()?;
        let challenge = self.api.passkey_register_begin(access).await?;
        let request = creation_request(&challenge)?;
        let credential = authenticator
            .create_credential(request)
            .await
            .map_err(ceremony_error)?;
        let result = registration_result(&credential);
        let summary = self
            .api
            .passkey_register_complete(access, result, name)
            .await?;
        info!(passkey = %summary.id, "passkey registered");
        Ok(summary)
    }

    /// Authenticate with a passkey, optionally scoped to a known account
    /// by email. The returned payload is committed by the caller exactly
    /// like a direct login.
    pub async fn authenticate(&self, email: Option<&str>) -> Result<SessionPayload> {
        let authenticator = self.authenticator()?;
        let challenge = self.api.passkey_auth_begin(email).await?;
        let request = assertion_request(&challenge)?;
        let assertion = authenticator
            .get_credential(request)
            .await
            .map_err(ceremony_error)?;
        let result = assertion_result(&assertion);
        let payload = self.api.passkey_auth_complete(result).await?;
        info!("passkey authentication completed");
        Ok(payload)
    }
}

/// Build the binary platform request from a registration document.
fn creation_request(challenge: &RegistrationChallenge) -> Result<CredentialCreationRequest> {
    let selection = challenge.authenticator_selection.clone().unwrap_or_default();
    let exclude_credentials = challenge
        .exclude_credentials
        .iter()
        .map(|descriptor| codec::decode_field(&descriptor.id))
        .collect::<Result<Vec<_>>>()?;

    Ok(CredentialCreationRequest {
        challenge: codec::decode_field(&challenge.challenge)?,
        relying_party: RelyingParty {
            id: challenge.rp.id.clone(),
            name: challenge.rp.name.clone(),
        },
        user: CeremonyUser {
            id: codec::decode_field(&challenge.user.id)?,
            name: challenge.user.name.clone(),
            display_name: challenge.user.display_name.clone(),
        },
        algorithms: challenge
            .pub_key_cred_params
            .iter()
            .filter(|param| param.cred_type == "public-key")
            .map(|param| param.alg)
            .collect(),
        exclude_credentials,
        selection: AuthenticatorSelection {
            attachment: selection.authenticator_attachment,
            resident_key: selection.resident_key,
            user_verification: selection
                .user_verification
                .unwrap_or_else(|| DEFAULT_USER_VERIFICATION.into()),
        },
        timeout: challenge.timeout.map(Duration::from_millis),
    })
}

/// Re-encode the attestation for transport.
fn registration_result(credential: &CreatedCredential) -> RegistrationResult {
    let id = codec::encode_field(&credential.id);
    RegistrationResult {
        id: id.clone(),
        raw_id: id,
        cred_type: "public-key".into(),
        response: AttestationResponse {
            attestation_object: codec::encode_field(&credential.attestation_object),
            client_data_json: codec::encode_field(&credential.client_data_json),
            transports: credential.transports.clone(),
        },
    }
}

/// Build the binary platform request from an authentication document.
fn assertion_request(challenge: &AuthenticationChallenge) -> Result<AssertionRequest> {
    let allow_credentials = challenge
        .allow_credentials
        .iter()
        .map(|descriptor| codec::decode_field(&descriptor.id))
        .collect::<Result<Vec<_>>>()?;

    Ok(AssertionRequest {
        challenge: codec::decode_field(&challenge.challenge)?,
        relying_party_id: challenge.rp_id.clone(),
        allow_credentials,
        user_verification: challenge
            .user_verification
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_VERIFICATION.into()),
        timeout: challenge.timeout.map(Duration::from_millis),
    })
}

/// Re-encode the assertion for transport.
fn assertion_result(assertion: &CredentialAssertion) -> AssertionResult {
    let id = codec::encode_field(&assertion.id);
    AssertionResult {
        id: id.clone(),
        raw_id: id,
        cred_type: "public-key".into(),
        response: AssertionResponse {
            authenticator_data: codec::encode_field(&assertion.authenticator_data),
            client_data_json: codec::encode_field(&assertion.client_data_json),
            signature: codec::encode_field(&assertion.signature),
            user_handle: assertion
                .user_handle
                .as_deref()
                .map(codec::encode_field),
        },
    }
}

/// Map a platform rejection to the ceremony error taxonomy.
fn ceremony_error(e: AuthenticatorError) -> Error {
    match e {
        AuthenticatorError::NotSupported(message) => Error::PasskeyUnsupported(message),
        AuthenticatorError::Cancelled => Error::CeremonyCancelled,
        AuthenticatorError::TimedOut => Error::CeremonyTimeout,
        AuthenticatorError::DuplicateCredential => Error::DuplicateCredential,
        AuthenticatorError::Failed(message) => Error::CeremonyFailed(message),
    }
}
