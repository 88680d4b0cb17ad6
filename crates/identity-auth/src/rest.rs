//! HTTP implementation of the identity-server operations
//!
//! JSON request/response bodies over reqwest. Every request is bound to
//! the client-wide timeout; a timed-out request surfaces as
//! `Error::Timeout`, distinct from a server-returned failure. Non-2xx
//! responses are read for a machine-readable `{code, message}` detail and
//! become `Error::Server`; a handful of call sites narrow that into the
//! credential-error variants the caller can act on.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{ApiFuture, IdentityApi};
use crate::error::{Error, Result};
use crate::types::{
    AssertionResult, AuthTokens, AuthenticationChallenge, LinkedAccount, LinkedAccountsResponse,
    LoginOutcome, LoginRequest, OAuthAuthorizeRequest, OAuthAuthorizeResponse,
    OAuthCallbackRequest, PasskeySummary, RecoveryCodes, RegisterOutcome, RegisterRequest,
    RegistrationChallenge, RegistrationResult, SessionPayload, TwoFactorSetup,
};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed identity server client.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    /// Build a client for the given server base URL with the default
    /// 30-second request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("building http client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        bearer: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Send, check status, deserialize.
    async fn execute<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(parse_server_error(status.as_u16(), &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Decode(format!("invalid response body: {e}")))
    }

    /// Send, check status, ignore the body.
    async fn execute_empty(&self, builder: reqwest::RequestBuilder) -> Result<()> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(parse_server_error(status.as_u16(), &body));
        }
        Ok(())
    }
}

/// Map a reqwest failure to the transport taxonomy.
fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(e.to_string())
    }
}

/// Machine-readable error shapes the server may return.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Parse a non-2xx body into `Error::Server {status, code, message}`.
///
/// Accepts `{code, message}`, `{detail: "..."}`, `{detail: {code, message}}`,
/// and OAuth-style `{error, error_description}`; anything else keeps the
/// raw body as the message.
fn parse_server_error(status: u16, body: &str) -> Error {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let (code, message) = match parsed {
        Some(e) => {
            if let Some(detail) = e.detail {
                match detail {
                    serde_json::Value::String(s) => ("server_error".to_string(), s),
                    serde_json::Value::Object(ref obj) => (
                        obj.get("code")
                            .and_then(|v| v.as_str())
                            .unwrap_or("server_error")
                            .to_string(),
                        obj.get("message")
                            .and_then(|v| v.as_str())
                            .unwrap_or(body)
                            .to_string(),
                    ),
                    other => ("server_error".to_string(), other.to_string()),
                }
            } else if let Some(error) = e.error {
                (error, e.error_description.unwrap_or_else(|| body.to_string()))
            } else {
                (
                    e.code.unwrap_or_else(|| "server_error".to_string()),
                    e.message.unwrap_or_else(|| body.to_string()),
                )
            }
        }
        None => ("server_error".to_string(), body.to_string()),
    };
    debug!(status, code = %code, "server returned error");
    Error::Server {
        status,
        code,
        message,
    }
}

/// Narrow a 401 on the login path into the credential-error variant.
fn map_login_error(e: Error) -> Error {
    match e {
        Error::Server {
            status: 401,
            message,
            ..
        } => Error::InvalidCredentials(message),
        other => other,
    }
}

/// Refresh rejections are terminal; 401/403 means the refresh token is
/// revoked or expired.
fn map_refresh_error(e: Error) -> Error {
    match e {
        Error::Server {
            status: 401 | 403,
            message,
            ..
        } => Error::RefreshRejected(message),
        other => other,
    }
}

/// Narrow a rejected second-factor submission to the matching code error.
fn map_verify_error(e: Error, is_recovery_code: bool) -> Error {
    match e {
        Error::Server {
            status: 400 | 401,
            message,
            ..
        } => {
            if is_recovery_code {
                Error::InvalidRecoveryCode(message)
            } else {
                Error::InvalidTwoFactorCode(message)
            }
        }
        other => other,
    }
}

impl IdentityApi for RestClient {
    fn login(&self, request: LoginRequest) -> ApiFuture<'_, LoginOutcome> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/login", None)
                .json(&request);
            self.execute(builder).await.map_err(map_login_error)
        })
    }

    fn register(&self, request: RegisterRequest) -> ApiFuture<'_, RegisterOutcome> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/register", None)
                .json(&request);
            self.execute(builder).await
        })
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> ApiFuture<'a, AuthTokens> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/refresh", None)
                .json(&serde_json::json!({ "refresh_token": refresh_token }));
            self.execute(builder).await.map_err(map_refresh_error)
        })
    }

    fn logout<'a>(&'a self, access: &'a str, refresh: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/logout", Some(access))
                .json(&serde_json::json!({ "refresh_token": refresh }));
            self.execute_empty(builder).await
        })
    }

    fn oauth_authorize<'a>(
        &'a self,
        provider: &'a str,
        request: OAuthAuthorizeRequest,
        access: Option<&'a str>,
    ) -> ApiFuture<'a, OAuthAuthorizeResponse> {
        Box::pin(async move {
            let path = format!("/auth/oauth/{provider}/authorize");
            let builder = self
                .request(reqwest::Method::POST, &path, access)
                .json(&request);
            self.execute(builder).await
        })
    }

    fn oauth_callback<'a>(
        &'a self,
        provider: &'a str,
        request: OAuthCallbackRequest,
    ) -> ApiFuture<'a, SessionPayload> {
        Box::pin(async move {
            let path = format!("/auth/oauth/{provider}/callback");
            let builder = self
                .request(reqwest::Method::POST, &path, None)
                .json(&request);
            self.execute(builder).await
        })
    }

    fn oauth_link<'a>(
        &'a self,
        provider: &'a str,
        request: OAuthCallbackRequest,
        access: &'a str,
    ) -> ApiFuture<'a, LinkedAccount> {
        Box::pin(async move {
            let path = format!("/auth/oauth/links/{provider}/link");
            let builder = self
                .request(reqwest::Method::POST, &path, Some(access))
                .json(&request);
            self.execute(builder).await
        })
    }

    fn oauth_unlink<'a>(&'a self, provider: &'a str, access: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("/auth/oauth/links/{provider}");
            let builder = self.request(reqwest::Method::DELETE, &path, Some(access));
            self.execute_empty(builder).await
        })
    }

    fn linked_accounts<'a>(&'a self, access: &'a str) -> ApiFuture<'a, Vec<LinkedAccount>> {
        Box::pin(async move {
            let builder = self.request(reqwest::Method::GET, "/auth/oauth/links", Some(access));
            let response: LinkedAccountsResponse = self.execute(builder).await?;
            Ok(response.links)
        })
    }

    fn passkey_register_begin<'a>(
        &'a self,
        access: &'a str,
    ) -> ApiFuture<'a, RegistrationChallenge> {
        Box::pin(async move {
            let builder =
                self.request(reqwest::Method::POST, "/auth/passkeys/register/begin", Some(access));
            self.execute(builder).await
        })
    }

    fn passkey_register_complete<'a>(
        &'a self,
        access: &'a str,
        result: RegistrationResult,
        name: &'a str,
    ) -> ApiFuture<'a, PasskeySummary> {
        Box::pin(async move {
            let builder = self
                .request(
                    reqwest::Method::POST,
                    "/auth/passkeys/register/complete",
                    Some(access),
                )
                .json(&serde_json::json!({ "credential": result, "name": name }));
            self.execute(builder).await
        })
    }

    fn passkey_auth_begin<'a>(
        &'a self,
        email: Option<&'a str>,
    ) -> ApiFuture<'a, AuthenticationChallenge> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/passkeys/authenticate/begin", None)
                .json(&serde_json::json!({ "email": email }));
            self.execute(builder).await
        })
    }

    fn passkey_auth_complete(&self, result: AssertionResult) -> ApiFuture<'_, SessionPayload> {
        Box::pin(async move {
            let builder = self
                .request(
                    reqwest::Method::POST,
                    "/auth/passkeys/authenticate/complete",
                    None,
                )
                .json(&serde_json::json!({ "credential": result }));
            self.execute(builder).await
        })
    }

    fn passkey_list<'a>(&'a self, access: &'a str) -> ApiFuture<'a, Vec<PasskeySummary>> {
        Box::pin(async move {
            let builder = self.request(reqwest::Method::GET, "/auth/passkeys", Some(access));
            self.execute(builder).await
        })
    }

    fn passkey_remove<'a>(&'a self, access: &'a str, passkey_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("/auth/passkeys/{passkey_id}");
            let builder = self.request(reqwest::Method::DELETE, &path, Some(access));
            self.execute_empty(builder).await
        })
    }

    fn two_factor_setup_begin<'a>(&'a self, access: &'a str) -> ApiFuture<'a, TwoFactorSetup> {
        Box::pin(async move {
            let builder = self.request(reqwest::Method::POST, "/auth/2fa/setup/begin", Some(access));
            self.execute(builder).await
        })
    }

    fn two_factor_setup_verify<'a>(
        &'a self,
        access: &'a str,
        code: &'a str,
    ) -> ApiFuture<'a, RecoveryCodes> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/2fa/setup/verify", Some(access))
                .json(&serde_json::json!({ "code": code }));
            self.execute(builder)
                .await
                .map_err(|e| map_verify_error(e, false))
        })
    }

    fn two_factor_verify_login<'a>(
        &'a self,
        temporary_token: &'a str,
        code: &'a str,
        is_recovery_code: bool,
    ) -> ApiFuture<'a, SessionPayload> {
        Box::pin(async move {
            // Authenticated with the temporary token, never the session token
            let builder = self
                .request(
                    reqwest::Method::POST,
                    "/auth/2fa/verify-login",
                    Some(temporary_token),
                )
                .json(&serde_json::json!({
                    "code": code,
                    "is_recovery_code": is_recovery_code,
                }));
            self.execute(builder)
                .await
                .map_err(|e| map_verify_error(e, is_recovery_code))
        })
    }

    fn two_factor_disable<'a>(&'a self, access: &'a str, password: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/2fa/disable", Some(access))
                .json(&serde_json::json!({ "password": password }));
            self.execute_empty(builder).await
        })
    }

    fn two_factor_regenerate_recovery<'a>(
        &'a self,
        access: &'a str,
        password: &'a str,
    ) -> ApiFuture<'a, RecoveryCodes> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/2fa/recovery-codes", Some(access))
                .json(&serde_json::json!({ "password": password }));
            self.execute(builder).await
        })
    }

    fn change_password<'a>(
        &'a self,
        access: &'a str,
        current_password: &'a str,
        new_password: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::PUT, "/auth/password", Some(access))
                .json(&serde_json::json!({
                    "current_password": current_password,
                    "new_password": new_password,
                }));
            self.execute_empty(builder).await
        })
    }

    fn password_reset_request<'a>(&'a self, email: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/password-reset/request", None)
                .json(&serde_json::json!({ "email": email }));
            self.execute_empty(builder).await
        })
    }

    fn password_reset_confirm<'a>(
        &'a self,
        token: &'a str,
        new_password: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/password-reset/confirm", None)
                .json(&serde_json::json!({
                    "token": token,
                    "new_password": new_password,
                }));
            self.execute_empty(builder).await
        })
    }

    fn verify_email<'a>(&'a self, token: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/verify-email", None)
                .json(&serde_json::json!({ "token": token }));
            self.execute_empty(builder).await
        })
    }

    fn resend_verification<'a>(&'a self, email: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .request(reqwest::Method::POST, "/auth/verify-email/resend", None)
                .json(&serde_json::json!({ "email": email }));
            self.execute_empty(builder).await
        })
    }
}
