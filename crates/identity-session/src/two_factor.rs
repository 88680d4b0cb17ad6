//! Step-up second-factor coordination
//!
//! When a first factor succeeds but the account requires a second factor,
//! the server returns a capability-restricted temporary token instead of
//! session tokens. This coordinator holds that token — and only this
//! coordinator ever holds it: it is never written to the credential store,
//! and while it is held the session stays unauthenticated.
//!
//! A failed verification keeps the temporary token so the caller can retry
//! with another code; the server owns rate limiting. The token is dropped
//! on successful verification, on logout, and on any fresh login attempt.

use common::Secret;
use identity_auth::error::{Error, Result};
use tracing::debug;

/// Coordinator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUpState {
    /// No second factor pending
    NotRequired,
    /// Holding a temporary token; waiting for a code
    Pending,
    /// A verification exchange is in flight
    Verifying,
}

/// Holds the temporary step-up token between first-factor success and
/// second-factor verification.
pub struct StepUp {
    state: StepUpState,
    temporary_token: Option<Secret<String>>,
}

impl StepUp {
    pub fn new() -> Self {
        Self {
            state: StepUpState::NotRequired,
            temporary_token: None,
        }
    }

    pub fn state(&self) -> StepUpState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state != StepUpState::NotRequired
    }

    /// First factor succeeded but a second factor is required.
    pub fn begin(&mut self, temporary_token: String) {
        debug!("second factor required, holding temporary token");
        self.temporary_token = Some(Secret::new(temporary_token));
        self.state = StepUpState::Pending;
    }

    /// Take a copy of the token for one verification exchange.
    pub fn start_verifying(&mut self) -> Result<String> {
        match (&self.state, &self.temporary_token) {
            (StepUpState::Pending, Some(token)) => {
                self.state = StepUpState::Verifying;
                Ok(token.expose().clone())
            }
            (StepUpState::Verifying, _) => Err(Error::InvalidTwoFactorCode(
                "a verification is already in flight".into(),
            )),
            _ => Err(Error::NotAuthenticated),
        }
    }

    /// Verification failed; keep the token for another attempt.
    pub fn verification_failed(&mut self) {
        if self.state == StepUpState::Verifying {
            self.state = StepUpState::Pending;
        }
    }

    /// Verification succeeded; the temporary token has served its one
    /// purpose and is dropped (zeroized).
    pub fn complete(&mut self) {
        self.temporary_token = None;
        self.state = StepUpState::NotRequired;
    }

    /// Abandon any pending step-up (fresh login attempt or logout).
    pub fn reset(&mut self) {
        self.temporary_token = None;
        self.state = StepUpState::NotRequired;
    }
}

impl Default for StepUp {
    fn default() -> Self {
        Self::new()
    }
}
