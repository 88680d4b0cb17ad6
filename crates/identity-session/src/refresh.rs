//! Silent token renewal scheduling
//!
//! Owns the single active access-token timer. `initialize` parses the
//! unverified `exp` claim, schedules renewal `buffer` seconds ahead of
//! expiry (immediately when already inside the buffer), and the background
//! task renews through the remote refresh operation. Renewal success
//! persists the new tokens and re-arms; any failure is terminal — the
//! manager emits token-refresh-failed, goes idle, and the session context
//! forces logout.
//!
//! Beyond the timer, two environment signals feed the schedule: the
//! page-visibility signal (a backgrounded tab's timer may not have fired;
//! on becoming visible the schedule is re-evaluated against the stored
//! token) and the cross-context storage notification (a sibling tab that
//! refreshed re-arms this tab against the new token; a sibling that logged
//! out tears this manager down). That combination keeps one tab doing the
//! network refresh while every tab converges on the same schedule.
//!
//! State machine: Idle → Armed → Refreshing → Armed (success) | Idle
//! (terminal failure). A trigger while Refreshing is a no-op, which bounds
//! each context to at most one in-flight renewal.

use std::sync::{Arc, Mutex};

use std::time::Duration;

use identity_auth::api::IdentityApi;
use identity_auth::claims;
use identity_auth::storage::{CredentialStore, StorageEvents, keys};
use platform::VisibilitySignal;
use tokio::sync::Notify;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{EventBus, EventKind};

/// Renewal is scheduled this many seconds before the `exp` claim.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(300);

/// Scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Armed,
    Refreshing,
}

/// Outcome of one renewal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Refreshed,
    AlreadyRefreshing,
    Terminal,
}

struct Inner {
    api: Arc<dyn IdentityApi>,
    store: CredentialStore,
    bus: EventBus,
    buffer_secs: u64,
    state: Mutex<RefreshState>,
    /// Unix seconds of the next scheduled renewal
    refresh_at: Mutex<Option<u64>>,
    reschedule: Notify,
}

/// The token lifecycle manager.
///
/// Explicitly constructed and owned by the session context; `initialize`
/// and `cleanup` are called exactly once per active session (re-`initialize`
/// after a commit re-arms the same instance).
pub struct TokenLifecycle {
    inner: Arc<Inner>,
    visibility: Option<VisibilitySignal>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TokenLifecycle {
    pub fn new(
        api: Arc<dyn IdentityApi>,
        store: CredentialStore,
        bus: EventBus,
        buffer: Duration,
        visibility: Option<VisibilitySignal>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                bus,
                buffer_secs: buffer.as_secs(),
                state: Mutex::new(RefreshState::Idle),
                refresh_at: Mutex::new(None),
                reschedule: Notify::new(),
            }),
            visibility,
            task: Mutex::new(None),
        }
    }

    /// Arm the schedule against the given access token.
    ///
    /// `refresh_at = exp − buffer`; a token with no parseable expiry is
    /// treated as already expired and renewed immediately. Negative delays
    /// never reach the timer — a due schedule renews on the spot.
    pub fn initialize(&self, token: &str) {
        let refresh_at = claims::expires_at(token)
            .map(|exp| exp.saturating_sub(self.inner.buffer_secs))
            .unwrap_or(0);

        {
            *self.inner.state.lock().expect("lifecycle state poisoned") = RefreshState::Armed;
            *self
                .inner
                .refresh_at
                .lock()
                .expect("lifecycle schedule poisoned") = Some(refresh_at);
        }

        let now = claims::now_unix_secs();
        if refresh_at > now {
            debug!(in_secs = refresh_at - now, "silent refresh scheduled");
        } else {
            debug!("token already inside refresh buffer, renewing immediately");
        }

        self.ensure_task();
        self.inner.reschedule.notify_one();
    }

    /// Trigger a renewal right now. No-op while one is already in flight.
    ///
    /// Returns true when this call performed the attempt.
    pub async fn refresh_now(&self) -> bool {
        refresh_once(&self.inner).await != RefreshOutcome::AlreadyRefreshing
    }

    /// Cancel the pending timer and detach the environment listeners.
    pub fn cleanup(&self) {
        if let Some(task) = self.task.lock().expect("lifecycle task poisoned").take() {
            task.abort();
        }
        set_idle(&self.inner);
        debug!("token lifecycle cleaned up");
    }

    pub fn state(&self) -> RefreshState {
        *self.inner.state.lock().expect("lifecycle state poisoned")
    }

    /// Unix seconds of the next scheduled renewal, if armed.
    pub fn refresh_at(&self) -> Option<u64> {
        *self
            .inner
            .refresh_at
            .lock()
            .expect("lifecycle schedule poisoned")
    }

    fn ensure_task(&self) {
        let mut slot = self.task.lock().expect("lifecycle task poisoned");
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let inner = self.inner.clone();
        let storage_events = self.inner.store.subscribe();
        let visibility = self.visibility.as_ref().map(|v| v.subscribe());
        *slot = Some(tokio::spawn(run(inner, storage_events, visibility)));
    }
}

/// Background loop: sleep until the schedule is due, renew, re-arm; wake
/// early for storage changes, visibility changes, and reschedule pokes.
async fn run(
    inner: Arc<Inner>,
    mut storage_events: StorageEvents,
    mut visibility: Option<watch::Receiver<bool>>,
) {
    let mut storage_alive = true;
    loop {
        if due_now(&inner) {
            match refresh_once(&inner).await {
                RefreshOutcome::Terminal => break,
                _ => continue,
            }
        }

        let delay = next_delay(&inner);
        tokio::select! {
            _ = async {
                match delay {
                    Some(d) => tokio::time::sleep(d).await,
                    None => std::future::pending::<()>().await,
                }
            } => {}

            change = storage_events.recv(), if storage_alive => {
                match change {
                    Some(change) if change.key == keys::ACCESS_TOKEN => match change.value {
                        Some(_) => {
                            info!("access token replaced by sibling context, re-arming");
                            rearm_from_store(&inner);
                        }
                        None => {
                            info!("access token removed by sibling context, stopping");
                            set_idle(&inner);
                            break;
                        }
                    },
                    Some(_) => {}
                    None => storage_alive = false,
                }
            }

            became_visible = visibility_changed(&mut visibility) => {
                if became_visible {
                    debug!("context became visible, re-evaluating schedule");
                    rearm_from_store(&inner);
                }
            }

            _ = inner.reschedule.notified() => {}
        }
    }
}

/// Resolve the visibility branch to "became visible". Parks forever when
/// no signal is attached; detaches on a dropped signal.
async fn visibility_changed(rx: &mut Option<watch::Receiver<bool>>) -> bool {
    let Some(receiver) = rx.as_mut() else {
        return std::future::pending().await;
    };
    match receiver.changed().await {
        Ok(()) => *receiver.borrow(),
        Err(_) => {
            *rx = None;
            false
        }
    }
}

fn due_now(inner: &Inner) -> bool {
    if *inner.state.lock().expect("lifecycle state poisoned") != RefreshState::Armed {
        return false;
    }
    match *inner
        .refresh_at
        .lock()
        .expect("lifecycle schedule poisoned")
    {
        Some(at) => at <= claims::now_unix_secs(),
        None => false,
    }
}

fn next_delay(inner: &Inner) -> Option<Duration> {
    if *inner.state.lock().expect("lifecycle state poisoned") != RefreshState::Armed {
        return None;
    }
    let at = (*inner
        .refresh_at
        .lock()
        .expect("lifecycle schedule poisoned"))?;
    Some(Duration::from_secs(
        at.saturating_sub(claims::now_unix_secs()),
    ))
}

fn set_idle(inner: &Inner) {
    *inner.state.lock().expect("lifecycle state poisoned") = RefreshState::Idle;
    *inner
        .refresh_at
        .lock()
        .expect("lifecycle schedule poisoned") = None;
}

/// Re-arm against whatever token the store currently holds. Used by the
/// visibility and sibling-change triggers; leaves an in-flight renewal
/// alone (it re-arms itself on completion).
fn rearm_from_store(inner: &Inner) {
    if *inner.state.lock().expect("lifecycle state poisoned") == RefreshState::Refreshing {
        return;
    }
    match inner.store.access_token() {
        Ok(Some(token)) => {
            let refresh_at = claims::expires_at(&token)
                .map(|exp| exp.saturating_sub(inner.buffer_secs))
                .unwrap_or(0);
            *inner.state.lock().expect("lifecycle state poisoned") = RefreshState::Armed;
            *inner
                .refresh_at
                .lock()
                .expect("lifecycle schedule poisoned") = Some(refresh_at);
            debug!(refresh_at, "schedule re-armed from store");
        }
        Ok(None) => set_idle(inner),
        Err(e) => warn!(error = %e, "could not read access token while re-arming"),
    }
}

/// One renewal attempt, re-entrancy guarded.
///
/// Overlapping triggers (timer firing while a visibility check also
/// fires) collapse into a single outbound refresh call per context.
async fn refresh_once(inner: &Inner) -> RefreshOutcome {
    {
        let mut state = inner.state.lock().expect("lifecycle state poisoned");
        if *state == RefreshState::Refreshing {
            debug!("renewal already in flight, ignoring trigger");
            return RefreshOutcome::AlreadyRefreshing;
        }
        *state = RefreshState::Refreshing;
    }

    let refresh_token = match inner.store.refresh_token() {
        Ok(Some(token)) => token,
        Ok(None) => {
            warn!("no refresh token available, renewal is impossible");
            set_idle(inner);
            inner.bus.emit(
                EventKind::TokenRefreshFailed,
                serde_json::json!({
                    "code": "refresh_token_missing",
                    "message": "no refresh token available",
                }),
            );
            return RefreshOutcome::Terminal;
        }
        Err(e) => {
            warn!(error = %e, "could not read refresh token");
            set_idle(inner);
            inner.bus.emit(
                EventKind::TokenRefreshFailed,
                serde_json::json!({ "code": e.code(), "message": e.to_string() }),
            );
            return RefreshOutcome::Terminal;
        }
    };

    match inner.api.refresh(&refresh_token).await {
        Ok(tokens) => {
            if let Err(e) = inner.store.store_tokens(&tokens) {
                warn!(error = %e, "failed to persist refreshed tokens");
            }
            let refresh_at = claims::expires_at(&tokens.access_token)
                .map(|exp| exp.saturating_sub(inner.buffer_secs))
                .unwrap_or(0);
            {
                *inner.state.lock().expect("lifecycle state poisoned") = RefreshState::Armed;
                *inner
                    .refresh_at
                    .lock()
                    .expect("lifecycle schedule poisoned") = Some(refresh_at);
            }
            info!("silent token refresh succeeded");
            inner.bus.emit(EventKind::TokenRefreshed, serde_json::json!({}));
            inner.reschedule.notify_one();
            RefreshOutcome::Refreshed
        }
        Err(e) => {
            warn!(error = %e, "silent token refresh failed");
            set_idle(inner);
            inner.bus.emit(
                EventKind::TokenRefreshFailed,
                serde_json::json!({ "code": e.code(), "message": e.to_string() }),
            );
            RefreshOutcome::Terminal
        }
    }
}
