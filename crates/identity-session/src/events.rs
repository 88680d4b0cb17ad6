//! Session-lifecycle event bus
//!
//! In-process typed publish/subscribe for the closed set of session
//! transitions. Two independently testable layers: the bus itself
//! (kind-filtered listeners, subscription-ordered delivery, panic
//! isolation) and an optional `EventSink` adapter that rebroadcasts every
//! emission onto a host-level channel so non-owning code can observe
//! transitions without coupling to the engine.
//!
//! Delivery contract: kind-specific listeners in subscription order, then
//! any-listeners in subscription order. A panicking listener is logged and
//! skipped; delivery to the remaining listeners continues.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::broadcast;
use tracing::{debug, warn};

/// The closed set of session-lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Login,
    Logout,
    Register,
    TokenRefreshed,
    TokenRefreshFailed,
    PasswordChanged,
    PasswordReset,
    EmailVerified,
    TwoFactorEnabled,
    TwoFactorDisabled,
    PasskeyAdded,
    PasskeyRemoved,
    AccountLinked,
    AccountUnlinked,
}

impl EventKind {
    /// Wire name of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Login => "login",
            EventKind::Logout => "logout",
            EventKind::Register => "register",
            EventKind::TokenRefreshed => "token-refreshed",
            EventKind::TokenRefreshFailed => "token-refresh-failed",
            EventKind::PasswordChanged => "password-changed",
            EventKind::PasswordReset => "password-reset",
            EventKind::EmailVerified => "email-verified",
            EventKind::TwoFactorEnabled => "2fa-enabled",
            EventKind::TwoFactorDisabled => "2fa-disabled",
            EventKind::PasskeyAdded => "passkey-added",
            EventKind::PasskeyRemoved => "passkey-removed",
            EventKind::AccountLinked => "account-linked",
            EventKind::AccountUnlinked => "account-unlinked",
        }
    }
}

/// An emitted transition with its payload.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: EventKind,
    pub data: serde_json::Value,
}

/// Rebroadcast target for every emission.
///
/// Kept as a thin, separately swappable shim so the bus itself stays
/// trivially unit-testable.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &AuthEvent);
}

/// `EventSink` over a tokio broadcast channel — the host-level signal
/// out-of-engine observers subscribe to.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<AuthEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: &AuthEvent) {
        // No observers is normal
        let _ = self.sender.send(event.clone());
    }
}

type Listener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

struct Entry {
    id: u64,
    /// None listens to every kind
    kind: Option<EventKind>,
    /// Set for `once` registrations; flipped on first delivery
    fired: Option<Arc<AtomicBool>>,
    listener: Listener,
}

struct BusInner {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
    sink: Option<Arc<dyn EventSink>>,
}

/// Handle returned by every registration; listeners are detached
/// explicitly, never by scope exit.
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.bus.upgrade() {
            inner
                .entries
                .lock()
                .expect("event bus entries poisoned")
                .retain(|e| e.id != self.id);
        }
    }
}

/// The in-process session event bus. Cloning shares the listener set.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Bus that rebroadcasts every emission through the given sink.
    pub fn with_sink(sink: Arc<dyn EventSink>) -> Self {
        Self::build(Some(sink))
    }

    fn build(sink: Option<Arc<dyn EventSink>>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                sink,
            }),
        }
    }

    /// Listen for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), false, listener)
    }

    /// Listen for every event kind. Any-listeners run after kind-specific
    /// listeners.
    pub fn on_any<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.register(None, false, listener)
    }

    /// Listen for the next emission of a kind, then detach.
    pub fn once<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), true, listener)
    }

    fn register<F>(&self, kind: Option<EventKind>, once: bool, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entries
            .lock()
            .expect("event bus entries poisoned")
            .push(Entry {
                id,
                kind,
                fired: once.then(|| Arc::new(AtomicBool::new(false))),
                listener: Arc::new(listener),
            });
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Emit an event to all matching listeners, then the sink.
    ///
    /// Never panics: each listener invocation is isolated, and a listener
    /// failure does not suppress delivery to subsequent listeners.
    pub fn emit(&self, kind: EventKind, data: serde_json::Value) {
        let event = AuthEvent { kind, data };

        // Snapshot under the lock so listeners can re-enter the bus
        let snapshot: Vec<(Option<EventKind>, Option<Arc<AtomicBool>>, Listener)> = {
            let entries = self.inner.entries.lock().expect("event bus entries poisoned");
            entries
                .iter()
                .filter(|e| e.kind.is_none() || e.kind == Some(kind))
                .map(|e| (e.kind, e.fired.clone(), e.listener.clone()))
                .collect()
        };

        debug!(event = event.kind.as_str(), listeners = snapshot.len(), "emitting");

        // Kind-specific listeners first, any-listeners after, each in
        // subscription order
        for pass_any in [false, true] {
            for (entry_kind, fired, listener) in &snapshot {
                if entry_kind.is_none() != pass_any {
                    continue;
                }
                if let Some(fired) = fired {
                    if fired.swap(true, Ordering::SeqCst) {
                        continue;
                    }
                }
                if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                    warn!(event = event.kind.as_str(), "event listener panicked, continuing");
                }
            }
        }

        // Drop spent once-listeners
        self.inner
            .entries
            .lock()
            .expect("event bus entries poisoned")
            .retain(|e| {
                e.fired
                    .as_ref()
                    .is_none_or(|fired| !fired.load(Ordering::SeqCst))
            });

        if let Some(ref sink) = self.inner.sink {
            sink.publish(&event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
