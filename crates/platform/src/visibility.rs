//! Page-visibility signal
//!
//! Backgrounded tabs may not fire timers on schedule; when the tab becomes
//! visible again the token lifecycle manager re-evaluates its schedule
//! against the wall clock. The host flips this signal from whatever its
//! environment provides (a visibilitychange handler, an app-resume hook).
//! Subscriptions are plain `watch` receivers, detached by dropping them.

use tokio::sync::watch;

/// Broadcast of the host's foreground/background state. Starts visible.
#[derive(Debug, Clone)]
pub struct VisibilitySignal {
    sender: watch::Sender<bool>,
}

impl VisibilitySignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(true);
        Self { sender }
    }

    /// Host-side: report a visibility change.
    pub fn set_visible(&self, visible: bool) {
        // send_replace never fails; a signal with no subscribers is fine
        self.sender.send_replace(visible);
    }

    /// Engine-side: subscribe to visibility changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Current state without subscribing.
    pub fn is_visible(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for VisibilitySignal {
    fn default() -> Self {
        Self::new()
    }
}
