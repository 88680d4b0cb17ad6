//! User-agent navigation seam
//!
//! The OAuth flow ends its first half by sending the user agent to the
//! provider's authorization URL — a full navigation away from the
//! application. The engine cannot (and should not) know how the host does
//! that, so it pushes the URL through this trait.

use tracing::debug;

/// Sends the user agent to an external URL.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Navigator for headless hosts and tests: records nothing, goes nowhere.
///
/// The OAuth controller also returns the authorization URL to its caller,
/// so a host using this navigator can still drive the redirect itself.
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, url: &str) {
        debug!(%url, "navigation requested, no user agent attached");
    }
}
