//! Credential storage for session artifacts
//!
//! A pluggable key/value store used by every engine component to persist
//! or read session state: tokens, the serialized user, the device id, the
//! remember-me flag, and per-attempt PKCE records. All backends present
//! the same synchronous get/set contract; none performs network or async
//! work.
//!
//! Cross-context coordination: mutations made through a `CredentialStore`
//! handle are republished on a shared origin hub. A handle never observes
//! its own writes — only sibling-handle mutations — which is exactly the
//! substrate the refresh scheduler needs to keep multiple tabs of the same
//! origin converged on one token pair.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{AuthTokens, User};

/// Well-known store keys.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "auth_access_token";
    pub const REFRESH_TOKEN: &str = "auth_refresh_token";
    pub const USER: &str = "auth_user";
    pub const DEVICE_ID: &str = "auth_device_id";
    pub const REMEMBER_ME: &str = "auth_remember_me";
    /// Namespace for in-flight OAuth attempt records, one per state value
    pub const PKCE_PREFIX: &str = "pkce_state:";
}

/// Synchronous key/value persistence contract shared by all backends.
pub trait StorageBackend: Send + Sync {
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear_prefix(&self, prefix: &str) -> Result<()>;
}

/// Pure in-memory backend for headless and non-interactive contexts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .map_err(|_| Error::Storage("memory store poisoned".into()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .map_err(|_| Error::Storage("memory store poisoned".into()))?
            .get(key)
            .cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.state
            .lock()
            .map_err(|_| Error::Storage("memory store poisoned".into()))?
            .remove(key);
        Ok(())
    }

    fn clear_prefix(&self, prefix: &str) -> Result<()> {
        self.state
            .lock()
            .map_err(|_| Error::Storage("memory store poisoned".into()))?
            .retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}

/// Tab-scoped backend: lives exactly as long as the owning handle, like
/// per-tab session storage. Same contract as `MemoryStorage`; the distinct
/// type records the intended lifetime.
#[derive(Debug, Default)]
pub struct TabStorage {
    inner: MemoryStorage,
}

impl TabStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for TabStorage {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }

    fn clear_prefix(&self, prefix: &str) -> Result<()> {
        self.inner.clear_prefix(prefix)
    }
}

/// Durable origin-scoped backend: a JSON file holding the key/value map.
///
/// All writes use atomic temp-file + rename to prevent corruption on
/// crash, with 0600 permissions since the file contains live tokens. The
/// file is the single source of truth for durable session state; the
/// in-memory map is a cache rewritten on every mutation.
pub struct FileStorage {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or create as `{}`) the backing file at the given path.
    pub fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("reading store file: {e}")))?;
            let state: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing store file: {e}")))?;
            info!(path = %path.display(), entries = state.len(), "loaded credential store");
            state
        } else {
            info!(path = %path.display(), "store file not found, starting empty");
            let state = HashMap::new();
            write_atomic(&path, &state)?;
            state
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn mutate<F: FnOnce(&mut HashMap<String, String>)>(&self, f: F) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Storage("file store poisoned".into()))?;
        f(&mut state);
        write_atomic(&self.path, &state)
    }
}

impl StorageBackend for FileStorage {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|state| {
            state.insert(key.to_string(), value.to_string());
        })
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .map_err(|_| Error::Storage("file store poisoned".into()))?
            .get(key)
            .cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|state| {
            state.remove(key);
        })
    }

    fn clear_prefix(&self, prefix: &str) -> Result<()> {
        self.mutate(|state| {
            state.retain(|k, _| !k.starts_with(prefix));
        })
    }
}

/// Write the store map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Permissions are set to 0600 (owner read/write only) since
/// the contents include OAuth tokens.
fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing store: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage("store path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".store.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Storage(format!("writing temp store file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| Error::Storage(format!("setting store file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Storage(format!("renaming temp store file: {e}")))?;

    debug!(path = %path.display(), "persisted credential store");
    Ok(())
}

// --- Cookie backend ---

/// SameSite attribute for cookie-backed storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SameSite::Strict => f.write_str("Strict"),
            SameSite::Lax => f.write_str("Lax"),
            SameSite::None => f.write_str("None"),
        }
    }
}

/// Attributes applied to every cookie the backend writes.
#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub domain: Option<String>,
    pub path: String,
    pub max_age_secs: Option<u64>,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            domain: None,
            path: "/".into(),
            max_age_secs: None,
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}

/// The host's cookie surface. The engine writes rendered cookie strings
/// and reads raw values; expiry enforcement belongs to the host.
pub trait CookieJar: Send + Sync {
    fn write(&self, cookie: &str);
    fn read(&self, name: &str) -> Option<String>;
    fn names(&self) -> Vec<String>;
}

/// Cookie-backed storage.
///
/// Values are base64url-encoded so serialized JSON survives the cookie
/// value grammar. Keys map to cookie names with ':' replaced by '.'
/// (cookie names cannot contain separators); the mapping preserves
/// prefixes so `clear_prefix` still works.
pub struct CookieStorage {
    jar: Arc<dyn CookieJar>,
    attributes: CookieAttributes,
}

impl CookieStorage {
    pub fn new(jar: Arc<dyn CookieJar>, attributes: CookieAttributes) -> Self {
        Self { jar, attributes }
    }

    fn cookie_name(key: &str) -> String {
        key.replace(':', ".")
    }

    fn render(&self, name: &str, value: &str, max_age: Option<u64>) -> String {
        let mut cookie = format!("{name}={value}; Path={}", self.attributes.path);
        if let Some(ref domain) = self.attributes.domain {
            cookie.push_str(&format!("; Domain={domain}"));
        }
        if let Some(max_age) = max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.attributes.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(&format!("; SameSite={}", self.attributes.same_site));
        cookie
    }
}

impl StorageBackend for CookieStorage {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(value);
        let cookie = self.render(
            &Self::cookie_name(key),
            &encoded,
            self.attributes.max_age_secs,
        );
        self.jar.write(&cookie);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        use base64::Engine;
        match self.jar.read(&Self::cookie_name(key)) {
            Some(encoded) => {
                let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
                    .decode(encoded.as_bytes())
                    .map_err(|e| Error::Storage(format!("cookie value not base64url: {e}")))?;
                let value = String::from_utf8(bytes)
                    .map_err(|e| Error::Storage(format!("cookie value not utf-8: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        // Max-Age=0 tells the jar to drop the cookie
        let cookie = self.render(&Self::cookie_name(key), "", Some(0));
        self.jar.write(&cookie);
        Ok(())
    }

    fn clear_prefix(&self, prefix: &str) -> Result<()> {
        let name_prefix = Self::cookie_name(prefix);
        for name in self.jar.names() {
            if name.starts_with(&name_prefix) {
                let cookie = self.render(&name, "", Some(0));
                self.jar.write(&cookie);
            }
        }
        Ok(())
    }
}

// --- Change notification ---

/// A mutation observed from a sibling store handle.
#[derive(Debug, Clone)]
pub struct StorageChange {
    pub key: String,
    /// New value; None means the key was removed
    pub value: Option<String>,
    origin: u64,
}

/// Shared notification channel for all store handles of one origin.
///
/// Mirrors the browser storage event: every handle attached to the hub
/// hears every mutation except its own.
#[derive(Debug, Clone)]
pub struct StorageHub {
    sender: broadcast::Sender<StorageChange>,
    next_origin: Arc<AtomicU64>,
}

impl StorageHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            sender,
            next_origin: Arc::new(AtomicU64::new(1)),
        }
    }

    fn register(&self) -> u64 {
        self.next_origin.fetch_add(1, Ordering::Relaxed)
    }

    fn publish(&self, change: StorageChange) {
        // No subscribers is normal (single tab, nothing armed yet)
        let _ = self.sender.send(change);
    }
}

impl Default for StorageHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription to sibling-handle mutations.
pub struct StorageEvents {
    rx: broadcast::Receiver<StorageChange>,
    origin: u64,
}

impl StorageEvents {
    /// Wait for the next change made by a different handle.
    ///
    /// Skips this handle's own writes. Returns None once the hub is gone.
    pub async fn recv(&mut self) -> Option<StorageChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.origin == self.origin => continue,
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "storage change subscriber lagged, continuing");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Handle every engine component goes through to persist or read session
/// artifacts. Cloning keeps the same origin identity (same tab); attach a
/// fresh handle to the same backend and hub to model a sibling tab.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
    hub: StorageHub,
    origin: u64,
}

impl CredentialStore {
    /// Store with a private hub (single-context use).
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_hub(backend, StorageHub::new())
    }

    /// Store attached to a shared hub; each call registers a new origin
    /// identity, i.e. a new "tab".
    pub fn with_hub(backend: Arc<dyn StorageBackend>, hub: StorageHub) -> Self {
        let origin = hub.register();
        Self {
            backend,
            hub,
            origin,
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.backend.set(key, value)?;
        self.hub.publish(StorageChange {
            key: key.to_string(),
            value: Some(value.to_string()),
            origin: self.origin,
        });
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.backend.get(key)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove(key)?;
        self.hub.publish(StorageChange {
            key: key.to_string(),
            value: None,
            origin: self.origin,
        });
        Ok(())
    }

    /// Drop every key under the prefix. Prefix sweeps are local hygiene
    /// (in-flight PKCE records); they are not republished to siblings.
    pub fn clear_prefix(&self, prefix: &str) -> Result<()> {
        self.backend.clear_prefix(prefix)
    }

    /// Subscribe to mutations made by sibling handles.
    pub fn subscribe(&self) -> StorageEvents {
        StorageEvents {
            rx: self.hub.sender.subscribe(),
            origin: self.origin,
        }
    }

    // --- Typed accessors for the well-known keys ---

    pub fn access_token(&self) -> Result<Option<String>> {
        self.get(keys::ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.get(keys::REFRESH_TOKEN)
    }

    /// Persist a token pair. A refresh token is only written when the
    /// server returned one; an absent refresh token leaves the stored one
    /// in place (rotation is the server's choice).
    pub fn store_tokens(&self, tokens: &AuthTokens) -> Result<()> {
        self.set(keys::ACCESS_TOKEN, &tokens.access_token)?;
        if let Some(ref refresh) = tokens.refresh_token {
            self.set(keys::REFRESH_TOKEN, refresh)?;
        }
        Ok(())
    }

    pub fn user(&self) -> Result<Option<User>> {
        match self.get(keys::USER)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| Error::Storage(format!("stored user unreadable: {e}"))),
            None => Ok(None),
        }
    }

    pub fn store_user(&self, user: &User) -> Result<()> {
        let json = serde_json::to_string(user)
            .map_err(|e| Error::Storage(format!("serializing user: {e}")))?;
        self.set(keys::USER, &json)
    }

    /// Remove all session artifacts: tokens, user, in-flight PKCE records.
    /// The device id and remember-me flag survive logout.
    pub fn clear_session(&self) -> Result<()> {
        self.remove(keys::ACCESS_TOKEN)?;
        self.remove(keys::REFRESH_TOKEN)?;
        self.remove(keys::USER)?;
        self.clear_prefix(keys::PKCE_PREFIX)
    }

    /// Stable per-installation identifier, generated on first use.
    pub fn device_id(&self) -> Result<String> {
        if let Some(id) = self.get(keys::DEVICE_ID)? {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.set(keys::DEVICE_ID, &id)?;
        Ok(id)
    }

    pub fn remember_me(&self) -> Result<bool> {
        Ok(matches!(self.get(keys::REMEMBER_ME)?.as_deref(), Some("true")))
    }

    pub fn set_remember_me(&self, remember: bool) -> Result<()> {
        self.set(keys::REMEMBER_ME, if remember { "true" } else { "false" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn memory_roundtrip() {
        let store = memory_store();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn clear_prefix_only_removes_matching_keys() {
        let store = memory_store();
        store.set("pkce_state:abc", "1").unwrap();
        store.set("pkce_state:def", "2").unwrap();
        store.set("auth_access_token", "at").unwrap();

        store.clear_prefix("pkce_state:").unwrap();

        assert_eq!(store.get("pkce_state:abc").unwrap(), None);
        assert_eq!(store.get("pkce_state:def").unwrap(), None);
        assert_eq!(
            store.get("auth_access_token").unwrap().as_deref(),
            Some("at")
        );
    }

    #[test]
    fn file_storage_roundtrip_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStorage::open(path.clone()).unwrap();
        store.set("auth_access_token", "at_1").unwrap();
        drop(store);

        let store = FileStorage::open(path).unwrap();
        assert_eq!(
            store.get("auth_access_token").unwrap().as_deref(),
            Some("at_1")
        );
    }

    #[test]
    fn file_storage_cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        assert!(!path.exists());
        let _store = FileStorage::open(path.clone()).unwrap();
        assert!(path.exists());

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStorage::open(path.clone()).unwrap();
        store.set("auth_refresh_token", "rt").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "store file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn sibling_handle_observes_change_writer_does_not() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let hub = StorageHub::new();
        let tab_a = CredentialStore::with_hub(backend.clone(), hub.clone());
        let tab_b = CredentialStore::with_hub(backend, hub);

        let mut a_events = tab_a.subscribe();
        let mut b_events = tab_b.subscribe();

        tab_a.set("auth_access_token", "at_new").unwrap();

        let change = b_events.recv().await.expect("sibling sees the write");
        assert_eq!(change.key, "auth_access_token");
        assert_eq!(change.value.as_deref(), Some("at_new"));

        // The writer must not hear its own mutation
        let own = tokio::time::timeout(std::time::Duration::from_millis(50), a_events.recv()).await;
        assert!(own.is_err(), "writer observed its own change");
    }

    #[tokio::test]
    async fn removal_notifies_with_none_value() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let hub = StorageHub::new();
        let tab_a = CredentialStore::with_hub(backend.clone(), hub.clone());
        let tab_b = CredentialStore::with_hub(backend, hub);

        tab_a.set("auth_access_token", "at").unwrap();
        let mut b_events = tab_b.subscribe();

        tab_a.remove("auth_access_token").unwrap();
        let change = b_events.recv().await.unwrap();
        assert_eq!(change.key, "auth_access_token");
        assert_eq!(change.value, None);
    }

    #[test]
    fn store_tokens_keeps_existing_refresh_when_absent() {
        let store = memory_store();
        store
            .store_tokens(&AuthTokens {
                access_token: "at_1".into(),
                refresh_token: Some("rt_1".into()),
                token_type: "bearer".into(),
                expires_in: Some(3600),
            })
            .unwrap();

        // Rotation without a new refresh token
        store
            .store_tokens(&AuthTokens {
                access_token: "at_2".into(),
                refresh_token: None,
                token_type: "bearer".into(),
                expires_in: Some(3600),
            })
            .unwrap();

        assert_eq!(store.access_token().unwrap().as_deref(), Some("at_2"));
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("rt_1"));
    }

    #[test]
    fn clear_session_keeps_device_id() {
        let store = memory_store();
        let device = store.device_id().unwrap();
        store.set(keys::ACCESS_TOKEN, "at").unwrap();
        store.set(keys::REFRESH_TOKEN, "rt").unwrap();
        store.set("pkce_state:s1", "{}").unwrap();

        store.clear_session().unwrap();

        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(store.refresh_token().unwrap(), None);
        assert_eq!(store.get("pkce_state:s1").unwrap(), None);
        assert_eq!(store.device_id().unwrap(), device);
    }

    #[test]
    fn device_id_is_stable() {
        let store = memory_store();
        let first = store.device_id().unwrap();
        let second = store.device_id().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 36, "uuid v4 string form");
    }

    #[test]
    fn user_roundtrip() {
        let store = memory_store();
        let user = User {
            id: "u-1".into(),
            email: "a@b.com".into(),
            email_verified: true,
            username: Some("ada".into()),
            display_name: None,
            two_factor_enabled: false,
        };
        store.store_user(&user).unwrap();
        assert_eq!(store.user().unwrap(), Some(user));
    }

    // --- Cookie backend ---

    #[derive(Default)]
    struct MemoryJar {
        cookies: Mutex<HashMap<String, String>>,
    }

    impl CookieJar for MemoryJar {
        fn write(&self, cookie: &str) {
            let mut parts = cookie.split(';');
            let pair = parts.next().unwrap_or_default();
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let dropped = parts.any(|attr| attr.trim() == "Max-Age=0");
            let mut cookies = self.cookies.lock().unwrap();
            if dropped {
                cookies.remove(name.trim());
            } else {
                cookies.insert(name.trim().to_string(), value.to_string());
            }
        }

        fn read(&self, name: &str) -> Option<String> {
            self.cookies.lock().unwrap().get(name).cloned()
        }

        fn names(&self) -> Vec<String> {
            self.cookies.lock().unwrap().keys().cloned().collect()
        }
    }

    #[test]
    fn cookie_roundtrip_encodes_value() {
        let jar = Arc::new(MemoryJar::default());
        let storage = CookieStorage::new(jar.clone(), CookieAttributes::default());

        storage.set("auth_user", r#"{"id":"u-1"}"#).unwrap();
        // The raw cookie value must not contain JSON punctuation
        let raw = jar.read("auth_user").unwrap();
        assert!(!raw.contains('{') && !raw.contains('"'), "raw: {raw}");

        assert_eq!(
            storage.get("auth_user").unwrap().as_deref(),
            Some(r#"{"id":"u-1"}"#)
        );
    }

    #[test]
    fn cookie_rendering_includes_attributes() {
        let storage = CookieStorage::new(
            Arc::new(MemoryJar::default()),
            CookieAttributes {
                domain: Some("app.example.com".into()),
                path: "/auth".into(),
                max_age_secs: Some(86400),
                secure: true,
                same_site: SameSite::Strict,
            },
        );
        let cookie = storage.render("auth_access_token", "abc", Some(86400));
        assert!(cookie.contains("Domain=app.example.com"), "got: {cookie}");
        assert!(cookie.contains("Path=/auth"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
    }

    #[test]
    fn cookie_names_replace_separators() {
        let jar = Arc::new(MemoryJar::default());
        let storage = CookieStorage::new(jar.clone(), CookieAttributes::default());

        storage.set("pkce_state:abc", "v").unwrap();
        assert!(jar.read("pkce_state.abc").is_some());
        assert_eq!(storage.get("pkce_state:abc").unwrap().as_deref(), Some("v"));

        storage.clear_prefix("pkce_state:").unwrap();
        assert_eq!(storage.get("pkce_state:abc").unwrap(), None);
    }
}
