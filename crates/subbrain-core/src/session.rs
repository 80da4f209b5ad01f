//! The active engine endpoint.
//!
//! `ConnectionSession` is the only owner of "which engine is active". Every
//! other component receives a clone of the handle (or a subscription) and
//! only ever reads it.

use crate::discovery::normalize_address;
use crate::error::{ClientError, Result};

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Key under which the last selected address is persisted.
pub const SESSION_KEY: &str = "subgen_url";

/// Durable storage for the last selected address.
pub trait SessionStore: Send + Sync + 'static {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, address: &str) -> Result<()>;
}

/// Stores the address in a small JSON object on disk, next to other keys
/// that may live in the same file.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the default config directory.
    pub fn default_location() -> Self {
        Self::new(crate::config::get_session_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the persisted address, keeping any other keys in the file.
    pub fn forget(&self) -> Result<()> {
        let mut map = self.read_map()?;
        if map.remove(SESSION_KEY).is_some() {
            std::fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        }
        Ok(())
    }

    fn read_map(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let map = serde_json::from_str(&content)?;
        Ok(map)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<String>> {
        let map = self.read_map()?;
        Ok(map
            .get(SESSION_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty()))
    }

    fn save(&self, address: &str) -> Result<()> {
        // A corrupt file is replaced rather than blocking the new selection.
        let mut map = self.read_map().unwrap_or_default();
        map.insert(
            SESSION_KEY.to_string(),
            serde_json::Value::String(address.to_string()),
        );
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&map)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Process-local store, for embedding and tests.
#[derive(Default)]
pub struct MemorySessionStore {
    value: Mutex<Option<String>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.value.lock().clone())
    }

    fn save(&self, address: &str) -> Result<()> {
        *self.value.lock() = Some(address.to_string());
        Ok(())
    }
}

impl<S: SessionStore> SessionStore for Arc<S> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, address: &str) -> Result<()> {
        (**self).save(address)
    }
}

struct SessionInner {
    store: Box<dyn SessionStore>,
    active: watch::Sender<Option<String>>,
}

/// Handle to the active endpoint. Clones share the same state.
#[derive(Clone)]
pub struct ConnectionSession {
    inner: Arc<SessionInner>,
}

impl ConnectionSession {
    /// Create an empty session. Nothing is active until `select` or `restore`.
    pub fn new(store: impl SessionStore) -> Self {
        let (active, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                store: Box::new(store),
                active,
            }),
        }
    }

    /// Make `address` the active endpoint, persist it and wake dependents.
    ///
    /// A persistence failure is logged; the selection still takes effect for
    /// this process.
    pub fn select(&self, address: &str) {
        let address = normalize_address(address);
        if let Err(e) = self.inner.store.save(&address) {
            log::warn!("Failed to persist selected endpoint {}: {}", address, e);
        }
        log::info!("Active Subgen endpoint: {}", address);
        self.inner.active.send_replace(Some(address));
    }

    /// Re-activate the persisted address without probing it.
    ///
    /// A previously working address is trusted until the health poller says
    /// otherwise.
    pub fn restore(&self) -> Option<String> {
        match self.inner.store.load() {
            Ok(Some(address)) => {
                log::info!("Restored Subgen endpoint {}", address);
                self.inner.active.send_replace(Some(address.clone()));
                Some(address)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read persisted endpoint: {}", e);
                None
            }
        }
    }

    /// Drop the active endpoint. Persisted storage is left alone; the next
    /// `select` overwrites it.
    pub fn clear(&self) {
        let previous = self.inner.active.send_replace(None);
        if let Some(address) = previous {
            log::info!("Disconnected from {}", address);
        }
    }

    pub fn active(&self) -> Option<String> {
        self.inner.active.borrow().clone()
    }

    /// Active address, or `NoActiveEndpoint` when discovery has not finished.
    pub fn require_active(&self) -> Result<String> {
        self.active().ok_or(ClientError::NoActiveEndpoint)
    }

    /// Whether `address` is still the active endpoint.
    pub fn is_active(&self, address: &str) -> bool {
        self.inner.active.borrow().as_deref() == Some(address)
    }

    /// Receive a notification every time the active endpoint changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.inner.active.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_then_restore_on_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let session = ConnectionSession::new(FileSessionStore::new(&path));
        session.select("http://172.17.0.1:9000/");
        assert_eq!(session.active().as_deref(), Some("http://172.17.0.1:9000"));

        let fresh = ConnectionSession::new(FileSessionStore::new(&path));
        assert_eq!(fresh.active(), None);
        assert_eq!(fresh.restore().as_deref(), Some("http://172.17.0.1:9000"));
        assert_eq!(fresh.active().as_deref(), Some("http://172.17.0.1:9000"));
    }

    #[test]
    fn select_overwrites_previous_address() {
        let store = Arc::new(MemorySessionStore::default());
        let session = ConnectionSession::new(store.clone());
        session.select("http://a:9000");
        session.select("http://b:9000");
        assert_eq!(store.load().unwrap().as_deref(), Some("http://b:9000"));
    }

    #[test]
    fn clear_keeps_persisted_address() {
        let store = Arc::new(MemorySessionStore::default());
        let session = ConnectionSession::new(store.clone());
        session.select("http://a:9000");
        session.clear();
        assert_eq!(session.active(), None);
        assert_eq!(session.require_active(), Err(ClientError::NoActiveEndpoint));
        assert_eq!(store.load().unwrap().as_deref(), Some("http://a:9000"));

        let fresh = ConnectionSession::new(store);
        assert_eq!(fresh.restore().as_deref(), Some("http://a:9000"));
    }

    #[test]
    fn restore_without_history_stays_empty() {
        let dir = tempfile::tempdir().unwrap();
        let session = ConnectionSession::new(FileSessionStore::new(dir.path().join("none.json")));
        assert_eq!(session.restore(), None);
        assert_eq!(session.active(), None);
    }

    #[test]
    fn file_store_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();
        let store = FileSessionStore::new(&path);
        store.save("http://a:9000").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw[SESSION_KEY], "http://a:9000");
    }

    #[test]
    fn forget_removes_only_the_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();
        let store = FileSessionStore::new(&path);
        store.save("http://a:9000").unwrap();

        store.forget().unwrap();
        assert_eq!(store.load().unwrap(), None);
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");

        FileSessionStore::new(dir.path().join("missing.json")).forget().unwrap();
    }

    #[test]
    fn corrupt_file_does_not_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "garbage").unwrap();
        let session = ConnectionSession::new(FileSessionStore::new(&path));
        assert_eq!(session.restore(), None);

        session.select("http://a:9000");
        let fresh = ConnectionSession::new(FileSessionStore::new(&path));
        assert_eq!(fresh.restore().as_deref(), Some("http://a:9000"));
    }

    #[tokio::test]
    async fn dependents_are_notified() {
        let session = ConnectionSession::new(MemorySessionStore::default());
        let mut rx = session.subscribe();
        assert_eq!(*rx.borrow_and_update(), None);

        session.select("http://a:9000");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_deref(), Some("http://a:9000"));

        session.clear();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), None);
    }
}
