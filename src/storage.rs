//! Client-side storage
//!
//! Sessions, admin records and redeemed coupons live in small string key/value
//! stores. A tab-scoped [`MemoryStore`] stands in for the browser's session
//! storage and a profile-scoped [`FileStore`] for its durable local storage.
//! Writes are last-write-wins and every change is broadcast as a
//! [`StorageEvent`] so other observers (such as the session gate) can react.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use mockall::automock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

/// Keys of the persisted client state.
pub mod keys {
    /// Opaque session token of the signed-in user (tab scoped).
    pub const TOKEN: &str = "token";

    /// JSON record of the signed-in user (tab scoped).
    pub const USER: &str = "user";

    /// Admin sign-in flag (profile scoped).
    pub const ADMIN_AUTHENTICATED: &str = "adminAuthenticated";

    /// JSON record of the signed-in admin (profile scoped).
    pub const ADMIN_USER: &str = "adminUser";

    /// JSON array of redeemed coupon codes (profile scoped).
    pub const USED_COUPONS: &str = "usedCoupons";
}

/// Number of change events buffered per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be read or written.
    #[error("failed to access store file: {0}")]
    Io(#[from] io::Error),

    /// The store contents could not be encoded as JSON.
    #[error("failed to encode store contents: {0}")]
    Json(#[from] serde_json::Error),

    /// Another thread panicked while holding the store lock.
    #[error("store lock was poisoned")]
    Poisoned,
}

/// A change to a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that was written or removed.
    pub key: String,
}

/// String key/value store shared by the session gate and the coupon used-set.
#[automock]
pub trait SessionStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Subscribe to change events for every key in this store.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

/// In-memory store, lost when dropped.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<FxHashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            entries: Mutex::new(FxHashMap::default()),
            events,
        }
    }

    /// Create a store pre-populated with the given entries. No events are emitted.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();

        if let Ok(mut map) = store.entries.lock() {
            map.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        }

        store
    }

    fn entries(&self) -> Result<MutexGuard<'_, FxHashMap<String, String>>, StoreError> {
        self.entries.lock().map_err(|_err| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries()?.insert(key.to_string(), value.to_string());

        notify(&self.events, key);

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.entries()?.remove(key).is_some() {
            notify(&self.events, key);
        }

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

/// Durable store persisted as a JSON object in a single file.
///
/// The whole file is rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<FxHashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store. So is a file that is not a JSON object
    /// of strings; it is replaced on the next write.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError::Io`] if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => FxHashMap::default(),
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|error| {
                warn!(path = %path.display(), %error, "store file is corrupt, starting empty");
                FxHashMap::default()
            }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => FxHashMap::default(),
            Err(error) => return Err(error.into()),
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            events,
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> Result<MutexGuard<'_, FxHashMap<String, String>>, StoreError> {
        self.entries.lock().map_err(|_err| StoreError::Poisoned)
    }

    fn flush(&self, entries: &FxHashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;

        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut entries = self.entries()?;
            let mut next = entries.clone();

            next.insert(key.to_string(), value.to_string());
            self.flush(&next)?;

            *entries = next;
        }

        notify(&self.events, key);

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let removed = {
            let mut entries = self.entries()?;

            if entries.contains_key(key) {
                let mut next = entries.clone();

                next.remove(key);
                self.flush(&next)?;

                *entries = next;
                true
            } else {
                false
            }
        };

        if removed {
            notify(&self.events, key);
        }

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

/// Publish a change; having no subscribers is fine.
fn notify(events: &broadcast::Sender<StorageEvent>, key: &str) {
    _ = events.send(StorageEvent {
        key: key.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn memory_store_round_trips_values() -> TestResult {
        let store = MemoryStore::new();

        store.set(keys::TOKEN, "abc")?;

        assert_eq!(store.get(keys::TOKEN)?, Some("abc".to_string()));

        store.remove(keys::TOKEN)?;

        assert_eq!(store.get(keys::TOKEN)?, None);

        Ok(())
    }

    #[test]
    fn memory_store_broadcasts_writes_and_removals() -> TestResult {
        let store = MemoryStore::new();
        let mut events = store.subscribe();

        store.set(keys::TOKEN, "abc")?;
        store.remove(keys::TOKEN)?;

        assert_eq!(events.try_recv()?.key, keys::TOKEN);
        assert_eq!(events.try_recv()?.key, keys::TOKEN);

        Ok(())
    }

    #[test]
    fn removing_a_missing_key_is_silent() -> TestResult {
        let store = MemoryStore::new();
        let mut events = store.subscribe();

        store.remove(keys::USER)?;

        assert!(events.try_recv().is_err());

        Ok(())
    }

    #[test]
    fn file_store_persists_between_opens() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("profile.json");

        FileStore::open(&path)?.set(keys::USED_COUPONS, r#"["SAVE500"]"#)?;

        let reopened = FileStore::open(&path)?;

        assert_eq!(
            reopened.get(keys::USED_COUPONS)?,
            Some(r#"["SAVE500"]"#.to_string())
        );

        Ok(())
    }

    #[test]
    fn file_store_treats_missing_file_as_empty() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = FileStore::open(dir.path().join("missing.json"))?;

        assert_eq!(store.get(keys::TOKEN)?, None);

        Ok(())
    }

    #[test]
    fn file_store_opens_corrupt_file_as_empty() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("profile.json");

        fs::write(&path, "{not json")?;

        let store = FileStore::open(&path)?;

        assert_eq!(store.get(keys::USED_COUPONS)?, None);

        store.set(keys::USED_COUPONS, r#"["FIRST10"]"#)?;

        assert_eq!(
            FileStore::open(&path)?.get(keys::USED_COUPONS)?,
            Some(r#"["FIRST10"]"#.to_string())
        );

        Ok(())
    }

    #[test]
    fn failed_flush_leaves_entries_unchanged() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("profile.json");

        let store = FileStore::open(&path)?;

        // A directory in place of the file makes every write fail.
        fs::create_dir(&path)?;

        assert!(matches!(
            store.set(keys::TOKEN, "abc"),
            Err(StoreError::Io(_))
        ));
        assert_eq!(store.get(keys::TOKEN)?, None);

        Ok(())
    }

    #[test]
    fn failed_flush_keeps_removed_key() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("profile.json");

        let store = FileStore::open(&path)?;
        store.set(keys::TOKEN, "abc")?;

        fs::remove_file(&path)?;
        fs::create_dir(&path)?;

        assert!(store.remove(keys::TOKEN).is_err());
        assert_eq!(store.get(keys::TOKEN)?, Some("abc".to_string()));

        Ok(())
    }
}
