//! Durable string key/value backends for the credential cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use tracing::debug;

/// File name of the credential map inside the cache directory
const STORE_FILE: &str = "credentials.json";

/// Keyring service name used for every entry
const KEYRING_SERVICE: &str = "estatedesk";

/// A string-keyed store that survives process restarts.
///
/// `set_many` and `remove_many` must apply all-or-nothing where the backend
/// allows it. The default implementations, used by per-key backends such as
/// the keychain, come as close as one call per key can: a failed write undoes
/// the keys already written in that batch, and a removal tries every key
/// before reporting the first failure.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(e) = self.set(key, value) {
                for (undo, _) in &entries[..written] {
                    if let Err(undo_err) = self.remove(undo) {
                        debug!(key = %undo, error = %undo_err, "Failed to undo partial write");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.remove(key) {
                debug!(key = %key, error = %e, "Failed to remove entry");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store. Nothing is written to disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// JSON file
// ============================================================================

/// All entries live in one JSON object on disk.
///
/// Every write replaces the whole file through a temp file and a rename, so a
/// crash never leaves a token without its snapshot or the reverse.
pub struct FileStore {
    cache_dir: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        Ok(Self {
            cache_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn store_path(&self) -> PathBuf {
        self.cache_dir.join(STORE_FILE)
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        let path = self.store_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read credential file")?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse credential file")
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        let path = self.store_path();
        if map.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path).context("Failed to remove credential file")?;
            }
            return Ok(());
        }

        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&tmp, contents).context("Failed to write credential file")?;
        std::fs::rename(&tmp, &path).context("Failed to replace credential file")?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                // An unreadable file holds nothing we can trust; start over.
                debug!(error = %e, "Discarding unreadable credential file");
                HashMap::new()
            }
        };
        f(&mut map);
        self.write_map(&map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|map| {
            map.remove(key);
        })
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.modify(|map| {
            for (key, value) in entries {
                map.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.modify(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// One keychain entry per key, under the `estatedesk` service.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    /// Use a separate keychain service, e.g. one per API environment.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow!(e).context("Failed to read from keychain")),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store value in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow!(e).context("Failed to delete from keychain")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert!(store.is_empty());
    }

    /// Memory store whose listed keys refuse writes and removals.
    struct FailingKeys {
        inner: MemoryStore,
        failing: Vec<&'static str>,
    }

    impl FailingKeys {
        fn new(failing: &[&'static str]) -> Self {
            Self {
                inner: MemoryStore::new(),
                failing: failing.to_vec(),
            }
        }

        fn check(&self, key: &str) -> Result<()> {
            if self.failing.contains(&key) {
                Err(anyhow!("{} is locked", key))
            } else {
                Ok(())
            }
        }
    }

    impl KeyValueStore for FailingKeys {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.check(key)?;
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.check(key)?;
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_default_set_many_undoes_partial_write() {
        let store = FailingKeys::new(&["user"]);
        let err = store.set_many(&[("token", "t"), ("user", "u")]).unwrap_err();
        assert!(err.to_string().contains("user is locked"));
        assert_eq!(store.get("token").unwrap(), None);
        assert!(store.inner.is_empty());
    }

    #[test]
    fn test_default_remove_many_tries_every_key() {
        let store = FailingKeys::new(&[]);
        store.set_many(&[("token", "t"), ("user", "u")]).unwrap();
        let store = FailingKeys {
            failing: vec!["token"],
            ..store
        };

        let err = store.remove_many(&["token", "user"]).unwrap_err();
        assert!(err.to_string().contains("token is locked"));
        assert_eq!(store.get("user").unwrap(), None);
        assert_eq!(store.get("token").unwrap().as_deref(), Some("t"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::new(dir.path().to_path_buf()).unwrap();
            store.set_many(&[("a", "1"), ("b", "2")]).unwrap();
        }
        let reopened = FileStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_file_store_remove_many_deletes_file_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        store.set_many(&[("a", "1"), ("b", "2")]).unwrap();
        assert!(dir.path().join(STORE_FILE).exists());

        store.remove_many(&["a", "b"]).unwrap();
        assert!(!dir.path().join(STORE_FILE).exists());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_file_store_remove_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        store.remove("nothing").unwrap();
        assert_eq!(store.get("nothing").unwrap(), None);
    }

    #[test]
    fn test_file_store_overwrites_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORE_FILE), "{not json").unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        assert!(store.get("a").is_err());
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }
}
