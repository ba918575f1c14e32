use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace, warn};

use crate::config::{SaveMode, StoreConfig};
use crate::error::StoreResult;
use crate::key::Key;
use crate::snapshot::{self, SnapshotStats};
use crate::traits::KeyValueStore;
use crate::value::Value;

/// Thread-safe in-memory key-value store with whole-file snapshots.
///
/// One `RwLock` guards the whole mapping. Reads share it; mutations and
/// snapshot loads take it exclusively, so no caller ever observes a
/// half-applied change. Snapshot saves lock according to
/// [`StoreConfig::save_mode`].
///
/// A poisoned lock is recovered rather than propagated: the map is only
/// changed by single `HashMap` operations or a whole-map swap, so a panic
/// elsewhere cannot leave it half-modified.
pub struct ConcurrentStore {
    entries: RwLock<HashMap<Key, Value>>,
    config: StoreConfig,
}

impl ConcurrentStore {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Insert or overwrite `key`, returning the previous value.
    pub fn set(&self, key: Key, value: impl Into<Value>) -> Option<Value> {
        let value = value.into();
        trace!(key = %key, kind = %value.kind(), "set");
        self.write().insert(key, value)
    }

    /// Current value for `key`, or `None` if it was never set.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&self, key: &str) -> Option<Value> {
        trace!(key, "remove");
        self.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<Key> {
        let map = self.read();
        let mut keys: Vec<Key> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// A consistent, sorted copy of every entry.
    pub fn entries(&self) -> BTreeMap<Key, Value> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Write the entire mapping to `path`, creating or truncating it.
    ///
    /// The file reflects a single point in time: no `set` or load can
    /// interleave with the encode. Whether the lock is still held during
    /// the file write depends on [`SaveMode`].
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> StoreResult<SnapshotStats> {
        let path = path.as_ref();
        let stats = match self.config.save_mode {
            SaveMode::Shared => {
                let map = self.read();
                self.persist(&map, path)?
            }
            SaveMode::Exclusive => {
                let map = self.write();
                self.persist(&map, path)?
            }
            SaveMode::CopyThenRelease => {
                let (bytes, entries) = {
                    let map = self.read();
                    (snapshot::encode(&map, self.config.max_snapshot_bytes)?, map.len())
                };
                snapshot::write_snapshot(
                    path,
                    &bytes,
                    self.config.write_mode,
                    self.config.sync_mode,
                )?;
                SnapshotStats {
                    entries,
                    bytes: bytes.len() as u64,
                }
            }
        };

        debug!(
            path = %path.display(),
            entries = stats.entries,
            bytes = stats.bytes,
            mode = ?self.config.save_mode,
            "snapshot saved"
        );
        Ok(stats)
    }

    /// Replace the entire mapping with the contents of the snapshot at
    /// `path`.
    ///
    /// The exclusive lock is held for the read, decode, and swap. On any
    /// error the current contents are left untouched.
    pub fn load_snapshot(&self, path: impl AsRef<Path>) -> StoreResult<SnapshotStats> {
        let path = path.as_ref();
        let mut map = self.write();

        let bytes = snapshot::read_snapshot(path)?;
        let fresh = match snapshot::decode(&bytes, self.config.max_snapshot_bytes) {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "snapshot rejected");
                return Err(e);
            }
        };

        let stats = SnapshotStats {
            entries: fresh.len(),
            bytes: bytes.len() as u64,
        };
        *map = fresh;

        debug!(
            path = %path.display(),
            entries = stats.entries,
            bytes = stats.bytes,
            "snapshot loaded"
        );
        Ok(stats)
    }

    fn persist(&self, map: &HashMap<Key, Value>, path: &Path) -> StoreResult<SnapshotStats> {
        let bytes = snapshot::encode(map, self.config.max_snapshot_bytes)?;
        snapshot::write_snapshot(path, &bytes, self.config.write_mode, self.config.sync_mode)?;
        Ok(SnapshotStats {
            entries: map.len(),
            bytes: bytes.len() as u64,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Key, Value>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Key, Value>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConcurrentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for ConcurrentStore {
    fn set(&self, key: Key, value: Value) -> Option<Value> {
        ConcurrentStore::set(self, key, value)
    }

    fn get(&self, key: &str) -> Option<Value> {
        ConcurrentStore::get(self, key)
    }

    fn remove(&self, key: &str) -> Option<Value> {
        ConcurrentStore::remove(self, key)
    }

    fn len(&self) -> usize {
        ConcurrentStore::len(self)
    }

    fn save_snapshot(&self, path: &Path) -> StoreResult<SnapshotStats> {
        ConcurrentStore::save_snapshot(self, path)
    }

    fn load_snapshot(&self, path: &Path) -> StoreResult<SnapshotStats> {
        ConcurrentStore::load_snapshot(self, path)
    }
}

impl std::fmt::Debug for ConcurrentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentStore")
            .field("entry_count", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
