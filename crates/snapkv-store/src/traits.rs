use std::path::Path;

use crate::error::StoreResult;
use crate::key::Key;
use crate::snapshot::SnapshotStats;
use crate::value::Value;

/// Key-value store with whole-mapping snapshot persistence.
///
/// All implementations must satisfy these invariants:
/// - Every individual operation is atomic with respect to every other
///   operation on the same store.
/// - `load_snapshot` replaces the whole mapping, and leaves it unchanged
///   on error.
/// - A missing key is `None`, never an error.
/// - I/O and codec failures are returned, never panicked on.
pub trait KeyValueStore: Send + Sync {
    /// Insert or overwrite an entry, returning the previous value.
    fn set(&self, key: Key, value: Value) -> Option<Value>;

    /// Read the current value for `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Remove an entry, returning its value if it existed.
    fn remove(&self, key: &str) -> Option<Value>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Write the whole mapping to a snapshot file.
    fn save_snapshot(&self, path: &Path) -> StoreResult<SnapshotStats>;

    /// Replace the whole mapping with a snapshot file's contents.
    fn load_snapshot(&self, path: &Path) -> StoreResult<SnapshotStats>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read several keys.
    ///
    /// Default implementation calls `get()` for each key, so the results
    /// are not a single consistent view.
    fn get_many(&self, keys: &[&str]) -> Vec<Option<Value>> {
        keys.iter().map(|k| self.get(k)).collect()
    }
}
