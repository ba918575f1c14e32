use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Lock discipline used while saving a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Hold the read lock for encode and file write. Readers proceed,
    /// writers and loads wait.
    #[default]
    Shared,
    /// Hold the write lock for encode and file write. Saves are fully
    /// serialized against every other operation.
    Exclusive,
    /// Encode under the read lock, then release it before touching the
    /// filesystem.
    CopyThenRelease,
}

/// How snapshot bytes reach the destination path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Create or truncate the destination and write in place. A failed
    /// write may leave a partial file behind.
    #[default]
    Direct,
    /// Write a temporary file next to the destination and rename it over
    /// the destination on success.
    AtomicRename,
}

/// Flush/sync strategy for snapshot writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` before returning.
    EveryWrite,
    /// Flush to the OS and rely on its page cache.
    #[default]
    OsDefault,
}

/// Store configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub save_mode: SaveMode,
    pub write_mode: WriteMode,
    pub sync_mode: SyncMode,
    /// Upper bound on the encoded payload, applied on both save and load.
    pub max_snapshot_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            save_mode: SaveMode::default(),
            write_mode: WriteMode::default(),
            sync_mode: SyncMode::default(),
            max_snapshot_bytes: 1024 * 1024 * 1024, // 1 GiB
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.save_mode, SaveMode::Shared);
        assert_eq!(c.write_mode, WriteMode::Direct);
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert_eq!(c.max_snapshot_bytes, 1024 * 1024 * 1024);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c = StoreConfig::from_toml_str(
            r#"
            save_mode = "copy_then_release"
            write_mode = "atomic_rename"
            "#,
        )
        .unwrap();
        assert_eq!(c.save_mode, SaveMode::CopyThenRelease);
        assert_eq!(c.write_mode, WriteMode::AtomicRename);
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert_eq!(
            c.max_snapshot_bytes,
            StoreConfig::default().max_snapshot_bytes
        );
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = StoreConfig::from_toml_str("save_mode = \"sometimes\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapkv.toml");
        std::fs::write(
            &path,
            "sync_mode = \"every_write\"\nmax_snapshot_bytes = 4096\n",
        )
        .unwrap();

        let c = StoreConfig::load(&path).unwrap();
        assert_eq!(c.sync_mode, SyncMode::EveryWrite);
        assert_eq!(c.max_snapshot_bytes, 4096);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(err.is_io());
    }
}
