//! In-memory key-value store with whole-file snapshots.
//!
//! A [`ConcurrentStore`] maps non-empty string [`Key`]s to [`Value`]s behind
//! a single reader/writer lock. The entire mapping can be written to one file
//! with [`ConcurrentStore::save_snapshot`] and replaced wholesale from one
//! with [`ConcurrentStore::load_snapshot`].
//!
//! # Modules
//!
//! - [`store`] -- the [`ConcurrentStore`] itself
//! - [`traits`] -- the [`KeyValueStore`] interface
//! - [`key`] / [`value`] -- the data model
//! - [`snapshot`] -- on-disk format and file I/O
//! - [`config`] -- [`StoreConfig`] and its lock/write/sync modes
//! - [`error`] -- [`StoreError`]
//!
//! # Design Rules
//!
//! 1. No reader ever observes a partially applied mutation.
//! 2. Loading is all-or-nothing: decode into a fresh map, then swap.
//! 3. A missing key is a normal `None`, not an error.
//! 4. All I/O and codec errors are propagated, never panicked on.

pub mod config;
pub mod error;
pub mod key;
pub mod snapshot;
pub mod store;
pub mod traits;
pub mod value;

pub use config::{SaveMode, StoreConfig, SyncMode, WriteMode};
pub use error::{StoreError, StoreResult};
pub use key::Key;
pub use snapshot::SnapshotStats;
pub use store::ConcurrentStore;
pub use traits::KeyValueStore;
pub use value::{Value, ValueKind};
