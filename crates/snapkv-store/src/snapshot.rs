//! Whole-store snapshot format and file I/O.
//!
//! A snapshot is one file holding the entire key/value mapping, produced by a
//! single encode and consumed by a single decode.
//!
//! On-disk format:
//! ```text
//! [4 bytes: magic b"SNKV"]
//! [2 bytes: format version (little-endian u16)]
//! [8 bytes: payload length (little-endian u64)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized HashMap<Key, Value>)]
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use bincode::Options;
use tempfile::NamedTempFile;

use crate::config::{SyncMode, WriteMode};
use crate::error::{StoreError, StoreResult};
use crate::key::Key;
use crate::value::{Value, MAX_NESTING};

/// File magic.
pub const MAGIC: [u8; 4] = *b"SNKV";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header size: magic + version + length + CRC.
pub const HEADER_SIZE: usize = 4 + 2 + 8 + 4;

/// Summary of a completed save or load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotStats {
    /// Number of entries written or loaded.
    pub entries: usize,
    /// Size of the snapshot file in bytes, header included.
    pub bytes: u64,
}

/// Encode a mapping into a complete snapshot image.
///
/// Fails with [`StoreError::Serialization`] if the payload would exceed
/// `max_bytes` or a value nests deeper than [`MAX_NESTING`].
pub fn encode(map: &HashMap<Key, Value>, max_bytes: u64) -> StoreResult<Vec<u8>> {
    if let Some((key, depth)) = map
        .iter()
        .map(|(k, v)| (k, v.nesting_depth()))
        .find(|(_, depth)| *depth > MAX_NESTING)
    {
        return Err(StoreError::Serialization(format!(
            "value for {key:?} nests {depth} levels, limit is {MAX_NESTING}"
        )));
    }
    let payload = bincode::options()
        .with_limit(max_bytes)
        .serialize(map)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(frame(&payload))
}

/// Decode a snapshot image into a fresh mapping.
///
/// Every check happens before anything is returned, so the caller either
/// gets the whole mapping or a [`StoreError::Deserialization`].
pub fn decode(bytes: &[u8], max_bytes: u64) -> StoreResult<HashMap<Key, Value>> {
    if bytes.len() < HEADER_SIZE {
        return Err(corrupt(format!(
            "truncated header: {} of {HEADER_SIZE} bytes",
            bytes.len()
        )));
    }
    let (header, payload) = bytes.split_at(HEADER_SIZE);

    if header[0..4] != MAGIC {
        return Err(corrupt(format!(
            "bad magic: expected {}, got {}",
            hex::encode(MAGIC),
            hex::encode(&header[0..4])
        )));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {version}")));
    }

    let mut len_buf = [0u8; 8];
    len_buf.copy_from_slice(&header[6..14]);
    let declared = u64::from_le_bytes(len_buf);
    if declared > max_bytes {
        return Err(corrupt(format!(
            "payload length {declared} exceeds limit {max_bytes}"
        )));
    }
    let actual = payload.len() as u64;
    if declared > actual {
        return Err(corrupt(format!(
            "truncated payload: header declares {declared} bytes, found {actual}"
        )));
    }
    if declared < actual {
        return Err(corrupt(format!(
            "{} trailing bytes after payload",
            actual - declared
        )));
    }

    let expected_crc = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(corrupt(format!(
            "CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
        )));
    }

    bincode::options()
        .with_limit(max_bytes)
        .deserialize(payload)
        .map_err(|e| corrupt(e.to_string()))
}

/// Write a snapshot image to `path`.
pub fn write_snapshot(
    path: &Path,
    bytes: &[u8],
    write_mode: WriteMode,
    sync_mode: SyncMode,
) -> StoreResult<()> {
    match write_mode {
        WriteMode::Direct => {
            let mut file = File::create(path)?;
            file.write_all(bytes)?;
            file.flush()?;
            if sync_mode == SyncMode::EveryWrite {
                file.sync_all()?;
            }
        }
        WriteMode::AtomicRename => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(bytes)?;
            tmp.flush()?;
            if sync_mode == SyncMode::EveryWrite {
                tmp.as_file().sync_all()?;
            }
            tmp.persist(path).map_err(|e| e.error)?;
        }
    }
    Ok(())
}

/// Read a whole snapshot image from `path`.
pub fn read_snapshot(path: &Path) -> StoreResult<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn corrupt(reason: String) -> StoreError {
    StoreError::Deserialization(reason)
}
