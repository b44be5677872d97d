//! On-disk snapshot format for the state store.
//!
//! The whole state mapping is written as one file: a 4-byte little-endian
//! header length, a bincode-encoded [`SnapshotHeader`], then the mapping as a
//! JSON object. The header carries magic bytes, the format version, the entry
//! count, and a checksum of the payload so truncated or foreign files are
//! detected on load.
//!
//! Writes go to a sibling `.tmp` file which is synced and then renamed over
//! the target, so readers observe either the previous or the new snapshot.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use brew_common::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Magic bytes identifying a brewpipe state snapshot.
const SNAPSHOT_MAGIC: [u8; 4] = *b"BREW";

/// Current snapshot format version. Increment on breaking changes to the
/// header or payload layout.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// The in-memory form of a snapshot: qualified key to JSON value, sorted.
pub type StateMap = BTreeMap<String, serde_json::Value>;

/// Header prepended to every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// Magic bytes: must be `b"BREW"`.
    pub magic: [u8; 4],

    /// Snapshot format version.
    pub format_version: u32,

    /// Number of entries in the payload.
    pub entry_count: u64,

    /// Fingerprint of the payload bytes.
    pub checksum: Fingerprint,
}

/// Header fields and sizes of a snapshot file, for tooling.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    /// The decoded header.
    pub header: SnapshotHeader,
    /// Size of the JSON payload in bytes.
    pub payload_len: usize,
    /// Size of the whole file in bytes.
    pub file_len: usize,
}

/// Encodes `state` into the snapshot byte layout.
pub fn encode(state: &StateMap) -> Result<Vec<u8>, StateError> {
    let payload = serde_json::to_vec(state).map_err(|e| StateError::Serialization {
        reason: e.to_string(),
    })?;

    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        format_version: SNAPSHOT_FORMAT_VERSION,
        entry_count: state.len() as u64,
        checksum: Fingerprint::from_bytes(&payload),
    };
    let header_bytes = encode_header(&header)?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

fn encode_header(header: &SnapshotHeader) -> Result<Vec<u8>, StateError> {
    bincode::serde::encode_to_vec(header, bincode::config::standard()).map_err(|e| {
        StateError::Serialization {
            reason: e.to_string(),
        }
    })
}

/// Splits raw snapshot bytes into a validated header and the payload slice.
fn split<'a>(path: &Path, raw: &'a [u8]) -> Result<(SnapshotHeader, &'a [u8]), StateError> {
    let invalid = |reason: &str| StateError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if raw.len() < 4 {
        return Err(invalid("file too short for header length"));
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    if raw.len() - 4 < header_len {
        return Err(invalid("truncated header"));
    }

    let (header, _): (SnapshotHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?;

    if header.magic != SNAPSHOT_MAGIC {
        return Err(invalid("missing magic bytes"));
    }
    if header.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(StateError::VersionMismatch {
            path: path.to_path_buf(),
            expected: SNAPSHOT_FORMAT_VERSION,
            actual: header.format_version,
        });
    }

    let payload = &raw[4 + header_len..];
    let actual = Fingerprint::from_bytes(payload);
    if actual != header.checksum {
        return Err(StateError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }

    Ok((header, payload))
}

/// Decodes and validates snapshot bytes read from `path`.
pub fn decode(path: &Path, raw: &[u8]) -> Result<StateMap, StateError> {
    let (header, payload) = split(path, raw)?;
    decode_payload(path, &header, payload)
}

fn decode_payload(
    path: &Path,
    header: &SnapshotHeader,
    payload: &[u8],
) -> Result<StateMap, StateError> {
    let state: StateMap =
        serde_json::from_slice(payload).map_err(|e| StateError::Serialization {
            reason: format!("{}: {e}", path.display()),
        })?;
    if state.len() as u64 != header.entry_count {
        return Err(StateError::InvalidHeader {
            path: path.to_path_buf(),
            reason: format!(
                "header lists {} entries, payload has {}",
                header.entry_count,
                state.len()
            ),
        });
    }
    Ok(state)
}

/// Reads the snapshot at `path`.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn read_snapshot(path: &Path) -> Result<Option<StateMap>, StateError> {
    match std::fs::read(path) {
        Ok(raw) => decode(path, &raw).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StateError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Returns the staging path used while writing `path`.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StateError {
    let path = path.to_path_buf();
    move |source| StateError::Io { path, source }
}

/// Atomically replaces the snapshot at `path` with `state`.
///
/// Creates parent directories as needed. Returns the number of bytes written.
pub fn write_snapshot(path: &Path, state: &StateMap) -> Result<usize, StateError> {
    let bytes = encode(state)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let tmp = staging_path(path);
    {
        let mut file = File::create(&tmp).map_err(io_error(&tmp))?;
        file.write_all(&bytes).map_err(io_error(&tmp))?;
        file.sync_all().map_err(io_error(&tmp))?;
    }
    std::fs::rename(&tmp, path).map_err(io_error(path))?;

    Ok(bytes.len())
}

/// Reads and validates the header of the snapshot at `path` without keeping
/// the payload. Returns `Ok(None)` if the file does not exist.
pub fn inspect(path: &Path) -> Result<Option<SnapshotInfo>, StateError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StateError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    let (header, payload) = split(path, &raw)?;
    decode_payload(path, &header, payload)?;
    Ok(Some(SnapshotInfo {
        header,
        payload_len: payload.len(),
        file_len: raw.len(),
    }))
}
