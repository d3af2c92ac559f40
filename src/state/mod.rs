//! Per-artifact state kept next to the artifact on disk.
//!
//! Two sidecar files live beside every artifact the patcher touches:
//! a JSON marker (`<artifact>.patched_custom`) recording the target domain,
//! and a byte-for-byte backup (`<artifact>.original`) of the pristine file.
//! No cross-process locking is done; one patcher runs against an
//! installation at a time.

pub mod backup;
pub mod marker;

pub use backup::{
    backup_hash, backup_path, ensure_backup, has_backup, read_backup, restore, BACKUP_SUFFIX,
};
pub use marker::{
    clear_marker, is_patched, mark_patched, marker_path, read_marker, write_marker, PatchMarker,
    MARKER_SUFFIX, PATCHER_VERSION,
};

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("no backup found to restore: {0}")]
    NoBackupFound(PathBuf),

    #[error("backup {path} does not match its recorded fingerprint ({actual:016x} != {expected:016x})")]
    BackupCorrupted {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize marker: {0}")]
    Serialize(serde_json::Error),
}

/// `<artifact><suffix>` in the artifact's directory.
fn sidecar_path(artifact: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(artifact.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
