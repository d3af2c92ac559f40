//! Pristine copies of artifacts, taken before the first rewrite.

use super::marker::{clear_marker, read_marker};
use super::{sidecar_path, StateError};
use crate::atomic::{atomic_write, copy_new};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

/// Suffix appended to an artifact's file name to form its backup path.
pub const BACKUP_SUFFIX: &str = ".original";

pub fn backup_path(artifact: &Path) -> PathBuf {
    sidecar_path(artifact, BACKUP_SUFFIX)
}

pub fn has_backup(artifact: &Path) -> bool {
    backup_path(artifact).is_file()
}

/// Snapshot `artifact` unless a backup already exists.
///
/// An existing backup is never overwritten, so it keeps holding the pristine
/// pre-patch bytes across any number of patch/restore cycles.
pub fn ensure_backup(artifact: &Path) -> Result<PathBuf, StateError> {
    let backup = backup_path(artifact);

    if !artifact.is_file() {
        return Err(StateError::NotFound(artifact.to_path_buf()));
    }

    let created = copy_new(artifact, &backup).map_err(|source| StateError::Io {
        path: backup.clone(),
        source,
    })?;

    if created {
        info!("Created backup at {}", backup.display());
    } else {
        debug!("Backup already exists at {}", backup.display());
    }

    Ok(backup)
}

/// xxh3 fingerprint of the backup for `artifact`.
pub fn backup_hash(artifact: &Path) -> Result<u64, StateError> {
    let backup = backup_path(artifact);
    let data = fs::read(&backup).map_err(|source| StateError::Io {
        path: backup.clone(),
        source,
    })?;
    Ok(xxh3_64(&data))
}

/// Read the backup for `artifact`, checking it against the fingerprint
/// recorded in the marker when there is one.
pub fn read_backup(artifact: &Path) -> Result<Vec<u8>, StateError> {
    let backup = backup_path(artifact);
    if !backup.is_file() {
        return Err(StateError::NoBackupFound(backup));
    }

    let data = fs::read(&backup).map_err(|source| StateError::Io {
        path: backup.clone(),
        source,
    })?;

    if let Some(expected) = read_marker(artifact).and_then(|m| m.backup_hash) {
        let actual = xxh3_64(&data);
        if actual != expected {
            return Err(StateError::BackupCorrupted {
                path: backup,
                expected,
                actual,
            });
        }
    }

    Ok(data)
}

/// Put the backup bytes back in place of `artifact` and drop its marker.
///
/// The artifact ends up byte-identical to what it was before its first
/// rewrite, unpatched and without a signature applied by the patcher.
pub fn restore(artifact: &Path) -> Result<(), StateError> {
    let backup = backup_path(artifact);
    let data = read_backup(artifact)?;

    info!("Restoring {} from {}", artifact.display(), backup.display());
    atomic_write(artifact, &data).map_err(|source| StateError::Io {
        path: artifact.to_path_buf(),
        source,
    })?;

    if let Ok(meta) = fs::metadata(&backup) {
        let mtime = filetime::FileTime::from_last_modification_time(&meta);
        if let Err(err) = filetime::set_file_mtime(artifact, mtime) {
            debug!("Could not restore mtime of {}: {}", artifact.display(), err);
        }
    }

    clear_marker(artifact)
}
