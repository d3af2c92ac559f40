//! Sidecar markers recording which domain an artifact was patched for.

use super::{sidecar_path, StateError};
use crate::atomic::atomic_write;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to an artifact's file name to form its marker path.
pub const MARKER_SUFFIX: &str = ".patched_custom";

/// Marker format version written by this patcher.
pub const PATCHER_VERSION: &str = "1.0.0";

/// Persisted record of a completed rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchMarker {
    pub patched_at: String,
    pub original_domain: String,
    pub target_domain: String,
    pub patcher_version: String,
    /// xxh3 fingerprint of the pristine backup, when one was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_hash: Option<u64>,
}

impl PatchMarker {
    pub fn new(original_domain: &str, target_domain: &str) -> Self {
        Self {
            patched_at: chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            original_domain: original_domain.to_string(),
            target_domain: target_domain.to_string(),
            patcher_version: PATCHER_VERSION.to_string(),
            backup_hash: None,
        }
    }

    pub fn with_backup_hash(mut self, hash: u64) -> Self {
        self.backup_hash = Some(hash);
        self
    }
}

pub fn marker_path(artifact: &Path) -> PathBuf {
    sidecar_path(artifact, MARKER_SUFFIX)
}

/// Read the marker for `artifact`.
///
/// Missing or malformed markers read as `None`.
pub fn read_marker(artifact: &Path) -> Option<PatchMarker> {
    let path = marker_path(artifact);
    let data = fs::read(&path).ok()?;
    match serde_json::from_slice(&data) {
        Ok(marker) => Some(marker),
        Err(err) => {
            debug!("Ignoring malformed marker {}: {}", path.display(), err);
            None
        }
    }
}

/// Whether `artifact` carries a marker for `target_domain`.
pub fn is_patched(artifact: &Path, target_domain: &str) -> bool {
    read_marker(artifact).is_some_and(|marker| marker.target_domain == target_domain)
}

/// Write `marker` next to `artifact`, replacing any previous marker.
pub fn write_marker(artifact: &Path, marker: &PatchMarker) -> Result<(), StateError> {
    let path = marker_path(artifact);
    let data = serde_json::to_vec_pretty(marker).map_err(StateError::Serialize)?;
    atomic_write(&path, &data).map_err(|source| StateError::Io { path, source })
}

/// Record that `artifact` was rewritten from `original_domain` to `target_domain`.
pub fn mark_patched(
    artifact: &Path,
    original_domain: &str,
    target_domain: &str,
) -> Result<PatchMarker, StateError> {
    let marker = PatchMarker::new(original_domain, target_domain);
    write_marker(artifact, &marker)?;
    Ok(marker)
}

/// Remove the marker for `artifact`. Missing markers are fine.
pub fn clear_marker(artifact: &Path) -> Result<(), StateError> {
    let path = marker_path(artifact);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StateError::Io { path, source }),
    }
}
