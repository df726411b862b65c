//! Snapshot cache for the last fully ingested specification.
//!
//! One snapshot per cache directory, stored as `snapshot.json`. The file is
//! only replaced after a run completes, and always through a temp file plus
//! rename so a crash never leaves a half-written snapshot behind.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::models::SpecDocument;

/// File name of the snapshot inside the cache directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Path of the snapshot for a given cache directory.
pub fn snapshot_path(directory: &Path) -> PathBuf {
    directory.join(SNAPSHOT_FILE)
}

/// Persist `spec` as the snapshot in `directory`, creating it if needed.
///
/// Returns the snapshot path. Any previous snapshot is replaced.
pub fn write(spec: &SpecDocument, directory: &Path) -> Result<PathBuf, CacheError> {
    fs::create_dir_all(directory).map_err(|source| CacheError::Io {
        path: directory.to_path_buf(),
        source,
    })?;

    let path = snapshot_path(directory);
    let tmp = directory.join(format!("{}.tmp", SNAPSHOT_FILE));

    let body = serde_json::to_vec_pretty(spec).map_err(|source| CacheError::Corrupt {
        path: path.clone(),
        source,
    })?;
    fs::write(&tmp, body).map_err(|source| CacheError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, &path).map_err(|source| CacheError::Io {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "wrote spec snapshot");
    Ok(path)
}

/// Read the snapshot at `path`.
pub fn load(path: &Path) -> Result<SpecDocument, CacheError> {
    if !path.exists() {
        return Err(CacheError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CacheError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Deep structural comparison of `spec` against the snapshot at `path`.
///
/// A missing snapshot is an error, not a mismatch: without a snapshot there
/// is nothing to compare against.
pub fn matches(spec: &SpecDocument, path: &Path) -> Result<bool, CacheError> {
    let cached = load(path)?;
    Ok(&cached == spec)
}
