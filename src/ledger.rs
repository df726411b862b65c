//! Checkpoint ledger for a single ingestion run.
//!
//! Records which `(method, path)` operations have been stored so an
//! interrupted run can resume where it stopped. The ledger is a JSON object
//! keyed by `"<method>:<path>"`:
//!
//! ```json
//! { "get:/pets": { "uuid": "…", "processed_at": "2024-05-01T12:00:00Z" } }
//! ```
//!
//! Entries are never rolled back. Re-processing an operation is safe because
//! the store replaces records by id, so at-least-once delivery is enough.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::CheckpointEntry;

/// Flush after this many cumulative entries unless configured otherwise.
pub const DEFAULT_FLUSH_EVERY: usize = 5;

/// Ledger key for an operation: the method exactly as the document spells
/// it. Method keys are case-sensitive in the diff, so `GET` and `get` under
/// one path are distinct operations and need distinct keys.
pub fn operation_key(method: &str, path: &str) -> String {
    format!("{}:{}", method, path)
}

/// In-memory ledger plus its periodic flush policy.
#[derive(Debug, Clone)]
pub struct Ledger {
    entries: BTreeMap<String, CheckpointEntry>,
    flush_every: usize,
}

impl Ledger {
    pub fn new(flush_every: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            flush_every: flush_every.max(1),
        }
    }

    /// Load the ledger at `path`; a missing file yields an empty ledger.
    pub fn load(path: &Path, flush_every: usize) -> Result<Self, LedgerError> {
        let mut ledger = Self::new(flush_every);
        if !path.exists() {
            return Ok(ledger);
        }
        let content = fs::read_to_string(path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ledger.entries = serde_json::from_str(&content).map_err(|source| LedgerError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ledger)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&CheckpointEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, CheckpointEntry> {
        &self.entries
    }

    /// Mark `key` processed. Recording a key again replaces its entry.
    ///
    /// Returns `true` when this entry lands on a batch boundary and the
    /// caller should flush.
    pub fn record(&mut self, key: &str, uuid: Uuid, processed_at: DateTime<Utc>) -> bool {
        let inserted = self
            .entries
            .insert(key.to_string(), CheckpointEntry { uuid, processed_at })
            .is_none();
        inserted && self.entries.len() % self.flush_every == 0
    }

    /// Write the whole ledger to `path`, replacing the previous file.
    pub fn flush(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LedgerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let body = serde_json::to_vec_pretty(&self.entries)?;
        let tmp = tmp_path(path);
        fs::write(&tmp, body).map_err(|source| LedgerError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), entries = self.entries.len(), "flushed checkpoint");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Name of the archived log for `log_file` at `at`:
/// `swagger_ingestion_log.json` becomes `swagger_ingestion_log_20240501_120000.json`.
pub fn timestamped_log_path(log_file: &Path, at: DateTime<Local>) -> PathBuf {
    let stamp = at.format("%Y%m%d_%H%M%S");
    let stem = log_file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "ingestion_log".to_string());
    let name = match log_file.extension() {
        Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, stamp),
    };
    log_file.with_file_name(name)
}

/// Move a finished checkpoint to a timestamped log file.
///
/// Returns `Ok(None)` when there is no checkpoint file to archive.
pub fn archive(checkpoint_path: &Path, log_file: &Path) -> Result<Option<PathBuf>, LedgerError> {
    if !checkpoint_path.exists() {
        return Ok(None);
    }
    let target = timestamped_log_path(log_file, Local::now());
    fs::rename(checkpoint_path, &target).map_err(|source| LedgerError::Io {
        path: target.clone(),
        source,
    })?;
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn id(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    #[test]
    fn test_operation_key_keeps_method_spelling() {
        assert_eq!(operation_key("get", "/test"), "get:/test");
        assert_eq!(operation_key("post", "/Pets/{Id}"), "post:/Pets/{Id}");
        assert_ne!(operation_key("GET", "/test"), operation_key("get", "/test"));
    }

    #[test]
    fn test_methods_differing_in_case_are_recorded_separately() {
        let mut ledger = Ledger::new(10);
        ledger.record(&operation_key("GET", "/test"), id(1), Utc::now());
        ledger.record(&operation_key("get", "/test"), id(2), Utc::now());
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("GET:/test"));
        assert!(ledger.contains("get:/test"));
    }

    #[test]
    fn test_load_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        let ledger = Ledger::load(&tmp.path().join("nope.json"), 5).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_load_corrupt_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("progress.json");
        fs::write(&path, "[1, 2").unwrap();
        let err = Ledger::load(&path, 5).unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { .. }));
    }

    #[test]
    fn test_flush_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("progress.json");
        let mut ledger = Ledger::new(5);
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ledger.record("get:/test", id(1), at);
        ledger.flush(&path).unwrap();

        let loaded = Ledger::load(&path, 5).unwrap();
        assert_eq!(loaded.len(), 1);
        let entry = loaded.get("get:/test").unwrap();
        assert_eq!(entry.uuid, id(1));
        assert_eq!(entry.processed_at, at);
        assert!(!tmp.path().join("progress.json.tmp").exists());
    }

    #[test]
    fn test_file_schema() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("progress.json");
        let mut ledger = Ledger::new(5);
        ledger.record("get:/test", id(2), Utc::now());
        ledger.flush(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entry = raw["get:/test"].as_object().unwrap();
        assert_eq!(entry["uuid"], id(2).to_string());
        assert!(entry["processed_at"].is_string());
    }

    #[test]
    fn test_record_same_key_twice_keeps_one_entry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("progress.json");
        let mut ledger = Ledger::new(5);
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        ledger.record("get:/test", id(1), first);
        ledger.record("get:/test", id(1), second);
        ledger.flush(&path).unwrap();

        let loaded = Ledger::load(&path, 5).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("get:/test").unwrap().processed_at, second);
    }

    #[test]
    fn test_record_reports_batch_boundary() {
        let mut ledger = Ledger::new(5);
        let boundaries: Vec<bool> = (0..10)
            .map(|i| ledger.record(&format!("get:/r{}", i), id(i), Utc::now()))
            .collect();
        assert_eq!(
            boundaries,
            vec![false, false, false, false, true, false, false, false, false, true]
        );
        // Re-recording an existing key does not count toward the batch.
        assert!(!ledger.record("get:/r9", id(9), Utc::now()));
    }

    #[test]
    fn test_zero_flush_every_is_clamped() {
        let mut ledger = Ledger::new(0);
        assert!(ledger.record("get:/a", id(1), Utc::now()));
    }

    #[test]
    fn test_timestamped_log_path() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 8, 7).unwrap();
        assert_eq!(
            timestamped_log_path(Path::new("logs/swagger_ingestion_log.json"), at),
            PathBuf::from("logs/swagger_ingestion_log_20240501_090807.json")
        );
        assert_eq!(
            timestamped_log_path(Path::new("ingest"), at),
            PathBuf::from("ingest_20240501_090807")
        );
    }

    #[test]
    fn test_archive_moves_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let checkpoint = tmp.path().join("progress.json");
        let mut ledger = Ledger::new(5);
        ledger.record("get:/test", id(3), Utc::now());
        ledger.flush(&checkpoint).unwrap();

        let archived = archive(&checkpoint, &tmp.path().join("log.json"))
            .unwrap()
            .unwrap();
        assert!(!checkpoint.exists());
        assert!(archived.exists());
        let name = archived.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("log_") && name.ends_with(".json"));
        assert_eq!(Ledger::load(&archived, 5).unwrap().len(), 1);
    }

    #[test]
    fn test_archive_without_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let result = archive(&tmp.path().join("progress.json"), &tmp.path().join("log.json"));
        assert!(result.unwrap().is_none());
    }
}
