//! Snapshot and checkpoint overview, and change preview.
//!
//! `oai status` shows what the last completed run left behind: the cached
//! snapshot (size, age, sha256 fingerprint, operation count) and any
//! checkpoint an interrupted run would resume from. `oai diff` resolves a
//! specification and lists the operationIds that differ from the snapshot,
//! without touching the store.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::cache;
use crate::config::Config;
use crate::error::{CacheError, LedgerError};
use crate::ingest::changed_operations;
use crate::ledger::Ledger;
use crate::resolver::{DefaultResolver, Resolver};

/// Run the status command and print a summary.
pub fn run_status(config: &Config) -> Result<()> {
    let snapshot = cache::snapshot_path(&config.ingest.cache_dir);

    println!("status");
    match cache::load(&snapshot) {
        Ok(spec) => {
            let bytes = std::fs::read(&snapshot)?;
            let modified = std::fs::metadata(&snapshot)
                .and_then(|m| m.modified())
                .ok()
                .map(chrono::DateTime::<chrono::Utc>::from);
            println!("  snapshot: {}", snapshot.display());
            println!("  size: {}", format_bytes(bytes.len() as u64));
            if let Some(modified) = modified {
                println!("  updated: {}", format_relative(modified.timestamp()));
            }
            println!("  sha256: {}", fingerprint(&bytes));
            println!("  operations: {}", spec.operation_count());
        }
        Err(CacheError::NotFound(_)) => println!("  snapshot: none"),
        Err(e) => return Err(e.into()),
    }

    print_checkpoint(&config.ingest.checkpoint_file, config.ingest.flush_every)?;
    println!("ok");
    Ok(())
}

fn print_checkpoint(path: &Path, flush_every: usize) -> Result<()> {
    if !path.exists() {
        println!("  checkpoint: none");
        return Ok(());
    }
    match Ledger::load(path, flush_every) {
        Ok(ledger) => {
            println!("  checkpoint: {} ({} operations)", path.display(), ledger.len());
            if let Some(last) = ledger.entries().values().map(|e| e.processed_at).max() {
                println!("  last processed: {}", format_relative(last.timestamp()));
            }
        }
        Err(e @ LedgerError::Corrupt { .. }) => {
            println!("  checkpoint: {} (unreadable: {})", path.display(), e);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Run the diff command: resolve `spec_url` and list changed operationIds.
pub async fn run_diff(config: &Config, spec_url: &str) -> Result<()> {
    config.validate()?;
    let resolver = DefaultResolver::new(Duration::from_secs(config.store.timeout_secs))?;
    let spec = resolver.resolve(spec_url).await?;

    println!("diff {}", spec_url);
    match changed_operations(&spec, &config.ingest.cache_dir)? {
        None => {
            println!("  snapshot: none");
            println!("  operations: {}", spec.operation_count());
        }
        Some(changed) => {
            println!("  changed: {}", changed.len());
            for id in changed.iter() {
                println!("    {}", id);
            }
        }
    }
    println!("ok");
    Ok(())
}

/// Hex sha256 of the snapshot bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now ("3 hours ago").
fn format_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_iso(ts)
    }
}

fn format_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fingerprint(b"{}").len(), 64);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(12), "12 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_relative(now), "just now");
        assert_eq!(format_relative(now - 7200), "2 hours ago");
        assert_eq!(format_relative(now - 86400), "1 day ago");
    }
}
