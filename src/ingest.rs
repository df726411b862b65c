//! Ingestion driver.
//!
//! Coordinates one run: snapshot comparison → operation diff → checkpoint
//! resume → summarize, build record, upsert, record progress → snapshot
//! update and checkpoint archive.
//!
//! ```text
//! INIT ─▶ RESUME_CHECK ─▶ PROCESSING ─┬─▶ COMPLETE
//!                                      └─▶ ABORTED (ledger flushed)
//! ```
//!
//! Operations run one at a time. The first failing operation aborts the
//! run after the ledger is flushed, so a resumed run starts at that
//! operation and nothing already stored is redone. The snapshot is only
//! written once every target has been stored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use crate::cache;
use crate::config::{Config, IngestConfig};
use crate::diff::{diff, ChangedOperations};
use crate::embedding::create_providers;
use crate::error::{CacheError, IngestError, LedgerError, OperationError};
use crate::ledger::{self, Ledger};
use crate::models::{EndpointRecord, Operation, SpecDocument};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress, ProgressMode};
use crate::record::build_record;
use crate::resolver::{DefaultResolver, Resolver};
use crate::store::{InMemoryStore, MilvusStore, VectorStore};
use crate::summarizer::{create_summarizer, Summarizer};

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub cache_dir: PathBuf,
    pub checkpoint_file: PathBuf,
    pub log_file: PathBuf,
    pub flush_every: usize,
    pub flush_each_operation: bool,
    pub resume: bool,
    pub dry_run: bool,
}

impl IngestOptions {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            checkpoint_file: config.checkpoint_file.clone(),
            log_file: config.log_file.clone(),
            flush_every: config.flush_every,
            flush_each_operation: config.flush_each_operation,
            resume: false,
            dry_run: false,
        }
    }
}

/// How the incoming spec relates to the cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// No snapshot: every operation is new.
    FirstRun,
    /// Snapshot differs: only changed operations are targeted.
    Changed,
    /// Snapshot is identical: nothing to do.
    UpToDate,
}

impl Baseline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Baseline::FirstRun => "first run",
            Baseline::Changed => "changed",
            Baseline::UpToDate => "up to date",
        }
    }
}

/// Result of planning a run.
#[derive(Debug)]
pub struct IngestPlan<'s> {
    pub baseline: Baseline,
    /// Diff output, when a snapshot was available.
    pub changed: Option<ChangedOperations>,
    /// Operations to process, in document order.
    pub targets: Vec<Operation<'s>>,
    /// Targets dropped because the resumed checkpoint already has them.
    pub skipped: usize,
    /// Changed operationIds no longer present in the incoming spec.
    pub removed: Vec<String>,
    ledger: Ledger,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub baseline: Baseline,
    pub dry_run: bool,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    /// `METHOD /path` of every targeted operation, in processing order.
    pub targets: Vec<String>,
    pub skipped: usize,
    pub processed: usize,
    pub snapshot: Option<PathBuf>,
    pub archived: Option<PathBuf>,
}

/// Compare `spec` to the snapshot in `cache_dir`.
///
/// Returns `Ok(None)` when there is no snapshot yet.
pub fn changed_operations(
    spec: &SpecDocument,
    cache_dir: &Path,
) -> Result<Option<ChangedOperations>, CacheError> {
    let snapshot = cache::snapshot_path(cache_dir);
    let cached = match cache::load(&snapshot) {
        Ok(cached) => cached,
        Err(CacheError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    Ok(Some(diff(spec, &cached)))
}

pub struct IngestionDriver<'a> {
    store: &'a dyn VectorStore,
    summarizer: Option<&'a dyn Summarizer>,
    progress: Box<dyn IngestProgressReporter + 'a>,
    options: IngestOptions,
}

impl<'a> IngestionDriver<'a> {
    pub fn new(store: &'a dyn VectorStore, options: IngestOptions) -> Self {
        Self {
            store,
            summarizer: None,
            progress: Box::new(NoProgress),
            options,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Option<&'a dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn IngestProgressReporter + 'a>) -> Self {
        self.progress = progress;
        self
    }

    /// INIT and RESUME_CHECK: work out which operations this run touches.
    pub fn plan<'s>(&self, spec: &'s SpecDocument) -> Result<IngestPlan<'s>, IngestError> {
        let snapshot = cache::snapshot_path(&self.options.cache_dir);
        let (baseline, changed) = if snapshot.exists() && cache::matches(spec, &snapshot)? {
            (Baseline::UpToDate, None)
        } else {
            match changed_operations(spec, &self.options.cache_dir)? {
                Some(changed) => (Baseline::Changed, Some(changed)),
                None => (Baseline::FirstRun, None),
            }
        };

        let ledger = self.load_ledger()?;

        if baseline == Baseline::UpToDate {
            return Ok(IngestPlan {
                baseline,
                changed: Some(ChangedOperations::new()),
                targets: Vec::new(),
                skipped: 0,
                removed: Vec::new(),
                ledger,
            });
        }

        let candidates: Vec<Operation<'s>> = spec
            .operations()
            .filter(|op| match &changed {
                Some(changed) => op.operation_id().is_some_and(|id| changed.contains(id)),
                None => true,
            })
            .collect();

        let removed = match &changed {
            Some(changed) => {
                let incoming: std::collections::HashSet<&str> =
                    spec.operations().filter_map(|op| op.operation_id()).collect();
                changed
                    .iter()
                    .filter(|id| !incoming.contains(id))
                    .map(str::to_string)
                    .collect()
            }
            None => Vec::new(),
        };

        let before = candidates.len();
        let targets: Vec<Operation<'s>> = candidates
            .into_iter()
            .filter(|op| !ledger.contains(&op.key()))
            .collect();
        let skipped = before - targets.len();

        Ok(IngestPlan {
            baseline,
            changed,
            targets,
            skipped,
            removed,
            ledger,
        })
    }

    fn load_ledger(&self) -> Result<Ledger, IngestError> {
        if !self.options.resume {
            return Ok(Ledger::new(self.options.flush_every));
        }
        match Ledger::load(&self.options.checkpoint_file, self.options.flush_every) {
            Ok(ledger) => {
                if !ledger.is_empty() {
                    tracing::info!(
                        entries = ledger.len(),
                        path = %self.options.checkpoint_file.display(),
                        "resuming from checkpoint"
                    );
                }
                Ok(ledger)
            }
            Err(err @ LedgerError::Corrupt { .. }) => {
                tracing::warn!(error = %err, "ignoring unreadable checkpoint, starting with an empty one");
                Ok(Ledger::new(self.options.flush_every))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Run the whole state machine for `spec`.
    pub async fn run(&self, spec: &SpecDocument) -> Result<IngestReport, IngestError> {
        let plan = self.plan(spec)?;
        let IngestPlan {
            baseline,
            changed,
            targets,
            skipped,
            removed,
            mut ledger,
        } = plan;

        let mut report = IngestReport {
            baseline,
            dry_run: self.options.dry_run,
            changed: changed.map(ChangedOperations::into_vec).unwrap_or_default(),
            removed,
            targets: targets
                .iter()
                .map(|op| format!("{} {}", op.method.to_uppercase(), op.path))
                .collect(),
            skipped,
            processed: 0,
            snapshot: None,
            archived: None,
        };

        if baseline == Baseline::UpToDate {
            tracing::info!("specification matches cached snapshot, nothing to ingest");
            return Ok(report);
        }
        for id in &report.removed {
            tracing::warn!(operation_id = %id, "operation removed from spec; its stored record is left in place");
        }
        if self.options.dry_run {
            return Ok(report);
        }

        let checkpoint = self.options.checkpoint_file.as_path();
        let total = targets.len() as u64;
        self.progress.report(IngestProgressEvent::Planned {
            total,
            skipped: skipped as u64,
        });

        for op in &targets {
            match self.process(op).await {
                Ok(record) => {
                    let at_boundary = ledger.record(&op.key(), record.id, Utc::now());
                    if at_boundary || self.options.flush_each_operation {
                        ledger.flush(checkpoint)?;
                    }
                    report.processed += 1;
                    tracing::debug!(method = op.method, path = op.path, id = %record.id, "stored endpoint");
                    self.progress.report(IngestProgressEvent::Ingested {
                        method: op.method.to_string(),
                        path: op.path.to_string(),
                        n: report.processed as u64,
                        total,
                    });
                }
                Err(source) => {
                    if let Err(flush_err) = ledger.flush(checkpoint) {
                        tracing::error!(error = %flush_err, "failed to save checkpoint after error");
                    }
                    tracing::error!(method = op.method, path = op.path, error = %source, "ingestion aborted");
                    return Err(IngestError::Operation {
                        method: op.method.to_string(),
                        path: op.path.to_string(),
                        source,
                    });
                }
            }
        }

        // A checkpoint left by an earlier, non-resumed run is replaced so the
        // archived log holds only this run's entries.
        if !ledger.is_empty() || checkpoint.exists() {
            ledger.flush(checkpoint)?;
        }

        report.snapshot = Some(cache::write(spec, &self.options.cache_dir)?);

        match ledger::archive(checkpoint, &self.options.log_file) {
            Ok(archived) => {
                if let Some(path) = &archived {
                    tracing::info!(path = %path.display(), "archived checkpoint");
                }
                report.archived = archived;
            }
            Err(err) => {
                tracing::warn!(error = %err, "couldn't archive checkpoint file");
            }
        }

        Ok(report)
    }

    /// Summarize, build and store one operation.
    async fn process(&self, op: &Operation<'_>) -> Result<EndpointRecord, OperationError> {
        let description = op.description().unwrap_or_default();
        let summary = match self.summarizer {
            Some(summarizer) if !description.trim().is_empty() => {
                summarizer.summarize(description).await?
            }
            _ => description.to_string(),
        };
        let record = build_record(op, &summary)?;
        self.store.upsert(&record).await?;
        Ok(record)
    }
}

/// Arguments of `oai ingest` that are not part of the config file.
#[derive(Debug, Clone)]
pub struct IngestArgs {
    pub spec_url: String,
    pub resume: bool,
    pub dry_run: bool,
    pub progress: ProgressMode,
}

/// Run the ingest command and print a summary.
pub async fn run_ingest(config: &Config, args: &IngestArgs) -> anyhow::Result<()> {
    if args.dry_run {
        config.validate()?;
    } else {
        config.validate_for_store()?;
    }

    let resolver = DefaultResolver::new(Duration::from_secs(config.store.timeout_secs))?;
    let spec = resolver.resolve(&args.spec_url).await?;
    tracing::info!(operations = spec.operation_count(), "specification loaded");

    let mut options = IngestOptions::from_config(&config.ingest);
    options.resume = args.resume;
    options.dry_run = args.dry_run;

    if args.dry_run {
        let store = InMemoryStore::new();
        let report = IngestionDriver::new(&store, options).run(&spec).await?;
        print_report(&args.spec_url, &report);
        return Ok(());
    }

    let embedders = create_providers(&config.embeddings)?;
    let store = MilvusStore::new(&config.store, embedders)?;
    store
        .use_database(&config.store.database)
        .await
        .map_err(IngestError::Store)?;
    let summarizer = create_summarizer(&config.summarizer)?;

    let driver = IngestionDriver::new(&store, options)
        .with_summarizer(summarizer.as_deref())
        .with_progress(args.progress.reporter());
    let report = driver.run(&spec).await?;
    print_report(&args.spec_url, &report);
    Ok(())
}

fn print_report(spec_url: &str, report: &IngestReport) {
    if report.dry_run {
        println!("ingest {} (dry-run)", spec_url);
    } else {
        println!("ingest {}", spec_url);
    }
    println!("  baseline: {}", report.baseline.as_str());
    if report.baseline == Baseline::Changed {
        println!("  changed operations: {}", report.changed.len());
    }
    if !report.removed.is_empty() {
        println!("  removed operations: {}", report.removed.join(", "));
    }
    if report.skipped > 0 {
        println!("  already in checkpoint: {}", report.skipped);
    }
    if report.dry_run {
        println!("  would ingest: {}", report.targets.len());
        for target in &report.targets {
            println!("    {}", target);
        }
        return;
    }
    println!("  ingested: {}", report.processed);
    if let Some(snapshot) = &report.snapshot {
        println!("  snapshot: {}", snapshot.display());
    }
    if let Some(archived) = &report.archived {
        println!("  checkpoint log: {}", archived.display());
    }
    println!("ok");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, SummarizeError};
    use crate::record::stable_id;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    fn options(dir: &Path) -> IngestOptions {
        IngestOptions {
            cache_dir: dir.join(".cache"),
            checkpoint_file: dir.join("progress.json"),
            log_file: dir.join("log.json"),
            flush_every: 5,
            flush_each_operation: true,
            resume: false,
            dry_run: false,
        }
    }

    fn scenario_a() -> SpecDocument {
        SpecDocument::new(json!({
            "swagger": "2.0",
            "paths": {"/test": {"get": {"operationId": "getTest", "description": "<p>Test</p>"}}}
        }))
    }

    struct UpperSummarizer;

    #[async_trait]
    impl Summarizer for UpperSummarizer {
        async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
            Ok(text.to_uppercase())
        }
    }

    struct BrokenSummarizer;

    #[async_trait]
    impl Summarizer for BrokenSummarizer {
        async fn summarize(&self, _text: &str) -> Result<String, SummarizeError> {
            Err(SummarizeError::Request("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_first_run_ingests_everything() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let driver = IngestionDriver::new(&store, options(tmp.path()));

        let report = driver.run(&scenario_a()).await.unwrap();
        assert_eq!(report.baseline, Baseline::FirstRun);
        assert_eq!(report.processed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&stable_id("getTest")).is_some());

        let archived = report.archived.unwrap();
        let ledger = Ledger::load(&archived, 5).unwrap();
        assert!(ledger.contains("get:/test"));
        assert!(!tmp.path().join("progress.json").exists());
        assert!(cache::matches(&scenario_a(), &report.snapshot.unwrap()).unwrap());
    }

    #[tokio::test]
    async fn test_plan_uses_diff_against_snapshot() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path());
        cache::write(&scenario_a(), &opts.cache_dir).unwrap();

        let incoming = SpecDocument::new(json!({
            "swagger": "2.0",
            "paths": {"/test": {
                "get": {"operationId": "getTest", "description": "<p>Test</p>"},
                "post": {"operationId": "createTest", "description": "new"}
            }}
        }));
        let store = InMemoryStore::new();
        let driver = IngestionDriver::new(&store, opts);
        let plan = driver.plan(&incoming).unwrap();
        assert_eq!(plan.baseline, Baseline::Changed);
        assert_eq!(plan.changed.unwrap().into_vec(), vec!["createTest"]);
        let keys: Vec<String> = plan.targets.iter().map(|op| op.key()).collect();
        assert_eq!(keys, vec!["post:/test"]);
    }

    #[tokio::test]
    async fn test_unchanged_spec_makes_no_store_calls() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let driver = IngestionDriver::new(&store, options(tmp.path()));
        driver.run(&scenario_a()).await.unwrap();
        assert_eq!(store.upsert_count(), 1);

        let report = driver.run(&scenario_a()).await.unwrap();
        assert_eq!(report.baseline, Baseline::UpToDate);
        assert_eq!(report.processed, 0);
        assert_eq!(store.upsert_count(), 1);
    }

    #[tokio::test]
    async fn test_removed_operations_are_reported() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path());
        cache::write(
            &SpecDocument::new(json!({
                "swagger": "2.0",
                "paths": {"/test": {
                    "get": {"operationId": "getTest", "description": "<p>Test</p>"},
                    "delete": {"operationId": "deleteTest"}
                }}
            })),
            &opts.cache_dir,
        )
        .unwrap();

        let store = InMemoryStore::new();
        let driver = IngestionDriver::new(&store, opts);
        let report = driver.run(&scenario_a()).await.unwrap();
        assert_eq!(report.changed, vec!["deleteTest"]);
        assert_eq!(report.removed, vec!["deleteTest"]);
        assert!(report.targets.is_empty());
        assert_eq!(store.upsert_count(), 0);
        assert!(cache::matches(&scenario_a(), &report.snapshot.unwrap()).unwrap());
    }

    #[tokio::test]
    async fn test_stale_checkpoint_not_archived_as_this_run() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path());
        cache::write(
            &SpecDocument::new(json!({
                "swagger": "2.0",
                "paths": {"/test": {
                    "get": {"operationId": "getTest", "description": "<p>Test</p>"},
                    "delete": {"operationId": "deleteTest"}
                }}
            })),
            &opts.cache_dir,
        )
        .unwrap();
        let mut stale = Ledger::new(5);
        stale.record("delete:/test", stable_id("deleteTest"), Utc::now());
        stale.flush(&opts.checkpoint_file).unwrap();

        let store = InMemoryStore::new();
        let checkpoint = opts.checkpoint_file.clone();
        let report = IngestionDriver::new(&store, opts).run(&scenario_a()).await.unwrap();
        assert_eq!(report.processed, 0);
        assert!(!checkpoint.exists());

        let archived = Ledger::load(&report.archived.unwrap(), 5).unwrap();
        assert!(archived.is_empty());
    }

    #[tokio::test]
    async fn test_summarizer_output_used_in_text() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let summarizer = UpperSummarizer;
        let driver =
            IngestionDriver::new(&store, options(tmp.path())).with_summarizer(Some(&summarizer));
        driver.run(&scenario_a()).await.unwrap();

        let record = store.get(&stable_id("getTest")).unwrap();
        assert!(record.text.contains("description: <P>TEST</P>"));
        assert_eq!(record.metadata["description"], "Test");
    }

    #[tokio::test]
    async fn test_summarizer_failure_aborts_and_keeps_cache() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let summarizer = BrokenSummarizer;
        let opts = options(tmp.path());
        let cache_dir = opts.cache_dir.clone();
        let driver = IngestionDriver::new(&store, opts).with_summarizer(Some(&summarizer));

        let err = driver.run(&scenario_a()).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Operation {
                source: OperationError::Summarize(_),
                ..
            }
        ));
        assert!(err.is_resumable());
        assert!(store.is_empty());
        assert!(!cache::snapshot_path(&cache_dir).exists());
    }

    #[tokio::test]
    async fn test_dry_run_has_no_side_effects() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let mut opts = options(tmp.path());
        opts.dry_run = true;
        let driver = IngestionDriver::new(&store, opts.clone());

        let report = driver.run(&scenario_a()).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.targets, vec!["GET /test"]);
        assert_eq!(store.upsert_count(), 0);
        assert!(!opts.checkpoint_file.exists());
        assert!(!cache::snapshot_path(&opts.cache_dir).exists());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_degrades_to_empty() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.resume = true;
        std::fs::write(&opts.checkpoint_file, "{{ not json").unwrap();

        let store = InMemoryStore::new();
        let driver = IngestionDriver::new(&store, opts);
        let report = driver.run(&scenario_a()).await.unwrap();
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn test_missing_operation_id_on_first_run_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let driver = IngestionDriver::new(&store, options(tmp.path()));
        let spec = SpecDocument::new(json!({
            "swagger": "2.0",
            "paths": {"/ping": {"get": {"description": "no id"}}}
        }));
        let err = driver.run(&spec).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Operation {
                source: OperationError::Malformed(_),
                ..
            }
        ));
        assert_eq!(err.to_string(), "Error processing GET /ping: Malformed operation: GET /ping has no operationId");
    }

    struct RejectingStore;

    #[async_trait]
    impl VectorStore for RejectingStore {
        async fn use_database(&self, _name: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn upsert(&self, _record: &EndpointRecord) -> Result<(), StoreError> {
            Err(StoreError::Api {
                code: 65535,
                message: "collection not loaded".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_store_failure_writes_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path());
        let checkpoint = opts.checkpoint_file.clone();
        let driver = IngestionDriver::new(&RejectingStore, opts);

        let err = driver.run(&scenario_a()).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Operation {
                source: OperationError::Store(_),
                ..
            }
        ));
        // Flushed on failure even with nothing recorded yet.
        assert!(Ledger::load(&checkpoint, 5).unwrap().is_empty());
        assert!(checkpoint.exists());
    }
}
