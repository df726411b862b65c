//! Error types, one enum per component boundary.
//!
//! Callers match on the variant to tell a retryable condition (resume the
//! run) from a fatal one (fix the input), instead of inspecting messages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the snapshot cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No snapshot exists at the path, so there is no basis for comparison.
    #[error("Cached spec file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot exists but is not valid JSON.
    #[error("Cached spec at {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the checkpoint ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The checkpoint file exists but cannot be parsed.
    #[error("Checkpoint file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Checkpoint I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from fetching and dereferencing a specification.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetching {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Specification is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but is not an OpenAPI/Swagger specification.
    #[error("Invalid specification: {0}")]
    Invalid(String),
}

/// Errors from the summarization capability.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("Summarizer request failed: {0}")]
    Request(String),

    #[error("Summarizer API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse summarizer response: {0}")]
    Parse(String),

    #[error("Invalid summarizer configuration: {0}")]
    Config(String),
}

/// Errors from the embedding and vector store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(String),

    #[error("Store API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Embedding failed for model '{model}': {message}")]
    Embedding { model: String, message: String },

    #[error("Invalid store configuration: {0}")]
    Config(String),
}

/// Why a single operation could not be ingested.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The operation object is missing a field the record needs.
    #[error("Malformed operation: {0}")]
    Malformed(String),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level error of an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Failed to select database: {0}")]
    Store(#[from] StoreError),

    /// One operation failed; the ledger was flushed before returning.
    #[error("Error processing {} {path}: {source}", method.to_uppercase())]
    Operation {
        method: String,
        path: String,
        #[source]
        source: OperationError,
    },
}

impl IngestError {
    /// Whether re-running with resume enabled can make progress.
    ///
    /// Operation failures keep their completed work in the ledger, so a
    /// resumed run picks up at the failed operation. Everything else fails
    /// before any processing and needs a fix to the input or environment.
    pub fn is_resumable(&self) -> bool {
        matches!(self, IngestError::Operation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = CacheError::NotFound(PathBuf::from("/tmp/missing.json"));
        assert_eq!(
            err.to_string(),
            "Cached spec file not found at /tmp/missing.json"
        );
    }

    #[test]
    fn test_operation_error_names_endpoint() {
        let err = IngestError::Operation {
            method: "get".to_string(),
            path: "/pets".to_string(),
            source: OperationError::Malformed("missing operationId".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Error processing GET /pets: Malformed operation: missing operationId"
        );
        assert!(err.is_resumable());
    }

    #[test]
    fn test_resolve_error_not_resumable() {
        let err = IngestError::Resolve(ResolveError::Invalid("no paths".to_string()));
        assert!(!err.is_resumable());
    }

    #[test]
    fn test_ledger_serialize_from() {
        let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err: LedgerError = json_err.into();
        assert!(matches!(err, LedgerError::Serialize(_)));
    }
}
