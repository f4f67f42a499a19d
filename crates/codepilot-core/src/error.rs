//! Error taxonomy for the indexing and retrieval pipeline.
//!
//! Per-file read failures use the separate [`ReadError`] type: they are
//! always recovered inside the ingestion loop and never surface as a
//! [`CoreError`].

use std::time::Duration;

/// Errors surfaced by ingestion, index persistence, and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Invalid chunking or retrieval configuration (e.g. `window <= overlap`).
    #[error("config error: {0}")]
    Config(String),

    /// A query was issued before any ingestion produced a usable index.
    #[error("index not ready: run ingestion first")]
    NotReady,

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The query vector does not match the index dimensionality.
    #[error("dimension mismatch: index has {expected} dims, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A persisted index blob could not be decoded. Requires re-ingestion.
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// The embedding provider failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A collaborator call did not finish within its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Why a single file could not be turned into text.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("file too large ({size} bytes, limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("binary or undecodable content")]
    Undecodable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
