//! Core data models used throughout CodePilot.
//!
//! These types represent the chunks, corpus records, and search results
//! that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A line window produced by the windower, before hashing.
///
/// Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// An indexed chunk of source code.
///
/// A record's position in the corpus is its vector id in the index.
/// Field order matches the persisted JSON Lines format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Repository name (final component of the ingested root).
    pub repo: String,
    /// Repo-relative path with forward slashes.
    pub path: String,
    /// Language tag, `"unknown"` when undetected.
    pub lang: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Exact chunk text, line terminators included.
    pub text: String,
    /// 16-hex-char content hash of `text`.
    pub hash: String,
    /// First few lines of `text` for display.
    pub preview: String,
}

/// A ranked search result.
///
/// Exposes only display fields: the content hash and the full chunk text
/// stay internal to the corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub repo: String,
    pub path: String,
    pub lang: String,
    pub start_line: usize,
    pub end_line: usize,
    pub preview: String,
    /// Similarity score plus lexical boost.
    pub score: f32,
}

impl SearchHit {
    pub(crate) fn from_record(record: &ChunkRecord, score: f32) -> Self {
        Self {
            repo: record.repo.clone(),
            path: record.path.clone(),
            lang: record.lang.clone(),
            start_line: record.start_line,
            end_line: record.end_line,
            preview: record.preview.clone(),
            score,
        }
    }
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub files_scanned: usize,
    pub files_read: usize,
    pub files_skipped: usize,
    pub total_lines: usize,
    pub chunks_total: usize,
    /// `total_lines / chunks_total`, or `0.0` when nothing was chunked.
    pub avg_lines_per_chunk: f64,
}
