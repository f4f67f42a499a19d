//! Ingestion orchestration: read → split → window → hash → dedup.
//!
//! Turns an ordered list of repo-relative paths into an ordered corpus of
//! [`ChunkRecord`]s plus run statistics. File access and language tagging
//! are delegated to the [`FileReader`] and [`LanguageDetector`]
//! collaborators, so this module performs no filesystem walking itself.
//!
//! Per-file read failures are local: the file is skipped, counted, and
//! logged, and the run continues. Corpus order is file-then-chunk and
//! defines vector ids, so it must be preserved verbatim downstream.
//!
//! # Parallel ingestion
//!
//! [`ingest_parallel`] reads, windows, and hashes files on rayon workers,
//! each producing its own candidate list. A single serialized merge then
//! orders candidates by `(path, start_line)` and applies the run's
//! [`Deduplicator`], so the final corpus does not depend on scheduling.

use rayon::prelude::*;

use crate::dedup::{content_hash, Deduplicator};
use crate::error::{ReadError, Result};
use crate::models::{ChunkRecord, IngestStats};
use crate::window::{chunk_lines, split_lines_inclusive, stride};

/// Default number of lines kept in a record preview.
pub const DEFAULT_PREVIEW_LINES: usize = 12;

/// Reads a repo-relative path into text.
pub trait FileReader: Send + Sync {
    fn read(&self, path: &str) -> std::result::Result<String, ReadError>;
}

impl<F> FileReader for F
where
    F: Fn(&str) -> std::result::Result<String, ReadError> + Send + Sync,
{
    fn read(&self, path: &str) -> std::result::Result<String, ReadError> {
        self(path)
    }
}

/// Maps a path to a language tag (`"unknown"` when not recognised).
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, path: &str) -> String;
}

impl<F> LanguageDetector for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn detect(&self, path: &str) -> String {
        self(path)
    }
}

/// Windowing parameters for one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    /// Lines per window.
    pub window: usize,
    /// Lines shared by consecutive windows.
    pub overlap: usize,
    /// Minimum non-blank lines for a window to be kept.
    pub min_lines: usize,
    /// Lines kept in each record's preview.
    pub preview_lines: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            window: 80,
            overlap: 15,
            min_lines: 10,
            preview_lines: DEFAULT_PREVIEW_LINES,
        }
    }
}

/// Corpus and statistics produced by one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestOutput {
    pub corpus: Vec<ChunkRecord>,
    pub stats: IngestStats,
}

/// First `max_lines` lines of `text`, joined with `\n`.
pub fn make_preview(text: &str, max_lines: usize) -> String {
    text.lines().take(max_lines).collect::<Vec<_>>().join("\n")
}

/// Ingest `paths` sequentially, in the order given.
///
/// # Errors
///
/// Only a [`CoreError::Config`](crate::error::CoreError::Config) for invalid
/// window parameters, raised before any file is read. Unreadable files are
/// counted in [`IngestStats::files_skipped`] instead.
pub fn ingest(
    repo: &str,
    paths: &[String],
    reader: &dyn FileReader,
    detector: &dyn LanguageDetector,
    params: &ChunkingParams,
) -> Result<IngestOutput> {
    stride(params.window, params.overlap)?;

    let mut builder = CorpusBuilder::new(paths.len());
    for path in paths {
        let file = chunk_file(repo, path, reader, detector, params)?;
        builder.merge(file);
    }
    Ok(builder.finish())
}

/// Ingest `paths` on the rayon thread pool.
///
/// Produces the same corpus as [`ingest`] when `paths` is sorted, which is
/// what file discovery returns.
pub fn ingest_parallel(
    repo: &str,
    paths: &[String],
    reader: &dyn FileReader,
    detector: &dyn LanguageDetector,
    params: &ChunkingParams,
) -> Result<IngestOutput> {
    stride(params.window, params.overlap)?;

    let mut files: Vec<FileChunks> = paths
        .par_iter()
        .map(|path| chunk_file(repo, path, reader, detector, params))
        .collect::<Result<Vec<_>>>()?;

    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut builder = CorpusBuilder::new(paths.len());
    for mut file in files {
        if let FileOutcome::Read { chunks, .. } = &mut file.outcome {
            chunks.sort_by_key(|c| c.start_line);
        }
        builder.merge(file);
    }
    Ok(builder.finish())
}

/// Candidate records for one file, not yet deduplicated.
struct FileChunks {
    path: String,
    outcome: FileOutcome,
}

enum FileOutcome {
    Skipped,
    Read {
        line_count: usize,
        chunks: Vec<ChunkRecord>,
    },
}

fn chunk_file(
    repo: &str,
    path: &str,
    reader: &dyn FileReader,
    detector: &dyn LanguageDetector,
    params: &ChunkingParams,
) -> Result<FileChunks> {
    let text = match reader.read(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path, error = %e, "skipping unreadable file");
            return Ok(FileChunks {
                path: path.to_string(),
                outcome: FileOutcome::Skipped,
            });
        }
    };

    let lines = split_lines_inclusive(&text);
    let lang = detector.detect(path);
    let windows = chunk_lines(&lines, params.window, params.overlap, params.min_lines)?;

    let chunks = windows
        .into_iter()
        .map(|w| ChunkRecord {
            repo: repo.to_string(),
            path: path.to_string(),
            lang: lang.clone(),
            start_line: w.start_line,
            end_line: w.end_line,
            hash: content_hash(&w.text),
            preview: make_preview(&w.text, params.preview_lines),
            text: w.text,
        })
        .collect::<Vec<_>>();

    tracing::debug!(path, lines = lines.len(), chunks = chunks.len(), "chunked file");

    Ok(FileChunks {
        path: path.to_string(),
        outcome: FileOutcome::Read {
            line_count: lines.len(),
            chunks,
        },
    })
}

/// Serialized merge step: the only place the dedup set is touched.
struct CorpusBuilder {
    dedup: Deduplicator,
    corpus: Vec<ChunkRecord>,
    stats: IngestStats,
}

impl CorpusBuilder {
    fn new(files_scanned: usize) -> Self {
        Self {
            dedup: Deduplicator::new(),
            corpus: Vec::new(),
            stats: IngestStats {
                files_scanned,
                ..IngestStats::default()
            },
        }
    }

    fn merge(&mut self, file: FileChunks) {
        match file.outcome {
            FileOutcome::Skipped => self.stats.files_skipped += 1,
            FileOutcome::Read { line_count, chunks } => {
                self.stats.files_read += 1;
                self.stats.total_lines += line_count;
                for record in chunks {
                    if self.dedup.insert(&record.hash) {
                        self.corpus.push(record);
                    }
                }
            }
        }
    }

    fn finish(mut self) -> IngestOutput {
        self.stats.chunks_total = self.corpus.len();
        self.stats.avg_lines_per_chunk = if self.stats.chunks_total == 0 {
            0.0
        } else {
            self.stats.total_lines as f64 / self.stats.chunks_total as f64
        };
        tracing::info!(
            files_read = self.stats.files_read,
            files_skipped = self.stats.files_skipped,
            chunks = self.stats.chunks_total,
            "ingestion finished"
        );
        IngestOutput {
            corpus: self.corpus,
            stats: self.stats,
        }
    }
}
