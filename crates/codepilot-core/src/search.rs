//! Retrieve-then-rerank query pipeline.
//!
//! Given a query vector, [`retrieve`] runs four steps against one
//! [`Snapshot`]:
//!
//! 1. **Oversampled retrieval**: ask the index for `min(k × oversample, N)`
//!    neighbors.
//! 2. **Filtering**: drop ids outside the corpus, then keep only
//!    candidates matching every filter (case-insensitive path substring,
//!    case-insensitive language equality). Filters never widen the search:
//!    if nothing survives, the result is empty.
//! 3. **Lexical boost** (optional): add `boost_factor` to the score once
//!    per query keyword occurrence found in the chunk text.
//! 4. **Top-k assembly**: stable sort by boosted score descending, so
//!    equal scores keep their retrieval order, then truncate to `k`.
//!
//! The snapshot is only read; concurrent queries over one snapshot are safe.

use crate::error::{CoreError, Result};
use crate::models::{ChunkRecord, SearchHit};
use crate::snapshot::Snapshot;

/// Largest accepted `k`.
pub const MAX_K: usize = 50;

/// Query words that never count towards the lexical boost.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "how", "do", "does", "what", "where", "when", "i", "we", "you",
];

/// Tuning knobs shared by every query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    /// Multiplier on `k` for the number of index candidates fetched.
    pub oversample_factor: usize,
    /// Score added per keyword occurrence.
    pub boost_factor: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            oversample_factor: 5,
            boost_factor: 0.1,
        }
    }
}

/// A single query.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Raw query text, used for keyword extraction.
    pub query: String,
    pub k: usize,
    /// Keep only records whose path contains this (case-insensitive).
    pub path_contains: Option<String>,
    /// Keep only records whose language equals this (case-insensitive).
    pub lang: Option<String>,
    pub lexical_boost: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, k: usize) -> Self {
        Self {
            query: query.into(),
            k,
            path_contains: None,
            lang: None,
            lexical_boost: true,
        }
    }
}

/// Fail with [`CoreError::InvalidArgument`] unless `1 <= k <= MAX_K`.
pub fn validate_k(k: usize) -> Result<()> {
    if !(1..=MAX_K).contains(&k) {
        return Err(CoreError::InvalidArgument(format!(
            "k must be between 1 and {}, got {}",
            MAX_K, k
        )));
    }
    Ok(())
}

/// Run the full pipeline for `query_vec` against `snapshot`.
pub async fn retrieve(
    snapshot: &Snapshot,
    query_vec: &[f32],
    request: &SearchRequest,
    params: &RetrievalParams,
) -> Result<Vec<SearchHit>> {
    validate_k(request.k)?;

    let corpus = snapshot.corpus();
    let index = snapshot.index();
    if corpus.is_empty() || index.is_empty() {
        return Err(CoreError::NotReady);
    }
    if query_vec.len() != index.dims() {
        return Err(CoreError::DimensionMismatch {
            expected: index.dims(),
            actual: query_vec.len(),
        });
    }

    let n = request
        .k
        .saturating_mul(params.oversample_factor.max(1))
        .min(corpus.len());
    let neighbors = index.search(query_vec, n).await?;
    let fetched = neighbors.len();

    let path_filter = request.path_contains.as_deref().map(str::to_lowercase);
    let lang_filter = request.lang.as_deref().map(str::to_lowercase);

    let mut candidates: Vec<(&ChunkRecord, f32)> = neighbors
        .into_iter()
        .filter_map(|nb| corpus.get(nb.id).map(|record| (record, nb.score)))
        .filter(|(record, _)| matches_filters(record, path_filter.as_deref(), lang_filter.as_deref()))
        .collect();

    if request.lexical_boost {
        let keywords = extract_keywords(&request.query);
        if !keywords.is_empty() {
            for (record, score) in candidates.iter_mut() {
                *score += keyword_boost(&record.text, &keywords, params.boost_factor);
            }
        }
    }

    // `sort_by` is stable: equal scores keep retrieval order.
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(request.k);

    tracing::debug!(
        k = request.k,
        fetched,
        returned = candidates.len(),
        generation = snapshot.generation(),
        "retrieval complete"
    );

    Ok(candidates
        .into_iter()
        .map(|(record, score)| SearchHit::from_record(record, score))
        .collect())
}

/// Conjunctive metadata predicate. Filters must already be lowercased.
fn matches_filters(record: &ChunkRecord, path: Option<&str>, lang: Option<&str>) -> bool {
    if let Some(needle) = path {
        if !record.path.to_lowercase().contains(needle) {
            return false;
        }
    }
    if let Some(lang) = lang {
        if record.lang.to_lowercase() != lang {
            return false;
        }
    }
    true
}

/// Lowercase word tokens of `query` worth boosting on.
///
/// Tokens are runs of alphanumerics and underscores. Tokens of two
/// characters or fewer and stop words are dropped. Repeats are kept, so a
/// word typed twice counts twice.
pub fn extract_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Boost for one chunk: `boost_factor` per keyword present in `text`.
pub fn keyword_boost(text: &str, keywords: &[String], boost_factor: f32) -> f32 {
    let lower = text.to_lowercase();
    let hits = keywords.iter().filter(|kw| lower.contains(kw.as_str())).count();
    boost_factor * hits as f32
}
