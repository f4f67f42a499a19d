//! Nearest-neighbor index abstraction.
//!
//! The retrieval pipeline only needs four things from an index: build it
//! from corpus-aligned vectors, search it, and persist/load it as a binary
//! blob. [`VectorIndex`] captures exactly that so any implementation can
//! back a snapshot. [`FlatIndex`] is the exact brute-force implementation
//! (inner product over unit vectors, i.e. cosine similarity).
//!
//! # Blob format
//!
//! ```text
//! "CPIX" | version: u32 LE | dims: u32 LE | count: u64 LE | corpus digest: [u8; 32]
//!        | count × dims × f32 LE
//! ```
//!
//! The corpus digest ties a blob to the records it was built alongside.
//! Loading with any other digest fails, so a corpus file from one ingestion
//! can never be served next to vectors from another.

use async_trait::async_trait;

use crate::embedding::{blob_to_vec, dot, vec_to_blob};
use crate::error::{CoreError, Result};

const MAGIC: &[u8; 4] = b"CPIX";
const FORMAT_VERSION: u32 = 2;
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + DIGEST_LEN;
const DIGEST_LEN: usize = 32;

/// SHA-256 of the corpus an index belongs to. See
/// [`corpus_digest`](crate::corpus::corpus_digest).
pub type CorpusDigest = [u8; DIGEST_LEN];

/// A search hit from the index: similarity score and vector id.
///
/// `id` is the position of the record in the corpus the index was built
/// alongside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub score: f32,
    pub id: usize,
}

/// Abstract nearest-neighbor index.
///
/// Implementations are immutable once built and must be `Send + Sync` so a
/// snapshot can be shared by concurrent queries.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Build an index over `vectors`; vector `i` gets id `i`.
    fn build(dims: usize, vectors: Vec<Vec<f32>>) -> Result<Self>
    where
        Self: Sized;

    /// Decode a blob produced by [`persist`](VectorIndex::persist).
    ///
    /// Fails with [`CoreError::IndexCorrupt`] on any malformed input, and
    /// when the blob was persisted for a corpus other than `corpus`.
    fn load(bytes: &[u8], corpus: &CorpusDigest) -> Result<Self>
    where
        Self: Sized;

    /// Encode the index as a binary blob bound to `corpus`.
    fn persist(&self, corpus: &CorpusDigest) -> Vec<u8>;

    /// Vector dimensionality.
    fn dims(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return up to `n` neighbors of `query`, highest score first.
    async fn search(&self, query: &[f32], n: usize) -> Result<Vec<Neighbor>>;
}

/// Exact inner-product index over a contiguous `f32` buffer.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dims: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    fn row(&self, id: usize) -> &[f32] {
        &self.data[id * self.dims..(id + 1) * self.dims]
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn build(dims: usize, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if dims == 0 {
            return Err(CoreError::Config("index dims must be > 0".to_string()));
        }
        let mut data = Vec::with_capacity(dims * vectors.len());
        for v in &vectors {
            if v.len() != dims {
                return Err(CoreError::DimensionMismatch {
                    expected: dims,
                    actual: v.len(),
                });
            }
            data.extend_from_slice(v);
        }
        tracing::debug!(dims, count = vectors.len(), "built flat index");
        Ok(Self { dims, data })
    }

    fn load(bytes: &[u8], corpus: &CorpusDigest) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CoreError::IndexCorrupt(format!(
                "blob too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(CoreError::IndexCorrupt("bad magic".to_string()));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(CoreError::IndexCorrupt(format!(
                "unsupported format version {}",
                version
            )));
        }
        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[12..20]);
        let count = u64::from_le_bytes(count_bytes);
        if &bytes[20..HEADER_LEN] != corpus.as_slice() {
            return Err(CoreError::IndexCorrupt(
                "index was built for a different corpus".to_string(),
            ));
        }

        if dims == 0 {
            return Err(CoreError::IndexCorrupt("zero dims".to_string()));
        }
        let expected = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(dims))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| CoreError::IndexCorrupt("vector count overflows".to_string()))?;
        let body = &bytes[HEADER_LEN..];
        if body.len() != expected {
            return Err(CoreError::IndexCorrupt(format!(
                "expected {} payload bytes, found {}",
                expected,
                body.len()
            )));
        }

        Ok(Self {
            dims,
            data: blob_to_vec(body),
        })
    }

    fn persist(&self, corpus: &CorpusDigest) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dims as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(corpus);
        bytes.extend_from_slice(&vec_to_blob(&self.data));
        bytes
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    async fn search(&self, query: &[f32], n: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dims {
            return Err(CoreError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }
        let mut neighbors: Vec<Neighbor> = (0..self.len())
            .map(|id| Neighbor {
                score: dot(query, self.row(id)),
                id,
            })
            .collect();
        neighbors.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        neighbors.truncate(n);
        Ok(neighbors)
    }
}
