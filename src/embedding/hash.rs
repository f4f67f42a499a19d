//! Offline feature-hashing embedder.
//!
//! Each lowercase word token (and each `_`-separated part of a compound
//! identifier) is hashed with SHA-256 into one of `dims` buckets with a
//! ±1 sign; the bucket counts are then unit-normalized. Texts that share
//! vocabulary land close together, which is enough for local use and for
//! tests without a model download.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use codepilot_core::embedding::{normalize, EmbeddingProvider};

pub const DEFAULT_DIMS: usize = 256;

/// Deterministic bag-of-words embedder.
#[derive(Debug, Clone)]
pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    /// Embed one text synchronously.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        for token in lower
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
        {
            self.add(&mut v, token);
            if token.contains('_') {
                for part in token.split('_').filter(|p| !p.is_empty()) {
                    self.add(&mut v, part);
                }
            }
        }
        normalize(&mut v);
        v
    }

    fn add(&self, v: &mut [f32], token: &str) {
        let digest = Sha256::digest(token.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign;
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "feature-hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> codepilot_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}
