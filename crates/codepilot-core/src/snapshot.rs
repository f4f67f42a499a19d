//! Immutable `(corpus, index)` generations and an atomically swappable handle.
//!
//! A corpus and the index built from its embeddings are only meaningful as
//! a pair: record `i` is vector `i`. [`Snapshot`] owns both and refuses to
//! exist if their lengths disagree. [`SnapshotHandle`] publishes snapshots;
//! queries clone the current `Arc<Snapshot>` and keep using it even if a
//! newer generation is published mid-query, so a query never sees a corpus
//! from one generation paired with an index from another.

use std::sync::{Arc, RwLock};

use crate::error::{CoreError, Result};
use crate::index::VectorIndex;
use crate::models::ChunkRecord;

/// One ingestion generation: the corpus and its aligned index.
pub struct Snapshot {
    generation: u64,
    corpus: Vec<ChunkRecord>,
    index: Box<dyn VectorIndex>,
}

impl Snapshot {
    /// Pair a corpus with its index.
    ///
    /// Fails with [`CoreError::IndexCorrupt`] when the index does not hold
    /// exactly one vector per record.
    pub fn new(corpus: Vec<ChunkRecord>, index: Box<dyn VectorIndex>) -> Result<Self> {
        if corpus.len() != index.len() {
            return Err(CoreError::IndexCorrupt(format!(
                "corpus has {} records but index has {} vectors",
                corpus.len(),
                index.len()
            )));
        }
        Ok(Self {
            generation: 0,
            corpus,
            index,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn corpus(&self) -> &[ChunkRecord] {
        &self.corpus
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("generation", &self.generation)
            .field("records", &self.corpus.len())
            .field("dims", &self.index.dims())
            .finish()
    }
}

/// Holder of the current snapshot.
///
/// Readers take the lock only long enough to clone an `Arc`; the write
/// lock is held only for the pointer swap.
#[derive(Default)]
pub struct SnapshotHandle {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot, or `None` before the first publish.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The current snapshot, or [`CoreError::NotReady`].
    pub fn ready(&self) -> Result<Arc<Snapshot>> {
        self.current()
            .filter(|s| !s.is_empty())
            .ok_or(CoreError::NotReady)
    }

    /// Replace the current snapshot, assigning it the next generation number.
    ///
    /// Returns the generation assigned.
    pub fn publish(&self, mut snapshot: Snapshot) -> u64 {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let generation = guard.as_ref().map_or(1, |s| s.generation + 1);
        snapshot.generation = generation;
        *guard = Some(Arc::new(snapshot));
        tracing::info!(generation, "published index snapshot");
        generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FlatIndex;

    fn record(path: &str) -> ChunkRecord {
        ChunkRecord {
            repo: "r".to_string(),
            path: path.to_string(),
            lang: "rust".to_string(),
            start_line: 1,
            end_line: 2,
            text: "x".to_string(),
            hash: "0000000000000000".to_string(),
            preview: "x".to_string(),
        }
    }

    fn snapshot(paths: &[&str]) -> Snapshot {
        let vectors = paths.iter().map(|_| vec![1.0, 0.0]).collect();
        let index = FlatIndex::build(2, vectors).unwrap();
        Snapshot::new(paths.iter().map(|p| record(p)).collect(), Box::new(index)).unwrap()
    }

    #[test]
    fn test_rejects_misaligned_pair() {
        let index = FlatIndex::build(2, vec![vec![1.0, 0.0]]).unwrap();
        let err = Snapshot::new(vec![record("a"), record("b")], Box::new(index)).unwrap_err();
        assert!(matches!(err, CoreError::IndexCorrupt(_)));
    }

    #[test]
    fn test_not_ready_until_published() {
        let handle = SnapshotHandle::new();
        assert!(handle.current().is_none());
        assert!(matches!(handle.ready(), Err(CoreError::NotReady)));

        handle.publish(snapshot(&[]));
        assert!(matches!(handle.ready(), Err(CoreError::NotReady)));

        handle.publish(snapshot(&["a"]));
        assert_eq!(handle.ready().unwrap().len(), 1);
    }

    #[test]
    fn test_inflight_reader_keeps_old_generation() {
        let handle = SnapshotHandle::new();
        assert_eq!(handle.publish(snapshot(&["old"])), 1);
        let held = handle.current().unwrap();

        assert_eq!(handle.publish(snapshot(&["new1", "new2"])), 2);

        assert_eq!(held.generation(), 1);
        assert_eq!(held.corpus()[0].path, "old");
        assert_eq!(held.index().len(), 1);

        let fresh = handle.current().unwrap();
        assert_eq!(fresh.generation(), 2);
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh.index().len(), 2);
    }
}
