//! # CodePilot Core
//!
//! Pure indexing and retrieval logic for CodePilot: line windowing,
//! content-hash deduplication, corpus assembly, the vector index
//! abstraction, atomic snapshots, and the retrieve-then-rerank pipeline.
//!
//! This crate performs no filesystem traversal and no network I/O. File
//! reading, language detection, and embedding are supplied by the caller
//! through the [`ingest::FileReader`], [`ingest::LanguageDetector`], and
//! [`embedding::EmbeddingProvider`] traits.

pub mod corpus;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod models;
pub mod search;
pub mod snapshot;
pub mod window;

pub use error::{CoreError, ReadError, Result};
