//! Ingestion and query orchestration over the current index snapshot.
//!
//! The [`Engine`] owns the embedding provider handle and the
//! [`SnapshotHandle`]. Ingestion builds a complete new `(corpus, index)`
//! pair off to the side, persists it, and only then publishes it; queries
//! always run against one published snapshot.
//!
//! Calls into the embedding provider and the index are bounded by
//! `embedding.timeout_secs` and `retrieval.search_timeout_secs`. Index
//! search runs on the blocking pool so the deadline can fire while it is
//! still scoring. Nothing is retried.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use codepilot_core::embedding::EmbeddingProvider;
use codepilot_core::index::{FlatIndex, VectorIndex};
use codepilot_core::ingest::{self, ChunkingParams, IngestOutput};
use codepilot_core::models::{ChunkRecord, IngestStats, SearchHit};
use codepilot_core::search::{self, SearchRequest};
use codepilot_core::snapshot::{Snapshot, SnapshotHandle};
use codepilot_core::{CoreError, Result};

use crate::config::{Config, DiscoveryConfig};
use crate::discovery::discover_files;
use crate::embedding::create_provider;
use crate::lang::ExtensionDetector;
use crate::reader::FsReader;
use crate::remote::{self, Checkout};
use crate::storage;

/// One ingestion request. Unset fields fall back to the config.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub repo_path: PathBuf,
    pub chunking: Option<ChunkingParams>,
    pub include_exts: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
    pub parallel: Option<bool>,
}

/// Result of a completed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub repo: String,
    #[serde(flatten)]
    pub stats: IngestStats,
    pub generation: u64,
    pub duration_seconds: f64,
}

/// Query options. Unset fields fall back to the config.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub k: Option<usize>,
    pub path_contains: Option<String>,
    pub lang: Option<String>,
    pub lexical_boost: Option<bool>,
}

/// Ranked results for one query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub k: usize,
    pub total_results: usize,
    pub latency_ms: f64,
    pub results: Vec<SearchHit>,
}

/// Current index state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub indexed: bool,
    pub chunks: usize,
    pub generation: u64,
    pub dims: usize,
    pub model: String,
    pub index_dir: String,
    pub last_ingest: Option<DateTime<Utc>>,
}

pub struct Engine {
    config: Config,
    provider: Arc<dyn EmbeddingProvider>,
    snapshots: SnapshotHandle,
    last_ingest: RwLock<Option<DateTime<Utc>>>,
    ingest_lock: tokio::sync::Mutex<()>,
}

impl Engine {
    pub fn new(config: Config, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            config,
            provider,
            snapshots: SnapshotHandle::new(),
            last_ingest: RwLock::new(None),
            ingest_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Build an engine with the provider named in `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let provider = create_provider(&config.embedding)?;
        Ok(Self::new(config, provider))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Publish the index saved under `index.dir`, if there is one.
    ///
    /// Returns `Ok(false)` when nothing has been saved yet. A blob that
    /// fails to decode, or whose dimensionality differs from the current
    /// provider, is an error and leaves the engine not ready.
    pub fn load_from_disk(&self) -> Result<bool> {
        let Some((corpus, index)) = storage::load(&self.config.index.dir)? else {
            return Ok(false);
        };
        if index.dims() != self.provider.dims() {
            return Err(CoreError::DimensionMismatch {
                expected: self.provider.dims(),
                actual: index.dims(),
            });
        }
        let chunks = corpus.len();
        let generation = self
            .snapshots
            .publish(Snapshot::new(corpus, Box::new(index))?);
        let saved_at = std::fs::metadata(self.config.chunks_path())
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        self.set_last_ingest(saved_at);
        tracing::info!(
            dir = %self.config.index.dir.display(),
            chunks,
            generation,
            "loaded index from disk"
        );
        Ok(true)
    }

    /// Discover, chunk, embed, index, persist, then publish.
    ///
    /// Only one ingestion runs at a time. The previous snapshot stays
    /// queryable until the new one is published.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;
        let started = Instant::now();

        let params = request
            .chunking
            .unwrap_or_else(|| self.config.chunking.params());
        codepilot_core::window::stride(params.window, params.overlap)?;

        let discovery = DiscoveryConfig {
            include_exts: request
                .include_exts
                .unwrap_or_else(|| self.config.discovery.include_exts.clone()),
            exclude_dirs: request
                .exclude_dirs
                .unwrap_or_else(|| self.config.discovery.exclude_dirs.clone()),
            ..self.config.discovery.clone()
        };
        let parallel = request.parallel.unwrap_or(discovery.parallel);

        let source = request.repo_path;
        tracing::info!(source = %source.display(), parallel, "starting ingestion");

        let (repo, output) = tokio::task::spawn_blocking(move || {
            let checkout = checkout_remote(&source)?;
            let root = checkout.as_ref().map_or(source.as_path(), |c| c.path());
            let repo = repo_name(root);
            let output = chunk_repository(root, &repo, &discovery, &params, parallel)?;
            Ok::<_, CoreError>((repo, output))
        })
        .await
        .map_err(|e| CoreError::Io(std::io::Error::other(e)))??;

        let IngestOutput { corpus, stats } = output;
        if corpus.is_empty() {
            return Err(CoreError::InvalidArgument(
                "no chunks were produced; check the path and file filters".to_string(),
            ));
        }

        let vectors = self.embed_corpus(&corpus).await?;
        let index = FlatIndex::build(self.provider.dims(), vectors)?;

        storage::save(&self.config.index.dir, &corpus, &index)?;

        let generation = self.snapshots.publish(Snapshot::new(corpus, Box::new(index))?);
        self.set_last_ingest(Some(Utc::now()));

        let duration_seconds = started.elapsed().as_secs_f64();
        tracing::info!(
            %repo,
            chunks = stats.chunks_total,
            generation,
            duration_seconds,
            "ingestion complete"
        );

        Ok(IngestReport {
            repo,
            stats,
            generation,
            duration_seconds,
        })
    }

    async fn embed_corpus(&self, corpus: &[ChunkRecord]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.embedding.batch_size.max(1);
        let texts: Vec<String> = corpus.iter().map(|r| r.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(batch_size).enumerate() {
            let embedded = self
                .bounded(
                    "embedding",
                    self.embed_timeout(),
                    self.provider.embed_batch(batch),
                )
                .await?;
            if embedded.len() != batch.len() {
                return Err(CoreError::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
            tracing::debug!(
                batch = i + 1,
                embedded = vectors.len(),
                total = texts.len(),
                "embedded batch"
            );
        }
        Ok(vectors)
    }

    /// Embed `query` and run retrieval against the current snapshot.
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let started = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::InvalidArgument("query must not be empty".to_string()));
        }

        let k = options.k.unwrap_or(self.config.retrieval.default_k);
        search::validate_k(k)?;
        let snapshot = self.snapshots.ready()?;

        let query_vec = self
            .bounded("query embedding", self.embed_timeout(), self.provider.embed(query))
            .await?;

        let request = SearchRequest {
            query: query.to_string(),
            k,
            path_contains: options.path_contains.filter(|s| !s.is_empty()),
            lang: options.lang.filter(|s| !s.is_empty()),
            lexical_boost: options
                .lexical_boost
                .unwrap_or(self.config.retrieval.lexical_boost),
        };
        let params = self.config.retrieval.params();
        let runtime = tokio::runtime::Handle::current();
        let scoring = tokio::task::spawn_blocking(move || {
            runtime.block_on(search::retrieve(&snapshot, &query_vec, &request, &params))
        });
        let results = self
            .bounded(
                "index search",
                Duration::from_secs(self.config.retrieval.search_timeout_secs),
                async {
                    scoring
                        .await
                        .map_err(|e| CoreError::Io(std::io::Error::other(e)))?
                },
            )
            .await?;

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(
            query,
            k,
            results = results.len(),
            latency_ms,
            "search complete"
        );

        Ok(SearchResponse {
            query: query.to_string(),
            k,
            total_results: results.len(),
            latency_ms,
            results,
        })
    }

    pub fn status(&self) -> StatusReport {
        let current = self.snapshots.current();
        let last_ingest = match self.last_ingest.read() {
            Ok(slot) => *slot,
            Err(poisoned) => *poisoned.into_inner(),
        };
        StatusReport {
            indexed: current.as_ref().is_some_and(|s| !s.is_empty()),
            chunks: current.as_ref().map_or(0, |s| s.len()),
            generation: current.as_ref().map_or(0, |s| s.generation()),
            dims: self.provider.dims(),
            model: self.provider.model_name().to_string(),
            index_dir: self.config.index.dir.display().to_string(),
            last_ingest,
        }
    }

    fn set_last_ingest(&self, at: Option<DateTime<Utc>>) {
        match self.last_ingest.write() {
            Ok(mut slot) => *slot = at,
            Err(poisoned) => *poisoned.into_inner() = at,
        }
    }

    fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.config.embedding.timeout_secs)
    }

    async fn bounded<T, F>(&self, operation: &'static str, after: Duration, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, ?after, "deadline exceeded");
                Err(CoreError::Timeout { operation, after })
            }
        }
    }
}

/// Clone `source` when it is a GitHub URL rather than an existing path.
fn checkout_remote(source: &Path) -> Result<Option<Checkout>> {
    if source.exists() {
        return Ok(None);
    }
    match source.to_str().filter(|s| remote::is_github_url(s)) {
        Some(url) => remote::clone_github_repo(url)
            .map(Some)
            .map_err(|e| CoreError::Io(std::io::Error::other(format!("{:#}", e)))),
        None => Ok(None),
    }
}

fn chunk_repository(
    root: &Path,
    repo: &str,
    discovery: &DiscoveryConfig,
    params: &ChunkingParams,
    parallel: bool,
) -> Result<IngestOutput> {
    let paths =
        discover_files(root, discovery).map_err(|e| CoreError::InvalidArgument(e.to_string()))?;
    let reader = FsReader::new(root, discovery.max_file_bytes);
    let detector = ExtensionDetector;
    if parallel {
        ingest::ingest_parallel(repo, &paths, &reader, &detector, params)
    } else {
        ingest::ingest(repo, &paths, &reader, &detector, params)
    }
}

/// Final component of the ingested root, resolving `.` and `..`.
pub fn repo_name(root: &Path) -> String {
    let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| resolved.display().to_string())
}
