//! # CodePilot CLI (`codepilot`)
//!
//! ## Usage
//!
//! ```bash
//! codepilot --config ./codepilot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codepilot ingest <repo>` | Chunk, embed, and index a repository |
//! | `codepilot search "<query>"` | Search the saved index |
//! | `codepilot status` | Show what is indexed |
//! | `codepilot serve` | Start the HTTP API |
//!
//! Logs go to stderr and are filtered with `CODEPILOT_LOG`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use codepilot::config;
use codepilot::engine::{Engine, IngestRequest, SearchOptions, SearchResponse};
use codepilot::logging;
use codepilot::server;
use codepilot_core::ingest::ChunkingParams;

/// CodePilot: semantic search over a source code repository.
#[derive(Parser)]
#[command(
    name = "codepilot",
    about = "CodePilot: semantic code search over a local repository",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./codepilot.toml`. Built-in defaults are used when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./codepilot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Index a repository.
    ///
    /// Discovers source files, splits them into overlapping line windows,
    /// drops duplicate windows, embeds the rest, and writes
    /// `chunks.jsonl` + `index.bin` to `[index].dir`. Replaces any
    /// previous index.
    Ingest {
        /// Repository root directory, or a GitHub URL to shallow-clone.
        repo: PathBuf,

        /// Lines per window.
        #[arg(long)]
        window: Option<usize>,

        /// Lines shared by consecutive windows.
        #[arg(long)]
        overlap: Option<usize>,

        /// Minimum non-blank lines for a window to be kept.
        #[arg(long)]
        min_lines: Option<usize>,

        /// Read and chunk files on all cores.
        #[arg(long)]
        parallel: bool,
    },

    /// Search the saved index.
    Search {
        /// Natural-language query.
        query: String,

        /// Number of results (1-50).
        #[arg(short, long)]
        k: Option<usize>,

        /// Keep only paths containing this substring (case-insensitive).
        #[arg(long)]
        path: Option<String>,

        /// Keep only this language (e.g. `python`).
        #[arg(long)]
        lang: Option<String>,

        /// Rank by vector similarity only.
        #[arg(long)]
        no_boost: bool,

        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show index status.
    Status,

    /// Start the HTTP API.
    ///
    /// Loads the saved index, if any, and binds to `[server].bind`.
    Serve {
        /// Override the bind address.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing("info");

    let mut cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            repo,
            window,
            overlap,
            min_lines,
            parallel,
        } => {
            let defaults = cfg.chunking.params();
            let chunking = ChunkingParams {
                window: window.unwrap_or(defaults.window),
                overlap: overlap.unwrap_or(defaults.overlap),
                min_lines: min_lines.unwrap_or(defaults.min_lines),
                preview_lines: defaults.preview_lines,
            };
            let engine = Engine::from_config(cfg)?;
            let report = engine
                .ingest(IngestRequest {
                    repo_path: repo.clone(),
                    chunking: Some(chunking),
                    parallel: parallel.then_some(true),
                    ..IngestRequest::default()
                })
                .await
                .with_context(|| format!("Ingestion of {} failed", repo.display()))?;

            let stats = &report.stats;
            println!("Ingested {} (generation {})", report.repo, report.generation);
            println!("  files scanned:   {}", stats.files_scanned);
            println!("  files read:      {}", stats.files_read);
            println!("  files skipped:   {}", stats.files_skipped);
            println!("  total lines:     {}", stats.total_lines);
            println!("  chunks:          {}", stats.chunks_total);
            println!("  avg lines/chunk: {:.1}", stats.avg_lines_per_chunk);
            println!("  took:            {:.2}s", report.duration_seconds);
        }
        Commands::Search {
            query,
            k,
            path,
            lang,
            no_boost,
            json,
        } => {
            let engine = Engine::from_config(cfg)?;
            engine
                .load_from_disk()
                .context("Failed to load saved index")?;
            let response = engine
                .search(
                    &query,
                    SearchOptions {
                        k,
                        path_contains: path,
                        lang,
                        lexical_boost: no_boost.then_some(false),
                    },
                )
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_results(&response);
            }
        }
        Commands::Status => {
            let engine = Engine::from_config(cfg)?;
            if let Err(e) = engine.load_from_disk() {
                tracing::warn!(error = %e, "saved index could not be loaded");
            }
            let status = engine.status();
            println!("indexed:    {}", status.indexed);
            println!("chunks:     {}", status.chunks);
            println!("model:      {} ({} dims)", status.model, status.dims);
            println!("index dir:  {}", status.index_dir);
            match status.last_ingest {
                Some(at) => println!("last ingest: {}", at.to_rfc3339()),
                None => println!("last ingest: never"),
            }
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            let engine = Arc::new(Engine::from_config(cfg)?);
            match engine.load_from_disk() {
                Ok(true) => {}
                Ok(false) => tracing::info!("no saved index; POST /ingest to build one"),
                Err(e) => tracing::warn!(error = %e, "saved index could not be loaded"),
            }
            server::run_server(engine).await?;
        }
    }

    Ok(())
}

fn print_results(response: &SearchResponse) {
    if response.results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, hit) in response.results.iter().enumerate() {
        println!(
            "{}. {}:{}-{} [{}] score={:.4}",
            i + 1,
            hit.path,
            hit.start_line,
            hit.end_line,
            hit.lang,
            hit.score
        );
        for line in hit.preview.lines().take(3) {
            println!("     {}", line);
        }
    }
    println!(
        "\n{} result(s) in {:.1} ms",
        response.total_results, response.latency_ms
    );
}
