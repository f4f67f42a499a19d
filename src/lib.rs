//! # CodePilot
//!
//! Semantic search over a source code repository.
//!
//! CodePilot splits every source file into overlapping line windows,
//! drops duplicate windows, embeds the rest, and answers natural-language
//! queries by nearest-neighbor search re-ranked with a small lexical boost.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Discovery  │──▶│  Windowing   │──▶│  Embedding  │
//! │  walkdir   │   │ + dedup      │   │  provider   │
//! └────────────┘   └──────────────┘   └──────┬──────┘
//!                                            ▼
//!                  ┌──────────┐       ┌─────────────┐
//!                  │   CLI    │◀──────│  Snapshot   │
//!                  │  / HTTP  │       │ corpus+index│
//!                  └──────────┘       └─────────────┘
//! ```
//!
//! The pure pipeline lives in the `codepilot-core` crate; this crate adds
//! the filesystem, embedding backends, persistence, and the two front ends.
//!
//! ## Quick Start
//!
//! ```bash
//! codepilot ingest ./my-repo
//! codepilot search "where is the jwt verified" -k 5 --lang python
//! codepilot serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`discovery`] | Repository file discovery |
//! | [`reader`] | File reading with size and encoding checks |
//! | [`lang`] | Extension-based language tags |
//! | [`embedding`] | Embedding provider backends |
//! | [`remote`] | GitHub URL sources (temporary shallow clones) |
//! | [`storage`] | `chunks.jsonl` + `index.bin` persistence |
//! | [`engine`] | Ingestion and query orchestration |
//! | [`server`] | HTTP API |
//! | [`logging`] | Tracing setup |

pub mod config;
pub mod discovery;
pub mod embedding;
pub mod engine;
pub mod lang;
pub mod logging;
pub mod reader;
pub mod remote;
pub mod server;
pub mod storage;
