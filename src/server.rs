//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner and endpoint list |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/status` | Index state: chunk count, generation, model |
//! | `GET`  | `/search?q=&k=&path_contains=&lang=&boost=` | Ranked search |
//! | `POST` | `/ingest` | Ingest a repository and publish a new index |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "index not ready: run ingestion first" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_ready` (503), `timeout` (504),
//! `embedding_error` (502), `index_corrupt` (500), `internal` (500).
//! Malformed query strings and JSON bodies use the same envelope.
//!
//! # Response headers
//!
//! Every response carries `X-Process-Time`: seconds spent handling the
//! request, four decimal places.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use codepilot_core::CoreError;

use crate::engine::{Engine, IngestReport, IngestRequest, SearchOptions, SearchResponse, StatusReport};

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(engine: Arc<Engine>) -> anyhow::Result<()> {
    let bind_addr = engine.config().server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    axum::serve(listener, router(engine)).await?;
    Ok(())
}

/// Build the application router over a shared engine.
pub fn router(engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/search", get(handle_search))
        .route("/ingest", post(handle_ingest))
        .layer(cors)
        .layer(middleware::from_fn(process_time))
        .with_state(engine)
}

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

async fn process_time(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = format!("{:.4}", started.elapsed().as_secs_f64());
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    response
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_ready"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let (status, code) = match &err {
            CoreError::InvalidArgument(_)
            | CoreError::Config(_)
            | CoreError::DimensionMismatch { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            CoreError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
            CoreError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            CoreError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            CoreError::IndexCorrupt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index_corrupt"),
            CoreError::Io(_) | CoreError::Json(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: rejection.body_text(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: rejection.body_text(),
        }
    }
}

// ============ GET / ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "codepilot",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/status", "/search", "/ingest"],
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /status ============

async fn handle_status(State(engine): State<Arc<Engine>>) -> Json<StatusReport> {
    Json(engine.status())
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    k: Option<usize>,
    path_contains: Option<String>,
    lang: Option<String>,
    boost: Option<bool>,
}

async fn handle_search(
    State(engine): State<Arc<Engine>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(params) = params?;
    let options = SearchOptions {
        k: params.k,
        path_contains: params.path_contains,
        lang: params.lang,
        lexical_boost: params.boost,
    };
    Ok(Json(engine.search(&params.q, options).await?))
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestBody {
    repo_path: PathBuf,
    include_exts: Option<Vec<String>>,
    exclude_dirs: Option<Vec<String>>,
    window: Option<usize>,
    overlap: Option<usize>,
    min_lines: Option<usize>,
    parallel: Option<bool>,
}

async fn handle_ingest(
    State(engine): State<Arc<Engine>>,
    body: Result<Json<IngestBody>, JsonRejection>,
) -> Result<Json<IngestReport>, AppError> {
    let Json(body) = body?;
    let defaults = engine.config().chunking.params();
    let mut chunking = defaults;
    chunking.window = body.window.unwrap_or(defaults.window);
    chunking.overlap = body.overlap.unwrap_or(defaults.overlap);
    chunking.min_lines = body.min_lines.unwrap_or(defaults.min_lines);

    let request = IngestRequest {
        repo_path: body.repo_path,
        chunking: Some(chunking),
        include_exts: body.include_exts,
        exclude_dirs: body.exclude_dirs,
        parallel: body.parallel,
    };
    Ok(Json(engine.ingest(request).await?))
}
