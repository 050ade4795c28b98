//! Collection and query HTTP server.
//!
//! Exposes the ingestion and read paths as a JSON HTTP API. The server never
//! talks to the search index — ingestion writes the canonical file and the
//! structured record, and the sync watcher picks the file up on its own.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/collect` | Ingest one enveloped transcript |
//! | `GET`  | `/search` | Filtered summaries, newest first |
//! | `GET`  | `/chat/{id}` | Full stored transcript body |
//! | `GET`  | `/health` | Health check |
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code and a message:
//!
//! ```json
//! { "error": { "code": "invalid_payload", "message": "invalid JSON: ..." } }
//! ```
//!
//! Codes: `invalid_payload` (400), `missing_id` (400), `not_found` (404),
//! `storage` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the expected producer is
//! a browser extension posting cross-origin.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::collect;
use crate::config::Config;
use crate::db;
use crate::error::{CollectError, QueryError};
use crate::migrate;
use crate::models::ChatSummary;
use crate::query::{self, SearchFilters, DEFAULT_SEARCH_LIMIT};

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
}

/// Starts the HTTP server on the configured bind address. The schema is
/// created on startup so `serve` works on a fresh data directory. Runs until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/collect", post(handle_collect))
        .route("/search", get(handle_search))
        .route("/chat/{id}", get(handle_get_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    tracing::info!("listening on http://{bind_addr}");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
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

impl From<CollectError> for AppError {
    fn from(err: CollectError) -> Self {
        let (status, code) = match &err {
            CollectError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, "invalid_payload"),
            CollectError::MissingIdentifier => (StatusCode::BAD_REQUEST, "missing_id"),
            CollectError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
        };
        if status.is_server_error() {
            tracing::error!("collect failed: {err:#}");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let (status, code) = match &err {
            QueryError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            QueryError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
        };
        if status.is_server_error() {
            tracing::error!("query failed: {err:#}");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ POST /collect ============

#[derive(Serialize)]
struct CollectResponse {
    status: String,
    message: String,
    json_path: String,
}

/// Handler for `POST /collect`. The body is taken raw so parse failures map
/// to the taxonomy instead of the framework's default rejection.
async fn handle_collect(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<Json<CollectResponse>, AppError> {
    let receipt = collect::ingest(&state.pool, &state.config, &body).await?;

    Ok(Json(CollectResponse {
        status: "success".to_string(),
        message: format!("Data saved with id {}", receipt.id),
        json_path: receipt.json_path.display().to_string(),
    }))
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    query: Option<String>,
    model: Option<String>,
    min_length: Option<i64>,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Serialize)]
struct SearchResponse {
    chats: Vec<ChatSummary>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let filters = SearchFilters {
        query: params.query,
        model: params.model,
        min_length: params.min_length,
        limit: params.limit,
    };

    let chats = query::search_chats(&state.pool, &filters).await?;
    Ok(Json(SearchResponse { chats }))
}

// ============ GET /chat/{id} ============

async fn handle_get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body = query::get_chat(&state.pool, &id).await?;
    Ok(Json(body))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    })
}
