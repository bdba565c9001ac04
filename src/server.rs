//! HTTP server.
//!
//! Exposes the chat and sync surfaces to the outside world and runs the
//! periodic fallback sync.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer a visitor question |
//! | `POST` | `/api/webhooks/sheet-update` | Sheet-edit webhook; kicks a background sync |
//! | `POST` | `/api/admin/reindex` | Forced full reindex (manual recovery) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! The webhook and admin endpoints check a shared secret from the
//! `SHEETS_WEBHOOK_SECRET` environment variable and return 401 on mismatch.
//! The webhook replies immediately and runs the sync in the background so
//! the caller never times out; a trigger arriving while a sync is already
//! in flight is coalesced away by the indexer's lock.
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code and a human-readable
//! message:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the chat widget can
//! be embedded on any page.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::chat::ChatEngine;
use crate::config::Config;
use crate::indexer::Indexer;
use crate::models::{ChatResponse, SyncOutcome};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    chat: Arc<ChatEngine>,
    indexer: Arc<Indexer>,
    webhook_secret: Option<String>,
}

/// Start the HTTP server and the periodic fallback sync task.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(
    config: &Config,
    indexer: Arc<Indexer>,
    chat: Arc<ChatEngine>,
) -> anyhow::Result<()> {
    let state = AppState {
        chat,
        indexer: indexer.clone(),
        webhook_secret: std::env::var("SHEETS_WEBHOOK_SECRET").ok(),
    };

    if state.webhook_secret.is_none() {
        warn!("SHEETS_WEBHOOK_SECRET not set; webhook and admin endpoints will reject all calls");
    }

    spawn_periodic_sync(indexer, config.sync.interval_secs);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/webhooks/sheet-update", post(handle_sheet_webhook))
        .route("/api/admin/reindex", post(handle_reindex))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    info!(bind = %bind_addr, "server listening");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodic fallback sync: catches sheet edits whose webhook never arrived.
/// Funnels through the same indexer lock as webhook triggers. An interval
/// of 0 disables the task.
fn spawn_periodic_sync(indexer: Arc<Indexer>, interval_secs: u64) {
    if interval_secs == 0 {
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.tick().await; // consume the immediate first tick
        loop {
            interval.tick().await;
            match indexer.sync(false).await {
                Ok(SyncOutcome::Completed(report)) => {
                    info!(
                        added = report.added,
                        changed = report.changed,
                        removed = report.removed,
                        "periodic sync complete"
                    );
                }
                Ok(SyncOutcome::Skipped) => {
                    info!("periodic sync skipped, another sync in flight");
                }
                Err(err) => {
                    error!(error = %format!("{:#}", err), "periodic sync failed");
                }
            }
        }
    });
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

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn sync_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "sync_error".to_string(),
        message: message.into(),
    }
}

fn check_secret(state: &AppState, provided: &str) -> Result<(), AppError> {
    match &state.webhook_secret {
        Some(expected) if expected == provided => Ok(()),
        Some(_) => Err(unauthorized("invalid webhook secret")),
        None => Err(unauthorized("webhook secret not configured")),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let response = state.chat.chat(&request.query, request.session_id).await;
    Ok(Json(response))
}

// ============ POST /api/webhooks/sheet-update ============

#[derive(Deserialize)]
struct WebhookPayload {
    secret: String,
    #[serde(default)]
    #[allow(dead_code)]
    spreadsheet_id: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    timestamp: Option<String>,
}

/// Receives the sheet-edit webhook, validates the shared secret, and kicks
/// a sync in the background. Returns 200 immediately so the webhook sender
/// never times out.
async fn handle_sheet_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_secret(&state, &payload.secret)?;

    info!("sheet update webhook received, triggering sync");
    let indexer = state.indexer.clone();
    tokio::spawn(async move {
        match indexer.sync(false).await {
            Ok(SyncOutcome::Completed(report)) => {
                info!(
                    added = report.added,
                    changed = report.changed,
                    removed = report.removed,
                    "webhook sync complete"
                );
            }
            Ok(SyncOutcome::Skipped) => {
                info!("webhook sync skipped, another sync in flight");
            }
            Err(err) => {
                error!(error = %format!("{:#}", err), "webhook sync failed");
            }
        }
    });

    Ok(Json(serde_json::json!({ "status": "accepted" })))
}

// ============ POST /api/admin/reindex ============

#[derive(Deserialize)]
struct ReindexRequest {
    secret: String,
}

/// Forced full reindex for manual recovery. Runs inline and returns the
/// sync report; a concurrent sync results in a skipped status.
async fn handle_reindex(
    State(state): State<AppState>,
    Json(request): Json<ReindexRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_secret(&state, &request.secret)?;

    info!("manual reindex requested");
    match state.indexer.sync(true).await {
        Ok(SyncOutcome::Completed(report)) => Ok(Json(serde_json::json!({
            "status": "ok",
            "report": report,
        }))),
        Ok(SyncOutcome::Skipped) => Ok(Json(serde_json::json!({ "status": "skipped" }))),
        Err(err) => Err(sync_error(format!("{:#}", err))),
    }
}
