//! # HTTP API
//!
//! Builds the axum router that exposes the Hub over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path        | Description                                  |
//! |--------|-------------|----------------------------------------------|
//! | GET    | `/health`   | Liveness probe                               |
//! | GET    | `/status`   | Lifecycle, trie root, item count, snapshot   |
//! | POST   | `/sync`     | Answer one `SyncRequest` with a `SyncResponse` |
//! | POST   | `/messages` | Merge one `Message`                          |

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use hub_protocol::message::Message;
use hub_protocol::sync::{SyncRequest, SyncResponse};
use hub_protocol::{Hub, HubError, HubStatus};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub hub: Arc<Hub>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/sync", post(sync_handler))
        .route("/messages", post(submit_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    /// `running` or `stopped`.
    pub status: String,
    /// Hex-encoded trie root digest.
    pub trie_root: String,
    pub trie_items: usize,
    /// Timestamp prefix of the current snapshot.
    pub snapshot_prefix: String,
    pub syncing: bool,
    /// RFC 3339 time of the response.
    pub timestamp: String,
}

/// Response payload for a merged `POST /messages`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Sync id of the merged message.
    pub sync_id: String,
    /// Kind of every store event the merge caused, in order.
    pub events: Vec<String>,
}

/// Error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub error: String,
}

fn error_response(e: &HubError) -> Response {
    let status = match e {
        HubError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        HubError::NotFound(_) => StatusCode::NOT_FOUND,
        HubError::Conflict(_) | HubError::Duplicate(_) => StatusCode::CONFLICT,
        HubError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let body = ErrorResponse {
        code: e.code(),
        error: e.to_string(),
    };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is alive, whatever the Hub's state.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let sync = state.hub.sync_engine();
    let (trie_root, trie_items) = {
        let trie = sync.trie();
        (hex::encode(trie.root_hash()), trie.items())
    };
    state.metrics.trie_items.set(trie_items as i64);

    Json(StatusResponse {
        version: state.version.clone(),
        status: match state.hub.status() {
            HubStatus::Running => "running".to_string(),
            HubStatus::Stopped => "stopped".to_string(),
        },
        trie_root,
        trie_items,
        snapshot_prefix: String::from_utf8_lossy(&sync.snapshot().prefix).into_owned(),
        syncing: sync.is_syncing(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /sync`: the server side of reconciliation. Failures are carried
/// in-band as `SyncResponse::Error`, so this always answers 200.
async fn sync_handler(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Json<SyncResponse> {
    Json(state.hub.handle_sync_request(request))
}

async fn submit_handler(State(state): State<AppState>, Json(message): Json<Message>) -> Response {
    if state.hub.status() != HubStatus::Running {
        return error_response(&HubError::Unavailable("hub is not running".to_string()));
    }
    match state.hub.submit_message(&message) {
        Ok(events) => {
            state.metrics.messages_submitted_total.inc();
            state
                .metrics
                .trie_items
                .set(state.hub.sync_engine().trie().items() as i64);
            let body = SubmitResponse {
                sync_id: hub_protocol::sync::SyncId::from_message(&message).to_string(),
                events: events.iter().map(|e| e.kind().to_string()).collect(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            tracing::debug!(fid = message.fid(), error = %e, "rejected submitted message");
            state
                .metrics
                .messages_rejected_total
                .with_label_values(&[e.code().as_str()])
                .inc();
            error_response(&e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
