//! HTTP endpoints for request processing, health and metrics.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::desk::DeskService;
use crate::intake::{self, InboundRequest};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<DeskService>,
}

/// Build the Axum router.
pub fn routes(desk: Arc<DeskService>) -> Router {
    let state = AppState { desk };

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/process", post(process))
        .route("/api/process/raw", post(process_raw))
        .route("/api/reload", post(reload))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health & metrics ────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = state.desk.policy().current();
    Json(serde_json::json!({
        "status": "ok",
        "service": "sales-desk",
        "version": env!("CARGO_PKG_VERSION"),
        "artifacts": pipeline.catalog().len(),
        "detector": pipeline.detector_name(),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.desk.metrics().summary())
}

// ── Processing ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProcessBody {
    from_email: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: String,
}

async fn process(State(state): State<AppState>, Json(req): Json<ProcessBody>) -> impl IntoResponse {
    if req.from_email.trim().is_empty() {
        state.desk.metrics().record_error();
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "from_email is required"})),
        );
    }

    let inbound = InboundRequest::new(&req.from_email, req.subject, req.body);
    let record = state.desk.handle(&inbound).await;
    (StatusCode::OK, Json(serde_json::json!(record)))
}

async fn process_raw(State(state): State<AppState>, raw: Bytes) -> impl IntoResponse {
    let inbound = match intake::parse_raw(&raw) {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, "Rejected raw message");
            state.desk.metrics().record_error();
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e.to_string()})),
            );
        }
    };

    let record = state.desk.handle(&inbound).await;
    (StatusCode::OK, Json(serde_json::json!(record)))
}

// ── Reload ──────────────────────────────────────────────────────────────

async fn reload(State(state): State<AppState>) -> impl IntoResponse {
    match state.desk.reload() {
        Ok(()) => {
            info!("Policy reloaded via API");
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "reloaded"})),
            )
        }
        Err(e) => {
            warn!(error = %e, "Policy reload failed, keeping previous policy");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}
