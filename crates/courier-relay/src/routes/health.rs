//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the outbox cannot be queried.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Rows waiting to be dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<i64>,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let version = env!("CARGO_PKG_VERSION").to_string();
    match state.outbox.pending_count().await {
        Ok(pending) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                version,
                pending: Some(pending),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not query the outbox");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                    version,
                    pending: None,
                }),
            )
        }
    }
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
