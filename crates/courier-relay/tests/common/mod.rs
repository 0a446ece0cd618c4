//! Shared test helpers for relay integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use courier_core::repository::OutboxRepository;
use courier_outbox_store::PgOutboxRepository;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use courier_relay::bootstrap;
use courier_relay::state::AppState;

/// Build the relay router over a real `PgOutboxRepository`. Uses the same
/// route structure as the binary.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(Arc::new(PgOutboxRepository::new(pool)))
}

/// Build the relay router over any outbox repository.
pub fn build_test_app_with(outbox: Arc<dyn OutboxRepository>) -> Router {
    bootstrap::app(AppState::new(outbox))
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
