//! Integration tests for the health endpoint.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use courier_core::outbox::NewOutboxMessage;
use courier_outbox_store::PgOutboxRepository;
use courier_test_support::{FailingOutboxRepository, FixedClock, InMemoryOutbox};
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_health_returns_200_with_status_ok(pool: PgPool) {
    let app = common::build_test_app(pool);

    let (status, json) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["pending"], 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_health_reports_pending_backlog(pool: PgPool) {
    let clock = FixedClock::default();
    let mut tx = pool.begin().await.unwrap();
    for n in 0..3 {
        let message = NewOutboxMessage::new("users.created", serde_json::json!({ "n": n }), &clock);
        PgOutboxRepository::add(&mut tx, &message).await.unwrap();
    }
    tx.commit().await.unwrap();
    let app = common::build_test_app(pool);

    let (status, json) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pending"], 3);
}

#[tokio::test]
async fn test_health_counts_only_pending_rows() {
    let outbox = InMemoryOutbox::new();
    let clock = FixedClock::default();
    outbox.insert_committed(NewOutboxMessage::new("users.created", serde_json::json!({}), &clock));
    let app = common::build_test_app_with(Arc::new(outbox));

    let (status, json) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pending"], 1);
}

#[tokio::test]
async fn test_health_is_degraded_when_store_is_unreachable() {
    let app = common::build_test_app_with(Arc::new(FailingOutboxRepository));

    let (status, json) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "degraded");
    assert!(json.get("pending").is_none());
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = common::build_test_app_with(Arc::new(InMemoryOutbox::new()));

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/nonexistent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
