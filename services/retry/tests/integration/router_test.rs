use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use uuid::Uuid;

use dunning_retry::domain::port::NotifierRegistry;
use dunning_retry::infra::calendar::HolidayCalendar;
use dunning_retry::infra::payment::HttpPaymentGateway;
use dunning_retry::router::build_router;
use dunning_retry::state::AppState;
use dunning_testing::fixture::{rejection_payload, retry_policy_payload};
use dunning_testing::tenant::MockTenant;

use crate::helpers::{rejected_at, window};

/// Router over a database that is never reachable: only requests rejected
/// before any storage access can succeed.
fn server() -> TestServer {
    let state = AppState {
        db: DatabaseConnection::Disconnected,
        gateway: HttpPaymentGateway::new("http://payments.invalid", Duration::from_secs(1))
            .unwrap(),
        notifiers: NotifierRegistry::new(),
        calendar: Arc::new(HolidayCalendar::new(true)),
        window: window(),
        payment_timeout: Duration::from_secs(1),
        notifier_timeout: Duration::from_secs(1),
        reminder_batch_size: 10,
    };
    TestServer::new(build_router(state)).unwrap()
}

// ── Health ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_report_liveness() {
    let response = server().get("/healthz").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn should_report_not_ready_without_database() {
    let response = server().get("/readyz").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

// ── Tenant headers ───────────────────────────────────────────────────────────

#[tokio::test]
async fn should_reject_requests_without_tenant() {
    let server = server();

    for path in ["/retry-schedules", "/retry-policies", "/reminders", "/audit-logs"] {
        let response = server.get(path).await;
        assert_eq!(
            response.status_code(),
            StatusCode::UNAUTHORIZED,
            "{path} served without tenant"
        );
    }
}

#[tokio::test]
async fn should_reject_rejection_without_tenant() {
    let org = Uuid::now_v7();
    let response = server()
        .post("/rejections")
        .json(&rejection_payload(org, "AM04", rejected_at()))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_reject_malformed_query() {
    let tenant = MockTenant::random();
    let (name, value) = tenant.organisation_header();

    let response = server()
        .get("/retry-schedules")
        .add_query_param("per-page", "lots")
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["kind"], "VALIDATION");
}

#[tokio::test]
async fn should_reject_unknown_eligibility_filter() {
    let tenant = MockTenant::random();
    let (name, value) = tenant.organisation_header();

    let response = server()
        .get("/retry-schedules")
        .add_query_param("eligibility", "MAYBE")
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_unknown_opt_out_channel() {
    let tenant = MockTenant::random();
    let (name, value) = tenant.organisation_header();

    let response = server()
        .put(&format!("/opt-outs/{}/carrier-pigeon", Uuid::now_v7()))
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_rejection_for_other_organisation() {
    let tenant = MockTenant::random();
    let (name, value) = tenant.organisation_header();

    let response = server()
        .post("/rejections")
        .add_header(name, value)
        .json(&rejection_payload(Uuid::now_v7(), "AM04", rejected_at()))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_invalid_metrics_range() {
    let tenant = MockTenant::random();
    let (name, value) = tenant.organisation_header();

    let response = server()
        .get("/metrics/retry")
        .add_query_param("from", "2026-03-10T00:00:00Z")
        .add_query_param("to", "2026-03-01T00:00:00Z")
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_delivery_callback_without_message_id() {
    let response = server()
        .post("/webhooks/delivery-status")
        .json(&serde_json::json!({
            "providerMessageId": "  ",
            "status": "delivered",
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_policy_body_with_unknown_backoff() {
    let tenant = MockTenant::random();
    let (name, value) = tenant.organisation_header();
    let mut body = retry_policy_payload("broken");
    body["backoffStrategy"] = Value::from("RANDOM");

    let response = server()
        .post("/retry-policies")
        .add_header(name, value)
        .json(&body)
        .await;

    assert!(response.status_code().is_client_error());
}
