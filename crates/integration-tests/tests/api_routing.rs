//! Router tests that never reach the database.
//!
//! The pool connects lazily, so every request here must be answered by
//! routing, extractors or signature checks alone.

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use nexora_core::{Role, UserId};
use nexora_integration_tests::{test_config, test_state};
use nexora_storefront::services::auth::Claims;
use nexora_storefront::state::AppState;

fn lazy_state() -> AppState {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://postgres@localhost/nexora_unused")
        .unwrap();
    test_state(pool, test_config(&[]))
}

fn token_for(state: &AppState, role: Role) -> String {
    let now = chrono::Utc::now().timestamp();
    let token = state
        .tokens()
        .sign(&Claims {
            sub: UserId::generate(),
            email: "tester@example.com".to_owned(),
            role,
            iat: now,
            exp: now + 3600,
        })
        .unwrap();
    format!("Bearer {token}")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn app(state: AppState) -> Router {
    nexora_storefront::app(state)
}

#[tokio::test]
async fn test_health_is_ok_without_database() {
    let response = app(lazy_state())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = app(lazy_state())
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "req-abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-abc-123");
}

#[tokio::test]
async fn test_me_requires_token() {
    let response = app(lazy_state())
        .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let response = app(lazy_state())
        .oneshot(
            Request::get("/api/orders")
                .header(header::AUTHORIZATION, "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_customers() {
    let state = lazy_state();
    let token = token_for(&state, Role::Customer);

    let response = app(state)
        .oneshot(
            Request::get("/api/admin/dashboard")
                .header(header::AUTHORIZATION, token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let other = test_state(
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/nexora_unused")
            .unwrap(),
        test_config(&[("JWT_SECRET", "Zq8#Lm2!Vx6@Rt1$Kp9&Hn4*Wc7^Jb3%")]),
    );
    let token = token_for(&other, Role::Admin);

    let response = app(lazy_state())
        .oneshot(
            Request::get("/api/admin/dashboard")
                .header(header::AUTHORIZATION, token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_payment_config_is_public() {
    let response = app(lazy_state())
        .oneshot(
            Request::get("/api/payments/config")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["client_key"], "SB-Mid-client-test");
    assert_eq!(body["is_production"], false);
}

#[tokio::test]
async fn test_notification_with_bad_signature_is_forbidden() {
    let notification = json!({
        "order_id": "NEXORA-1a2b3c4d-1700000000",
        "status_code": "200",
        "gross_amount": "150000.00",
        "signature_key": "deadbeef",
        "transaction_status": "settlement",
    });

    let response = app(lazy_state())
        .oneshot(
            Request::post("/api/payments/notification")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(notification.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_google_sign_in_unconfigured() {
    let response = app(lazy_state())
        .oneshot(
            Request::get("/api/auth/google")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = app(lazy_state())
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
