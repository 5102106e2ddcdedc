//! Intake endpoint tests driven through the router without a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use callback_relay::config::ListenerConfig;
use callback_relay::dispatch::CallbackDispatcher;
use callback_relay::http::{AppState, HttpServer};
use callback_relay::lifecycle::Shutdown;

mod common;
use common::RecordingTransport;

fn app(transport: Arc<RecordingTransport>) -> (axum::Router, Arc<Shutdown>) {
    let shutdown = Arc::new(Shutdown::new());
    let state = AppState {
        dispatcher: Arc::new(CallbackDispatcher::new(
            common::credentials(),
            transport,
            common::fast_policy(3),
        )),
        shutdown: shutdown.clone(),
    };
    let config = ListenerConfig {
        max_body_size: 16 * 1024,
        ..ListenerConfig::default()
    };
    (HttpServer::build_router(&config, state), shutdown)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn send_body(token: &str) -> Value {
    json!({
        "url": common::TARGET,
        "encrypted_token": token,
        "payload": common::sample_payload(),
    })
}

#[tokio::test]
async fn test_send_is_accepted_then_delivered() {
    let transport = RecordingTransport::always(200);
    let (app, _shutdown) = app(transport.clone());
    let token = common::credentials().keyring().encrypt("bearer-xyz").unwrap();

    let response = app
        .oneshot(post_json("/callback/send", &send_body(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(response).await, json!({"message": "Accepted"}));

    let calls = transport.wait_for_calls(1, Duration::from_secs(2)).await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, common::TARGET);
    assert_eq!(calls[0].credential, "bearer-xyz");
    assert_eq!(
        calls[0].body["notification_id"],
        "4c1f0e9a-8d2b-4e7f-9a6c-3b5d7e9f1a2c"
    );
    assert_eq!(calls[0].body["reference"], "order-1234");
    assert_eq!(calls[0].body["provider_payload"], json!({"segments": 1}));
}

#[tokio::test]
async fn test_accepted_even_when_delivery_will_fail() {
    let transport = RecordingTransport::always(200);
    let (app, _shutdown) = app(transport.clone());

    let response = app
        .oneshot(post_json("/callback/send", &send_body("garbage-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_legacy_request() {
    let transport = RecordingTransport::always(200);
    let (app, _shutdown) = app(transport.clone());
    let token = common::credentials()
        .legacy()
        .sign("legacy-bearer", Some("tenant-7"))
        .unwrap();

    let mut body = send_body(&token);
    body["legacy"] = json!(true);
    body["salt"] = json!("tenant-7");

    let response = app.oneshot(post_json("/callback/send", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let calls = transport.wait_for_calls(1, Duration::from_secs(2)).await;
    assert_eq!(calls[0].credential, "legacy-bearer");
}

#[tokio::test]
async fn test_invalid_payload_is_rejected() {
    let transport = RecordingTransport::always(200);
    let (app, _shutdown) = app(transport.clone());

    let mut body = send_body("token");
    body["payload"]["notification_id"] = json!("not-a-uuid");

    let response = app.oneshot(post_json("/callback/send", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_naive_timestamp_is_rejected() {
    let (app, _shutdown) = app(RecordingTransport::always(200));

    let mut body = send_body("token");
    body["payload"]["sent_at"] = json!("2024-03-01T10:00:01");

    let response = app.oneshot(post_json("/callback/send", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (app, _shutdown) = app(RecordingTransport::always(200));

    let mut body = send_body("token");
    body["payload"]["provider_payload"] = json!("x".repeat(32 * 1024));

    let response = app.oneshot(post_json("/callback/send", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_refuses_work_after_shutdown() {
    let transport = RecordingTransport::always(200);
    let (app, shutdown) = app(transport.clone());
    shutdown.trigger();

    let token = common::credentials().keyring().encrypt("bearer").unwrap();
    let response = app
        .oneshot(post_json("/callback/send", &send_body(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_health_reports_credentials() {
    let (app, _shutdown) = app(RecordingTransport::always(200));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["keys"], 2);
    assert_eq!(body["legacy_enabled"], true);
}
