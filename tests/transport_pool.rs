//! Transport pool tests against a local HTTP server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use callback_relay::config::TransportConfig;
use callback_relay::crypto::Credential;
use callback_relay::transport::{CallbackTransport, TransportError, TransportPool};

mod common;

fn endpoint(server: &MockServer) -> Url {
    Url::parse(&format!("{}/callback", server.uri())).unwrap()
}

#[tokio::test]
async fn test_post_sends_bearer_and_json() {
    let server = MockServer::start().await;
    let body = json!({"notification_id": "abc", "status": "delivered"});

    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(header("authorization", "Bearer bearer-123"))
        .and(header("content-type", "application/json"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let pool = TransportPool::new(TransportConfig::default());
    assert!(!pool.is_open());

    let status = pool
        .post(&endpoint(&server), &Credential::new("bearer-123"), &body)
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert!(pool.is_open());
}

#[tokio::test]
async fn test_user_agent_from_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("user-agent", "relay-test/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let pool = TransportPool::new(TransportConfig {
        user_agent: "relay-test/1".to_string(),
        ..TransportConfig::default()
    });
    let status = pool
        .post(&endpoint(&server), &Credential::new("t"), &json!({}))
        .await
        .unwrap();
    assert_eq!(status, 204);
}

#[tokio::test]
async fn test_error_statuses_are_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let pool = TransportPool::new(TransportConfig::default());
    let status = pool
        .post(&endpoint(&server), &Credential::new("t"), &json!({}))
        .await
        .unwrap();
    assert_eq!(status, 503);
}

#[tokio::test]
async fn test_temporary_redirect_is_followed() {
    let server = MockServer::start().await;
    let body = json!({"status": "delivered"});
    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(ResponseTemplate::new(307).insert_header("location", "/moved"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/moved"))
        .and(header("authorization", "Bearer t"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let pool = TransportPool::new(TransportConfig::default());
    let status = pool
        .post(&endpoint(&server), &Credential::new("t"), &body)
        .await
        .unwrap();
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_redirect_loop_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(ResponseTemplate::new(308).insert_header("location", "/callback"))
        .mount(&server)
        .await;

    let pool = TransportPool::new(TransportConfig::default());
    let err = pool
        .post(&endpoint(&server), &Credential::new("t"), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Redirect(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let pool = TransportPool::new(TransportConfig {
        request_timeout_secs: 1,
        ..TransportConfig::default()
    });
    let err = pool
        .post(&endpoint(&server), &Credential::new("t"), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_refused_connection_is_retryable() {
    let addr = common::refused_addr().await;
    let url = Url::parse(&format!("http://{addr}/callback")).unwrap();

    let pool = TransportPool::new(TransportConfig::default());
    let err = pool
        .post(&url, &Credential::new("t"), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Connect(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unencodable_credential_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let pool = TransportPool::new(TransportConfig::default());
    let err = pool
        .post(&endpoint(&server), &Credential::new("bad\nvalue"), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Encode(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_close_then_reuse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let pool = TransportPool::new(TransportConfig::default());
    let url = endpoint(&server);

    pool.post(&url, &Credential::new("t"), &json!({})).await.unwrap();
    pool.close();
    assert!(!pool.is_open());

    pool.post(&url, &Credential::new("t"), &json!({})).await.unwrap();
    assert!(pool.is_open());
}

#[tokio::test]
async fn test_per_host_cap_serializes_excess_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let pool = Arc::new(TransportPool::new(TransportConfig {
        max_connections_per_host: 2,
        ..TransportConfig::default()
    }));
    let url = endpoint(&server);

    let started = Instant::now();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let url = url.clone();
            tokio::spawn(async move { pool.post(&url, &Credential::new("t"), &json!({})).await })
        })
        .collect();
    for handle in futures_util::future::join_all(handles).await {
        assert_eq!(handle.unwrap().unwrap(), 200);
    }

    // Four requests through two slots take at least two rounds.
    assert!(started.elapsed() >= Duration::from_millis(390));
    assert_eq!(pool.available_slots(&url), 2);
}

#[tokio::test]
async fn test_each_post_is_a_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(common::FlakyResponder::new(2, 429))
        .expect(3)
        .mount(&server)
        .await;

    let pool = TransportPool::new(TransportConfig::default());
    let url = endpoint(&server);
    let mut statuses = Vec::new();
    for _ in 0..3 {
        statuses.push(pool.post(&url, &Credential::new("t"), &json!({})).await.unwrap());
    }
    assert_eq!(statuses, vec![429, 429, 200]);
}

#[tokio::test]
async fn test_slot_wait_counts_against_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let pool = Arc::new(TransportPool::new(TransportConfig {
        max_connections_per_host: 1,
        request_timeout_secs: 1,
        ..TransportConfig::default()
    }));
    let url = endpoint(&server);

    let started = Instant::now();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let url = url.clone();
            tokio::spawn(async move { pool.post(&url, &Credential::new("t"), &json!({})).await })
        })
        .collect();
    let results: Vec<_> = futures_util::future::join_all(handles)
        .await
        .into_iter()
        .map(|h| h.unwrap())
        .collect();

    let delivered = results.iter().filter(|r| matches!(r, Ok(200))).count();
    let timed_out = results
        .iter()
        .filter(|r| matches!(r, Err(TransportError::Timeout)))
        .count();
    assert_eq!(delivered, 1);
    assert_eq!(timed_out, 3);
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert_eq!(pool.tracked_hosts(), 0);
}
