//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;
use wiremock::{Request, Respond, ResponseTemplate};

use callback_relay::crypto::{Credential, Credentials, KeyRing, LegacyVerifier};
use callback_relay::resilience::{Backoff, RetryPolicy};
use callback_relay::transport::{CallbackTransport, TransportResult};

pub const KEY_A: &str = "YXNkZmFzZGZhc2RmYXNkZmFzZGZhc2RmYXNkZmFzZGY=";
pub const KEY_B: &str = "Nzc3Nzc3Nzc3Nzc3Nzc3Nzc3Nzc3Nzc3Nzc3Nzc3Nzc=";
pub const LEGACY_SECRET: &str = "legacy-signing-secret";
pub const TARGET: &str = "https://hooks.example.com/callback";

/// Credentials with `[KEY_A, KEY_B]` and an active legacy verifier.
pub fn credentials() -> Arc<Credentials> {
    Arc::new(Credentials::new(
        KeyRing::from_keys(&[KEY_A, KEY_B]).unwrap(),
        LegacyVerifier::from_secret(LEGACY_SECRET, None).unwrap(),
    ))
}

/// Retry policy with millisecond delays so real-time tests stay fast.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Backoff::new(0.001, 2.0, Duration::ZERO, Duration::from_millis(20)),
    )
}

/// A valid notification status payload.
pub fn sample_payload() -> Value {
    json!({
        "notification_id": "4c1f0e9a-8d2b-4e7f-9a6c-3b5d7e9f1a2c",
        "reference": "order-1234",
        "to": "+15555550100",
        "status": "delivered",
        "created_at": "2024-03-01T10:00:00+00:00",
        "completed_at": "2024-03-01T10:00:05+00:00",
        "sent_at": "2024-03-01T10:00:01+00:00",
        "notification_type": "sms",
        "status_reason": null,
        "provider": "example-sms",
        "provider_payload": {"segments": 1}
    })
}

/// One POST seen by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub credential: String,
    pub body: Value,
}

/// In-memory transport that answers from a script and records every call.
pub struct RecordingTransport {
    script: Mutex<VecDeque<TransportResult<u16>>>,
    fallback: TransportResult<u16>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingTransport {
    pub fn new(script: Vec<TransportResult<u16>>, fallback: TransportResult<u16>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always(status: u16) -> Arc<Self> {
        Self::new(vec![], Ok(status))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Poll until `count` calls were recorded or `timeout` passes.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> Vec<RecordedCall> {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.calls.lock().unwrap().len() < count && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.calls()
    }
}

#[async_trait]
impl CallbackTransport for RecordingTransport {
    async fn post(&self, url: &Url, credential: &Credential, body: &Value) -> TransportResult<u16> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            credential: credential.expose().to_string(),
            body: body.clone(),
        });
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Responds with `failure` for the first `failures` requests, then 200.
pub struct FlakyResponder {
    failures: usize,
    failure: u16,
    seen: AtomicUsize,
}

impl FlakyResponder {
    pub fn new(failures: usize, failure: u16) -> Self {
        Self {
            failures,
            failure,
            seen: AtomicUsize::new(0),
        }
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        if self.seen.fetch_add(1, Ordering::SeqCst) < self.failures {
            ResponseTemplate::new(self.failure)
        } else {
            ResponseTemplate::new(200)
        }
    }
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
