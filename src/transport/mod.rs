//! Outbound transport subsystem.
//!
//! # Data Flow
//! ```text
//! CallbackDispatcher
//!     → CallbackTransport::post (trait seam, mockable)
//!     → pool.rs (lazy shared reqwest client, per-host connection cap)
//!     → resolver.rs (DNS answers reused for the configured TTL)
//! ```
//!
//! # Design Decisions
//! - The client is built on first use, never at construction
//! - Every POST carries the pool's total-request timeout, slot wait included
//! - Redirects are followed a bounded number of hops and the final answer
//!   is classified; reqwest drops `Authorization` on cross-origin hops

pub mod pool;
pub mod resolver;

pub use pool::TransportPool;
pub use resolver::CachingResolver;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::crypto::Credential;

/// Errors raised below the HTTP status line.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Could not establish a connection (DNS, refused, TLS handshake).
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request exceeded the pool's total timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection broke while sending or receiving.
    #[error("request failed: {0}")]
    Request(String),

    /// The destination kept redirecting past the hop limit.
    #[error("too many redirects: {0}")]
    Redirect(String),

    /// The request could not be built (e.g. credential not a valid header).
    #[error("cannot encode request: {0}")]
    Encode(String),

    /// The HTTP client itself could not be created.
    #[error("HTTP client unavailable: {0}")]
    Client(String),
}

impl TransportError {
    /// Network-layer failures are worth another attempt; local build failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Connect(_) | TransportError::Timeout | TransportError::Request(_)
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_redirect() {
            TransportError::Redirect(e.to_string())
        } else if e.is_builder() {
            TransportError::Encode(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Capability the dispatcher needs from an HTTP client: one authenticated POST.
#[async_trait]
pub trait CallbackTransport: Send + Sync {
    /// POST `body` as JSON with `Authorization: Bearer <credential>`.
    /// Returns the response status code.
    async fn post(
        &self,
        url: &Url,
        credential: &Credential,
        body: &serde_json::Value,
    ) -> TransportResult<u16>;
}
