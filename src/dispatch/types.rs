//! Request, payload, and outcome types for callback delivery.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::CryptoError;
use crate::transport::TransportError;

/// One callback to deliver.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackRequest {
    /// Destination; must be an `https` URL.
    pub url: String,

    /// Opaque token carrying the bearer credential.
    pub encrypted_token: String,

    /// JSON body POSTed to `url`.
    pub payload: serde_json::Value,

    /// Recover the credential through the legacy signed-token path.
    #[serde(default)]
    pub legacy: bool,

    /// Per-call salt for the legacy path.
    #[serde(default)]
    pub salt: Option<String>,
}

impl CallbackRequest {
    pub fn new(
        url: impl Into<String>,
        encrypted_token: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            url: url.into(),
            encrypted_token: encrypted_token.into(),
            payload,
            legacy: false,
            salt: None,
        }
    }

    /// Mark the token as a legacy signed token, optionally with its salt.
    pub fn legacy(mut self, salt: Option<String>) -> Self {
        self.legacy = true;
        self.salt = salt;
        self
    }
}

/// Notification status report sent to a callback URL.
///
/// The dispatcher POSTs whatever JSON it is handed; this type is what the
/// intake endpoint validates before scheduling a delivery.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CallbackPayload {
    pub notification_id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    pub to: String,

    pub status: String,

    pub created_at: DateTime<FixedOffset>,

    pub completed_at: DateTime<FixedOffset>,

    pub sent_at: DateTime<FixedOffset>,

    pub notification_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_payload: Option<serde_json::Value>,
}

/// Final state of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// A 2xx response was received.
    Delivered,
    /// Every attempt failed with a retryable error.
    Exhausted,
    /// Stopped on a terminal error; no further attempts are useful.
    Rejected,
    /// Shutdown interrupted the delivery.
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Exhausted => "exhausted",
            DeliveryStatus::Rejected => "rejected",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

/// Why the last attempt (or the pre-flight checks) failed.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("invalid callback URL: {0}")]
    InvalidUrl(String),

    #[error("credential rejected: {0}")]
    Credential(String),

    #[error("destination answered HTTP {0}")]
    RetryableStatus(u16),

    #[error("destination answered HTTP {0}")]
    TerminalStatus(u16),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("delivery cancelled by shutdown")]
    Cancelled,
}

impl DeliveryError {
    /// Whether another attempt could have succeeded.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::RetryableStatus(_) => true,
            DeliveryError::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// HTTP status of the last response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::RetryableStatus(s) | DeliveryError::TerminalStatus(s) => Some(*s),
            _ => None,
        }
    }
}

/// Result of one `send` call.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: DeliveryStatus,
    pub delivered: bool,
    pub attempts: u32,
    pub last_error: Option<DeliveryError>,
}

impl Outcome {
    pub fn delivered(attempts: u32) -> Self {
        Self {
            status: DeliveryStatus::Delivered,
            delivered: true,
            attempts,
            last_error: None,
        }
    }

    pub fn failed(status: DeliveryStatus, attempts: u32, error: DeliveryError) -> Self {
        Self {
            status,
            delivered: false,
            attempts,
            last_error: Some(error),
        }
    }
}

/// Errors `send` returns instead of an `Outcome`.
///
/// These mean the process is misconfigured, not that one callback is bad.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("credential store misconfigured: {0}")]
    Configuration(String),

    #[error("{0} used before initialization")]
    NotInitialized(&'static str),
}

impl DispatchError {
    /// Split fatal crypto errors from per-token failures.
    pub fn from_crypto(err: CryptoError) -> Result<Self, CryptoError> {
        match err {
            CryptoError::Configuration(msg) => Ok(DispatchError::Configuration(msg)),
            CryptoError::NotInitialized(component) => Ok(DispatchError::NotInitialized(component)),
            other => Err(other),
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
