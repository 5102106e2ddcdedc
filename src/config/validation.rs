//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, delays ordered, attempts >= 1)
//! - Validate key material shape before any traffic is accepted
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RelayConfig;
use crate::crypto::{KeyRing, LegacyVerifier};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    let transport = &config.transport;
    if transport.request_timeout_secs == 0 {
        errors.push(ValidationError::new("transport.request_timeout_secs", "must be > 0"));
    }
    if transport.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("transport.connect_timeout_secs", "must be > 0"));
    }
    if transport.max_connections_per_host == 0 {
        errors.push(ValidationError::new(
            "transport.max_connections_per_host",
            "must be > 0",
        ));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if !(retries.multiplier.is_finite() && retries.multiplier > 0.0) {
        errors.push(ValidationError::new("retries.multiplier", "must be a positive number"));
    }
    if !(retries.exp_base.is_finite() && retries.exp_base >= 1.0) {
        errors.push(ValidationError::new("retries.exp_base", "must be >= 1.0"));
    }
    if retries.min_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.min_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if let Err(e) = KeyRing::check_keys(&config.encryption.keys) {
        errors.push(ValidationError::new("encryption.keys", e.to_string()));
    }
    if let Some(secret) = config.encryption.legacy_key.as_deref() {
        if let Err(e) = LegacyVerifier::check_secret(secret) {
            errors.push(ValidationError::new("encryption.legacy_key", e.to_string()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
