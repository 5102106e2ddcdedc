//! Retry policy.
//!
//! # Responsibilities
//! - Classify each attempt as success, retryable, or terminal
//! - Compute the backoff before the next attempt
//! - Decide when the attempt budget is spent
//!
//! # Design Decisions
//! - Pure: no I/O, no clock, so the dispatcher loop is testable on its own
//! - Connection errors, 5xx, 408 and 429 are retryable
//! - Every other non-2xx is terminal; retrying a 400/401/403/404 only
//!   burns attempts

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::Backoff;
use crate::transport::TransportResult;

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    Retryable,
    Terminal,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Success => "success",
            Classification::Retryable => "retryable",
            Classification::Terminal => "terminal",
        }
    }
}

/// Default predicate for non-2xx statuses worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

/// Attempt bound, backoff, and status classification for one delivery.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    retryable_status: fn(u16) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Backoff::default())
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is raised to at least 1.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            retryable_status: is_retryable_status,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Backoff::from_config(config))
    }

    /// Replace the predicate deciding which non-2xx statuses are retried.
    pub fn with_retryable_status(mut self, predicate: fn(u16) -> bool) -> Self {
        self.retryable_status = predicate;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Classify a response status.
    pub fn classify_status(&self, status: u16) -> Classification {
        if (200..300).contains(&status) {
            Classification::Success
        } else if (self.retryable_status)(status) {
            Classification::Retryable
        } else {
            Classification::Terminal
        }
    }

    /// Classify the result of one POST.
    pub fn classify(&self, result: &TransportResult<u16>) -> Classification {
        match result {
            Ok(status) => self.classify_status(*status),
            Err(e) if e.is_retryable() => Classification::Retryable,
            Err(_) => Classification::Terminal,
        }
    }

    /// Delay to wait after `attempt` (1-based) failed.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.backoff.next_delay(attempt)
    }

    /// True once `attempt` attempts have been made.
    pub fn should_stop(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}
