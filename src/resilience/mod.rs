//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Callback attempt:
//!     → transport POST (bounded by the pool's request timeout)
//!     → retries.rs (classify: success / retryable / terminal)
//!     → backoff.rs (jittered delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound call has a deadline
//! - Retry decisions are pure functions the dispatcher loop drives explicitly
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{is_retryable_status, Classification, RetryPolicy};
