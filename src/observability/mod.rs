//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, filtered by EnvFilter)
//!     → metrics.rs (attempt/outcome counters, delivery histogram)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, when enabled)
//! ```
//!
//! # Design Decisions
//! - Credentials, tokens and key material are never recorded
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
