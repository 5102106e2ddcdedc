//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Credentials → Pool → Dispatcher → Listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Cancel deliveries → Drain → Close pool
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, cancel, drain, close
//! - Shutdown has timeout: the pool closes after the drain deadline regardless

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{Relay, StartupError};
