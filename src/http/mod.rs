//! HTTP intake subsystem.
//!
//! # Data Flow
//! ```text
//! POST /callback/send
//!     → server.rs (body limit, timeout, trace layers)
//!     → handlers.rs (typed payload validation)
//!     → tokio::spawn(CallbackDispatcher::send_until)
//!     → 202 Accepted (before any delivery attempt)
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
