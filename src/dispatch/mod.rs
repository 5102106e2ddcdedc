//! Callback dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! CallbackRequest { url, encrypted_token, payload, legacy, salt }
//!     → dispatcher.rs (validate URL, recover credential)
//!     → loop { transport POST → RetryPolicy::classify → sleep | stop }
//!     → Outcome { status, delivered, attempts, last_error }
//! ```

pub mod dispatcher;
pub mod types;

pub use dispatcher::CallbackDispatcher;
pub use types::{
    CallbackPayload, CallbackRequest, DeliveryError, DeliveryStatus, DispatchError,
    DispatchResult, Outcome,
};
