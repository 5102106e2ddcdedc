//! Callback Relay Library

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use config::schema::RelayConfig;
pub use crypto::{Credential, Credentials, KeyRing, LegacyVerifier};
pub use dispatch::{CallbackDispatcher, CallbackRequest, DeliveryStatus, Outcome};
pub use http::HttpServer;
pub use lifecycle::{Relay, Shutdown};
pub use transport::{CallbackTransport, TransportPool};
