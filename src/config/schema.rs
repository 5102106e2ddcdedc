//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the callback relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration for the intake endpoint.
    pub listener: ListenerConfig,

    /// Outbound connection pool settings.
    pub transport: TransportConfig,

    /// Retry and backoff configuration.
    pub retries: RetryConfig,

    /// Key material for credential recovery.
    pub encryption: EncryptionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5309").
    pub bind_address: String,

    /// Timeout for handling an intake request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5309".to_string(),
            request_timeout_secs: 10,
            max_body_size: 256 * 1024,
        }
    }
}

/// Outbound HTTP pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Total time allowed for one POST, in seconds.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Maximum concurrent connections to one destination host.
    pub max_connections_per_host: usize,

    /// How long resolved addresses are reused, in seconds.
    pub dns_cache_ttl_secs: u64,

    /// Idle pooled connections kept per host.
    pub idle_connections_per_host: usize,

    /// User-Agent header sent with every callback.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            max_connections_per_host: 50,
            dns_cache_ttl_secs: 120,
            idle_connections_per_host: 10,
            user_agent: concat!("callback-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of POST attempts per callback (including the first).
    pub max_attempts: u32,

    /// Scale factor applied to the exponential term, in seconds.
    pub multiplier: f64,

    /// Exponential base.
    pub exp_base: f64,

    /// Lower bound of every backoff delay in milliseconds.
    pub min_delay_ms: u64,

    /// Upper bound of every backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            multiplier: 2.0,
            exp_base: 2.0,
            min_delay_ms: 0,
            max_delay_ms: 60_000,
        }
    }
}

/// Encryption key configuration.
///
/// Keys are URL-safe base64 encodings of 32-byte secrets. The first key is
/// the current one; the rest stay listed until tokens under them expire.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Ordered key list, current key first.
    #[serde(deserialize_with = "key_list")]
    pub keys: Vec<String>,

    /// Secret for legacy signed tokens. Legacy mode is active only when set.
    pub legacy_key: Option<String>,

    /// Default salt for legacy verification.
    pub legacy_salt: Option<String>,
}

/// Accept only a list of keys. A lone string is a common mistake when a
/// deployment has a single key, and gets a message saying what to write.
fn key_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct KeyList;

    impl<'de> Visitor<'de> for KeyList {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a list of keys")
        }

        fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
            Err(E::custom(
                "keys must be a list, e.g. keys = [\"<key>\"], not a single string",
            ))
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut keys = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(key) = seq.next_element::<String>()? {
                keys.push(key);
            }
            Ok(keys)
        }
    }

    deserializer.deserialize_seq(KeyList)
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("keys", &self.keys.len())
            .field("legacy_key", &self.legacy_key.as_ref().map(|_| "<redacted>"))
            .field("legacy_salt", &self.legacy_salt)
            .finish()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
