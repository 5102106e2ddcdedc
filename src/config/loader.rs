//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the ordered key list as a JSON array.
pub const ENCRYPTION_KEYS_ENV_VAR: &str = "CALLBACK_RELAY_ENCRYPTION_KEYS";

/// Environment variable holding the legacy signing secret.
pub const LEGACY_KEY_ENV_VAR: &str = "CALLBACK_RELAY_LEGACY_KEY";

/// Environment variable holding the default legacy salt.
pub const LEGACY_SALT_ENV_VAR: &str = "CALLBACK_RELAY_LEGACY_SALT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate.
///
/// Without a path the defaults are used, so a deployment can be configured
/// entirely through the environment.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => RelayConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay secrets from the environment onto the file configuration.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENCRYPTION_KEYS_ENV_VAR) {
        config.encryption.keys = parse_key_list(&raw)?;
    }
    if let Some(secret) = lookup(LEGACY_KEY_ENV_VAR).filter(|s| !s.is_empty()) {
        config.encryption.legacy_key = Some(secret);
    }
    if let Some(salt) = lookup(LEGACY_SALT_ENV_VAR).filter(|s| !s.is_empty()) {
        config.encryption.legacy_salt = Some(salt);
    }
    Ok(())
}

/// Parse a JSON array of keys. A bare key is refused rather than wrapped, so
/// a truncated or mis-quoted list cannot silently shrink the ring.
fn parse_key_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let env_error = |message: &str| ConfigError::Env {
        var: ENCRYPTION_KEYS_ENV_VAR,
        message: message.to_string(),
    };

    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(key) => Ok(key),
                _ => Err(env_error("every key in the list must be a string")),
            })
            .collect(),
        _ => Err(env_error(
            "expected a JSON list of keys, e.g. [\"current\", \"previous\"]",
        )),
    }
}
