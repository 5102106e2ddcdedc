//! Credential recovery subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     encryption config (keys, legacy key, salt)
//!     → keyring.rs (validate whole key list)
//!     → legacy.rs (optional, only when a legacy key is set)
//!     → Credentials (immutable, shared via Arc)
//!
//! Per callback:
//!     encrypted token + legacy flag
//!     → KeyRing::decrypt | LegacyVerifier::verify
//!     → Credential (never logged)
//! ```
//!
//! # Security Constraints
//! - Keys and credentials never appear in logs or `Debug` output
//! - Decryption failures are distinct from configuration failures
//! - The legacy path never affects key-ring validity

pub mod keyring;
pub mod legacy;
pub mod types;

pub use keyring::{KeyMaterial, KeyRing};
pub use legacy::{LegacyVerifier, DEFAULT_LEGACY_SALT};
pub use types::{Credential, CryptoError, CryptoResult};

use crate::config::EncryptionConfig;

/// Key ring plus optional legacy verifier, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keyring: KeyRing,
    legacy: LegacyVerifier,
}

impl Credentials {
    pub fn new(keyring: KeyRing, legacy: LegacyVerifier) -> Self {
        Self { keyring, legacy }
    }

    /// Build from the encryption section of the configuration.
    pub fn from_config(config: &EncryptionConfig) -> CryptoResult<Self> {
        let keyring = KeyRing::from_keys(&config.keys)?;
        let legacy = match config.legacy_key.as_deref() {
            Some(secret) => LegacyVerifier::from_secret(secret, config.legacy_salt.as_deref())?,
            None => LegacyVerifier::disabled(),
        };
        Ok(Self { keyring, legacy })
    }

    pub fn keyring(&self) -> &KeyRing {
        &self.keyring
    }

    pub fn legacy(&self) -> &LegacyVerifier {
        &self.legacy
    }

    /// Recover the bearer credential through the path the caller selected.
    pub fn resolve(
        &self,
        token: &str,
        legacy: bool,
        salt_override: Option<&str>,
    ) -> CryptoResult<Credential> {
        if legacy {
            self.legacy.verify(token, salt_override)
        } else {
            self.keyring.decrypt(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "YXNkZmFzZGZhc2RmYXNkZmFzZGZhc2RmYXNkZmFzZGY=";

    #[test]
    fn test_from_config_without_legacy() {
        let config = EncryptionConfig {
            keys: vec![KEY_A.to_string()],
            legacy_key: None,
            legacy_salt: Some("ignored".to_string()),
        };
        let credentials = Credentials::from_config(&config).unwrap();
        assert!(credentials.keyring().is_ready());
        assert!(!credentials.legacy().is_active());
    }

    #[test]
    fn test_resolve_selects_path() {
        let config = EncryptionConfig {
            keys: vec![KEY_A.to_string()],
            legacy_key: Some(KEY_A.to_string()),
            legacy_salt: None,
        };
        let credentials = Credentials::from_config(&config).unwrap();

        let modern = credentials.keyring().encrypt("modern").unwrap();
        let legacy = credentials.legacy().sign("legacy", None).unwrap();

        assert_eq!(credentials.resolve(&modern, false, None).unwrap().expose(), "modern");
        assert_eq!(credentials.resolve(&legacy, true, None).unwrap().expose(), "legacy");
        assert!(credentials.resolve(&legacy, false, None).is_err());
    }

    #[test]
    fn test_uninitialized_in_any_order() {
        let credentials = Credentials::default();
        assert!(matches!(
            credentials.resolve("t", true, None).unwrap_err(),
            CryptoError::NotInitialized("LegacyVerifier")
        ));
        assert!(matches!(
            credentials.resolve("t", false, None).unwrap_err(),
            CryptoError::NotInitialized("KeyRing")
        ));
    }

    #[test]
    fn test_legacy_only_does_not_ready_keyring() {
        let legacy = LegacyVerifier::from_secret("secret", None).unwrap();
        let credentials = Credentials::new(KeyRing::uninitialized(), legacy);
        assert!(credentials.legacy().is_active());
        assert!(!credentials.keyring().is_ready());
    }
}
