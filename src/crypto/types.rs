//! Credential type and crypto error definitions.

use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors raised while configuring keys or recovering a credential.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material is missing, malformed, or of the wrong shape.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Decrypt or verify was called before the component was configured.
    #[error("{0} used before initialization")]
    NotInitialized(&'static str),

    /// No configured key authenticates the token, or the token is malformed.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Legacy token signature did not validate.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

impl CryptoError {
    /// True for errors that indicate a deployment or startup-ordering defect
    /// rather than a bad token.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CryptoError::Configuration(_) | CryptoError::NotInitialized(_))
    }
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// A recovered bearer credential.
///
/// The value is zeroized on drop and redacted from `Debug` output so it cannot
/// leak into logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the raw bearer token.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
