//! Legacy signed-token verification.
//!
//! Tokens issued before the key-ring migration are signed, not encrypted:
//!
//! ```text
//! base64url(json_string) "." base64url(HMAC-SHA256(derived_key, first_part))
//! derived_key = SHA-256(salt || "signer" || secret)
//! ```
//!
//! The verifier is only active when a legacy secret was configured at
//! startup. It never touches the key ring.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::types::{Credential, CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

/// Salt used when neither the configuration nor the call supplies one.
pub const DEFAULT_LEGACY_SALT: &str = "legacy-callback-token";

#[derive(Clone)]
struct LegacySigner {
    secret: Zeroizing<Vec<u8>>,
    default_salt: String,
}

impl LegacySigner {
    fn mac(&self, salt: &str) -> CryptoResult<HmacSha256> {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"signer");
        hasher.update(self.secret.as_slice());
        let derived = Zeroizing::new(hasher.finalize().to_vec());

        <HmacSha256 as Mac>::new_from_slice(&derived)
            .map_err(|e| CryptoError::Configuration(format!("legacy key derivation failed: {e}")))
    }

    fn salt<'a>(&'a self, salt_override: Option<&'a str>) -> &'a str {
        match salt_override {
            Some(salt) if !salt.is_empty() => salt,
            _ => &self.default_salt,
        }
    }
}

/// Verifier for legacy signed tokens.
#[derive(Clone, Default)]
pub struct LegacyVerifier {
    signer: Option<LegacySigner>,
}

impl LegacyVerifier {
    /// Create an inactive verifier.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build an active verifier.
    pub fn from_secret(secret: &str, salt: Option<&str>) -> CryptoResult<Self> {
        let mut verifier = Self::disabled();
        verifier.initialize(secret, salt)?;
        Ok(verifier)
    }

    /// Configure the legacy secret and default salt.
    pub fn initialize(&mut self, secret: &str, salt: Option<&str>) -> CryptoResult<()> {
        Self::check_secret(secret)?;

        let default_salt = match salt {
            Some(salt) if !salt.is_empty() => salt.to_string(),
            _ => DEFAULT_LEGACY_SALT.to_string(),
        };

        self.signer = Some(LegacySigner {
            secret: Zeroizing::new(secret.as_bytes().to_vec()),
            default_salt,
        });
        tracing::info!("Legacy token verification enabled");
        Ok(())
    }

    /// Check a legacy secret without installing it.
    pub fn check_secret(secret: &str) -> CryptoResult<()> {
        if secret.is_empty() {
            return Err(CryptoError::Configuration(
                "legacy key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a legacy key was configured.
    pub fn is_active(&self) -> bool {
        self.signer.is_some()
    }

    fn signer(&self) -> CryptoResult<&LegacySigner> {
        self.signer
            .as_ref()
            .ok_or(CryptoError::NotInitialized("LegacyVerifier"))
    }

    /// Produce a legacy token for `value`.
    pub fn sign(&self, value: &str, salt_override: Option<&str>) -> CryptoResult<String> {
        let signer = self.signer()?;
        let json = serde_json::to_string(value)
            .map_err(|e| CryptoError::InvalidToken(format!("cannot encode value: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(json.as_bytes());

        let mut mac = signer.mac(signer.salt(salt_override))?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    /// Check the signature and recover the credential.
    pub fn verify(&self, token: &str, salt_override: Option<&str>) -> CryptoResult<Credential> {
        let signer = self.signer()?;

        let (payload, signature) = token.trim().rsplit_once('.').ok_or_else(|| {
            CryptoError::InvalidSignature("no separator found in token".to_string())
        })?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CryptoError::InvalidSignature("signature is not base64".to_string()))?;

        let mut mac = signer.mac(signer.salt(salt_override))?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| {
            CryptoError::InvalidSignature("signature does not match".to_string())
        })?;

        if payload.starts_with('.') {
            return Err(CryptoError::InvalidToken(
                "compressed legacy payloads are not supported".to_string(),
            ));
        }

        let json = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(payload)
                .map_err(|_| CryptoError::InvalidToken("payload is not base64".to_string()))?,
        );
        let value: String = serde_json::from_slice(&json).map_err(|_| {
            CryptoError::InvalidToken("legacy payload is not a JSON string".to_string())
        })?;

        Ok(Credential::new(value))
    }
}

impl fmt::Debug for LegacyVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyVerifier")
            .field("active", &self.is_active())
            .finish()
    }
}
