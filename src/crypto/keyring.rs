//! Rotation-aware symmetric key ring.
//!
//! # Responsibilities
//! - Validate the configured key list as a whole
//! - Decrypt tokens with the first key that authenticates
//! - Encrypt new tokens with the current (first) key
//!
//! # Token Format
//! ```text
//! base64url( version(1) || nonce(12) || AES-256-GCM(ciphertext || tag) )
//! ```
//! The version byte is bound as associated data, so a token cannot be
//! re-labelled without failing authentication.
//!
//! # Design Decisions
//! - One malformed key fails the whole ring (a silently shrunk ring is a
//!   rotation hazard)
//! - Keys are never logged; errors name the key by index only
//! - Read-only after initialization; re-initializing requires `&mut self`

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine,
};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::types::{Credential, CryptoError, CryptoResult};

/// Decoded key length (AES-256).
pub const KEY_LEN: usize = 32;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// GCM authentication tag size.
const TAG_SIZE: usize = 16;

/// Leading byte of every token produced by this scheme.
const TOKEN_VERSION: u8 = 0x01;

/// A single validated symmetric key.
#[derive(Clone)]
pub struct KeyMaterial {
    cipher: Aes256Gcm,
}

impl KeyMaterial {
    /// Parse a key from URL-safe base64 text (padding optional).
    pub fn parse(encoded: &str) -> CryptoResult<Self> {
        let trimmed = encoded.trim();
        if trimmed.is_empty() {
            return Err(CryptoError::Configuration("key is empty".to_string()));
        }
        if !trimmed
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'=')
        {
            return Err(CryptoError::Configuration(
                "key must be URL-safe base64".to_string(),
            ));
        }

        let bytes = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(trimmed.trim_end_matches('='))
                .map_err(|e| CryptoError::Configuration(format!("key is not valid base64: {e}")))?,
        );
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::Configuration(format!(
                "key must decode to {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|e| CryptoError::Configuration(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Generate a fresh random key, returned in its configuration encoding.
    pub fn generate() -> String {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        URL_SAFE.encode(&bytes[..])
    }

    fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: &[TOKEN_VERSION],
                },
            )
            .map_err(|e| CryptoError::InvalidToken(format!("encryption failed: {e}")))?;

        let mut token = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
        token.push(TOKEN_VERSION);
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&ciphertext);
        Ok(URL_SAFE.encode(&token))
    }

    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &[TOKEN_VERSION],
                },
            )
            .ok()
            .map(Zeroizing::new)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// Ordered set of decryption keys. The first key is the current one.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    /// `None` until a complete, valid key list has been installed.
    keys: Option<Vec<KeyMaterial>>,
}

impl KeyRing {
    /// Create a ring in the not-ready state.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Build a ready ring from encoded keys.
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> CryptoResult<Self> {
        let mut ring = Self::uninitialized();
        ring.initialize(keys)?;
        Ok(ring)
    }

    /// Install the key list. Any invalid key fails the whole list and leaves
    /// the ring not ready.
    pub fn initialize<S: AsRef<str>>(&mut self, keys: &[S]) -> CryptoResult<()> {
        self.keys = None;
        let parsed = parse_key_list(keys)?;
        tracing::info!(key_count = parsed.len(), "Key ring initialized");
        self.keys = Some(parsed);
        Ok(())
    }

    /// Check a key list without installing it.
    pub fn check_keys<S: AsRef<str>>(keys: &[S]) -> CryptoResult<()> {
        parse_key_list(keys).map(|_| ())
    }

    /// Whether a valid key list is installed.
    pub fn is_ready(&self) -> bool {
        self.keys.is_some()
    }

    /// Number of keys in the ring (0 when not ready).
    pub fn len(&self) -> usize {
        self.keys.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> CryptoResult<&[KeyMaterial]> {
        self.keys
            .as_deref()
            .ok_or(CryptoError::NotInitialized("KeyRing"))
    }

    /// Encrypt under the current key.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        self.encrypt_with_key(0, plaintext)
    }

    /// Encrypt under a specific listed key.
    pub fn encrypt_with_key(&self, index: usize, plaintext: &str) -> CryptoResult<String> {
        let keys = self.keys()?;
        let key = keys.get(index).ok_or_else(|| {
            CryptoError::Configuration(format!(
                "key index {index} out of range for ring of {}",
                keys.len()
            ))
        })?;
        key.encrypt(plaintext)
    }

    /// Recover the credential, trying each key in order.
    pub fn decrypt(&self, token: &str) -> CryptoResult<Credential> {
        let keys = self.keys()?;

        let raw = URL_SAFE_NO_PAD
            .decode(token.trim().trim_end_matches('='))
            .map_err(|_| CryptoError::InvalidToken("token is not URL-safe base64".to_string()))?;

        if raw.len() < 1 + NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidToken("token is too short".to_string()));
        }
        if raw[0] != TOKEN_VERSION {
            return Err(CryptoError::InvalidToken(format!(
                "unsupported token version {:#04x}",
                raw[0]
            )));
        }

        let nonce = &raw[1..1 + NONCE_SIZE];
        let ciphertext = &raw[1 + NONCE_SIZE..];

        for (index, key) in keys.iter().enumerate() {
            if let Some(plaintext) = key.decrypt(nonce, ciphertext) {
                if index > 0 {
                    tracing::debug!(key_index = index, "Token authenticated by a non-current key");
                }
                let value = std::str::from_utf8(&plaintext).map_err(|_| {
                    CryptoError::InvalidToken("credential is not valid UTF-8".to_string())
                })?;
                return Ok(Credential::new(value));
            }
        }

        Err(CryptoError::InvalidToken(
            "no configured key authenticates the token".to_string(),
        ))
    }
}

fn parse_key_list<S: AsRef<str>>(keys: &[S]) -> CryptoResult<Vec<KeyMaterial>> {
    if keys.is_empty() {
        return Err(CryptoError::Configuration(
            "key list must contain at least one key".to_string(),
        ));
    }

    keys.iter()
        .enumerate()
        .map(|(index, key)| {
            KeyMaterial::parse(key.as_ref()).map_err(|e| match e {
                CryptoError::Configuration(msg) => {
                    CryptoError::Configuration(format!("key {index}: {msg}"))
                }
                other => other,
            })
        })
        .collect()
}
