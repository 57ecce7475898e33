//! Secret codec for credentials stored in the engine configuration
//!
//! Engine-side secrets are kept as a base64 envelope of `nonce || ciphertext`
//! sealed with AES-256-GCM. The key is derived from a configured entropy
//! string, so every machine (or user) can scope its own secrets.
//!
//! ```text
//! "user password" ──encrypt──→ base64(nonce[12] ‖ AES-GCM(ct ‖ tag))
//!                 ←─decrypt──
//! ```
//!
//! Empty input is never an error: it means "no credential".

use crate::error::{ConfigError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

const NONCE_SIZE: usize = 12;
const KEY_DOMAIN: &str = "cupboard/secrets/v1:";

/// Default entropy when none is configured
pub const DEFAULT_ENTROPY: &str = "cupboard";

/// Encrypts and decrypts credential fields
#[derive(Clone)]
pub struct SecretCodec {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}

impl SecretCodec {
    /// Derive the codec key from an entropy string
    pub fn new(entropy: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN.as_bytes());
        hasher.update(entropy.as_bytes());
        Self {
            key: hasher.finalize().into(),
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| ConfigError::SecretDecryption(format!("invalid key: {e}")))
    }

    /// Decrypt a secret envelope. Empty input yields empty output.
    pub fn decrypt(&self, cipher_text: &str) -> Result<String> {
        let cipher_text = cipher_text.trim();
        if cipher_text.is_empty() {
            return Ok(String::new());
        }

        let raw = STANDARD
            .decode(cipher_text.as_bytes())
            .map_err(|e| ConfigError::SecretDecryption(format!("not base64: {e}")))?;
        if raw.len() <= NONCE_SIZE {
            return Err(ConfigError::SecretDecryption(format!(
                "envelope too short ({} bytes)",
                raw.len()
            )));
        }

        let (nonce, sealed) = raw.split_at(NONCE_SIZE);
        let plain = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| {
                ConfigError::SecretDecryption("authentication failed (corrupt or wrong key)".into())
            })?;

        String::from_utf8(plain)
            .map_err(|e| ConfigError::SecretDecryption(format!("plaintext is not utf-8: {e}")))
    }

    /// Decrypt an optional field, treating absent and empty alike
    pub fn decrypt_optional(&self, cipher_text: Option<&str>) -> Result<Option<String>> {
        match cipher_text {
            Some(text) => {
                let plain = self.decrypt(text)?;
                Ok((!plain.is_empty()).then_some(plain))
            }
            None => Ok(None),
        }
    }

    /// Encrypt a secret for write-back to the engine. Empty input yields empty output.
    pub fn encrypt(&self, plain_text: &str) -> Result<String> {
        if plain_text.is_empty() {
            return Ok(String::new());
        }

        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce);

        let sealed = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), plain_text.as_bytes())
            .map_err(|e| ConfigError::SecretDecryption(format!("encryption failed: {e}")))?;

        let mut envelope = nonce.to_vec();
        envelope.extend(sealed);
        Ok(STANDARD.encode(envelope))
    }
}

impl Default for SecretCodec {
    fn default() -> Self {
        Self::new(DEFAULT_ENTROPY)
    }
}
