//! AES-256-GCM sealing for credentials at rest.
//!
//! A sealed blob is `base64(nonce || ciphertext || tag)` with a fresh 96-bit
//! nonce per call. The key lives only in process memory.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;

use crate::errors::{LumenError, LumenResult};

pub const KEY_ENV_VAR: &str = "LUMEN_SECRET_KEY";
pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; KEY_LEN],
}

impl CredentialCipher {
    pub fn new(key: &[u8]) -> LumenResult<Self> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| {
            LumenError::Credential(format!(
                "encryption key must be exactly {KEY_LEN} bytes, got {}",
                key.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Read the key from [`KEY_ENV_VAR`]. Startup aborts when this fails.
    pub fn from_env() -> LumenResult<Self> {
        let raw = std::env::var(KEY_ENV_VAR).map_err(|_| {
            LumenError::Credential(format!("{KEY_ENV_VAR} is not set"))
        })?;
        Self::new(raw.as_bytes())
    }

    fn aead(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    pub fn encrypt(&self, plaintext: &str) -> LumenResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .aead()
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| LumenError::Credential("failed to encrypt credential".into()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&sealed);
        Ok(B64_ENGINE.encode(blob))
    }

    pub fn decrypt(&self, blob: &str) -> LumenResult<String> {
        let raw = B64_ENGINE
            .decode(blob.trim().as_bytes())
            .map_err(|_| LumenError::Credential("stored credential is not valid base64".into()))?;
        if raw.len() < NONCE_LEN {
            return Err(LumenError::Credential("ciphertext too short".into()));
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let opened = self
            .aead()
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| {
                LumenError::Credential(
                    "failed to decrypt credential (wrong key or tampered data)".into(),
                )
            })?;
        String::from_utf8(opened)
            .map_err(|_| LumenError::Credential("decrypted credential was not valid UTF-8".into()))
    }
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}
