//! At-rest encryption of tenant private keys.
//!
//! Ciphertext layout is `base64(nonce || AES-256-GCM(plaintext))`, with the
//! tenant id bound as associated data so a blob cannot be replayed under a
//! different tenant.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

use crate::error::AppError;

const NONCE_SIZE: usize = 12;

#[derive(Clone)]
pub struct KeyCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for KeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCipher").finish_non_exhaustive()
    }
}

impl KeyCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, AppError> {
        let bytes = BASE64.decode(encoded.trim()).map_err(|e| {
            AppError::MissingConfiguration(format!("KEY_ENCRYPTION_KEY is not base64: {e}"))
        })?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            AppError::MissingConfiguration(format!(
                "KEY_ENCRYPTION_KEY must be 32 bytes, got {}",
                b.len()
            ))
        })?;
        Ok(Self::new(key))
    }

    fn cipher(&self) -> Result<Aes256Gcm, AppError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| AppError::Internal(e.to_string()))
    }

    pub fn encrypt(&self, tenant_id: &str, plaintext: &[u8]) -> Result<String, AppError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: tenant_id.as_bytes(),
                },
            )
            .map_err(|e| AppError::Internal(format!("Key encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    pub fn decrypt(&self, tenant_id: &str, encoded: &str) -> Result<Vec<u8>, AppError> {
        let data = BASE64
            .decode(encoded)
            .map_err(|e| AppError::Internal(format!("Stored key is not base64: {e}")))?;
        if data.len() <= NONCE_SIZE {
            return Err(AppError::Internal("Stored key is truncated".to_string()));
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);

        self.cipher()?
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: tenant_id.as_bytes(),
                },
            )
            .map_err(|_| {
                AppError::Internal(format!("Key decryption failed for tenant {tenant_id}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> KeyCipher {
        KeyCipher::new([7u8; 32])
    }

    #[test]
    fn round_trips_for_the_same_tenant() {
        let c = cipher();
        let sealed = c.encrypt("acme", b"private key").unwrap();
        assert_eq!(c.decrypt("acme", &sealed).unwrap(), b"private key");
    }

    #[test]
    fn ciphertext_is_bound_to_tenant() {
        let c = cipher();
        let sealed = c.encrypt("acme", b"private key").unwrap();
        assert!(c.decrypt("globex", &sealed).is_err());
    }

    #[test]
    fn tampering_is_detected() {
        let c = cipher();
        let sealed = c.encrypt("acme", b"private key").unwrap();
        let mut raw = BASE64.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(c.decrypt("acme", &BASE64.encode(raw)).is_err());
    }

    #[test]
    fn rejects_short_master_keys() {
        let err = KeyCipher::from_base64(&BASE64.encode([1u8; 16])).unwrap_err();
        assert!(matches!(err, AppError::MissingConfiguration(_)));
        assert!(KeyCipher::from_base64(&BASE64.encode([1u8; 32])).is_ok());
    }
}
