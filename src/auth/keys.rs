//! Per-tenant RS256 signing keys and their public JWKS.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, EncodingKey, Validation};
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::auth::cipher::KeyCipher;
use crate::auth::oauth2::generate_kid;
use crate::db::models::{KeyUse, SigningKey};
use crate::db::Store;
use crate::error::AppError;

const RSA_BITS: usize = 2048;
const ALGORITHM: &str = "RS256";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

/// Decrypted signing material for the tenant's active key.
#[derive(Clone)]
pub struct ActiveKey {
    pub kid: String,
    pub encoding_key: EncodingKey,
}

#[derive(Clone)]
pub struct SigningKeyProvider {
    store: Store,
    cipher: KeyCipher,
    retired_key_ttl: Duration,
    active: Arc<RwLock<HashMap<String, Arc<ActiveKey>>>>,
}

impl SigningKeyProvider {
    pub fn new(store: Store, cipher: KeyCipher, retired_key_ttl_days: i64) -> Self {
        Self {
            store,
            cipher,
            retired_key_ttl: Duration::days(retired_key_ttl_days),
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Generate a fresh RSA key for the tenant without persisting it.
    pub async fn generate(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SigningKey, AppError> {
        let (private_pem, public_pem) = tokio::task::spawn_blocking(|| {
            let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, RSA_BITS)
                .map_err(|e| AppError::Internal(format!("RSA key generation failed: {e}")))?;
            let private_pem = private_key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| AppError::Internal(format!("Private key encoding failed: {e}")))?;
            let public_pem = RsaPublicKey::from(&private_key)
                .to_public_key_pem(LineEnding::LF)
                .map_err(|e| AppError::Internal(format!("Public key encoding failed: {e}")))?;
            Ok::<_, AppError>((private_pem.to_string(), public_pem))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Key generation task failed: {e}")))??;

        Ok(SigningKey {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            kid: generate_kid(),
            algorithm: ALGORITHM.to_string(),
            key_use: KeyUse::Sign,
            private_key_encrypted: self.cipher.encrypt(tenant_id, private_pem.as_bytes())?,
            public_key_pem: public_pem,
            is_active: true,
            expires_at: None,
            created_at: now.naive_utc(),
        })
    }

    /// First key for a newly provisioned tenant.
    pub async fn provision(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SigningKey, AppError> {
        let key = self.generate(tenant_id, now).await?;
        self.store.signing_keys.create(&key).await?;
        tracing::info!(tenant = tenant_id, kid = %key.kid, "provisioned signing key");
        Ok(key)
    }

    /// Replace the active key. The previous key stays in the JWKS until the
    /// retention window passes so outstanding tokens remain verifiable.
    pub async fn rotate(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SigningKey, AppError> {
        let key = self.generate(tenant_id, now).await?;
        let retire_at = (now + self.retired_key_ttl).naive_utc();
        self.store.signing_keys.rotate(&key, retire_at).await?;
        self.active.write().await.remove(tenant_id);
        tracing::info!(tenant = tenant_id, kid = %key.kid, "rotated signing key");
        Ok(key)
    }

    /// The key to sign with. The stored active `kid` is read on every call,
    /// so a rotation made through another provider or process takes effect
    /// here; the cache only saves decrypting the private key again.
    pub async fn active_signing_key(&self, tenant_id: &str) -> Result<Arc<ActiveKey>, AppError> {
        let stored = self
            .store
            .signing_keys
            .find_active(tenant_id)
            .await?
            .ok_or_else(|| {
                AppError::MissingConfiguration(format!(
                    "tenant {tenant_id} has no active signing key"
                ))
            })?;

        if let Some(key) = self.active.read().await.get(tenant_id) {
            if key.kid == stored.kid {
                return Ok(key.clone());
            }
        }

        let pem = self
            .cipher
            .decrypt(tenant_id, &stored.private_key_encrypted)?;
        let encoding_key = EncodingKey::from_rsa_pem(&pem)
            .map_err(|e| AppError::Internal(format!("Invalid private key {}: {e}", stored.kid)))?;

        let key = Arc::new(ActiveKey {
            kid: stored.kid,
            encoding_key,
        });
        self.active
            .write()
            .await
            .insert(tenant_id.to_string(), key.clone());
        Ok(key)
    }

    /// Public halves of every sign key that has not passed its retirement.
    pub async fn public_jwks(&self, tenant_id: &str, now: DateTime<Utc>) -> Result<Jwks, AppError> {
        let now = now.naive_utc();
        let keys = self
            .store
            .signing_keys
            .list(tenant_id)
            .await?
            .iter()
            .filter(|k| k.is_published(now))
            .map(to_jwk)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Jwks { keys })
    }

    /// Verify a token issued for `tenant_id` against its published keys.
    pub async fn verify<C: DeserializeOwned>(
        &self,
        tenant_id: &str,
        token: &str,
        issuer: &str,
    ) -> Result<C, AppError> {
        let header = decode_header(token).map_err(|_| AppError::Unauthorized)?;
        let kid = header.kid.ok_or(AppError::Unauthorized)?;

        let jwks = self.public_jwks(tenant_id, Utc::now()).await?;
        let jwk = jwks.find(&kid).ok_or(AppError::Unauthorized)?;
        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| AppError::Internal(format!("Invalid JWK {kid}: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.validate_aud = false;

        let data = decode::<C>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!("token rejected: {e}");
            AppError::Unauthorized
        })?;
        Ok(data.claims)
    }
}

fn to_jwk(key: &SigningKey) -> Result<Jwk, AppError> {
    let public_key = RsaPublicKey::from_public_key_pem(&key.public_key_pem)
        .map_err(|e| AppError::Internal(format!("Invalid public key {}: {e}", key.kid)))?;
    Ok(Jwk {
        kty: "RSA".to_string(),
        key_use: key.key_use.as_str().to_string(),
        alg: key.algorithm.clone(),
        kid: key.kid.clone(),
        n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    })
}
