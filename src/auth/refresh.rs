use chrono::{DateTime, Duration, Utc};

use crate::auth::oauth2::{generate_refresh_token, hash_token};
use crate::db::models::{Client, RefreshToken};
use crate::db::Store;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct RedeemedRefreshToken {
    pub previous_id: String,
    pub user_id: String,
    pub scopes: Vec<String>,
    /// The value to hand back to the client: a fresh token when the client
    /// rotates, the presented one otherwise.
    pub value: String,
    /// Set when a replacement was issued and the old token revoked.
    pub replacement_id: Option<String>,
}

#[derive(Clone)]
pub struct RefreshTokenRotator {
    store: Store,
    ttl: Duration,
}

impl RefreshTokenRotator {
    pub fn new(store: Store, ttl_days: i64) -> Self {
        Self {
            store,
            ttl: Duration::days(ttl_days),
        }
    }

    pub async fn issue(
        &self,
        tenant_id: &str,
        app_id: &str,
        user_id: &str,
        scopes: &[String],
        now: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, AppError> {
        let value = generate_refresh_token();
        let token = RefreshToken {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            app_id: app_id.to_string(),
            user_id: user_id.to_string(),
            token_hash: hash_token(&value),
            scopes: scopes.to_vec(),
            expires_at: (now + self.ttl).naive_utc(),
            revoked: false,
            superseded: false,
            created_at: now.naive_utc(),
        };
        self.store.refresh_tokens.create(&token).await?;
        Ok(IssuedRefreshToken {
            id: token.id,
            value,
        })
    }

    pub async fn redeem(
        &self,
        tenant_id: &str,
        client: &Client,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<RedeemedRefreshToken, AppError> {
        let reject = |reason: &str| {
            tracing::warn!(
                tenant = tenant_id,
                client_id = %client.client_id,
                "refresh token rejected: {reason}"
            );
            AppError::InvalidGrant
        };

        let stored = self
            .store
            .refresh_tokens
            .find_by_hash(&hash_token(value))
            .await?
            .ok_or_else(|| reject("unknown token"))?;

        if stored.revoked {
            return Err(reject("revoked"));
        }
        if now.naive_utc() >= stored.expires_at {
            return Err(reject("expired"));
        }
        if stored.tenant_id != tenant_id || stored.app_id != client.id {
            return Err(reject("issued to another client"));
        }

        if !client.rotate_refresh_tokens {
            return Ok(RedeemedRefreshToken {
                previous_id: stored.id,
                user_id: stored.user_id,
                scopes: stored.scopes,
                value: value.to_string(),
                replacement_id: None,
            });
        }

        if !self.store.refresh_tokens.supersede(&stored.id).await? {
            return Err(reject("lost rotation race"));
        }

        let replacement = match self
            .issue(tenant_id, &stored.app_id, &stored.user_id, &stored.scopes, now)
            .await
        {
            Ok(replacement) => replacement,
            Err(e) => {
                self.store.refresh_tokens.restore(&stored.id).await?;
                return Err(e);
            }
        };

        Ok(RedeemedRefreshToken {
            previous_id: stored.id,
            user_id: stored.user_id,
            scopes: stored.scopes,
            value: replacement.value,
            replacement_id: Some(replacement.id),
        })
    }

    /// Undo a rotation whose token issuance failed.
    pub async fn rollback(&self, redeemed: &RedeemedRefreshToken) -> Result<(), AppError> {
        if let Some(replacement_id) = redeemed.replacement_id.as_deref() {
            self.store.refresh_tokens.revoke(replacement_id).await?;
            if self.store.refresh_tokens.restore(&redeemed.previous_id).await? {
                tracing::info!("rolled back refresh token rotation after failed issuance");
            } else {
                tracing::warn!("refresh token was revoked during a failed rotation, left revoked");
            }
        }
        Ok(())
    }

    pub async fn revoke_by_id(&self, id: &str) -> Result<bool, AppError> {
        self.store.refresh_tokens.revoke(id).await
    }

    /// RFC 7009 revocation. Tokens belonging to other clients are left alone.
    pub async fn revoke(
        &self,
        tenant_id: &str,
        client: &Client,
        value: &str,
    ) -> Result<bool, AppError> {
        match self
            .store
            .refresh_tokens
            .find_by_hash(&hash_token(value))
            .await?
        {
            Some(token) if token.tenant_id == tenant_id && token.app_id == client.id => {
                self.store.refresh_tokens.revoke(&token.id).await
            }
            _ => Ok(false),
        }
    }
}
