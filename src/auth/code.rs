use chrono::{DateTime, Duration, Utc};

use crate::auth::oauth2::{generate_auth_code, hash_token, verify_pkce};
use crate::db::models::{AuthorizationCode, Client};
use crate::db::Store;
use crate::error::AppError;

/// Everything a code is bound to at issuance.
#[derive(Debug, Clone)]
pub struct CodeGrant {
    pub tenant_id: String,
    pub app_id: String,
    pub user_id: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Result of a successful consumption. `code_hash` lets the caller undo it.
#[derive(Debug, Clone)]
pub struct ConsumedCode {
    pub code_hash: String,
    pub user_id: String,
    pub scopes: Vec<String>,
    pub nonce: Option<String>,
}

#[derive(Clone)]
pub struct AuthorizationCodeIssuer {
    store: Store,
    ttl: Duration,
}

impl AuthorizationCodeIssuer {
    pub fn new(store: Store, ttl_secs: i64) -> Self {
        Self {
            store,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Persist a new code and return its plaintext value. Only the hash is stored.
    pub async fn issue(&self, grant: CodeGrant, now: DateTime<Utc>) -> Result<String, AppError> {
        let code = generate_auth_code();
        let record = AuthorizationCode {
            code_hash: hash_token(&code),
            tenant_id: grant.tenant_id,
            app_id: grant.app_id,
            user_id: grant.user_id,
            redirect_uri: grant.redirect_uri,
            scopes: grant.scopes,
            nonce: grant.nonce,
            code_challenge: grant.code_challenge,
            code_challenge_method: grant.code_challenge_method,
            expires_at: (now + self.ttl).naive_utc(),
            consumed: false,
            created_at: now.naive_utc(),
        };
        self.store.codes.create(&record).await?;
        Ok(code)
    }

    /// Validate and consume a code exactly once. Every failure is
    /// `InvalidGrant`; the reason only goes to the log.
    pub async fn consume(
        &self,
        tenant_id: &str,
        client: &Client,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ConsumedCode, AppError> {
        let code_hash = hash_token(code);
        let reject = |reason: &str| {
            tracing::warn!(
                tenant = tenant_id,
                client_id = %client.client_id,
                "authorization code rejected: {reason}"
            );
            AppError::InvalidGrant
        };

        let record = self
            .store
            .codes
            .find(&code_hash)
            .await?
            .ok_or_else(|| reject("unknown code"))?;

        if now.naive_utc() >= record.expires_at {
            return Err(reject("expired"));
        }
        if record.consumed {
            return Err(reject("already consumed"));
        }
        if record.tenant_id != tenant_id || record.app_id != client.id {
            return Err(reject("issued to another client"));
        }
        if record.redirect_uri != redirect_uri {
            return Err(reject("redirect_uri mismatch"));
        }
        if let Some(challenge) = record.code_challenge.as_deref() {
            let method = record.code_challenge_method.as_deref().unwrap_or("plain");
            let verifier = code_verifier.ok_or_else(|| reject("missing code_verifier"))?;
            if !verify_pkce(verifier, challenge, method) {
                return Err(reject("code_verifier mismatch"));
            }
        }

        // The checks above are advisory; this conditional update is what
        // guarantees a single winner under concurrent exchanges.
        if !self
            .store
            .codes
            .mark_consumed(&code_hash, now.naive_utc())
            .await?
        {
            return Err(reject("lost consumption race"));
        }

        Ok(ConsumedCode {
            code_hash,
            user_id: record.user_id,
            scopes: record.scopes,
            nonce: record.nonce,
        })
    }

    /// Give a consumed code back after token issuance failed.
    pub async fn restore(&self, consumed: &ConsumedCode) -> Result<(), AppError> {
        if self.store.codes.restore(&consumed.code_hash).await? {
            tracing::info!("restored authorization code after failed issuance");
        }
        Ok(())
    }
}
