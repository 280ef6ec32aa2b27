use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde::{Deserialize, Serialize};

use crate::auth::keys::SigningKeyProvider;
use crate::auth::oauth2::{join_scope, OFFLINE_ACCESS};
use crate::auth::refresh::RefreshTokenRotator;
use crate::config::Config;
use crate::db::models::{AccessTokenRecord, Account, Client};
use crate::db::Store;
use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub name: String,
    pub given_name: String,
    pub family_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessTokenClaims {
    pub jti: String,
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

/// How the refresh token in a response is obtained.
#[derive(Debug, Clone)]
pub enum RefreshPolicy {
    /// Mint one when the scope set contains `offline_access`.
    IfOffline,
    /// Return a token the grant already produced.
    Carry(String),
    Never,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenResponse {
    pub id_token: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    /// Same value as `expires_in`, kept for older clients.
    pub expires: i64,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct TokenMinter {
    store: Store,
    keys: SigningKeyProvider,
    refresh_tokens: RefreshTokenRotator,
    config: Config,
}

impl TokenMinter {
    pub fn new(
        store: Store,
        keys: SigningKeyProvider,
        refresh_tokens: RefreshTokenRotator,
        config: Config,
    ) -> Self {
        Self {
            store,
            keys,
            refresh_tokens,
            config,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn mint(
        &self,
        tenant_id: &str,
        client: &Client,
        account: &Account,
        scopes: &[String],
        nonce: Option<String>,
        refresh: RefreshPolicy,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, AppError> {
        let key = self.keys.active_signing_key(tenant_id).await?;
        let issuer = self.config.issuer_for(tenant_id);
        let iat = now.timestamp();
        let expires_in = client.access_token_expires_in;
        let exp = iat + expires_in;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid.clone());

        let id_claims = IdTokenClaims {
            iss: issuer.clone(),
            sub: account.id.clone(),
            aud: client.client_id.clone(),
            exp,
            iat,
            name: account.display_name(),
            given_name: account.given_name.clone(),
            family_name: account.family_name.clone(),
            email: account.email.clone(),
            nonce,
        };
        let jti = uuid::Uuid::new_v4().to_string();
        let access_claims = AccessTokenClaims {
            jti: jti.clone(),
            iss: issuer,
            sub: account.id.clone(),
            aud: client.client_id.clone(),
            exp,
            iat,
            scopes: scopes.to_vec(),
            roles: account.roles.clone(),
        };

        let id_token = encode(&header, &id_claims, &key.encoding_key)?;
        let access_token = encode(&header, &access_claims, &key.encoding_key)?;

        let (refresh_token, minted_refresh_id) = match refresh {
            RefreshPolicy::Carry(value) => (Some(value), None),
            RefreshPolicy::IfOffline if scopes.iter().any(|s| s == OFFLINE_ACCESS) => {
                let issued = self
                    .refresh_tokens
                    .issue(tenant_id, &client.id, &account.id, scopes, now)
                    .await?;
                (Some(issued.value), Some(issued.id))
            }
            RefreshPolicy::IfOffline | RefreshPolicy::Never => (None, None),
        };

        let record = AccessTokenRecord {
            id: jti,
            tenant_id: tenant_id.to_string(),
            app_id: client.id.clone(),
            user_id: account.id.clone(),
            scopes: scopes.to_vec(),
            token: access_token.clone(),
            expires_at: (now + Duration::seconds(expires_in)).naive_utc(),
            created_at: now.naive_utc(),
        };
        if let Err(e) = self.store.access_tokens.create(&record).await {
            if let Some(id) = minted_refresh_id {
                self.refresh_tokens.revoke_by_id(&id).await?;
            }
            return Err(e);
        }

        tracing::info!(
            tenant = tenant_id,
            client_id = %client.client_id,
            sub = %account.id,
            kid = %key.kid,
            "issued access token"
        );

        Ok(TokenResponse {
            id_token,
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            expires: expires_in,
            scope: join_scope(scopes),
            refresh_token,
        })
    }
}
