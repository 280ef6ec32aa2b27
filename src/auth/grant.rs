//! Token endpoint state machine.
//!
//! Client authentication always runs first; each grant then resolves a
//! principal and scope set before handing off to the [`TokenMinter`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::client::{ClientCredentials, ClientRegistry};
use crate::auth::code::AuthorizationCodeIssuer;
use crate::auth::minter::{RefreshPolicy, TokenMinter, TokenResponse};
use crate::auth::oauth2::{parse_scope, OFFLINE_ACCESS};
use crate::auth::password::verify_account_password;
use crate::auth::refresh::RefreshTokenRotator;
use crate::db::models::{Account, Client};
use crate::db::Store;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
    Password,
}

impl GrantType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authorization_code" => Some(GrantType::AuthorizationCode),
            "client_credentials" => Some(GrantType::ClientCredentials),
            "refresh_token" => Some(GrantType::RefreshToken),
            "password" => Some(GrantType::Password),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
            GrantType::Password => "password",
        }
    }
}

/// Form body of `POST /oauth/token`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    // authorization_code
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    // refresh_token
    pub refresh_token: Option<String>,
    // password
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
}

#[derive(Clone)]
pub struct GrantDispatcher {
    store: Store,
    clients: ClientRegistry,
    codes: AuthorizationCodeIssuer,
    refresh_tokens: RefreshTokenRotator,
    minter: TokenMinter,
}

impl GrantDispatcher {
    pub fn new(
        store: Store,
        clients: ClientRegistry,
        codes: AuthorizationCodeIssuer,
        refresh_tokens: RefreshTokenRotator,
        minter: TokenMinter,
    ) -> Self {
        Self {
            store,
            clients,
            codes,
            refresh_tokens,
            minter,
        }
    }

    /// Run the grant on its own task so a dropped connection cannot stop it
    /// between consuming a one-time credential and persisting the result.
    pub async fn dispatch(
        &self,
        tenant_id: String,
        credentials: ClientCredentials,
        request: TokenRequest,
    ) -> Result<TokenResponse, AppError> {
        let this = self.clone();
        tokio::spawn(async move {
            this.handle(&tenant_id, &credentials, &request, Utc::now())
                .await
        })
        .await
        .map_err(|e| AppError::Internal(format!("token task failed: {e}")))?
    }

    pub async fn handle(
        &self,
        tenant_id: &str,
        credentials: &ClientCredentials,
        req: &TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, AppError> {
        let client = self.clients.authenticate(tenant_id, credentials).await?;

        let grant_type = req.grant_type.as_deref().ok_or_else(|| {
            AppError::InvalidRequest("Missing 'grant_type' parameter".to_string())
        })?;
        let grant = GrantType::parse(grant_type).ok_or(AppError::UnsupportedGrantType)?;

        if !self.clients.validate_grant_type(&client, grant.as_str()) {
            return Err(AppError::UnauthorizedClient);
        }

        match grant {
            GrantType::AuthorizationCode => {
                self.authorization_code(tenant_id, &client, req, now).await
            }
            GrantType::ClientCredentials => {
                self.client_credentials(tenant_id, &client, req, now).await
            }
            GrantType::RefreshToken => self.refresh_token(tenant_id, &client, req, now).await,
            GrantType::Password => self.password(tenant_id, &client, req, now).await,
        }
    }

    async fn authorization_code(
        &self,
        tenant_id: &str,
        client: &Client,
        req: &TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, AppError> {
        let code = req.code.as_deref().ok_or(AppError::InvalidGrant)?;

        let consumed = self
            .codes
            .consume(
                tenant_id,
                client,
                code,
                req.redirect_uri.as_deref().unwrap_or_default(),
                req.code_verifier.as_deref(),
                now,
            )
            .await?;

        let result = async {
            let account = self.load_account(tenant_id, &consumed.user_id).await?;
            self.minter
                .mint(
                    tenant_id,
                    client,
                    &account,
                    &consumed.scopes,
                    consumed.nonce.clone(),
                    RefreshPolicy::IfOffline,
                    now,
                )
                .await
        }
        .await;

        if result.is_err() {
            if let Err(e) = self.codes.restore(&consumed).await {
                tracing::error!(tenant = tenant_id, "failed to restore authorization code: {e}");
            }
        }
        result
    }

    async fn client_credentials(
        &self,
        tenant_id: &str,
        client: &Client,
        req: &TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, AppError> {
        let service_account_id = client
            .service_account_id
            .as_deref()
            .ok_or(AppError::UnauthorizedClient)?;
        let account = self
            .store
            .accounts
            .find(tenant_id, service_account_id)
            .await?
            .ok_or(AppError::UnauthorizedClient)?;

        let requested = parse_scope(req.scope.as_deref());
        let scopes = self.clients.permitted_scopes(client, &requested);

        self.minter
            .mint(
                tenant_id,
                client,
                &account,
                &scopes,
                None,
                RefreshPolicy::IfOffline,
                now,
            )
            .await
    }

    async fn refresh_token(
        &self,
        tenant_id: &str,
        client: &Client,
        req: &TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, AppError> {
        let value = req.refresh_token.as_deref().ok_or(AppError::InvalidGrant)?;
        let redeemed = self
            .refresh_tokens
            .redeem(tenant_id, client, value, now)
            .await?;

        let result = async {
            let account = self.load_account(tenant_id, &redeemed.user_id).await?;
            self.minter
                .mint(
                    tenant_id,
                    client,
                    &account,
                    &redeemed.scopes,
                    None,
                    RefreshPolicy::Carry(redeemed.value.clone()),
                    now,
                )
                .await
        }
        .await;

        if result.is_err() {
            if let Err(e) = self.refresh_tokens.rollback(&redeemed).await {
                tracing::error!(tenant = tenant_id, "failed to roll back refresh rotation: {e}");
            }
        }
        result
    }

    async fn password(
        &self,
        tenant_id: &str,
        client: &Client,
        req: &TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, AppError> {
        let (Some(username), Some(password)) = (req.username.as_deref(), req.password.as_deref())
        else {
            return Err(AppError::InvalidRequest(
                "Missing 'username' or 'password' parameter".to_string(),
            ));
        };

        let account = self
            .store
            .accounts
            .find_by_username(tenant_id, username)
            .await?
            .ok_or(AppError::InvalidCredential)?;
        verify_account_password(&account, password)?;

        let mut scopes = account.roles.clone();
        let requested = parse_scope(req.scope.as_deref());
        if requested.iter().any(|s| s == OFFLINE_ACCESS)
            && client.allowed_scopes.iter().any(|s| s == OFFLINE_ACCESS)
            && !scopes.iter().any(|s| s == OFFLINE_ACCESS)
        {
            scopes.push(OFFLINE_ACCESS.to_string());
        }

        self.minter
            .mint(
                tenant_id,
                client,
                &account,
                &scopes,
                None,
                RefreshPolicy::IfOffline,
                now,
            )
            .await
    }

    async fn load_account(&self, tenant_id: &str, user_id: &str) -> Result<Account, AppError> {
        self.store
            .accounts
            .find(tenant_id, user_id)
            .await?
            .ok_or(AppError::InvalidGrant)
    }
}

#[cfg(test)]
mod tests {
    use super::GrantType;

    #[test]
    fn grant_type_names_round_trip() {
        for name in ["authorization_code", "client_credentials", "refresh_token", "password"] {
            assert_eq!(GrantType::parse(name).map(|g| g.as_str()), Some(name));
        }
        assert_eq!(GrantType::parse("implicit"), None);
        assert_eq!(GrantType::parse(""), None);
    }
}
