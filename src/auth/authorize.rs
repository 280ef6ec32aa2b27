use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::auth::client::ClientRegistry;
use crate::auth::code::{AuthorizationCodeIssuer, CodeGrant};
use crate::auth::minter::{RefreshPolicy, TokenMinter};
use crate::auth::oauth2::{is_supported_pkce_method, parse_scope};
use crate::db::models::{Client, Session};
use crate::db::Store;
use crate::error::AppError;

/// Query of `GET /oauth/authorize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub client_id: Option<String>,
    pub response_type: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseType {
    Code,
    Token,
}

#[derive(Clone)]
pub struct AuthorizationEndpoint {
    store: Store,
    clients: ClientRegistry,
    codes: AuthorizationCodeIssuer,
    minter: TokenMinter,
    signin_path: String,
}

impl AuthorizationEndpoint {
    pub fn new(
        store: Store,
        clients: ClientRegistry,
        codes: AuthorizationCodeIssuer,
        minter: TokenMinter,
        signin_path: String,
    ) -> Self {
        Self {
            store,
            clients,
            codes,
            minter,
            signin_path,
        }
    }

    /// Returns the `Location` to redirect the browser to. Errors raised
    /// before the redirect URI is verified are never sent to it.
    pub async fn authorize(
        &self,
        tenant_id: &str,
        req: &AuthorizeRequest,
        raw_query: &str,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let client_id = req.client_id.as_deref().ok_or(AppError::InvalidClient)?;
        let client = self.clients.resolve(tenant_id, client_id).await?;

        let redirect_uri = req
            .redirect_uri
            .as_deref()
            .filter(|uri| self.clients.validate_redirect_uri(&client, uri))
            .ok_or(AppError::InvalidRedirectUri)?;
        let mut location = Url::parse(redirect_uri).map_err(|_| AppError::InvalidRedirectUri)?;

        let response_type = match req.response_type.as_deref() {
            Some("code") => ResponseType::Code,
            Some("token") => ResponseType::Token,
            _ => return Err(AppError::UnsupportedResponseType),
        };
        let required_grant = match response_type {
            ResponseType::Code => "authorization_code",
            ResponseType::Token => "implicit",
        };
        if !self.clients.validate_grant_type(&client, required_grant) {
            return Err(AppError::UnauthorizedClient);
        }

        let Some(session) = self.active_session(tenant_id, session_id, now).await? else {
            return Ok(self.signin_location(raw_query));
        };

        let scopes = self
            .clients
            .permitted_scopes(&client, &parse_scope(req.scope.as_deref()));

        match response_type {
            ResponseType::Code => {
                let code = self
                    .issue_code(tenant_id, &client, &session, req, redirect_uri, scopes, now)
                    .await?;
                {
                    let mut query = location.query_pairs_mut();
                    query.append_pair("code", &code);
                    if let Some(state) = req.state.as_deref() {
                        query.append_pair("state", state);
                    }
                }
                Ok(location.to_string())
            }
            ResponseType::Token => {
                let account = self
                    .store
                    .accounts
                    .find(tenant_id, &session.user_id)
                    .await?
                    .ok_or(AppError::Unauthorized)?;
                let tokens = self
                    .minter
                    .mint(
                        tenant_id,
                        &client,
                        &account,
                        &scopes,
                        req.nonce.clone(),
                        RefreshPolicy::Never,
                        now,
                    )
                    .await?;

                let mut fragment = url::form_urlencoded::Serializer::new(String::new());
                fragment
                    .append_pair("access_token", &tokens.access_token)
                    .append_pair("token_type", &tokens.token_type)
                    .append_pair("expires_in", &tokens.expires_in.to_string())
                    .append_pair("scope", &tokens.scope);
                if let Some(state) = req.state.as_deref() {
                    fragment.append_pair("state", state);
                }
                location.set_fragment(Some(&fragment.finish()));
                Ok(location.to_string())
            }
        }
    }

    fn signin_location(&self, raw_query: &str) -> String {
        if raw_query.is_empty() {
            self.signin_path.clone()
        } else {
            format!("{}?{}", self.signin_path, raw_query)
        }
    }

    async fn active_session(
        &self,
        tenant_id: &str,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, AppError> {
        let Some(session_id) = session_id.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let session = self.store.sessions.find(tenant_id, session_id).await?;
        Ok(session.filter(|s| now.naive_utc() < s.expires_at))
    }

    #[allow(clippy::too_many_arguments)]
    async fn issue_code(
        &self,
        tenant_id: &str,
        client: &Client,
        session: &Session,
        req: &AuthorizeRequest,
        redirect_uri: &str,
        scopes: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let code_challenge = req.code_challenge.clone().filter(|c| !c.is_empty());
        let code_challenge_method = match (&code_challenge, req.code_challenge_method.as_deref()) {
            (None, _) => None,
            (Some(_), None) => Some("plain".to_string()),
            (Some(_), Some(method)) if is_supported_pkce_method(method) => Some(method.to_string()),
            (Some(_), Some(method)) => {
                return Err(AppError::InvalidRequest(format!(
                    "Unsupported code_challenge_method: {method}"
                )))
            }
        };

        self.codes
            .issue(
                CodeGrant {
                    tenant_id: tenant_id.to_string(),
                    app_id: client.id.clone(),
                    user_id: session.user_id.clone(),
                    scopes,
                    redirect_uri: redirect_uri.to_string(),
                    nonce: req.nonce.clone(),
                    code_challenge,
                    code_challenge_method,
                },
                now,
            )
            .await
    }
}
