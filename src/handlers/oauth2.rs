use axum::{
    extract::{Query, RawQuery, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::authorize::AuthorizeRequest;
use crate::auth::client::{ClientCredentials, ClientRegistry};
use crate::auth::grant::TokenRequest;
use crate::auth::middleware::{BasicClientAuth, BearerToken, TenantContext};
use crate::auth::minter::{AccessTokenClaims, TokenResponse};
use crate::auth::oauth2::join_scope;
use crate::db::models::{AccessTokenRecord, Client};
use crate::error::AppError;
use crate::AppState;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IntrospectRequest {
    pub token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct IntrospectResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    pub sub: String,
    pub preferred_username: String,
    pub name: String,
    pub given_name: String,
    pub family_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub account_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

// --- Handlers ---

pub async fn token(
    tenant: TenantContext,
    BasicClientAuth(basic): BasicClientAuth,
    State(state): State<AppState>,
    Form(req): Form<TokenRequest>,
) -> Result<Response, AppError> {
    let credentials = ClientCredentials::from_parts(
        basic,
        req.client_id.as_deref(),
        req.client_secret.as_deref(),
    )?;

    let tokens: TokenResponse = state
        .grants
        .dispatch(tenant.id().to_string(), credentials, req)
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    Ok((headers, Json(tokens)).into_response())
}

pub async fn authorize(
    tenant: TenantContext,
    State(state): State<AppState>,
    jar: CookieJar,
    RawQuery(raw_query): RawQuery,
    Query(req): Query<AuthorizeRequest>,
) -> Result<Response, AppError> {
    let session_id = jar
        .get(&state.config.session_cookie_name)
        .map(|c| c.value().to_string());

    let location = state
        .authorization
        .authorize(
            tenant.id(),
            &req,
            raw_query.as_deref().unwrap_or_default(),
            session_id.as_deref(),
            Utc::now(),
        )
        .await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

pub async fn userinfo(
    tenant: TenantContext,
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
) -> Result<Json<UserInfoResponse>, AppError> {
    let (record, _) = live_access_token(&state, tenant.id(), &token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let account = state
        .store
        .accounts
        .find(tenant.id(), &record.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(UserInfoResponse {
        sub: account.id.clone(),
        preferred_username: account.username.clone(),
        name: account.display_name(),
        given_name: account.given_name,
        family_name: account.family_name,
        email: account.email,
        account_type: account.account_type.as_str().to_string(),
        roles: account.roles,
    }))
}

pub async fn revoke(
    tenant: TenantContext,
    BasicClientAuth(basic): BasicClientAuth,
    State(state): State<AppState>,
    Form(req): Form<RevokeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let client = authenticate(
        &state.clients,
        tenant.id(),
        basic,
        req.client_id.as_deref(),
        req.client_secret.as_deref(),
    )
    .await?;

    if state
        .refresh_tokens
        .revoke(tenant.id(), &client, &req.token)
        .await?
    {
        tracing::info!(
            tenant = tenant.id(),
            client_id = %client.client_id,
            "refresh token revoked"
        );
    }
    // Per RFC 7009, always return 200
    Ok(Json(serde_json::json!({})))
}

pub async fn introspect(
    tenant: TenantContext,
    BasicClientAuth(basic): BasicClientAuth,
    State(state): State<AppState>,
    Form(req): Form<IntrospectRequest>,
) -> Result<Json<IntrospectResponse>, AppError> {
    authenticate(
        &state.clients,
        tenant.id(),
        basic,
        req.client_id.as_deref(),
        req.client_secret.as_deref(),
    )
    .await?;

    let Some((record, claims)) = live_access_token(&state, tenant.id(), &req.token).await? else {
        return Ok(Json(IntrospectResponse::default()));
    };

    Ok(Json(IntrospectResponse {
        active: true,
        sub: Some(record.user_id),
        aud: Some(claims.aud.clone()),
        client_id: Some(claims.aud),
        exp: Some(claims.exp),
        iat: Some(claims.iat),
        scope: Some(join_scope(&record.scopes)),
        token_type: Some("Bearer".to_string()),
    }))
}

async fn authenticate(
    clients: &ClientRegistry,
    tenant_id: &str,
    basic: Option<ClientCredentials>,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Result<Client, AppError> {
    let credentials = ClientCredentials::from_parts(basic, client_id, client_secret)?;
    clients.authenticate(tenant_id, &credentials).await
}

/// The persisted record behind a signed access token, if the signature,
/// issuer and expiry check out and the token was issued by this tenant.
async fn live_access_token(
    state: &AppState,
    tenant_id: &str,
    token: &str,
) -> Result<Option<(AccessTokenRecord, AccessTokenClaims)>, AppError> {
    let claims = match state
        .keys
        .verify::<AccessTokenClaims>(tenant_id, token, &state.config.issuer_for(tenant_id))
        .await
    {
        Ok(claims) => claims,
        Err(AppError::Unauthorized) => return Ok(None),
        Err(e) => return Err(e),
    };

    let now = Utc::now().naive_utc();
    let record = state
        .store
        .access_tokens
        .find(&claims.jti)
        .await?
        .filter(|r| r.tenant_id == tenant_id && r.user_id == claims.sub && now < r.expires_at);
    Ok(record.map(|r| (r, claims)))
}
