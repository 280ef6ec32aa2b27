use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::auth::keys::Jwks;
use crate::auth::middleware::TenantContext;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub revocation_endpoint: String,
    pub introspection_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub subject_types_supported: Vec<&'static str>,
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
    pub code_challenge_methods_supported: Vec<&'static str>,
    pub scopes_supported: Vec<&'static str>,
}

pub async fn jwks(
    tenant: TenantContext,
    State(state): State<AppState>,
) -> Result<Json<Jwks>, AppError> {
    Ok(Json(state.keys.public_jwks(tenant.id(), Utc::now()).await?))
}

pub async fn openid_configuration(
    tenant: TenantContext,
    State(state): State<AppState>,
) -> Json<OpenIdConfiguration> {
    let issuer = state.config.issuer_for(tenant.id());
    let endpoint = |path: &str| format!("{}{path}", issuer.trim_end_matches('/'));

    Json(OpenIdConfiguration {
        authorization_endpoint: endpoint("/oauth/authorize"),
        token_endpoint: endpoint("/oauth/token"),
        userinfo_endpoint: endpoint("/oauth/userinfo"),
        revocation_endpoint: endpoint("/oauth/revoke"),
        introspection_endpoint: endpoint("/oauth/introspect"),
        jwks_uri: endpoint("/.well-known/jwks.json"),
        issuer,
        response_types_supported: vec!["code", "token"],
        grant_types_supported: vec![
            "authorization_code",
            "client_credentials",
            "refresh_token",
            "password",
            "implicit",
        ],
        subject_types_supported: vec!["public"],
        id_token_signing_alg_values_supported: vec!["RS256"],
        token_endpoint_auth_methods_supported: vec!["client_secret_basic", "client_secret_post"],
        code_challenge_methods_supported: vec!["S256", "plain"],
        scopes_supported: vec!["openid", "profile", "email", "offline_access"],
    })
}
