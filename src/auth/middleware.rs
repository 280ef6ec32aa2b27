use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::Engine;

use crate::auth::client::ClientCredentials;
use crate::db::models::Tenant;
use crate::error::AppError;

/// Tenant addressed by the first label of the `Host` header
/// (`acme.auth.example.com` -> `acme`).
#[derive(Debug, Clone)]
pub struct TenantContext(pub Tenant);

impl TenantContext {
    pub fn id(&self) -> &str {
        &self.0.id
    }
}

pub fn tenant_from_host(host: &str) -> Option<&str> {
    let without_port = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    without_port
        .split('.')
        .next()
        .filter(|label| !label.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync + AsRef<crate::AppState>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state: &crate::AppState = state.as_ref();

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.host())
            .ok_or(AppError::TenantNotFound)?;
        let tenant_id = tenant_from_host(host)
            .ok_or(AppError::TenantNotFound)?
            .to_ascii_lowercase();

        let tenant = app_state
            .store
            .tenants
            .find(&tenant_id)
            .await?
            .ok_or(AppError::TenantNotFound)?;

        Ok(TenantContext(tenant))
    }
}

/// Raw bearer token from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?;

        Ok(BearerToken(token.to_string()))
    }
}

/// Client credentials from HTTP Basic auth, if the header is present.
/// Form-posted credentials are merged in by the handler.
#[derive(Debug, Clone)]
pub struct BasicClientAuth(pub Option<ClientCredentials>);

#[async_trait]
impl<S> FromRequestParts<S> for BasicClientAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(BasicClientAuth(None));
        };

        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(AppError::InvalidClient)?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| AppError::InvalidClient)?;
        let decoded_str = String::from_utf8(decoded).map_err(|_| AppError::InvalidClient)?;
        let (client_id, client_secret) = decoded_str
            .split_once(':')
            .ok_or(AppError::InvalidClient)?;

        Ok(BasicClientAuth(Some(ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::tenant_from_host;

    #[test]
    fn tenant_is_first_host_label() {
        assert_eq!(tenant_from_host("acme.auth.example.com"), Some("acme"));
        assert_eq!(tenant_from_host("acme.localhost:3000"), Some("acme"));
        assert_eq!(tenant_from_host("localhost"), Some("localhost"));
        assert_eq!(tenant_from_host(".example.com"), None);
    }
}
