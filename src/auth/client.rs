use crate::auth::oauth2::{constant_time_eq, hash_token, OFFLINE_ACCESS};
use crate::db::models::Client;
use crate::db::Store;
use crate::error::AppError;

/// Client credentials as presented on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    /// Merge credentials from the Basic header and the form body. Basic wins;
    /// a form `client_id` naming a different client is rejected outright.
    pub fn from_parts(
        basic: Option<ClientCredentials>,
        form_client_id: Option<&str>,
        form_client_secret: Option<&str>,
    ) -> Result<Self, AppError> {
        match basic {
            Some(creds) => match form_client_id {
                Some(id) if id != creds.client_id => Err(AppError::InvalidClient),
                _ => Ok(creds),
            },
            None => Ok(ClientCredentials {
                client_id: form_client_id.ok_or(AppError::InvalidClient)?.to_string(),
                client_secret: form_client_secret.unwrap_or_default().to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct ClientRegistry {
    store: Store,
}

impl ClientRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Look up an active client of the tenant.
    pub async fn resolve(&self, tenant_id: &str, client_id: &str) -> Result<Client, AppError> {
        match self
            .store
            .clients
            .find_by_client_id(tenant_id, client_id)
            .await?
        {
            Some(client) if client.is_active => Ok(client),
            _ => Err(AppError::InvalidClient),
        }
    }

    pub async fn authenticate(
        &self,
        tenant_id: &str,
        credentials: &ClientCredentials,
    ) -> Result<Client, AppError> {
        let presented = hash_token(&credentials.client_secret);
        let client = self.resolve(tenant_id, &credentials.client_id).await;

        match client {
            Ok(client) if constant_time_eq(&presented, &client.client_secret_hash) => Ok(client),
            Ok(client) => {
                tracing::warn!(
                    tenant = tenant_id,
                    client_id = %client.client_id,
                    "client secret mismatch"
                );
                Err(AppError::InvalidClient)
            }
            Err(e) => Err(e),
        }
    }

    /// Exact string match only; no prefix or wildcard forms.
    pub fn validate_redirect_uri(&self, client: &Client, redirect_uri: &str) -> bool {
        client.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    pub fn validate_grant_type(&self, client: &Client, grant_type: &str) -> bool {
        client.grant_types.iter().any(|g| g == grant_type)
    }

    /// Requested scopes the client may hold. With nothing requested, every
    /// allowed scope except `offline_access`, which must be asked for.
    pub fn permitted_scopes(&self, client: &Client, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            return client
                .allowed_scopes
                .iter()
                .filter(|s| *s != OFFLINE_ACCESS)
                .cloned()
                .collect();
        }
        requested
            .iter()
            .filter(|s| client.allowed_scopes.contains(s))
            .cloned()
            .collect()
    }
}
