//! Provisioning of tenants, accounts and clients.
//!
//! Used by the `seed` CLI subcommand and by tests; the OAuth endpoints
//! themselves never create these records.

use chrono::Utc;

use crate::auth::oauth2::{generate_client_secret, hash_token};
use crate::auth::password::hash_password;
use crate::db::models::{Account, AccountType, Client, Tenant};
use crate::error::AppError;
use crate::AppState;

pub const DEFAULT_ACCESS_TOKEN_EXPIRES_IN: i64 = 86400;

#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub id: Option<String>,
    pub account_type: Option<AccountType>,
    pub username: String,
    pub password: Option<String>,
    pub email: Option<String>,
    pub given_name: String,
    pub family_name: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: String,
    /// Generated when not given.
    pub client_id: Option<String>,
    /// Generated when not given.
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub access_token_expires_in: i64,
    pub service_account_id: Option<String>,
    pub rotate_refresh_tokens: bool,
}

impl Default for NewClient {
    fn default() -> Self {
        Self {
            name: "Default Application".to_string(),
            client_id: None,
            client_secret: None,
            redirect_uris: Vec::new(),
            grant_types: vec![
                "authorization_code".to_string(),
                "client_credentials".to_string(),
                "refresh_token".to_string(),
            ],
            allowed_scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
                "offline_access".to_string(),
            ],
            access_token_expires_in: DEFAULT_ACCESS_TOKEN_EXPIRES_IN,
            service_account_id: None,
            rotate_refresh_tokens: true,
        }
    }
}

/// A client together with its plaintext secret, which is not stored.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    pub client: Client,
    pub client_secret: String,
}

#[derive(Debug)]
pub struct SeedResult {
    pub tenant_id: String,
    pub tenant_created: bool,
    pub client_id: String,
    /// Only set when a new client was created.
    pub client_secret: Option<String>,
    pub service_account_id: String,
}

fn is_valid_tenant_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 63
        && !id.starts_with('-')
        && !id.ends_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Create a tenant and its first signing key.
pub async fn provision_tenant(
    state: &AppState,
    tenant_id: &str,
    title: &str,
) -> Result<Tenant, AppError> {
    if !is_valid_tenant_id(tenant_id) {
        return Err(AppError::InvalidRequest(format!(
            "Tenant id must be a lowercase DNS label: {tenant_id}"
        )));
    }

    let now = Utc::now();
    let tenant = Tenant {
        id: tenant_id.to_string(),
        title: title.to_string(),
        created_at: now.naive_utc(),
    };
    state.store.tenants.create(&tenant).await?;
    state.keys.provision(tenant_id, now).await?;

    tracing::info!(tenant = tenant_id, "provisioned tenant");
    Ok(tenant)
}

pub async fn create_account(
    state: &AppState,
    tenant_id: &str,
    new: NewAccount,
) -> Result<Account, AppError> {
    let password_hash = new.password.as_deref().map(hash_password).transpose()?;
    let now = Utc::now().naive_utc();
    let account = Account {
        id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        tenant_id: tenant_id.to_string(),
        account_type: new.account_type.unwrap_or(AccountType::User),
        username: new.username,
        email: new.email,
        password_hash,
        given_name: new.given_name,
        family_name: new.family_name,
        roles: new.roles,
        created_at: now,
        updated_at: now,
    };
    state.store.accounts.create(&account).await?;
    Ok(account)
}

pub async fn register_client(
    state: &AppState,
    tenant_id: &str,
    new: NewClient,
) -> Result<RegisteredClient, AppError> {
    let client_secret = new.client_secret.unwrap_or_else(generate_client_secret);
    let client_id = new.client_id.unwrap_or_else(|| {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("app_{}", &id[..24])
    });

    let now = Utc::now().naive_utc();
    let client = Client {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        name: new.name,
        client_id,
        client_secret_hash: hash_token(&client_secret),
        redirect_uris: new.redirect_uris,
        grant_types: new.grant_types,
        allowed_scopes: new.allowed_scopes,
        access_token_expires_in: new.access_token_expires_in,
        service_account_id: new.service_account_id,
        rotate_refresh_tokens: new.rotate_refresh_tokens,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    state.store.clients.create(&client).await?;

    Ok(RegisteredClient {
        client,
        client_secret,
    })
}

/// Idempotently set up a tenant with a service account and a default
/// client bound to it.
pub async fn bootstrap(
    state: &AppState,
    tenant_id: &str,
    redirect_uri: &str,
) -> Result<SeedResult, AppError> {
    let tenant_created = match state.store.tenants.find(tenant_id).await? {
        Some(_) => false,
        None => {
            provision_tenant(state, tenant_id, tenant_id).await?;
            true
        }
    };

    let service_username = format!("service-account@{tenant_id}");
    let service_account = match state
        .store
        .accounts
        .find_by_username(tenant_id, &service_username)
        .await?
    {
        Some(account) => account,
        None => {
            create_account(
                state,
                tenant_id,
                NewAccount {
                    account_type: Some(AccountType::ServiceAccount),
                    username: service_username,
                    given_name: "Service".to_string(),
                    family_name: "Account".to_string(),
                    ..Default::default()
                },
            )
            .await?
        }
    };

    let default_client_id = format!("{tenant_id}-default");
    let (client_id, client_secret) = match state
        .store
        .clients
        .find_by_client_id(tenant_id, &default_client_id)
        .await?
    {
        Some(client) => (client.client_id, None),
        None => {
            let registered = register_client(
                state,
                tenant_id,
                NewClient {
                    client_id: Some(default_client_id),
                    redirect_uris: vec![redirect_uri.to_string()],
                    service_account_id: Some(service_account.id.clone()),
                    ..Default::default()
                },
            )
            .await?;
            (registered.client.client_id, Some(registered.client_secret))
        }
    };

    Ok(SeedResult {
        tenant_id: tenant_id.to_string(),
        tenant_created,
        client_id,
        client_secret,
        service_account_id: service_account.id,
    })
}

#[cfg(test)]
mod tests {
    use super::is_valid_tenant_id;

    #[test]
    fn tenant_ids_are_dns_labels() {
        assert!(is_valid_tenant_id("acme"));
        assert!(is_valid_tenant_id("acme-2"));
        assert!(!is_valid_tenant_id("Acme"));
        assert!(!is_valid_tenant_id("acme.corp"));
        assert!(!is_valid_tenant_id("-acme"));
        assert!(!is_valid_tenant_id(""));
    }
}
