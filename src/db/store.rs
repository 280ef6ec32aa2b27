//! Storage capabilities used by the OAuth core.
//!
//! Each entity gets its own trait so the protocol logic never touches a
//! concrete database. One-time flags (`consumed`, `revoked`) are only ever
//! flipped through the conditional `*_if_*` / `mark_*` methods, which report
//! whether this caller performed the transition.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::DatabaseConnection;

use crate::db::memory::MemoryStore;
use crate::db::models::{
    AccessTokenRecord, Account, AuthorizationCode, Client, RefreshToken, Session, SigningKey,
    Tenant,
};
use crate::db::queries::SqlStore;
use crate::error::AppError;

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<Tenant>, AppError>;
    async fn create(&self, tenant: &Tenant) -> Result<(), AppError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn find_by_client_id(
        &self,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<Option<Client>, AppError>;
    async fn create(&self, client: &Client) -> Result<(), AppError>;
}

#[async_trait]
pub trait SigningKeyStore: Send + Sync {
    /// Every key the tenant has ever had, newest first.
    async fn list(&self, tenant_id: &str) -> Result<Vec<SigningKey>, AppError>;
    async fn find_active(&self, tenant_id: &str) -> Result<Option<SigningKey>, AppError>;
    async fn create(&self, key: &SigningKey) -> Result<(), AppError>;
    /// Atomically deactivates the tenant's active sign keys, stamping them
    /// with `retire_at`, and inserts `key` as the new active key.
    async fn rotate(&self, key: &SigningKey, retire_at: NaiveDateTime) -> Result<(), AppError>;
}

#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    async fn find(&self, code_hash: &str) -> Result<Option<AuthorizationCode>, AppError>;
    async fn create(&self, code: &AuthorizationCode) -> Result<(), AppError>;
    /// `unconsumed -> consumed` for a code that has not expired at `now`.
    /// Returns false when another caller got there first.
    async fn mark_consumed(&self, code_hash: &str, now: NaiveDateTime) -> Result<bool, AppError>;
    /// Undo a consumption whose token issuance failed.
    async fn restore(&self, code_hash: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    async fn find(&self, jti: &str) -> Result<Option<AccessTokenRecord>, AppError>;
    async fn create(&self, record: &AccessTokenRecord) -> Result<(), AppError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError>;
    async fn create(&self, token: &RefreshToken) -> Result<(), AppError>;
    /// `active -> superseded` for a rotation. Returns false when the token
    /// was already revoked.
    async fn supersede(&self, id: &str) -> Result<bool, AppError>;
    /// Final revocation; also pins a superseded token so it cannot be
    /// restored. Returns false when there was nothing to change.
    async fn revoke(&self, id: &str) -> Result<bool, AppError>;
    /// `superseded -> active`. A token revoked outright stays revoked.
    async fn restore(&self, id: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find(&self, tenant_id: &str, id: &str) -> Result<Option<Account>, AppError>;
    async fn find_by_username(
        &self,
        tenant_id: &str,
        username: &str,
    ) -> Result<Option<Account>, AppError>;
    async fn create(&self, account: &Account) -> Result<(), AppError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find(&self, tenant_id: &str, id: &str) -> Result<Option<Session>, AppError>;
    async fn create(&self, session: &Session) -> Result<(), AppError>;
}

/// Bundle of storage capabilities handed to every component.
#[derive(Clone)]
pub struct Store {
    pub tenants: Arc<dyn TenantStore>,
    pub clients: Arc<dyn ClientStore>,
    pub signing_keys: Arc<dyn SigningKeyStore>,
    pub codes: Arc<dyn AuthorizationCodeStore>,
    pub access_tokens: Arc<dyn AccessTokenStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Store {
    pub fn relational(db: DatabaseConnection) -> Self {
        Self::from_backend(Arc::new(SqlStore::new(db)))
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::default()))
    }

    fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: TenantStore
            + ClientStore
            + SigningKeyStore
            + AuthorizationCodeStore
            + AccessTokenStore
            + RefreshTokenStore
            + AccountStore
            + SessionStore
            + 'static,
    {
        Self {
            tenants: backend.clone(),
            clients: backend.clone(),
            signing_keys: backend.clone(),
            codes: backend.clone(),
            access_tokens: backend.clone(),
            refresh_tokens: backend.clone(),
            accounts: backend.clone(),
            sessions: backend,
        }
    }
}
