use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;

use crate::db::models::{
    AccessTokenRecord, Account, AuthorizationCode, Client, KeyUse, RefreshToken, Session,
    SigningKey, Tenant,
};
use crate::db::store::{
    AccessTokenStore, AccountStore, AuthorizationCodeStore, ClientStore, RefreshTokenStore,
    SessionStore, SigningKeyStore, TenantStore,
};
use crate::error::AppError;

#[derive(Default)]
struct State {
    tenants: HashMap<String, Tenant>,
    clients: Vec<Client>,
    signing_keys: Vec<SigningKey>,
    codes: HashMap<String, AuthorizationCode>,
    access_tokens: HashMap<String, AccessTokenRecord>,
    refresh_tokens: HashMap<String, RefreshToken>,
    accounts: Vec<Account>,
    sessions: HashMap<String, Session>,
}

/// In-process backend. Every check-and-flip runs under a single lock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn conflict(what: &str) -> AppError {
    AppError::Internal(format!("{what} already exists"))
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn find(&self, id: &str) -> Result<Option<Tenant>, AppError> {
        Ok(self.state.lock().await.tenants.get(id).cloned())
    }

    async fn create(&self, tenant: &Tenant) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.tenants.contains_key(&tenant.id) {
            return Err(conflict("tenant"));
        }
        state.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn find_by_client_id(
        &self,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<Option<Client>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .clients
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.client_id == client_id)
            .cloned())
    }

    async fn create(&self, client: &Client) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state
            .clients
            .iter()
            .any(|c| c.tenant_id == client.tenant_id && c.client_id == client.client_id)
        {
            return Err(conflict("client"));
        }
        state.clients.push(client.clone());
        Ok(())
    }
}

#[async_trait]
impl SigningKeyStore for MemoryStore {
    async fn list(&self, tenant_id: &str) -> Result<Vec<SigningKey>, AppError> {
        let state = self.state.lock().await;
        let mut keys: Vec<SigningKey> = state
            .signing_keys
            .iter()
            .filter(|k| k.tenant_id == tenant_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn find_active(&self, tenant_id: &str) -> Result<Option<SigningKey>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .signing_keys
            .iter()
            .rev()
            .find(|k| k.tenant_id == tenant_id && k.is_active && k.key_use == KeyUse::Sign)
            .cloned())
    }

    async fn create(&self, key: &SigningKey) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.signing_keys.iter().any(|k| k.kid == key.kid) {
            return Err(conflict("signing key"));
        }
        state.signing_keys.push(key.clone());
        Ok(())
    }

    async fn rotate(&self, key: &SigningKey, retire_at: NaiveDateTime) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.signing_keys.iter().any(|k| k.kid == key.kid) {
            return Err(conflict("signing key"));
        }
        for existing in state.signing_keys.iter_mut().filter(|k| {
            k.tenant_id == key.tenant_id && k.is_active && k.key_use == KeyUse::Sign
        }) {
            existing.is_active = false;
            existing.expires_at = Some(retire_at);
        }
        state.signing_keys.push(key.clone());
        Ok(())
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryStore {
    async fn find(&self, code_hash: &str) -> Result<Option<AuthorizationCode>, AppError> {
        Ok(self.state.lock().await.codes.get(code_hash).cloned())
    }

    async fn create(&self, code: &AuthorizationCode) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.codes.contains_key(&code.code_hash) {
            return Err(conflict("authorization code"));
        }
        state.codes.insert(code.code_hash.clone(), code.clone());
        Ok(())
    }

    async fn mark_consumed(&self, code_hash: &str, now: NaiveDateTime) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state.codes.get_mut(code_hash) {
            Some(code) if !code.consumed && now < code.expires_at => {
                code.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore(&self, code_hash: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state.codes.get_mut(code_hash) {
            Some(code) if code.consumed => {
                code.consumed = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl AccessTokenStore for MemoryStore {
    async fn find(&self, jti: &str) -> Result<Option<AccessTokenRecord>, AppError> {
        Ok(self.state.lock().await.access_tokens.get(jti).cloned())
    }

    async fn create(&self, record: &AccessTokenRecord) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.access_tokens.contains_key(&record.id) {
            return Err(conflict("access token"));
        }
        state.access_tokens.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn create(&self, token: &RefreshToken) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state
            .refresh_tokens
            .values()
            .any(|t| t.token_hash == token.token_hash)
        {
            return Err(conflict("refresh token"));
        }
        state.refresh_tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn supersede(&self, id: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state.refresh_tokens.get_mut(id) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                token.superseded = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, id: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state.refresh_tokens.get_mut(id) {
            Some(token) if !token.revoked || token.superseded => {
                token.revoked = true;
                token.superseded = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore(&self, id: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state.refresh_tokens.get_mut(id) {
            Some(token) if token.revoked && token.superseded => {
                token.revoked = false;
                token.superseded = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find(&self, tenant_id: &str, id: &str) -> Result<Option<Account>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.tenant_id == tenant_id && a.id == id)
            .cloned())
    }

    async fn find_by_username(
        &self,
        tenant_id: &str,
        username: &str,
    ) -> Result<Option<Account>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.tenant_id == tenant_id && a.username == username)
            .cloned())
    }

    async fn create(&self, account: &Account) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state
            .accounts
            .iter()
            .any(|a| {
                a.id == account.id
                    || (a.tenant_id == account.tenant_id && a.username == account.username)
            })
        {
            return Err(conflict("account"));
        }
        state.accounts.push(account.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find(&self, tenant_id: &str, id: &str) -> Result<Option<Session>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .get(id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn create(&self, session: &Session) -> Result<(), AppError> {
        self.state
            .lock()
            .await
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }
}
