use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub title: String,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    User,
    ServiceAccount,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::User => "user",
            AccountType::ServiceAccount => "service_account",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "service_account" => AccountType::ServiceAccount,
            _ => AccountType::User,
        }
    }
}

/// Resource owner. Service accounts carry no password.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub tenant_id: String,
    pub account_type: AccountType,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub given_name: String,
    pub family_name: String,
    pub roles: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Account {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }
}

/// A registered OAuth application.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub client_id: String,
    pub client_secret_hash: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub access_token_expires_in: i64,
    pub service_account_id: Option<String>,
    pub rotate_refresh_tokens: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyUse {
    #[serde(rename = "sig")]
    Sign,
    #[serde(rename = "enc")]
    Encrypt,
}

impl KeyUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyUse::Sign => "sig",
            KeyUse::Encrypt => "enc",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "enc" => KeyUse::Encrypt,
            _ => KeyUse::Sign,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningKey {
    pub id: String,
    pub tenant_id: String,
    pub kid: String,
    pub algorithm: String,
    pub key_use: KeyUse,
    pub private_key_encrypted: String,
    pub public_key_pem: String,
    pub is_active: bool,
    /// Set when the key is retired; it stays published until then.
    pub expires_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl SigningKey {
    pub fn is_published(&self, now: NaiveDateTime) -> bool {
        self.key_use == KeyUse::Sign && self.expires_at.map_or(true, |exp| now < exp)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code_hash: String,
    pub tenant_id: String,
    pub app_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub expires_at: NaiveDateTime,
    pub consumed: bool,
    pub created_at: NaiveDateTime,
}

/// Persisted record of an issued access token; `id` is the JWT's `jti`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    pub id: String,
    pub tenant_id: String,
    pub app_id: String,
    pub user_id: String,
    pub scopes: Vec<String>,
    pub token: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    pub tenant_id: String,
    pub app_id: String,
    pub user_id: String,
    pub token_hash: String,
    pub scopes: Vec<String>,
    pub expires_at: NaiveDateTime,
    pub revoked: bool,
    /// Set when a rotation revoked the token; only such a revocation may be
    /// undone.
    pub superseded: bool,
    pub created_at: NaiveDateTime,
}

/// Browser session established by the sign-in surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}
