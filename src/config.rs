use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// Base64 of the 32-byte AES-256-GCM key that wraps tenant private keys.
    pub key_encryption_key: String,
    /// Issuer URL with a `{tenant}` placeholder.
    pub issuer_url_template: String,
    pub signin_path: String,
    pub session_cookie_name: String,
    pub authorization_code_ttl_secs: i64,
    pub refresh_token_ttl_days: i64,
    pub retired_key_ttl_days: i64,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            key_encryption_key: env::var("KEY_ENCRYPTION_KEY")?,
            issuer_url_template: env::var("ISSUER_URL_TEMPLATE")
                .unwrap_or_else(|_| "https://{tenant}.localhost".to_string()),
            signin_path: env::var("SIGNIN_PATH").unwrap_or_else(|_| "/signin".to_string()),
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "_SID".to_string()),
            authorization_code_ttl_secs: env::var("AUTHORIZATION_CODE_TTL_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap_or(600),
            refresh_token_ttl_days: env::var("REFRESH_TOKEN_TTL_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap_or(7),
            retired_key_ttl_days: env::var("RETIRED_KEY_TTL_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap_or(7),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        })
    }

    pub fn issuer_for(&self, tenant_id: &str) -> String {
        self.issuer_url_template.replace("{tenant}", tenant_id)
    }
}
