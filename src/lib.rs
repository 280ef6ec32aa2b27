pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod seed;

use auth::authorize::AuthorizationEndpoint;
use auth::cipher::KeyCipher;
use auth::client::ClientRegistry;
use auth::code::AuthorizationCodeIssuer;
use auth::grant::GrantDispatcher;
use auth::keys::SigningKeyProvider;
use auth::minter::TokenMinter;
use auth::refresh::RefreshTokenRotator;
use config::Config;
use db::Store;
use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub clients: ClientRegistry,
    pub keys: SigningKeyProvider,
    pub codes: AuthorizationCodeIssuer,
    pub refresh_tokens: RefreshTokenRotator,
    pub minter: TokenMinter,
    pub grants: GrantDispatcher,
    pub authorization: AuthorizationEndpoint,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Result<Self, AppError> {
        let cipher = KeyCipher::from_base64(&config.key_encryption_key)?;

        let clients = ClientRegistry::new(store.clone());
        let keys = SigningKeyProvider::new(store.clone(), cipher, config.retired_key_ttl_days);
        let codes = AuthorizationCodeIssuer::new(store.clone(), config.authorization_code_ttl_secs);
        let refresh_tokens = RefreshTokenRotator::new(store.clone(), config.refresh_token_ttl_days);
        let minter = TokenMinter::new(
            store.clone(),
            keys.clone(),
            refresh_tokens.clone(),
            config.clone(),
        );
        let grants = GrantDispatcher::new(
            store.clone(),
            clients.clone(),
            codes.clone(),
            refresh_tokens.clone(),
            minter.clone(),
        );
        let authorization = AuthorizationEndpoint::new(
            store.clone(),
            clients.clone(),
            codes.clone(),
            minter.clone(),
            config.signin_path.clone(),
        );

        Ok(Self {
            store,
            config,
            clients,
            keys,
            codes,
            refresh_tokens,
            minter,
            grants,
            authorization,
        })
    }
}

impl AsRef<AppState> for AppState {
    fn as_ref(&self) -> &AppState {
        self
    }
}
