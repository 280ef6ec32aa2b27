pub mod authorize;
pub mod cipher;
pub mod client;
pub mod code;
pub mod grant;
pub mod keys;
pub mod middleware;
pub mod minter;
pub mod oauth2;
pub mod password;
pub mod refresh;
