pub mod access_token;
pub mod account;
pub mod application;
pub mod authorization_code;
pub mod refresh_token;
pub mod session;
pub mod signing_key;
pub mod tenant;
