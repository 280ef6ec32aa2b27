use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const OFFLINE_ACCESS: &str = "offline_access";

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a cryptographically random authorization code.
pub fn generate_auth_code() -> String {
    random_token(32)
}

/// Generate a cryptographically random refresh token.
pub fn generate_refresh_token() -> String {
    random_token(32)
}

pub fn generate_client_secret() -> String {
    random_token(32)
}

/// Key IDs are published in JWKS and must never collide across tenants.
pub fn generate_kid() -> String {
    random_token(24)
}

/// Hash a token with SHA-256 for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verify a PKCE code_verifier against a code_challenge.
pub fn verify_pkce(code_verifier: &str, code_challenge: &str, code_challenge_method: &str) -> bool {
    match code_challenge_method {
        "S256" => {
            let computed = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));
            constant_time_eq(&computed, code_challenge)
        }
        "plain" => constant_time_eq(code_verifier, code_challenge),
        _ => false,
    }
}

pub fn is_supported_pkce_method(method: &str) -> bool {
    matches!(method, "S256" | "plain")
}

/// Split a space-delimited `scope` parameter, dropping duplicates.
pub fn parse_scope(scope: Option<&str>) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for s in scope.unwrap_or_default().split_whitespace() {
        if !scopes.iter().any(|existing| existing == s) {
            scopes.push(s.to_string());
        }
    }
    scopes
}

pub fn join_scope(scopes: &[String]) -> String {
    scopes.join(" ")
}
