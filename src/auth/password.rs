use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::db::models::{Account, AccountType};
use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing error: {e}")))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Resource-owner check for the password grant. Service accounts and
/// accounts without a credential never authenticate this way.
pub fn verify_account_password(account: &Account, password: &str) -> Result<(), AppError> {
    if account.account_type != AccountType::User {
        return Err(AppError::InvalidCredential);
    }
    let hash = account
        .password_hash
        .as_deref()
        .ok_or(AppError::InvalidCredential)?;
    if verify_password(password, hash)? {
        Ok(())
    } else {
        Err(AppError::InvalidCredential)
    }
}
