//! sea-orm backed implementations of the storage traits.

mod access_tokens;
mod accounts;
mod applications;
mod auth_codes;
mod refresh_tokens;
mod sessions;
mod signing_keys;
mod tenants;

use sea_orm::DatabaseConnection;

use crate::error::AppError;

pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn encode_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn decode_list(raw: &str) -> Result<Vec<String>, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(format!("Corrupt list column {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_columns_round_trip() {
        let scopes = vec!["openid".to_string(), "offline_access".to_string()];
        assert_eq!(decode_list(&encode_list(&scopes)).unwrap(), scopes);
    }

    #[test]
    fn corrupt_list_column_is_an_error() {
        assert!(matches!(decode_list("openid profile"), Err(AppError::Internal(_))));
        assert!(matches!(decode_list(""), Err(AppError::Internal(_))));
    }
}
