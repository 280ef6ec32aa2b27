use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Client authentication failed")]
    InvalidClient,

    #[error("Redirect URI is not registered for this client")]
    InvalidRedirectUri,

    /// Covers unknown, expired, consumed and mismatched codes and refresh
    /// tokens alike so callers cannot tell them apart.
    #[error("The provided grant is invalid, expired, or revoked")]
    InvalidGrant,

    #[error("Unsupported grant_type")]
    UnsupportedGrantType,

    #[error("Client is not allowed to use this grant")]
    UnauthorizedClient,

    #[error("Unsupported response_type")]
    UnsupportedResponseType,

    #[error("Invalid scope")]
    InvalidScope,

    #[error("Invalid username or password")]
    InvalidCredential,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// Status code and stable error name exposed on the wire.
    pub fn status_and_name(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidClient => (StatusCode::UNAUTHORIZED, "InvalidClient"),
            AppError::InvalidRedirectUri => (StatusCode::BAD_REQUEST, "InvalidRedirectURI"),
            AppError::InvalidGrant => (StatusCode::BAD_REQUEST, "InvalidGrant"),
            AppError::UnsupportedGrantType => (StatusCode::BAD_REQUEST, "UnsupportedGrantType"),
            AppError::UnauthorizedClient => (StatusCode::BAD_REQUEST, "UnauthorizedClient"),
            AppError::UnsupportedResponseType => {
                (StatusCode::BAD_REQUEST, "UnsupportedResponseType")
            }
            AppError::InvalidScope => (StatusCode::BAD_REQUEST, "InvalidScope"),
            AppError::InvalidCredential => (StatusCode::BAD_REQUEST, "InvalidCredential"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::TenantNotFound => (StatusCode::NOT_FOUND, "TenantNotFound"),
            AppError::MissingConfiguration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "MissingConfiguration")
            }
            AppError::Internal(_) | AppError::Database(_) | AppError::Jwt(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, name) = self.status_and_name();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed with {status}");
            match self {
                AppError::MissingConfiguration(_) => "Server is not configured for this tenant",
                _ => "Internal server error",
            }
            .to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "error": {
                "status": status.as_u16(),
                "name": name,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
