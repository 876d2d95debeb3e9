/// Error types for the streaming service
///
/// Every failure surfaced over HTTP is rendered as
/// `{"error": CODE, "message": ..., "status": ...}`. Server conditions are
/// logged with their detail and answered with a generic message.
use crate::db::StoreError;
use crate::services::streaming::{GatekeeperError, StreamKeyError};
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use jwt_security::TokenError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid stream key format")]
    InvalidStreamKey,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Username already exists")]
    UserExists,

    #[error("Stream is live; end the stream before rotating the key")]
    StreamingInProgress,

    #[error("User not found")]
    UserNotFound,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to generate a unique stream key after {0} attempts")]
    KeyGenerationFailed(usize),

    #[error("User store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidStreamKey => "INVALID_STREAM_KEY",
            AppError::Token(err) => err.code(),
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::AccountDisabled => "ACCOUNT_DISABLED",
            AppError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AppError::UserExists => "USER_EXISTS",
            AppError::StreamingInProgress => "STREAMING_IN_PROGRESS",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::KeyGenerationFailed(_) => "KEY_GENERATION_FAILED",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn is_server_condition(&self) -> bool {
        match self {
            AppError::Token(err) => err.is_server_condition(),
            AppError::Config(_)
            | AppError::KeyGenerationFailed(_)
            | AppError::StoreUnavailable(_)
            | AppError::Internal(_) => true,
            _ => false,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        if self.is_server_condition() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        match self {
            AppError::Validation(_) | AppError::InvalidStreamKey => StatusCode::BAD_REQUEST,
            AppError::Token(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::AccountDisabled | AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::UserExists | AppError::StreamingInProgress => StatusCode::CONFLICT,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if self.is_server_condition() {
            error!(code = self.code(), error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.code(),
            "message": message,
            "status": status.as_u16(),
        }))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AppError::UserExists,
            StoreError::NotFound => AppError::UserNotFound,
            StoreError::DuplicateStreamKey => {
                AppError::Internal("unexpected stream key conflict".to_string())
            }
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
        }
    }
}

impl From<StreamKeyError> for AppError {
    fn from(err: StreamKeyError) -> Self {
        match err {
            StreamKeyError::InvalidFormat => AppError::InvalidStreamKey,
            StreamKeyError::KeyGenerationFailed { attempts } => {
                AppError::KeyGenerationFailed(attempts)
            }
            StreamKeyError::StreamInProgress => AppError::StreamingInProgress,
            StreamKeyError::UserExists => AppError::UserExists,
            StreamKeyError::UserNotFound => AppError::UserNotFound,
            StreamKeyError::StoreUnavailable(msg) => AppError::StoreUnavailable(msg),
        }
    }
}

impl From<GatekeeperError> for AppError {
    fn from(err: GatekeeperError) -> Self {
        match err {
            GatekeeperError::StoreUnavailable(msg) => AppError::StoreUnavailable(msg),
        }
    }
}
