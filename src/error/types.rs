use std::fmt;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tracing::error;

use crate::services::otp_service::OtpError;
use crate::services::transaction_ledger::LedgerError;
use crate::services::user_directory::DirectoryError;

#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    ValidationError(String),
    NotFound(String),
    OtpExpired(String),
    OtpMismatch(String),
    Conflict(String),
    AuthenticationError(String),
    AuthorizationError(String),
    ConfigError(String),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::OtpExpired(msg) => write!(f, "OTP expired: {}", msg),
            AppError::OtpMismatch(msg) => write!(f, "OTP mismatch: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::AuthenticationError(msg) => write!(f, "Authentication error: {}", msg),
            AppError::AuthorizationError(msg) => write!(f, "Authorization error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::OtpExpired(_) => StatusCode::GONE,
            AppError::OtpMismatch(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ConfigError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind for clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::OtpExpired(_) => "expired",
            AppError::OtpMismatch(_) => "mismatch",
            AppError::Conflict(_) => "conflict",
            AppError::AuthenticationError(_) => "authentication_error",
            AppError::AuthorizationError(_) => "authorization_error",
            AppError::ConfigError(_) => "config_error",
            AppError::InternalError(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                error!("Request failed: {}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "error": self.kind(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::NotFound { .. } => AppError::NotFound(err.to_string()),
            OtpError::Expired { .. } => AppError::OtpExpired(err.to_string()),
            OtpError::Mismatch { .. } => AppError::OtpMismatch(err.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(_) => AppError::NotFound(err.to_string()),
            LedgerError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            LedgerError::Duplicate(_) => AppError::InternalError(err.to_string()),
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::InvalidCredentials => AppError::AuthenticationError(err.to_string()),
            DirectoryError::EmailTaken(_) => AppError::Conflict(err.to_string()),
            DirectoryError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            DirectoryError::Validation(_) => AppError::ValidationError(err.to_string()),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OtpSubject;

    #[test]
    fn test_otp_errors_map_to_distinct_kinds() {
        let subject = OtpSubject::User("user_1".to_string());
        let expired: AppError = OtpError::Expired { subject: subject.clone() }.into();
        let mismatch: AppError = OtpError::Mismatch { subject: subject.clone() }.into();
        let missing: AppError = OtpError::NotFound { subject }.into();

        assert_eq!(expired.kind(), "expired");
        assert_eq!(mismatch.kind(), "mismatch");
        assert_eq!(missing.kind(), "not_found");
        assert_eq!(expired.status_code(), StatusCode::GONE);
    }

    #[test]
    fn test_ledger_and_directory_errors() {
        use crate::models::{TransactionId, TransactionStatus};

        let conflict: AppError = LedgerError::InvalidTransition {
            id: TransactionId::from("TX1"),
            from: TransactionStatus::Blocked,
            to: TransactionStatus::Approved,
        }
        .into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let taken: AppError = DirectoryError::EmailTaken("a@b.com".to_string()).into();
        assert_eq!(taken.status_code(), StatusCode::CONFLICT);

        let creds: AppError = DirectoryError::InvalidCredentials.into();
        assert_eq!(creds.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_error_status() {
        let err = AppError::InternalError("ledger lock poisoned".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
