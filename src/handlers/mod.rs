pub mod auth_handlers;
pub mod fraud_handlers;
pub mod health;

pub use auth_handlers::create_auth_routes;
pub use fraud_handlers::create_fraud_routes;
pub use health::{health_check, ping};

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Unwrap a JSON body, turning extractor rejections into validation errors
/// so malformed input gets the same error envelope as everything else.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}
