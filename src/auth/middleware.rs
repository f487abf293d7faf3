//! Bearer-token middleware for axum

use crate::auth::claims::{AuthContext, Permission, TokenValidation};
use crate::auth::jwt::JwtService;
use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Reject requests without a valid bearer token; attach `AuthContext` otherwise.
pub async fn jwt_auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationError("Access token required".to_string()))?;

    let token = JwtService::extract_token_from_header(auth_header)
        .ok_or_else(|| AppError::AuthenticationError("Malformed authorization header".to_string()))?
        .to_string();

    match jwt_service.validate_token(&token).await? {
        TokenValidation::Valid(claims) => {
            request.extensions_mut().insert(AuthContext::new(claims, token));
            Ok(next.run(request).await)
        }
        TokenValidation::Expired => Err(AppError::AuthenticationError("Token expired".to_string())),
        TokenValidation::Revoked => Err(AppError::AuthenticationError("Token revoked".to_string())),
        TokenValidation::Invalid(reason) => {
            debug!("Rejected token: {}", reason);
            Err(AppError::AuthenticationError("Invalid token".to_string()))
        }
    }
}

/// Must run after `jwt_auth_middleware`. Admins and analysts only.
pub async fn reviewer_only_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    let auth_context = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| AppError::AuthenticationError("Access token required".to_string()))?;

    if !auth_context.has_permission(Permission::ReviewTransactions) {
        return Err(AppError::AuthorizationError(
            "Reviewer role required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
