use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::{
    auth::{jwt_auth_middleware, AuthContext, JwtService, SessionResponse},
    error::AppError,
    handlers::json_body,
    models::UserInfo,
    services::user_directory::validate_email,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyUserOtpRequest {
    pub otp: String,
}

const RESET_LINK_MESSAGE: &str = "If the email exists, a reset link has been sent";

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, AppError> {
    let request = json_body(payload)?;
    validate_email(&request.email)?;
    if request.password.is_empty() {
        return Err(AppError::ValidationError("Password is required".to_string()));
    }

    let user = state.directory.authenticate(&request.email, &request.password).await?;
    let (token, claims) = state.jwt_service.generate_token(&user).await?;

    info!("User {} logged in", user.id);
    Ok(Json(state.jwt_service.session_response("Login successful", token, &claims, &user)))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let request = json_body(payload)?;
    let user = state
        .directory
        .register(&request.name, &request.email, &request.password)
        .await?;
    let (token, claims) = state.jwt_service.generate_token(&user).await?;

    Ok((
        StatusCode::CREATED,
        Json(state.jwt_service.session_response("Registration successful", token, &claims, &user)),
    ))
}

/// Same answer whether or not the address is known.
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    validate_email(&request.email)?;

    if let Some(user) = state.directory.find_by_email(&request.email).await {
        info!("Password reset requested for user {}", user.id);
    }

    Ok(Json(json!({ "success": true, "message": RESET_LINK_MESSAGE })))
}

pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .directory
        .get(auth.user_id())
        .await
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "success": true, "user": UserInfo::from(&user) })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    let user = state
        .directory
        .update_profile(auth.user_id(), &request.name, &request.email)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": UserInfo::from(&user)
    })))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    state
        .directory
        .change_password(auth.user_id(), &request.current_password, &request.new_password)
        .await?;

    Ok(Json(json!({ "success": true, "message": "Password changed successfully" })))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Value>, AppError> {
    state.jwt_service.revoke_token(&auth.token, auth.claims.exp).await?;
    info!("User {} logged out", auth.user_id());
    Ok(Json(json!({ "success": true, "message": "Logout successful" })))
}

pub async fn generate_otp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Json<Value> {
    let dispatch = state.workflow.issue_user_otp(auth.user_id()).await;

    Json(json!({
        "success": true,
        "message": "OTP generated successfully",
        "otpId": dispatch.otp_id,
        "maskedContact": dispatch.masked_contact,
        "expiresIn": dispatch.expires_in
    }))
}

pub async fn verify_user_otp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<VerifyUserOtpRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    if request.otp.trim().is_empty() {
        return Err(AppError::ValidationError("OTP is required".to_string()));
    }

    let verified_at = state.workflow.verify_user_otp(auth.user_id(), &request.otp).await?;
    Ok(Json(json!({
        "success": true,
        "message": "OTP verified successfully",
        "verifiedAt": verified_at
    })))
}

pub fn create_auth_routes(jwt_service: Arc<JwtService>) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(current_user))
        .route("/profile", put(update_profile))
        .route("/change-password", post(change_password))
        .route("/logout", post(logout))
        .route("/generate-otp", post(generate_otp))
        .route("/verify-otp", post(verify_user_otp))
        .route_layer(middleware::from_fn_with_state(jwt_service, jwt_auth_middleware));

    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/forgot-password", post(forgot_password))
        .merge(protected)
}
