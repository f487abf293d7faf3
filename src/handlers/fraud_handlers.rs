use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::{
    auth::{jwt_auth_middleware, reviewer_only_middleware, AuthContext, JwtService},
    error::AppError,
    handlers::json_body,
    models::{Transaction, TransactionId, TransactionRequest, TransactionStatus},
    services::{advisory_service::Advisory, risk_scorer::RiskAssessment},
    AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub transaction_id: TransactionId,
    pub result: RiskAssessment,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub transaction_id: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendOtpRequest {
    pub transaction_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub success: bool,
    pub transactions: Vec<Transaction>,
    pub total: usize,
}

impl From<Vec<Transaction>> for TransactionListResponse {
    fn from(transactions: Vec<Transaction>) -> Self {
        Self {
            success: true,
            total: transactions.len(),
            transactions,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub transaction_data: SuggestionSubject,
}

/// Either a score to advise on directly, or the id of a recorded transaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSubject {
    pub anomaly_score: Option<f64>,
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub success: bool,
    #[serde(flatten)]
    pub advisory: Advisory,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: TransactionStatus,
}

pub async fn analyze_transaction(
    State(state): State<AppState>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let request = json_body(payload)?;
    let outcome = state.workflow.analyze(request).await?;

    let message = if outcome.assessment.requires_otp {
        "Transaction flagged as suspicious. OTP verification required."
    } else {
        "Transaction approved."
    };

    Ok(Json(AnalyzeResponse {
        success: true,
        transaction_id: outcome.transaction.id,
        result: outcome.assessment,
        message: message.to_string(),
        otp_expires_in: outcome.otp_expires_in,
    }))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    if request.otp.trim().is_empty() {
        return Err(AppError::ValidationError("OTP is required".to_string()));
    }

    let id = TransactionId::from(request.transaction_id.trim());
    let transaction = state.workflow.verify_otp(&id, &request.otp).await?;

    Ok(Json(json!({
        "success": true,
        "message": "OTP verified successfully. Transaction approved.",
        "transactionId": transaction.id,
        "verifiedAt": transaction.otp_verified_at
    })))
}

pub async fn resend_otp(
    State(state): State<AppState>,
    payload: Result<Json<ResendOtpRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    let id = TransactionId::from(request.transaction_id.trim());
    let dispatch = state.workflow.resend_otp(&id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "A new OTP has been sent.",
        "maskedContact": dispatch.masked_contact,
        "expiresIn": dispatch.expires_in
    })))
}

pub async fn transaction_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<TransactionListResponse> {
    let transactions = state.workflow.history(query.user_id.as_deref()).await;
    Json(transactions.into())
}

pub async fn flagged_transactions(State(state): State<AppState>) -> Json<TransactionListResponse> {
    Json(state.workflow.flagged().await.into())
}

pub async fn system_metrics(State(state): State<AppState>) -> Json<Value> {
    let metrics = state.workflow.metrics().await;
    Json(json!({ "success": true, "metrics": metrics }))
}

pub async fn ai_suggestion(
    State(state): State<AppState>,
    payload: Result<Json<SuggestionRequest>, JsonRejection>,
) -> Result<Json<SuggestionResponse>, AppError> {
    let subject = json_body(payload)?.transaction_data;

    let score = match (subject.anomaly_score, subject.id) {
        (Some(score), _) if score.is_finite() => score.max(0.0).ceil() as u32,
        (_, Some(id)) => {
            state
                .workflow
                .ledger()
                .get(&TransactionId::from(id.as_str()))
                .await
                .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", id)))?
                .anomaly_score
        }
        _ => {
            return Err(AppError::ValidationError(
                "transactionData needs an anomalyScore or an id".to_string(),
            ))
        }
    };

    Ok(Json(SuggestionResponse {
        success: true,
        advisory: state.advisory.advise(score),
    }))
}

pub async fn update_transaction_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = json_body(payload)?;
    let id = TransactionId::from(id);
    let transaction = state.workflow.review(&id, request.status).await?;

    info!("Reviewer {} set {} to {}", auth.user_id(), id, transaction.status);
    Ok(Json(json!({
        "success": true,
        "message": format!("Transaction status updated to {}", transaction.status),
        "transaction": transaction
    })))
}

pub fn create_fraud_routes(jwt_service: Arc<JwtService>) -> Router<AppState> {
    let review_routes = Router::new()
        .route("/transactions/:id/status", put(update_transaction_status))
        .route_layer(middleware::from_fn(reviewer_only_middleware))
        .route_layer(middleware::from_fn_with_state(jwt_service, jwt_auth_middleware));

    Router::new()
        .route("/analyze", post(analyze_transaction))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/transactions", get(transaction_history))
        .route("/flagged", get(flagged_transactions))
        .route("/metrics", get(system_metrics))
        .route("/ai-suggestion", post(ai_suggestion))
        .merge(review_routes)
}
