pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

pub use error::types::*;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{JwtConfig, JwtService};
use crate::config::Settings;
use crate::services::{
    channel_from_settings, AdvisoryService, ConfirmationWorkflow, NotificationChannel, UserDirectory,
};
use crate::utils::time::{system_clock, Clock};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub workflow: ConfirmationWorkflow,
    pub directory: UserDirectory,
    pub advisory: AdvisoryService,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    /// Production wiring: wall clock, notifier chosen from settings.
    pub async fn from_settings(settings: Settings) -> Self {
        let notifier = channel_from_settings(settings.notifications.webhook_url.as_deref());
        Self::with_parts(settings, notifier, system_clock()).await
    }

    pub async fn with_parts(
        settings: Settings,
        notifier: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let directory = if settings.auth.seed_demo_users {
            UserDirectory::with_demo_users().await
        } else {
            UserDirectory::new()
        };
        let workflow = ConfirmationWorkflow::from_settings(&settings, directory.clone(), notifier, clock);
        let jwt_service = Arc::new(JwtService::new(JwtConfig::from(&settings.auth)));

        Self {
            settings,
            workflow,
            directory,
            advisory: AdvisoryService::new(),
            jwt_service,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/ping", get(handlers::ping))
        .nest("/api/fraud", handlers::create_fraud_routes(state.jwt_service.clone()))
        .nest("/api/auth", handlers::create_auth_routes(state.jwt_service.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
