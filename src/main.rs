use fraudguard::{config::Settings, create_app, AppState};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    init_logging(&settings);

    info!("Starting FraudGuard");

    let state = AppState::from_settings(settings.clone()).await;
    let sweep_handle = state
        .workflow
        .otp_service()
        .start_sweep_task(Duration::from_secs(settings.otp.sweep_interval_seconds));
    let prune_handle = state
        .jwt_service
        .start_prune_task(Duration::from_secs(settings.otp.sweep_interval_seconds));

    let listener = tokio::net::TcpListener::bind((settings.api.host.as_str(), settings.api.port)).await?;
    let addr = listener.local_addr()?;
    let app = create_app(state);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    info!("API server running on {}", addr);
    info!("API endpoints available at:");
    info!("Fraud detection:");
    info!("  POST   /api/fraud/analyze - Score a transaction");
    info!("  POST   /api/fraud/verify-otp - Confirm a pending transaction");
    info!("  POST   /api/fraud/resend-otp - Reissue a transaction OTP");
    info!("  GET    /api/fraud/transactions?userId= - Transaction history");
    info!("  GET    /api/fraud/flagged - Flagged transactions");
    info!("  GET    /api/fraud/metrics - System metrics");
    info!("  POST   /api/fraud/ai-suggestion - Analyst advisory");
    info!("  PUT    /api/fraud/transactions/{{id}}/status - Review a transaction");
    info!("Accounts:");
    info!("  POST   /api/auth/login | /register | /forgot-password");
    info!("  GET    /api/auth/me");
    info!("  PUT    /api/auth/profile");
    info!("  POST   /api/auth/change-password | /logout | /generate-otp | /verify-otp");

    tokio::select! {
        _ = server_handle => {
            error!("Web server stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    sweep_handle.abort();
    prune_handle.abort();
    info!("Shutting down FraudGuard");
    Ok(())
}

fn init_logging(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("fraudguard={},tower_http=info", settings.logging.level).into());

    if settings.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}
