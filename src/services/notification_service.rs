use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::models::OtpSubject;

/// Out-of-band delivery request for a freshly issued code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpNotification {
    pub subject: OtpSubject,
    pub code: String,
    pub masked_contact: String,
    pub expires_at: DateTime<Utc>,
}

/// Delivery seam for OTP codes. Implementations must return immediately;
/// anything slow happens off the caller's task.
pub trait NotificationChannel: Send + Sync {
    fn notify(&self, notification: &OtpNotification);
}

/// Writes codes to the log. Development default.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl NotificationChannel for LogNotifier {
    fn notify(&self, notification: &OtpNotification) {
        info!(
            subject = %notification.subject,
            contact = %notification.masked_contact,
            "OTP for {} is {} (expires {})",
            notification.subject,
            notification.code,
            notification.expires_at
        );
    }
}

/// POSTs the notification as JSON to a configured endpoint. Delivery runs on
/// a spawned task; failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http_client: Client,
    endpoint_url: String,
}

impl WebhookNotifier {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            endpoint_url: endpoint_url.into(),
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

impl NotificationChannel for WebhookNotifier {
    fn notify(&self, notification: &OtpNotification) {
        let client = self.http_client.clone();
        let url = self.endpoint_url.clone();
        let payload = notification.clone();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available, dropping OTP webhook for {}", payload.subject);
            return;
        };

        runtime.spawn(async move {
            let result = client
                .post(&url)
                .timeout(std::time::Duration::from_secs(10))
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    info!("OTP webhook delivered for {}", payload.subject);
                }
                Ok(response) => {
                    warn!("OTP webhook for {} returned {}", payload.subject, response.status());
                }
                Err(e) => {
                    warn!("OTP webhook for {} failed: {}", payload.subject, e);
                }
            }
        });
    }
}

/// Keeps every notification in memory. Used by tests to read issued codes.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<OtpNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OtpNotification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Code of the most recent notification for `subject`.
    pub fn last_code_for(&self, subject: &OtpSubject) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|n| &n.subject == subject)
            .map(|n| n.code)
    }
}

impl NotificationChannel for RecordingNotifier {
    fn notify(&self, notification: &OtpNotification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
    }
}

/// Channel selected from settings: the webhook when a URL is configured,
/// the log otherwise.
pub fn channel_from_settings(webhook_url: Option<&str>) -> Arc<dyn NotificationChannel> {
    match webhook_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => {
            info!("OTP notifications go to webhook {}", url);
            Arc::new(WebhookNotifier::new(url))
        }
        None => Arc::new(LogNotifier),
    }
}
