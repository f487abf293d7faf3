//! Transaction confirmation state machine.
//!
//! ```text
//! SUBMITTED -> SCORED -> APPROVED
//!                     -> AWAITING_OTP -> APPROVED            (verify)
//!                                     -> AWAITING_OTP        (mismatch, expiry, resend)
//!                                     -> BLOCKED | INVESTIGATING (review)
//! ```
//!
//! Every mutation (analysis, verification, resend, review, user OTP issue
//! and verify) runs under one workflow-wide lock, so a transaction's status
//! and its OTP challenge always change together. Reads go straight to the
//! ledger.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::AppError;
use crate::models::{
    OtpSubject, SystemMetrics, Transaction, TransactionId, TransactionRequest, TransactionStatus,
};
use crate::services::notification_service::{NotificationChannel, OtpNotification};
use crate::services::otp_service::{OtpConfig, OtpError, OtpService};
use crate::services::risk_scorer::{RiskAssessment, RiskScorer, ScoringContext, ScoringRules};
use crate::services::transaction_ledger::TransactionLedger;
use crate::services::user_directory::UserDirectory;
use crate::utils::masking::{mask_email, mask_user_key};
use crate::utils::time::{local_hour, offset_from_minutes, Clock};

/// Result of submitting a transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub transaction: Transaction,
    pub assessment: RiskAssessment,
    /// Seconds until the issued OTP lapses, when one was issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_expires_in: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpDispatch {
    pub otp_id: String,
    pub masked_contact: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub frequency_window: Duration,
    pub flag_threshold: u32,
    pub utc_offset: Option<FixedOffset>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig::from(&Settings::default())
    }
}

impl From<&Settings> for WorkflowConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            frequency_window: Duration::seconds(settings.risk.frequency_window_seconds),
            flag_threshold: settings.risk.flag_threshold,
            utc_offset: settings.risk.utc_offset_minutes.and_then(offset_from_minutes),
        }
    }
}

#[derive(Clone)]
pub struct ConfirmationWorkflow {
    config: WorkflowConfig,
    scorer: RiskScorer,
    otp: OtpService,
    ledger: TransactionLedger,
    directory: UserDirectory,
    notifier: Arc<dyn NotificationChannel>,
    clock: Arc<dyn Clock>,
    transitions: Arc<Mutex<()>>,
}

impl ConfirmationWorkflow {
    pub fn new(
        config: WorkflowConfig,
        scorer: RiskScorer,
        otp: OtpService,
        ledger: TransactionLedger,
        directory: UserDirectory,
        notifier: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            scorer,
            otp,
            ledger,
            directory,
            notifier,
            clock,
            transitions: Arc::new(Mutex::new(())),
        }
    }

    /// Wire every component from settings around a shared clock.
    pub fn from_settings(
        settings: &Settings,
        directory: UserDirectory,
        notifier: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            WorkflowConfig::from(settings),
            RiskScorer::new(ScoringRules::from(&settings.risk)),
            OtpService::new(OtpConfig::from(&settings.otp), clock.clone()),
            TransactionLedger::new(),
            directory,
            notifier,
            clock,
        )
    }

    pub fn otp_service(&self) -> &OtpService {
        &self.otp
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    /// Score a submitted transaction and record it, issuing an OTP challenge
    /// when the score calls for one.
    pub async fn analyze(&self, request: TransactionRequest) -> Result<AnalysisOutcome, AppError> {
        RiskScorer::validate(&request)?;

        let _guard = self.transitions.lock().await;
        let now = self.clock.now();

        let recent = self
            .ledger
            .recent_count(&request.user_id, now - self.config.frequency_window)
            .await;
        let context = ScoringContext {
            recent_transactions: recent,
            local_hour: local_hour(now, self.config.utc_offset),
        };
        let assessment = self.scorer.score(&request, context);

        let id = TransactionId::generate(now);
        let status = if assessment.requires_otp {
            TransactionStatus::PendingOtp
        } else {
            TransactionStatus::Approved
        };

        let challenge = if assessment.requires_otp {
            Some(self.otp.issue(OtpSubject::Transaction(id.clone())).await)
        } else {
            None
        };

        let transaction = Transaction {
            id: id.clone(),
            amount: request.amount,
            recipient: request.recipient,
            user_id: request.user_id,
            location: request.location,
            created_at: now,
            anomaly_score: assessment.anomaly_score,
            flags: assessment.flags.clone(),
            risk_level: assessment.risk_level,
            status,
            otp_verified_at: None,
        };

        if let Err(e) = self.ledger.append(transaction.clone()).await {
            if let Some(challenge) = &challenge {
                self.otp.revoke(&challenge.subject).await;
            }
            return Err(e.into());
        }

        info!(
            "Analyzed transaction {} for {}: score {} ({}), status {}",
            id,
            transaction.user_id,
            assessment.anomaly_score,
            assessment.risk_level.as_str(),
            status
        );

        let otp_expires_in = match challenge {
            Some(challenge) => {
                let masked_contact = self.masked_contact(&transaction.user_id).await;
                self.notifier.notify(&OtpNotification {
                    subject: challenge.subject.clone(),
                    code: challenge.code.clone(),
                    masked_contact,
                    expires_at: challenge.expires_at,
                });
                Some(challenge.expires_in_seconds(now))
            }
            None => None,
        };

        Ok(AnalysisOutcome {
            transaction,
            assessment,
            otp_expires_in,
        })
    }

    /// Confirm a pending transaction with its OTP. The status only changes on
    /// success; every failure leaves the transaction as it was.
    pub async fn verify_otp(&self, id: &TransactionId, code: &str) -> Result<Transaction, AppError> {
        let _guard = self.transitions.lock().await;

        let transaction = self
            .ledger
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", id)))?;

        let subject = OtpSubject::Transaction(id.clone());
        let verified_at = match self.otp.verify(&subject, code).await {
            Ok(at) => at,
            // A pending transaction always holds a challenge until it expires
            // and is swept, so a missing one here is an expired code.
            Err(OtpError::NotFound { .. }) if transaction.status == TransactionStatus::PendingOtp => {
                warn!("OTP for {} expired and was swept", id);
                return Err(AppError::OtpExpired(format!("OTP for transaction {} has expired", id)));
            }
            Err(e) => {
                warn!("OTP verification failed for {}: {}", id, e);
                return Err(e.into());
            }
        };

        let transaction = self.ledger.record_verification(id, verified_at).await?;
        info!("Transaction {} approved by OTP", id);
        Ok(transaction)
    }

    /// Issue a fresh challenge for a transaction still awaiting its OTP.
    pub async fn resend_otp(&self, id: &TransactionId) -> Result<OtpDispatch, AppError> {
        let _guard = self.transitions.lock().await;

        let transaction = self
            .ledger
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", id)))?;
        if transaction.status != TransactionStatus::PendingOtp {
            return Err(AppError::Conflict(format!(
                "transaction {} is {}, not awaiting OTP",
                id, transaction.status
            )));
        }

        let challenge = self.otp.issue(OtpSubject::Transaction(id.clone())).await;
        let masked_contact = self.masked_contact(&transaction.user_id).await;
        self.notifier.notify(&OtpNotification {
            subject: challenge.subject.clone(),
            code: challenge.code.clone(),
            masked_contact: masked_contact.clone(),
            expires_at: challenge.expires_at,
        });

        Ok(OtpDispatch {
            otp_id: challenge.subject.to_string(),
            masked_contact,
            expires_in: challenge.expires_in_seconds(self.clock.now()),
        })
    }

    /// Reviewer-driven status change. A pending transaction can be blocked or
    /// sent to investigation here, but only its OTP can approve it.
    pub async fn review(&self, id: &TransactionId, status: TransactionStatus) -> Result<Transaction, AppError> {
        let _guard = self.transitions.lock().await;

        let current = self
            .ledger
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", id)))?;

        if current.status == TransactionStatus::PendingOtp && status == TransactionStatus::Approved {
            return Err(AppError::Conflict(format!(
                "transaction {} can only be approved by OTP verification",
                id
            )));
        }

        let updated = self.ledger.set_status(id, status).await?;
        if current.status == TransactionStatus::PendingOtp {
            self.otp.revoke(&OtpSubject::Transaction(id.clone())).await;
        }
        Ok(updated)
    }

    /// Transactions newest first, for one user or for everyone.
    pub async fn history(&self, user_id: Option<&str>) -> Vec<Transaction> {
        match user_id.map(str::trim).filter(|u| !u.is_empty()) {
            Some(user_id) => self.ledger.list_by_user(user_id).await,
            None => self.ledger.list_all().await,
        }
    }

    pub async fn flagged(&self) -> Vec<Transaction> {
        self.ledger.list_flagged(self.config.flag_threshold).await
    }

    pub async fn metrics(&self) -> SystemMetrics {
        self.ledger.aggregate_metrics(self.config.flag_threshold).await
    }

    /// Issue an account-level OTP (step-up for the signed-in user).
    pub async fn issue_user_otp(&self, user_id: &str) -> OtpDispatch {
        let _guard = self.transitions.lock().await;

        let challenge = self.otp.issue(OtpSubject::User(user_id.to_string())).await;
        let masked_contact = self.masked_contact(user_id).await;
        self.notifier.notify(&OtpNotification {
            subject: challenge.subject.clone(),
            code: challenge.code.clone(),
            masked_contact: masked_contact.clone(),
            expires_at: challenge.expires_at,
        });

        OtpDispatch {
            otp_id: challenge.subject.to_string(),
            masked_contact,
            expires_in: challenge.expires_in_seconds(challenge.issued_at),
        }
    }

    pub async fn verify_user_otp(&self, user_id: &str, code: &str) -> Result<DateTime<Utc>, AppError> {
        let _guard = self.transitions.lock().await;
        let verified_at = self
            .otp
            .verify(&OtpSubject::User(user_id.to_string()), code)
            .await?;
        Ok(verified_at)
    }

    async fn masked_contact(&self, user_id: &str) -> String {
        match self.directory.get(user_id).await {
            Some(user) => mask_email(&user.email),
            None => mask_user_key(user_id),
        }
    }
}
