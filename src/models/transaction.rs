use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::utils::time::to_unix_millis;

static TRANSACTION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Transaction identifier, `TX<unix-millis><6-digit sequence>`.
///
/// Ids sort by generation time; the process-wide sequence keeps ids minted
/// within the same millisecond distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn generate(at: DateTime<Utc>) -> Self {
        let sequence = TRANSACTION_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1_000_000;
        Self(format!("TX{}{:06}", to_unix_millis(at), sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
}

/// Coarse risk bucket derived from the anomaly score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const CRITICAL_THRESHOLD: u32 = 80;
    pub const HIGH_THRESHOLD: u32 = 60;
    pub const MEDIUM_THRESHOLD: u32 = 40;

    /// Tier lookup. The score saturates at 100 before comparison.
    pub fn from_score(score: u32) -> Self {
        let score = crate::utils::math::clamp_score(score);
        if score >= Self::CRITICAL_THRESHOLD {
            RiskLevel::Critical
        } else if score >= Self::HIGH_THRESHOLD {
            RiskLevel::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    PendingOtp,
    Approved,
    Blocked,
    Investigating,
}

impl TransactionStatus {
    /// Guarded transitions. Nothing moves back into `PendingOtp`, and a
    /// status never transitions to itself.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (PendingOtp, Approved)
                | (PendingOtp, Blocked)
                | (PendingOtp, Investigating)
                | (Approved, Investigating)
                | (Approved, Blocked)
                | (Investigating, Approved)
                | (Investigating, Blocked)
                | (Blocked, Investigating)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::PendingOtp => "pending_otp",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Blocked => "blocked",
            TransactionStatus::Investigating => "investigating",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes submitted for analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub amount: f64,
    pub recipient: String,
    pub user_id: String,
    #[serde(default)]
    pub location: Option<GeoLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: f64,
    pub recipient: String,
    pub user_id: String,
    pub location: Option<GeoLocation>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub anomaly_score: u32,
    pub flags: Vec<String>,
    pub risk_level: RiskLevel,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_verified_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_flagged(&self, threshold: u32) -> bool {
        self.anomaly_score > threshold || !self.flags.is_empty()
    }
}
