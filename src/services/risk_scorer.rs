//! Heuristic transaction scoring.
//!
//! Each rule adds a fixed weight and names itself in the flag list when it
//! fires. Rules are independent and additive; the sum is not capped, only the
//! tier lookup saturates at 100.

use serde::{Deserialize, Serialize};

use crate::config::RiskSettings;
use crate::error::AppError;
use crate::models::{RiskLevel, TransactionRequest};

pub const VERY_HIGH_AMOUNT_WEIGHT: u32 = 50;
pub const HIGH_AMOUNT_WEIGHT: u32 = 30;
pub const SUSPICIOUS_RECIPIENT_WEIGHT: u32 = 25;
pub const HIGH_FREQUENCY_WEIGHT: u32 = 40;
pub const MODERATE_FREQUENCY_WEIGHT: u32 = 20;
pub const NO_LOCATION_WEIGHT: u32 = 15;
pub const UNUSUAL_TIME_WEIGHT: u32 = 20;

pub const HIGH_FREQUENCY_COUNT: usize = 5;
pub const MODERATE_FREQUENCY_COUNT: usize = 3;

/// Scores strictly above this require OTP confirmation.
pub const OTP_SCORE_THRESHOLD: u32 = 50;

pub const FLAG_VERY_HIGH_AMOUNT: &str = "Very High Amount";
pub const FLAG_HIGH_AMOUNT: &str = "High Amount";
pub const FLAG_SUSPICIOUS_RECIPIENT: &str = "Suspicious Recipient";
pub const FLAG_HIGH_FREQUENCY: &str = "High Frequency";
pub const FLAG_MODERATE_FREQUENCY: &str = "Moderate Frequency";
pub const FLAG_LOCATION_UNAVAILABLE: &str = "Location Unavailable";
pub const FLAG_UNUSUAL_TIME: &str = "Unusual Time";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub anomaly_score: u32,
    pub flags: Vec<String>,
    pub risk_level: RiskLevel,
    pub requires_otp: bool,
}

/// Configurable parts of the rule set. Weights and tier thresholds are fixed.
#[derive(Debug, Clone)]
pub struct ScoringRules {
    pub very_high_amount: f64,
    pub high_amount: f64,
    pub suspicious_keywords: Vec<String>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        ScoringRules::from(&RiskSettings::default())
    }
}

impl From<&RiskSettings> for ScoringRules {
    fn from(settings: &RiskSettings) -> Self {
        Self {
            very_high_amount: settings.very_high_amount,
            high_amount: settings.high_amount,
            suspicious_keywords: settings
                .suspicious_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }
}

/// Everything a scoring pass looks at besides the request itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext {
    /// Prior transactions by the same user inside the frequency window
    pub recent_transactions: usize,
    /// Hour of day (0-23) in the configured timezone
    pub local_hour: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    rules: ScoringRules,
}

impl RiskScorer {
    pub fn new(rules: ScoringRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Reject malformed input before any scoring happens.
    pub fn validate(request: &TransactionRequest) -> Result<(), AppError> {
        if !request.amount.is_finite() || request.amount < 0.0 {
            return Err(AppError::ValidationError(
                "amount must be a non-negative number".to_string(),
            ));
        }
        if request.recipient.trim().is_empty() {
            return Err(AppError::ValidationError("recipient is required".to_string()));
        }
        if request.user_id.trim().is_empty() {
            return Err(AppError::ValidationError("userId is required".to_string()));
        }
        if let Some(location) = &request.location {
            let lat_ok = location.lat.is_finite() && (-90.0..=90.0).contains(&location.lat);
            let lng_ok = location.lng.is_finite() && (-180.0..=180.0).contains(&location.lng);
            if !lat_ok || !lng_ok {
                return Err(AppError::ValidationError(
                    "location must hold a valid lat/lng pair".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn score(&self, request: &TransactionRequest, context: ScoringContext) -> RiskAssessment {
        let mut score = 0u32;
        let mut flags = Vec::new();

        let mut apply = |fired: bool, weight: u32, flag: &str| {
            if fired {
                score += weight;
                flags.push(flag.to_string());
            }
        };

        let amount = request.amount;
        apply(amount > self.rules.very_high_amount, VERY_HIGH_AMOUNT_WEIGHT, FLAG_VERY_HIGH_AMOUNT);
        apply(
            amount > self.rules.high_amount && amount <= self.rules.very_high_amount,
            HIGH_AMOUNT_WEIGHT,
            FLAG_HIGH_AMOUNT,
        );
        apply(
            self.is_suspicious_recipient(&request.recipient),
            SUSPICIOUS_RECIPIENT_WEIGHT,
            FLAG_SUSPICIOUS_RECIPIENT,
        );

        let recent = context.recent_transactions;
        apply(recent >= HIGH_FREQUENCY_COUNT, HIGH_FREQUENCY_WEIGHT, FLAG_HIGH_FREQUENCY);
        apply(
            (MODERATE_FREQUENCY_COUNT..HIGH_FREQUENCY_COUNT).contains(&recent),
            MODERATE_FREQUENCY_WEIGHT,
            FLAG_MODERATE_FREQUENCY,
        );

        apply(request.location.is_none(), NO_LOCATION_WEIGHT, FLAG_LOCATION_UNAVAILABLE);
        apply(is_unusual_hour(context.local_hour), UNUSUAL_TIME_WEIGHT, FLAG_UNUSUAL_TIME);

        RiskAssessment {
            anomaly_score: score,
            risk_level: RiskLevel::from_score(score),
            requires_otp: requires_otp(score),
            flags,
        }
    }

    fn is_suspicious_recipient(&self, recipient: &str) -> bool {
        let recipient = recipient.to_lowercase();
        self.rules
            .suspicious_keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && recipient.contains(&keyword.to_lowercase()))
    }
}

/// 22:00 through 05:59 local time.
pub fn is_unusual_hour(hour: u32) -> bool {
    hour >= 22 || hour <= 5
}

pub fn requires_otp(score: u32) -> bool {
    score > OTP_SCORE_THRESHOLD
}
