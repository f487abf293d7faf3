use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Action the advisory leans towards for a given score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    Approve,
    Verify,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advisory {
    pub suggestion: String,
    pub confidence: f64,
    pub recommended_action: RecommendedAction,
}

const CRITICAL_TEXT: &str = "This transaction shows critical risk indicators. We strongly recommend \
blocking this transaction and conducting a thorough investigation. Multiple red flags suggest \
potential fraud activity.";
const HIGH_TEXT: &str = "This transaction appears highly suspicious. Consider requiring additional \
verification steps such as biometric authentication or contacting the user directly before \
proceeding.";
const MODERATE_TEXT: &str = "This transaction shows moderate risk. While it may be legitimate, we \
recommend monitoring the user's activity closely and potentially requiring OTP verification.";
const NORMAL_TEXT: &str = "This transaction appears to be within normal parameters. However, \
continue monitoring for any unusual patterns.";

/// Canned analyst guidance keyed on the anomaly score. Bands are strict:
/// a score of exactly 80 reads as "high", not "critical".
#[derive(Debug, Clone, Default)]
pub struct AdvisoryService;

impl AdvisoryService {
    pub fn new() -> Self {
        Self
    }

    pub fn advise(&self, anomaly_score: u32) -> Advisory {
        let advisory = Advisory {
            suggestion: suggestion_for(anomaly_score).to_string(),
            confidence: rand::thread_rng().gen_range(0.7..1.0),
            recommended_action: action_for(anomaly_score),
        };
        debug!("Advisory for score {}: {:?}", anomaly_score, advisory.recommended_action);
        advisory
    }
}

pub fn suggestion_for(anomaly_score: u32) -> &'static str {
    match anomaly_score {
        s if s > 80 => CRITICAL_TEXT,
        s if s > 60 => HIGH_TEXT,
        s if s > 40 => MODERATE_TEXT,
        _ => NORMAL_TEXT,
    }
}

pub fn action_for(anomaly_score: u32) -> RecommendedAction {
    match anomaly_score {
        s if s > 60 => RecommendedAction::Block,
        s if s > 40 => RecommendedAction::Verify,
        _ => RecommendedAction::Approve,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_bands() {
        assert_eq!(action_for(0), RecommendedAction::Approve);
        assert_eq!(action_for(40), RecommendedAction::Approve);
        assert_eq!(action_for(41), RecommendedAction::Verify);
        assert_eq!(action_for(60), RecommendedAction::Verify);
        assert_eq!(action_for(61), RecommendedAction::Block);
        assert_eq!(action_for(115), RecommendedAction::Block);
    }

    #[test]
    fn test_suggestion_bands() {
        assert_eq!(suggestion_for(81), CRITICAL_TEXT);
        assert_eq!(suggestion_for(80), HIGH_TEXT);
        assert_eq!(suggestion_for(45), MODERATE_TEXT);
        assert_eq!(suggestion_for(10), NORMAL_TEXT);
    }

    #[test]
    fn test_confidence_range() {
        let service = AdvisoryService::new();
        for _ in 0..100 {
            let advisory = service.advise(70);
            assert!(advisory.confidence >= 0.7 && advisory.confidence < 1.0);
        }
    }

    #[test]
    fn test_action_serializes_lowercase() {
        let json = serde_json::to_value(AdvisoryService::new().advise(90)).unwrap();
        assert_eq!(json["recommendedAction"], "block");
        assert!(json["suggestion"].as_str().unwrap().contains("critical"));
    }
}
