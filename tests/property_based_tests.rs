use proptest::prelude::*;
use std::collections::HashSet;

use fraudguard::{
    models::{GeoLocation, RiskLevel, TransactionId, TransactionRequest},
    services::{
        requires_otp, RiskScorer, ScoringContext, FLAG_HIGH_AMOUNT, FLAG_HIGH_FREQUENCY,
        FLAG_LOCATION_UNAVAILABLE, FLAG_MODERATE_FREQUENCY, FLAG_SUSPICIOUS_RECIPIENT,
        FLAG_UNUSUAL_TIME, FLAG_VERY_HIGH_AMOUNT, HIGH_AMOUNT_WEIGHT, HIGH_FREQUENCY_WEIGHT,
        MODERATE_FREQUENCY_WEIGHT, NO_LOCATION_WEIGHT, SUSPICIOUS_RECIPIENT_WEIGHT,
        UNUSUAL_TIME_WEIGHT, VERY_HIGH_AMOUNT_WEIGHT,
    },
    utils::masking::mask_email,
};

fn weight_of(flag: &str) -> u32 {
    match flag {
        f if f == FLAG_VERY_HIGH_AMOUNT => VERY_HIGH_AMOUNT_WEIGHT,
        f if f == FLAG_HIGH_AMOUNT => HIGH_AMOUNT_WEIGHT,
        f if f == FLAG_SUSPICIOUS_RECIPIENT => SUSPICIOUS_RECIPIENT_WEIGHT,
        f if f == FLAG_HIGH_FREQUENCY => HIGH_FREQUENCY_WEIGHT,
        f if f == FLAG_MODERATE_FREQUENCY => MODERATE_FREQUENCY_WEIGHT,
        f if f == FLAG_LOCATION_UNAVAILABLE => NO_LOCATION_WEIGHT,
        f if f == FLAG_UNUSUAL_TIME => UNUSUAL_TIME_WEIGHT,
        other => panic!("unexpected flag {}", other),
    }
}

fn recipient() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z ]{1,20}",
        Just("unknown payee".to_string()),
        Just("TEMP account".to_string()),
        Just("Fake Store".to_string()),
    ]
}

fn location() -> impl Strategy<Value = Option<GeoLocation>> {
    prop_oneof![
        Just(None),
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lng)| Some(GeoLocation { lat, lng })),
    ]
}

proptest! {
    /// The score is exactly the sum of the weights of the flags raised.
    #[test]
    fn test_score_is_sum_of_flag_weights(
        amount in 0.0f64..200_000.0,
        recipient in recipient(),
        location in location(),
        recent in 0usize..20,
        hour in 0u32..24,
    ) {
        let scorer = RiskScorer::default();
        let request = TransactionRequest { amount, recipient, user_id: "user_1".to_string(), location };
        let result = scorer.score(&request, ScoringContext { recent_transactions: recent, local_hour: hour });

        let sum: u32 = result.flags.iter().map(|f| weight_of(f)).sum();
        prop_assert_eq!(result.anomaly_score, sum);
        prop_assert_eq!(result.requires_otp, result.anomaly_score > 50);
        prop_assert_eq!(result.risk_level, RiskLevel::from_score(result.anomaly_score));

        let unique: HashSet<&String> = result.flags.iter().collect();
        prop_assert_eq!(unique.len(), result.flags.len());
    }

    /// Mutually exclusive rule pairs never fire together.
    #[test]
    fn test_exclusive_bands(amount in 0.0f64..200_000.0, recent in 0usize..20) {
        let scorer = RiskScorer::default();
        let request = TransactionRequest {
            amount,
            recipient: "Alice".to_string(),
            user_id: "user_1".to_string(),
            location: None,
        };
        let flags = scorer.score(&request, ScoringContext { recent_transactions: recent, local_hour: 12 }).flags;

        let has = |name: &str| flags.iter().any(|f| f == name);
        prop_assert!(!(has(FLAG_VERY_HIGH_AMOUNT) && has(FLAG_HIGH_AMOUNT)));
        prop_assert!(!(has(FLAG_HIGH_FREQUENCY) && has(FLAG_MODERATE_FREQUENCY)));
        prop_assert!(has(FLAG_LOCATION_UNAVAILABLE));
    }

    /// Tiers never go down as the score goes up.
    #[test]
    fn test_risk_level_is_monotonic(a in 0u32..300, b in 0u32..300) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(RiskLevel::from_score(low) <= RiskLevel::from_score(high));
        prop_assert_eq!(requires_otp(low) && !requires_otp(high), false);
    }

    #[test]
    fn test_mask_email_keeps_shape(local in "[a-z0-9.]{1,16}", domain in "[a-z]{1,10}\\.[a-z]{2,4}") {
        let email = format!("{}@{}", local, domain);
        let masked = mask_email(&email);

        prop_assert_eq!(masked.len(), email.len());
        let domain_suffix = format!("@{}", domain);
        prop_assert!(masked.ends_with(&domain_suffix));
        let masked_local = masked.split('@').next().unwrap_or_default().to_string();
        if local.len() > 2 {
            prop_assert_eq!(masked_local.chars().next(), local.chars().next());
            prop_assert_eq!(masked_local.chars().last(), local.chars().last());
        } else {
            prop_assert!(masked_local.chars().all(|c| c == '*'));
        }
    }
}

#[test]
fn test_transaction_ids_never_collide() {
    let at = chrono::Utc::now();
    let ids: HashSet<TransactionId> = (0..10_000).map(|_| TransactionId::generate(at)).collect();
    assert_eq!(ids.len(), 10_000);
}
