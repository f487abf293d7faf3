//! One-time passcode issuing and verification.
//!
//! One challenge per subject: issuing replaces whatever was stored for the
//! subject, so a superseded code can never verify. Successful verification
//! removes the challenge; expired ones linger (and keep answering `Expired`)
//! until the sweep drops them.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::OtpSettings;
use crate::models::{OtpChallenge, OtpSubject};
use crate::utils::time::Clock;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OtpError {
    #[error("no OTP challenge for {subject}")]
    NotFound { subject: OtpSubject },

    #[error("OTP for {subject} has expired")]
    Expired { subject: OtpSubject },

    #[error("OTP for {subject} does not match")]
    Mismatch { subject: OtpSubject },
}

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub digits: u32,
    pub validity: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        OtpConfig::from(&OtpSettings::default())
    }
}

impl From<&OtpSettings> for OtpConfig {
    fn from(settings: &OtpSettings) -> Self {
        Self {
            digits: settings.digits,
            validity: Duration::seconds(settings.validity_seconds),
        }
    }
}

#[derive(Clone)]
pub struct OtpService {
    config: OtpConfig,
    clock: Arc<dyn Clock>,
    challenges: Arc<RwLock<HashMap<OtpSubject, OtpChallenge>>>,
}

impl OtpService {
    pub fn new(config: OtpConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            challenges: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn validity(&self) -> Duration {
        self.config.validity
    }

    /// Issue a fresh challenge for `subject`, superseding any earlier one.
    pub async fn issue(&self, subject: OtpSubject) -> OtpChallenge {
        let issued_at = self.clock.now();
        let challenge = OtpChallenge {
            subject: subject.clone(),
            code: generate_code(self.config.digits),
            issued_at,
            expires_at: issued_at + self.config.validity,
        };

        let mut challenges = self.challenges.write().await;
        if challenges.insert(subject.clone(), challenge.clone()).is_some() {
            debug!("Superseded earlier OTP challenge for {}", subject);
        }
        info!("Issued OTP challenge for {} (expires {})", subject, challenge.expires_at);

        challenge
    }

    /// Check `submitted` against the stored challenge. On success the
    /// challenge is removed and the verification time returned.
    pub async fn verify(&self, subject: &OtpSubject, submitted: &str) -> Result<DateTime<Utc>, OtpError> {
        let now = self.clock.now();
        let mut challenges = self.challenges.write().await;

        let challenge = challenges
            .get(subject)
            .ok_or_else(|| OtpError::NotFound { subject: subject.clone() })?;

        if challenge.is_expired_at(now) {
            return Err(OtpError::Expired { subject: subject.clone() });
        }

        let matches: bool = challenge.code.as_bytes().ct_eq(submitted.trim().as_bytes()).into();
        if !matches {
            return Err(OtpError::Mismatch { subject: subject.clone() });
        }

        challenges.remove(subject);
        info!("OTP verified for {}", subject);
        Ok(now)
    }

    /// Drop any challenge held for `subject`. Returns whether one existed.
    pub async fn revoke(&self, subject: &OtpSubject) -> bool {
        self.challenges.write().await.remove(subject).is_some()
    }

    pub async fn has_active(&self, subject: &OtpSubject) -> bool {
        let now = self.clock.now();
        self.challenges
            .read()
            .await
            .get(subject)
            .map(|c| !c.is_expired_at(now))
            .unwrap_or(false)
    }

    /// Remove every challenge whose expiry is at or before now.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut challenges = self.challenges.write().await;
        let before = challenges.len();
        challenges.retain(|_, c| c.expires_at > now);
        let removed = before - challenges.len();
        if removed > 0 {
            debug!("Swept {} expired OTP challenges", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.challenges.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.challenges.read().await.is_empty()
    }

    /// Periodically sweep expired challenges in the background.
    pub fn start_sweep_task(&self, every: std::time::Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                service.sweep().await;
            }
        })
    }
}

/// Uniform code over the whole `digits`-wide space, zero-padded.
fn generate_code(digits: u32) -> String {
    let upper = 10u64.pow(digits);
    let value = rand::thread_rng().gen_range(0..upper);
    format!("{:0width$}", value, width = digits as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionId;
    use crate::utils::time::ManualClock;
    use chrono::TimeZone;

    fn setup() -> (OtpService, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        let service = OtpService::new(OtpConfig::default(), Arc::new(clock.clone()));
        (service, clock)
    }

    fn tx_subject(id: &str) -> OtpSubject {
        OtpSubject::Transaction(TransactionId::from(id))
    }

    #[test]
    fn test_generated_codes_are_zero_padded() {
        for _ in 0..200 {
            let code = generate_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        assert_eq!(generate_code(1).len(), 1);
    }

    #[tokio::test]
    async fn test_issue_sets_expiry_window() {
        let (service, clock) = setup();
        let challenge = service.issue(tx_subject("TX1")).await;

        assert_eq!(challenge.issued_at, clock.now());
        assert_eq!(challenge.expires_at, clock.now() + Duration::seconds(120));
        assert!(service.has_active(&tx_subject("TX1")).await);
    }

    #[tokio::test]
    async fn test_verify_succeeds_once() {
        let (service, clock) = setup();
        let subject = tx_subject("TX1");
        let challenge = service.issue(subject.clone()).await;

        let verified_at = service.verify(&subject, &challenge.code).await.unwrap();
        assert_eq!(verified_at, clock.now());

        assert!(!service.has_active(&subject).await);
        assert!(service.is_empty().await);

        let second = service.verify(&subject, &challenge.code).await;
        assert_eq!(second, Err(OtpError::NotFound { subject }));
    }

    #[tokio::test]
    async fn test_verify_unknown_subject() {
        let (service, _) = setup();
        let result = service.verify(&tx_subject("TX404"), "123456").await;
        assert!(matches!(result, Err(OtpError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_verify_mismatch_keeps_challenge() {
        let (service, _) = setup();
        let subject = tx_subject("TX1");
        let challenge = service.issue(subject.clone()).await;
        let wrong = if challenge.code == "000000" { "000001" } else { "000000" };

        assert!(matches!(service.verify(&subject, wrong).await, Err(OtpError::Mismatch { .. })));
        assert!(service.verify(&subject, &challenge.code).await.is_ok());
    }

    #[tokio::test]
    async fn test_expiry_is_strictly_after_window() {
        let (service, clock) = setup();
        let subject = tx_subject("TX1");
        let challenge = service.issue(subject.clone()).await;

        clock.advance(Duration::seconds(121));
        assert!(matches!(
            service.verify(&subject, &challenge.code).await,
            Err(OtpError::Expired { .. })
        ));
        // still expired on retry, not silently gone
        assert!(matches!(
            service.verify(&subject, &challenge.code).await,
            Err(OtpError::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn test_verify_at_exact_expiry_succeeds() {
        let (service, clock) = setup();
        let subject = tx_subject("TX1");
        let challenge = service.issue(subject.clone()).await;

        clock.advance(Duration::seconds(120));
        assert!(service.verify(&subject, &challenge.code).await.is_ok());
    }

    #[tokio::test]
    async fn test_reissue_supersedes_previous_code() {
        let (service, _) = setup();
        let subject = OtpSubject::User("user_1".to_string());
        let first = service.issue(subject.clone()).await;
        let mut second = service.issue(subject.clone()).await;
        while second.code == first.code {
            second = service.issue(subject.clone()).await;
        }

        assert!(matches!(service.verify(&subject, &first.code).await, Err(OtpError::Mismatch { .. })));
        assert!(service.verify(&subject, &second.code).await.is_ok());
        assert_eq!(service.len().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_only() {
        let (service, clock) = setup();
        service.issue(tx_subject("TX1")).await;
        clock.advance(Duration::seconds(60));
        service.issue(tx_subject("TX2")).await;

        clock.advance(Duration::seconds(60));
        assert_eq!(service.sweep().await, 1);
        assert_eq!(service.len().await, 1);

        let result = service.verify(&tx_subject("TX1"), "000000").await;
        assert!(matches!(result, Err(OtpError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_revoke() {
        let (service, _) = setup();
        let subject = tx_subject("TX1");
        let challenge = service.issue(subject.clone()).await;

        assert!(service.revoke(&subject).await);
        assert!(!service.revoke(&subject).await);
        assert!(matches!(
            service.verify(&subject, &challenge.code).await,
            Err(OtpError::NotFound { .. })
        ));
    }
}
