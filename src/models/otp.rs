use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::transaction::TransactionId;

/// Entity an OTP challenge is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OtpSubject {
    Transaction(TransactionId),
    User(String),
}

impl fmt::Display for OtpSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtpSubject::Transaction(id) => write!(f, "transaction:{}", id),
            OtpSubject::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// A live challenge. There is no consumed state: a verified challenge is
/// removed from the store, so holding one means it has not been used.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub subject: OtpSubject,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn expires_in_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}
