use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::models::{SystemMetrics, Transaction, TransactionId, TransactionStatus};
use crate::utils::math::{mean, percentage, round_half_up};

pub const DEFAULT_FLAG_THRESHOLD: u32 = 40;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("transaction {0} not found")]
    NotFound(TransactionId),

    #[error("transaction {0} already exists")]
    Duplicate(TransactionId),

    #[error("transaction {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    },
}

#[derive(Default)]
struct LedgerInner {
    records: Vec<Transaction>,
    index: HashMap<TransactionId, usize>,
}

/// Append-only, in-memory transaction store. Records are never removed;
/// only their status (and verification time) changes after insertion.
///
/// Every read clones out of the lock, so callers always hold a consistent
/// snapshot of each record.
#[derive(Clone, Default)]
pub struct TransactionLedger {
    inner: Arc<RwLock<LedgerInner>>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, transaction: Transaction) -> Result<TransactionId, LedgerError> {
        let mut inner = self.inner.write().await;
        let id = transaction.id.clone();
        if inner.index.contains_key(&id) {
            return Err(LedgerError::Duplicate(id));
        }

        let position = inner.records.len();
        inner.records.push(transaction);
        inner.index.insert(id.clone(), position);
        Ok(id)
    }

    pub async fn get(&self, id: &TransactionId) -> Option<Transaction> {
        let inner = self.inner.read().await;
        inner.index.get(id).map(|&i| inner.records[i].clone())
    }

    /// Overwrite the status of `id`, subject to the status transition guard.
    pub async fn set_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, LedgerError> {
        let mut inner = self.inner.write().await;
        let position = *inner
            .index
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;

        let record = &mut inner.records[position];
        if !record.status.can_transition_to(status) {
            return Err(LedgerError::InvalidTransition {
                id: id.clone(),
                from: record.status,
                to: status,
            });
        }

        info!("Transaction {} status {} -> {}", id, record.status, status);
        record.status = status;
        Ok(record.clone())
    }

    /// `pending_otp -> approved` after a successful OTP check.
    pub async fn record_verification(
        &self,
        id: &TransactionId,
        verified_at: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let mut inner = self.inner.write().await;
        let position = *inner
            .index
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;

        let record = &mut inner.records[position];
        if record.status != TransactionStatus::PendingOtp {
            return Err(LedgerError::InvalidTransition {
                id: id.clone(),
                from: record.status,
                to: TransactionStatus::Approved,
            });
        }

        record.status = TransactionStatus::Approved;
        record.otp_verified_at = Some(verified_at);
        Ok(record.clone())
    }

    /// All transactions, newest first.
    pub async fn list_all(&self) -> Vec<Transaction> {
        let inner = self.inner.read().await;
        newest_first(inner.records.iter().cloned().collect())
    }

    /// Transactions submitted by `user_id`, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> Vec<Transaction> {
        let inner = self.inner.read().await;
        newest_first(
            inner
                .records
                .iter()
                .filter(|t| t.user_id == user_id)
                .cloned()
                .collect(),
        )
    }

    /// Transactions by `user_id` created strictly after `since`.
    pub async fn recent_count(&self, user_id: &str, since: DateTime<Utc>) -> usize {
        let inner = self.inner.read().await;
        inner
            .records
            .iter()
            .filter(|t| t.user_id == user_id && t.created_at > since)
            .count()
    }

    /// Score above `threshold` or any flag raised, highest score first.
    pub async fn list_flagged(&self, threshold: u32) -> Vec<Transaction> {
        let inner = self.inner.read().await;
        let mut flagged: Vec<Transaction> = inner
            .records
            .iter()
            .filter(|t| t.is_flagged(threshold))
            .cloned()
            .collect();
        flagged.sort_by(|a, b| b.anomaly_score.cmp(&a.anomaly_score));
        flagged
    }

    pub async fn aggregate_metrics(&self, threshold: u32) -> SystemMetrics {
        let inner = self.inner.read().await;
        let records = &inner.records;
        let total = records.len();

        let count_status = |status: TransactionStatus| records.iter().filter(|t| t.status == status).count();
        let flagged = records.iter().filter(|t| t.anomaly_score > threshold).count();
        let scores: Vec<f64> = records.iter().map(|t| t.anomaly_score as f64).collect();
        let pending = count_status(TransactionStatus::PendingOtp);

        SystemMetrics {
            total_transactions: total,
            flagged_transactions: flagged,
            approved_transactions: count_status(TransactionStatus::Approved),
            pending_transactions: pending,
            blocked_transactions: count_status(TransactionStatus::Blocked),
            investigating_transactions: count_status(TransactionStatus::Investigating),
            average_anomaly_score: round_half_up(mean(&scores)),
            flagged_percentage: round_half_up(percentage(flagged, total)),
            alert_queue_count: pending,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

/// Stable sort so records sharing a timestamp keep insertion order reversed.
fn newest_first(mut records: Vec<Transaction>) -> Vec<Transaction> {
    records.reverse();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}
