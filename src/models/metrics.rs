use serde::{Deserialize, Serialize};

/// Aggregate view over the transaction ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub total_transactions: usize,
    pub flagged_transactions: usize,
    pub approved_transactions: usize,
    pub pending_transactions: usize,
    pub blocked_transactions: usize,
    pub investigating_transactions: usize,
    /// Mean anomaly score, rounded half up
    pub average_anomaly_score: i64,
    /// Share of transactions scoring above the flag threshold, in percent
    pub flagged_percentage: i64,
    pub alert_queue_count: usize,
}
