//! Scoring report sent back to service callers

use crate::types::scored::{ScoredBatch, SummaryStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of scoring one uploaded batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringReport {
    /// Unique report identifier
    pub report_id: String,

    /// Caller-supplied batch identifier, or a generated one
    pub batch_id: String,

    /// Report generation timestamp
    pub scored_at: DateTime<Utc>,

    pub summary: SummaryStats,

    /// Row indices predicted fraudulent
    pub flagged: Vec<usize>,

    /// The scored batch as CSV, header included
    pub csv: String,
}

impl ScoringReport {
    pub fn new(batch_id: String, scored: &ScoredBatch, summary: SummaryStats) -> Result<Self, csv::Error> {
        Ok(Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            batch_id,
            scored_at: Utc::now(),
            summary,
            flagged: scored.flagged_indices(),
            csv: scored.to_csv_string()?,
        })
    }
}

/// Reply sent when a batch could not be scored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringFailure {
    pub batch_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ScoringFailure {
    pub fn new(batch_id: String, error: impl ToString) -> Self {
        Self {
            batch_id,
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}
