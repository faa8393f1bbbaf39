//! Type definitions for batch scoring

pub mod action;
pub mod report;
pub mod scored;
pub mod transaction;

pub use action::{ActionThresholds, RiskAction};
pub use report::{ScoringFailure, ScoringReport};
pub use scored::{ActionCounts, OutputColumns, ScoredBatch, ScoredRow, SummaryStats};
pub use transaction::{TransactionBatch, Value};
