//! Fraud Scoring Library
//!
//! Applies a pre-fitted amount scaler and a pre-trained binary classifier to
//! uploaded transaction batches, producing per-row predictions, fraud
//! probabilities, risk actions and batch summary statistics.

pub mod config;
pub mod consumer;
pub mod display;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use error::{BatchError, SchemaError, ScoringError};
pub use features::FeatureMatrix;
pub use models::{Classifier, FeatureNormalizer, ModelLoader};
pub use pipeline::{score, ScoringOptions, ScoringPipeline};
pub use types::{RiskAction, ScoredBatch, SummaryStats, TransactionBatch};
