//! The scoring pipeline: label exclusion, amount normalization, inference,
//! risk labeling and summary statistics over one uploaded batch.
//!
//! Scoring is a pure function of its inputs. The normalizer and classifier are
//! only read, so one pair can serve any number of batches.

use crate::error::{SchemaError, ScoringError};
use crate::features::FeatureMatrix;
use crate::models::classifier::{Classifier, Inference};
use crate::models::loader::Artifacts;
use crate::models::scaler::FeatureNormalizer;
use crate::types::action::{ActionThresholds, RiskAction};
use crate::types::scored::{round_to, OutputColumns, ScoredBatch, ScoredRow, SummaryStats};
use crate::types::transaction::TransactionBatch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Column names and labeling rules for one scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringOptions {
    pub label_column: String,
    pub amount_column: String,
    pub thresholds: ActionThresholds,
    pub probability_decimals: u32,
    /// Threshold the rounded probability rather than the raw one
    pub threshold_on_rounded: bool,
    pub output: OutputColumns,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            label_column: "Class".to_string(),
            amount_column: "Amount".to_string(),
            thresholds: ActionThresholds::default(),
            probability_decimals: 3,
            threshold_on_rounded: true,
            output: OutputColumns::default(),
        }
    }
}

/// Score one batch.
///
/// The classifier is only called when the pruned batch matches its feature
/// schema and has at least one row.
pub fn score(
    mut batch: TransactionBatch,
    options: &ScoringOptions,
    normalizer: &dyn FeatureNormalizer,
    classifier: &dyn Classifier,
) -> Result<(ScoredBatch, SummaryStats), ScoringError> {
    if batch.columns().is_empty() {
        return Err(SchemaError::NoColumns.into());
    }

    batch.drop_column(&options.label_column);

    if let Some(idx) = batch.column_index(&options.amount_column) {
        normalize_column(&mut batch, idx, &options.amount_column, normalizer)?;
    }

    let matrix = FeatureMatrix::from_batch(&batch, classifier.feature_names())?;

    let inference = if batch.is_empty() {
        Inference {
            labels: Vec::new(),
            probabilities: Vec::new(),
        }
    } else {
        classifier.infer(&matrix).map_err(ScoringError::Classifier)?
    };
    check_inference(&inference, batch.len())?;

    let (columns, values) = batch.into_parts();
    let rows = values
        .into_iter()
        .zip(inference.labels)
        .zip(inference.probabilities)
        .map(|((values, label), raw)| {
            let fraud_probability = round_to(raw, options.probability_decimals);
            let decisive = if options.threshold_on_rounded {
                fraud_probability
            } else {
                raw
            };
            ScoredRow {
                values,
                // check_inference guarantees 0 or 1
                prediction: label as u8,
                fraud_probability,
                raw_probability: raw,
                action: RiskAction::from_probability(decisive, &options.thresholds),
            }
        })
        .collect::<Vec<_>>();

    let summary = SummaryStats::from_rows(&rows);
    let scored = ScoredBatch {
        columns,
        output: options.output.clone(),
        rows,
        probability_decimals: options.probability_decimals,
    };

    Ok((scored, summary))
}

fn normalize_column(
    batch: &mut TransactionBatch,
    idx: usize,
    column: &str,
    normalizer: &dyn FeatureNormalizer,
) -> Result<(), ScoringError> {
    let raw = batch
        .numeric_column(idx)
        .map_err(|(row, value)| ScoringError::InvalidFeature {
            column: column.to_string(),
            row,
            value,
        })?;

    let scaled = normalizer.transform(&raw);
    if scaled.len() != raw.len() {
        return Err(ScoringError::Normalizer {
            column: column.to_string(),
            expected: raw.len(),
            actual: scaled.len(),
        });
    }

    batch.replace_column(idx, scaled);
    Ok(())
}

fn check_inference(inference: &Inference, rows: usize) -> Result<(), ScoringError> {
    if inference.labels.len() != rows {
        return Err(ScoringError::OutputShape {
            output: "predict",
            expected: rows,
            actual: inference.labels.len(),
        });
    }
    if inference.probabilities.len() != rows {
        return Err(ScoringError::OutputShape {
            output: "predict_proba",
            expected: rows,
            actual: inference.probabilities.len(),
        });
    }
    if let Some((row, &value)) = inference
        .labels
        .iter()
        .enumerate()
        .find(|(_, &l)| l != 0 && l != 1)
    {
        return Err(ScoringError::InvalidLabel { row, value });
    }
    if let Some((row, &value)) = inference
        .probabilities
        .iter()
        .enumerate()
        .find(|(_, p)| !(0.0..=1.0).contains(*p))
    {
        return Err(ScoringError::InvalidProbability { row, value });
    }
    Ok(())
}

/// Loaded artifacts plus options. Can only be built from artifacts that
/// loaded successfully.
#[derive(Clone)]
pub struct ScoringPipeline {
    normalizer: Arc<dyn FeatureNormalizer>,
    classifier: Arc<dyn Classifier>,
    options: ScoringOptions,
}

impl ScoringPipeline {
    pub fn new(artifacts: Artifacts, options: ScoringOptions) -> Self {
        Self {
            normalizer: artifacts.normalizer,
            classifier: artifacts.classifier,
            options,
        }
    }

    pub fn score(
        &self,
        batch: TransactionBatch,
    ) -> Result<(ScoredBatch, SummaryStats), ScoringError> {
        score(
            batch,
            &self.options,
            self.normalizer.as_ref(),
            self.classifier.as_ref(),
        )
    }

    pub fn options(&self) -> &ScoringOptions {
        &self.options
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }
}
