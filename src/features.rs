//! Conversion of a pruned batch into classifier input.
//!
//! The classifier was trained on a fixed set of columns in a fixed order.
//! Columns are never dropped, added or reordered here: anything that does not
//! match the expected schema exactly is rejected before inference.

use crate::error::{ScoringError, SchemaError};
use crate::types::transaction::{TransactionBatch, Value};

/// Dense row-major feature matrix, one row per transaction
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl FeatureMatrix {
    /// Build a matrix from row-major data.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { data, rows, cols }
    }

    /// Validate the batch columns against `expected` and convert every cell.
    pub fn from_batch(batch: &TransactionBatch, expected: &[String]) -> Result<Self, ScoringError> {
        check_schema(batch.columns(), expected)?;

        let cols = batch.columns().len();
        let mut data = Vec::with_capacity(batch.len() * cols);

        for (row, values) in batch.rows().iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                match value {
                    Value::Number(v) if v.is_finite() => data.push(*v as f32),
                    other => {
                        return Err(ScoringError::InvalidFeature {
                            column: batch.columns()[col].clone(),
                            row,
                            value: other.to_string(),
                        })
                    }
                }
            }
        }

        Ok(Self::new(data, batch.len(), cols))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, idx: usize) -> &[f32] {
        &self.data[idx * self.cols..(idx + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Require `found` to equal `expected` column for column.
pub fn check_schema(found: &[String], expected: &[String]) -> Result<(), SchemaError> {
    if found.is_empty() {
        return Err(SchemaError::NoColumns);
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|name| !found.contains(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns(missing));
    }

    let unexpected: Vec<String> = found
        .iter()
        .filter(|name| !expected.contains(name))
        .cloned()
        .collect();
    if !unexpected.is_empty() {
        return Err(SchemaError::UnexpectedColumns(unexpected));
    }

    // Same set; duplicates or a different order still differ here
    if found != expected {
        return Err(SchemaError::ColumnOrder {
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }

    Ok(())
}
