//! Scored batches and their summary statistics

use crate::types::action::RiskAction;
use crate::types::transaction::Value;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Round to a fixed number of decimal places.
///
/// Exact halves go to the even neighbour, matching numpy and pandas
/// `round`: 0.0625 becomes 0.062 and 0.1875 becomes 0.188.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}

/// Names of the columns appended to every scored row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputColumns {
    pub prediction: String,
    pub probability: String,
    pub action: String,
}

impl Default for OutputColumns {
    fn default() -> Self {
        Self {
            prediction: "Prediction".to_string(),
            probability: "Fraud_Probability".to_string(),
            action: "Action".to_string(),
        }
    }
}

/// One input row plus its derived fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    /// Surviving input values (amount already normalized)
    pub values: Vec<Value>,
    /// Binary prediction, 1 = fraud
    pub prediction: u8,
    /// Positive-class probability rounded for display
    pub fraud_probability: f64,
    /// Positive-class probability at full precision
    #[serde(skip)]
    pub raw_probability: f64,
    pub action: RiskAction,
}

impl ScoredRow {
    /// Highlight predicate for renderers.
    pub fn is_flagged(&self) -> bool {
        self.prediction == 1
    }
}

/// A scored batch: surviving input columns followed by the derived columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBatch {
    pub columns: Vec<String>,
    pub output: OutputColumns,
    pub rows: Vec<ScoredRow>,
    pub probability_decimals: u32,
}

impl ScoredBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full export header.
    pub fn header(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(String::as_str)
            .chain([
                self.output.prediction.as_str(),
                self.output.probability.as_str(),
                self.output.action.as_str(),
            ])
            .collect()
    }

    /// Rows predicted fraudulent, with their position in the batch.
    pub fn flagged(&self) -> impl Iterator<Item = (usize, &ScoredRow)> {
        self.rows.iter().enumerate().filter(|(_, row)| row.is_flagged())
    }

    pub fn flagged_indices(&self) -> Vec<usize> {
        self.flagged().map(|(idx, _)| idx).collect()
    }

    /// Copy of the batch keeping only flagged rows.
    pub fn flagged_only(&self) -> ScoredBatch {
        ScoredBatch {
            columns: self.columns.clone(),
            output: self.output.clone(),
            rows: self.flagged().map(|(_, row)| row.clone()).collect(),
            probability_decimals: self.probability_decimals,
        }
    }

    /// Export fields for one row, in header order.
    pub fn record(&self, row: &ScoredRow) -> Vec<String> {
        row.values
            .iter()
            .map(Value::to_string)
            .chain([
                row.prediction.to_string(),
                format!("{:.*}", self.probability_decimals as usize, row.fraud_probability),
                row.action.to_string(),
            ])
            .collect()
    }

    /// Write the batch as comma-delimited UTF-8 CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.header())?;
        for row in &self.rows {
            csv_writer.write_record(self.record(row))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, csv::Error> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        // csv::Writer only emits UTF-8 from UTF-8 input
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Row counts per risk action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    pub block: usize,
    pub monitor: usize,
    pub safe: usize,
}

impl ActionCounts {
    pub fn add(&mut self, action: RiskAction) {
        match action {
            RiskAction::Block => self.block += 1,
            RiskAction::Monitor => self.monitor += 1,
            RiskAction::Safe => self.safe += 1,
        }
    }

    pub fn get(&self, action: RiskAction) -> usize {
        match action {
            RiskAction::Block => self.block,
            RiskAction::Monitor => self.monitor,
            RiskAction::Safe => self.safe,
        }
    }
}

/// Batch-level figures for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total: usize,
    pub fraud_count: usize,
    /// Percentage of rows predicted fraudulent, 2 decimal places.
    /// Zero when the batch is empty.
    pub fraud_rate: f64,
    /// False when there were no rows to score
    pub has_data: bool,
    pub actions: ActionCounts,
}

impl SummaryStats {
    pub fn from_rows(rows: &[ScoredRow]) -> Self {
        let total = rows.len();
        let fraud_count = rows.iter().filter(|r| r.is_flagged()).count();

        let mut actions = ActionCounts::default();
        for row in rows {
            actions.add(row.action);
        }

        let fraud_rate = if total > 0 {
            round_to(fraud_count as f64 / total as f64 * 100.0, 2)
        } else {
            0.0
        };

        Self {
            total,
            fraud_count,
            fraud_rate,
            has_data: total > 0,
            actions,
        }
    }

    pub fn empty() -> Self {
        Self::from_rows(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(prediction: u8, probability: f64, action: RiskAction) -> ScoredRow {
        ScoredRow {
            values: vec![Value::Number(1.0), Value::Text("a,b".to_string())],
            prediction,
            fraud_probability: probability,
            raw_probability: probability,
            action,
        }
    }

    fn batch(rows: Vec<ScoredRow>) -> ScoredBatch {
        ScoredBatch {
            columns: vec!["V1".to_string(), "Merchant".to_string()],
            output: OutputColumns::default(),
            rows,
            probability_decimals: 3,
        }
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.12345, 3), 0.123);
        assert_eq!(round_to(0.8566, 3), 0.857);
        assert_eq!(round_to(33.33333, 2), 33.33);
    }

    #[test]
    fn test_round_to_ties_even() {
        assert_eq!(round_to(0.0625, 3), 0.062);
        assert_eq!(round_to(0.1875, 3), 0.188);
        assert_eq!(round_to(12.5, 0), 12.0);
    }

    #[test]
    fn test_summary_two_of_ten() {
        let predictions = [1, 0, 1, 0, 0, 0, 0, 0, 0, 0];
        let rows: Vec<ScoredRow> = predictions
            .iter()
            .map(|&p| row(p, 0.1, RiskAction::Safe))
            .collect();

        let summary = SummaryStats::from_rows(&rows);
        assert_eq!(summary.total, 10);
        assert_eq!(summary.fraud_count, 2);
        assert_eq!(summary.fraud_rate, 20.0);
        assert!(summary.has_data);
        assert_eq!(summary.actions.safe, 10);
    }

    #[test]
    fn test_summary_empty() {
        let summary = SummaryStats::empty();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.fraud_rate, 0.0);
        assert!(!summary.has_data);
    }

    #[test]
    fn test_summary_rate_rounding() {
        let rows = vec![
            row(1, 0.9, RiskAction::Block),
            row(0, 0.7, RiskAction::Monitor),
            row(0, 0.1, RiskAction::Safe),
        ];
        let summary = SummaryStats::from_rows(&rows);
        assert_eq!(summary.fraud_rate, 33.33);
        assert_eq!(summary.actions.get(RiskAction::Block), 1);
        assert_eq!(summary.actions.get(RiskAction::Monitor), 1);
    }

    #[test]
    fn test_csv_export() {
        let scored = batch(vec![row(1, 0.912, RiskAction::Block), row(0, 0.05, RiskAction::Safe)]);

        let csv = scored.to_csv_string().unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "V1,Merchant,Prediction,Fraud_Probability,Action");
        assert_eq!(lines[1], "1,\"a,b\",1,0.912,Block");
        assert_eq!(lines[2], "1,\"a,b\",0,0.050,Safe");
    }

    #[test]
    fn test_flagged_only() {
        let scored = batch(vec![
            row(0, 0.2, RiskAction::Safe),
            row(1, 0.95, RiskAction::Block),
        ]);

        assert_eq!(scored.flagged_indices(), vec![1]);
        let flagged = scored.flagged_only();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged.rows[0].action, RiskAction::Block);
    }
}
