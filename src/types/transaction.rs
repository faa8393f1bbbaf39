//! Tabular transaction batches read from uploaded CSV files

use crate::error::{BatchError, SchemaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// A single CSV cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Parse a raw CSV field. Anything that reads as a float is numeric.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(v) => Value::Number(v),
            Err(_) => Value::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// An uploaded batch of transactions: a header plus rows of equal arity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionBatch {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TransactionBatch {
    /// Build a batch from already-parsed rows.
    ///
    /// Every row must have exactly one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, SchemaError> {
        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != columns.len())
        {
            return Err(SchemaError::RaggedRow {
                row,
                expected: columns.len(),
                found: values.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    /// Read a batch from CSV data with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, BatchError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(Value::parse).collect());
        }

        Ok(Self::new(columns, rows)?)
    }

    /// Read a batch from a CSV file on disk.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, BatchError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Remove a column by name. Returns `false` if it was not present.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    /// Values of a column as floats, in row order.
    ///
    /// Fails on the first cell that is not numeric, reporting `(row, raw text)`.
    pub fn numeric_column(&self, idx: usize) -> Result<Vec<f64>, (usize, String)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row, values)| values[idx].as_f64().ok_or_else(|| (row, values[idx].to_string())))
            .collect()
    }

    /// Overwrite a column with numeric values, one per row.
    pub(crate) fn replace_column(&mut self, idx: usize, values: Vec<f64>) {
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = Value::Number(value);
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Time,V1,Amount,Class\n0,-1.35,149.62,0\n1,1.19,2.69,1\n";

    #[test]
    fn test_read_csv() {
        let batch = TransactionBatch::from_csv_reader(SAMPLE.as_bytes()).unwrap();

        assert_eq!(batch.columns(), &["Time", "V1", "Amount", "Class"]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.rows()[0][2], Value::Number(149.62));
        assert_eq!(batch.rows()[1][3], Value::Number(1.0));
    }

    #[test]
    fn test_value_parse() {
        assert_eq!(Value::parse("3.5"), Value::Number(3.5));
        assert_eq!(Value::parse(" 7 "), Value::Number(7.0));
        assert_eq!(Value::parse("abc"), Value::Text("abc".to_string()));
        assert_eq!(Value::parse(""), Value::Text(String::new()));
    }

    #[test]
    fn test_drop_column_keeps_order() {
        let mut batch = TransactionBatch::from_csv_reader(SAMPLE.as_bytes()).unwrap();

        assert!(batch.drop_column("V1"));
        assert!(!batch.drop_column("V1"));
        assert_eq!(batch.columns(), &["Time", "Amount", "Class"]);
        assert_eq!(
            batch.rows()[1],
            vec![Value::Number(1.0), Value::Number(2.69), Value::Number(1.0)]
        );
    }

    #[test]
    fn test_numeric_column_rejects_text() {
        let csv = "Amount\n1.5\nn/a\n";
        let batch = TransactionBatch::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(batch.numeric_column(0), Err((1, "n/a".to_string())));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let csv = "a,b\n1,2\n3\n";
        let err = TransactionBatch::from_csv_reader(csv.as_bytes()).unwrap_err();

        assert!(matches!(
            err,
            BatchError::Schema(SchemaError::RaggedRow { row: 1, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_header_only() {
        let batch = TransactionBatch::from_csv_reader("V1,V2\n".as_bytes()).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.columns().len(), 2);
    }

    #[test]
    fn test_read_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let batch = TransactionBatch::from_csv_path(&path).unwrap();
        assert_eq!(batch.len(), 2);
    }
}
