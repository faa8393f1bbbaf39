//! Plain-text rendering of scoring results for the terminal

use crate::types::action::RiskAction;
use crate::types::scored::{ScoredBatch, SummaryStats};
use std::fmt::Write;

/// Marker printed in front of rows predicted fraudulent
const FLAG: &str = "!";

/// Aligned table of the first `limit` rows. Flagged rows are marked.
pub fn render_preview(scored: &ScoredBatch, limit: usize) -> String {
    let header: Vec<String> = scored.header().into_iter().map(str::to_string).collect();
    let records: Vec<(bool, Vec<String>)> = scored
        .rows
        .iter()
        .take(limit)
        .map(|row| (row.is_flagged(), scored.record(row)))
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for (_, fields) in &records {
        for (w, field) in widths.iter_mut().zip(fields) {
            *w = (*w).max(field.chars().count());
        }
    }

    let mut out = String::new();
    write_line(&mut out, " ", &header, &widths);
    for (flagged, fields) in &records {
        write_line(&mut out, if *flagged { FLAG } else { " " }, fields, &widths);
    }
    if scored.len() > limit {
        let _ = writeln!(out, "  ... {} more rows", scored.len() - limit);
    }
    out
}

fn write_line(out: &mut String, marker: &str, fields: &[String], widths: &[usize]) {
    out.push_str(marker);
    for (field, width) in fields.iter().zip(widths) {
        let _ = write!(out, " {:>width$}", field, width = width);
    }
    out.push('\n');
}

/// Summary block: fraud warning, rate and per-action counts.
pub fn render_summary(summary: &SummaryStats) -> String {
    let mut out = String::new();

    if !summary.has_data {
        out.push_str("No transactions to score.\n");
        return out;
    }

    let _ = writeln!(out, "Total Transactions: {}", summary.total);
    let _ = writeln!(out, "Fraudulent Transactions Detected: {}", summary.fraud_count);
    let _ = writeln!(out, "Fraud Rate: {:.2}%", summary.fraud_rate);
    for action in RiskAction::ALL {
        let _ = writeln!(out, "  {:<8} {}", action, summary.actions.get(action));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::scored::{OutputColumns, ScoredRow};
    use crate::types::transaction::Value;

    fn scored() -> ScoredBatch {
        let row = |v: f64, prediction: u8, p: f64, action| ScoredRow {
            values: vec![Value::Number(v)],
            prediction,
            fraud_probability: p,
            raw_probability: p,
            action,
        };
        ScoredBatch {
            columns: vec!["V1".to_string()],
            output: OutputColumns::default(),
            rows: vec![
                row(1.0, 0, 0.1, RiskAction::Safe),
                row(2.0, 1, 0.9, RiskAction::Block),
                row(3.0, 0, 0.2, RiskAction::Safe),
            ],
            probability_decimals: 3,
        }
    }

    #[test]
    fn test_preview_marks_flagged_rows() {
        let preview = render_preview(&scored(), 2);
        let lines: Vec<&str> = preview.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Fraud_Probability"));
        assert!(lines[1].starts_with(' '));
        assert!(lines[2].starts_with('!'));
        assert!(lines[2].contains("Block"));
        assert!(lines[3].contains("1 more rows"));
    }

    #[test]
    fn test_summary_text() {
        let batch = scored();
        let summary = SummaryStats::from_rows(&batch.rows);
        let text = render_summary(&summary);

        assert!(text.contains("Fraudulent Transactions Detected: 1"));
        assert!(text.contains("Fraud Rate: 33.33%"));
        assert!(text.contains("Block    1"));
    }

    #[test]
    fn test_summary_without_data() {
        assert_eq!(render_summary(&SummaryStats::empty()), "No transactions to score.\n");
    }
}
