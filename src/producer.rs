//! NATS producer for scoring reports

use crate::types::report::{ScoringFailure, ScoringReport};
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::debug;

/// Publishes reports to the request's reply subject, or to a fixed result subject
#[derive(Clone)]
pub struct ReportProducer {
    client: Client,
    subject: String,
    /// Largest payload the server accepts, 0 when unknown
    max_payload: usize,
}

impl ReportProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        let max_payload = client.server_info().max_payload;
        Self {
            client,
            subject: subject.to_string(),
            max_payload,
        }
    }

    /// Publish a scoring report
    pub async fn publish(&self, reply: Option<&Subject>, report: &ScoringReport) -> Result<()> {
        self.send(reply, report).await?;

        debug!(
            report_id = %report.report_id,
            batch_id = %report.batch_id,
            rows = report.summary.total,
            fraud_count = report.summary.fraud_count,
            "Published scoring report"
        );

        Ok(())
    }

    /// Publish a failure reply
    pub async fn publish_failure(&self, reply: Option<&Subject>, failure: &ScoringFailure) -> Result<()> {
        self.send(reply, failure).await?;

        debug!(batch_id = %failure.batch_id, "Published scoring failure");

        Ok(())
    }

    async fn send<T: Serialize>(&self, reply: Option<&Subject>, body: &T) -> Result<()> {
        let payload = encode_payload(body, self.max_payload)?;
        let subject = match reply {
            Some(reply) => reply.clone(),
            None => Subject::from(self.subject.as_str()),
        };

        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Serialize a reply body, refusing payloads the server would reject.
pub fn encode_payload<T: Serialize>(body: &T, max_payload: usize) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(body)?;
    if max_payload > 0 && payload.len() > max_payload {
        anyhow::bail!(
            "reply of {} bytes exceeds the server max_payload of {} bytes",
            payload.len(),
            max_payload
        );
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::action::RiskAction;
    use crate::types::scored::{OutputColumns, ScoredBatch, ScoredRow, SummaryStats};
    use crate::types::transaction::Value;

    fn large_report(rows: usize) -> ScoringReport {
        let scored = ScoredBatch {
            columns: vec!["V1".to_string(), "Amount".to_string()],
            output: OutputColumns::default(),
            rows: (0..rows)
                .map(|i| ScoredRow {
                    values: vec![Value::Number(i as f64), Value::Number(0.25)],
                    prediction: 0,
                    fraud_probability: 0.1,
                    raw_probability: 0.1,
                    action: RiskAction::Safe,
                })
                .collect(),
            probability_decimals: 3,
        };
        let summary = SummaryStats::from_rows(&scored.rows);
        ScoringReport::new("batch_large".to_string(), &scored, summary).unwrap()
    }

    #[test]
    fn test_oversized_report_refused() {
        let report = large_report(2_000);

        let err = encode_payload(&report, 4_096).unwrap_err();
        assert!(err.to_string().contains("exceeds the server max_payload of 4096 bytes"));

        // The failure reply sent in its place fits
        let failure = ScoringFailure::new(report.batch_id.clone(), err);
        let payload = encode_payload(&failure, 4_096).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json["batch_id"], "batch_large");
        assert!(json["error"].as_str().unwrap().contains("max_payload"));
    }

    #[test]
    fn test_payload_within_limit() {
        let report = large_report(3);
        let payload = encode_payload(&report, 1024 * 1024).unwrap();
        let decoded: ScoringReport = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded.summary.total, 3);

        // Unknown limit
        assert!(encode_payload(&large_report(2_000), 0).is_ok());
    }
}
