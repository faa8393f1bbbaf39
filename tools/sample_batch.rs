//! Sample Batch Generator
//!
//! Generates a credit-card style transactions CSV (`Time, V1..V28, Amount,
//! Class`) and sends it to the scoring service, or writes it out when NATS is
//! unreachable.
//!
//! Usage: sample-batch [nats_url] [subject] [rows] [fraud_rate] [output.csv]

use anyhow::{Context, Result};
use rand::Rng;
use std::io::Write;
use tracing::{info, warn};

const COMPONENTS: usize = 28;

/// Components that separate fraud from legitimate rows, with their fraud shift
const FRAUD_SHIFTS: [(usize, f64); 6] = [
    (4, 3.5),   // V4
    (10, -5.0), // V10
    (11, 3.0),  // V11
    (12, -6.0), // V12
    (14, -7.0), // V14
    (17, -6.5), // V17
];

/// Row generator for sample batches
struct BatchGenerator {
    rng: rand::rngs::ThreadRng,
    elapsed_secs: f64,
}

impl BatchGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            elapsed_secs: 0.0,
        }
    }

    fn header() -> Vec<String> {
        let mut header = vec!["Time".to_string()];
        header.extend((1..=COMPONENTS).map(|i| format!("V{}", i)));
        header.push("Amount".to_string());
        header.push("Class".to_string());
        header
    }

    /// Generate a legitimate transaction row
    fn generate_legitimate(&mut self) -> Vec<String> {
        let amount = self.rng.gen_range(1.0..300.0);
        self.row(amount, false)
    }

    /// Generate a fraudulent transaction row
    fn generate_fraudulent(&mut self) -> Vec<String> {
        // Fraud is either card testing (tiny) or cash-out (large)
        let amount = if self.rng.gen_bool(0.5) {
            self.rng.gen_range(0.0..2.0)
        } else {
            self.rng.gen_range(300.0..2500.0)
        };
        self.row(amount, true)
    }

    fn row(&mut self, amount: f64, fraud: bool) -> Vec<String> {
        self.elapsed_secs += self.rng.gen_range(0.0..30.0);

        let mut components: Vec<f64> = (0..COMPONENTS)
            .map(|_| self.rng.gen_range(-2.0..2.0))
            .collect();
        if fraud {
            for (v, shift) in FRAUD_SHIFTS {
                components[v - 1] += shift + self.rng.gen_range(-1.0..1.0);
            }
        }

        let mut fields = vec![format!("{:.0}", self.elapsed_secs)];
        fields.extend(components.iter().map(|c| format!("{:.6}", c)));
        fields.push(format!("{:.2}", amount));
        fields.push(if fraud { "1" } else { "0" }.to_string());
        fields
    }
}

fn generate_csv(rows: u64, fraud_rate: f64) -> Result<(Vec<u8>, u64)> {
    let mut generator = BatchGenerator::new();
    let mut rng = rand::thread_rng();
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut fraud_count = 0;

    writer.write_record(BatchGenerator::header())?;
    for _ in 0..rows {
        let record = if rng.gen_bool(fraud_rate) {
            fraud_count += 1;
            generator.generate_fraudulent()
        } else {
            generator.generate_legitimate()
        };
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))?;
    Ok((bytes, fraud_count))
}

/// Fraud share in [0, 1]; out-of-range values are clamped, NaN and infinities rejected
fn parse_fraud_rate(raw: &str) -> Result<f64> {
    let rate: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid fraud rate '{}'", raw))?;
    if !rate.is_finite() {
        anyhow::bail!("Fraud rate must be a finite number, got '{}'", raw);
    }
    Ok(rate.clamp(0.0, 1.0))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_batch=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("scoring.requests");
    let rows: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate = match args.get(4) {
        Some(raw) => parse_fraud_rate(raw)?,
        None => 0.1,
    };
    let output = args.get(5);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        rows = rows,
        fraud_rate = fraud_rate,
        "Configuration loaded"
    );

    let (payload, fraud_count) = generate_csv(rows, fraud_rate)?;
    info!(rows = rows, fraud = fraud_count, bytes = payload.len(), "Batch generated");

    if let Some(path) = output {
        std::fs::write(path, &payload).with_context(|| format!("Failed to write {}", path))?;
        info!(path = %path, "Batch written");
    }

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            if output.is_none() {
                std::io::stdout().write_all(&payload)?;
            }
            return Ok(());
        }
    };

    let batch_id = format!("sample_{}", uuid::Uuid::new_v4().simple());
    let mut headers = async_nats::HeaderMap::new();
    headers.insert("Batch-Id", batch_id.as_str());

    let reply = client
        .request_with_headers(subject.to_string(), headers, payload.into())
        .await
        .context("Scoring request failed")?;

    let report: serde_json::Value =
        serde_json::from_slice(&reply.payload).context("Reply is not JSON")?;

    if let Some(error) = report.get("error") {
        warn!(batch_id = %batch_id, error = %error, "Batch rejected by service");
    } else {
        info!(
            batch_id = %batch_id,
            generated_fraud = fraud_count,
            "Summary:\n{}",
            serde_json::to_string_pretty(&report["summary"])?
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_rate_parsing() {
        assert_eq!(parse_fraud_rate("0.25").unwrap(), 0.25);
        assert_eq!(parse_fraud_rate("1.5").unwrap(), 1.0);
        assert_eq!(parse_fraud_rate("-2").unwrap(), 0.0);
        assert!(parse_fraud_rate("nan").is_err());
        assert!(parse_fraud_rate("inf").is_err());
        assert!(parse_fraud_rate("lots").is_err());
    }

    #[test]
    fn test_generated_batch_shape() {
        let (bytes, fraud) = generate_csv(20, 1.0).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("Time,V1,"));
        assert!(header.ends_with(",V28,Amount,Class"));
        assert_eq!(lines.count(), 20);
        assert_eq!(fraud, 20);
    }
}
