//! Running statistics for the scoring service.

use crate::types::action::RiskAction;
use crate::types::scored::{ScoredBatch, SummaryStats};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for served batches
pub struct ScoringMetrics {
    /// Batches scored successfully
    pub batches_scored: AtomicU64,
    /// Batches rejected (schema, feature or classifier errors)
    pub batches_failed: AtomicU64,
    /// Rows across all scored batches
    pub rows_scored: AtomicU64,
    /// Rows predicted fraudulent
    pub fraud_rows: AtomicU64,
    /// Rows per risk action
    rows_by_action: RwLock<HashMap<RiskAction, u64>>,
    /// Failures by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Batch processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fraud probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            batches_scored: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            rows_scored: AtomicU64::new(0),
            fraud_rows: AtomicU64::new(0),
            rows_by_action: RwLock::new(HashMap::new()),
            failures_by_kind: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully scored batch
    pub fn record_batch(&self, processing_time: Duration, scored: &ScoredBatch, summary: &SummaryStats) {
        self.batches_scored.fetch_add(1, Ordering::Relaxed);
        self.rows_scored.fetch_add(summary.total as u64, Ordering::Relaxed);
        self.fraud_rows.fetch_add(summary.fraud_count as u64, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut by_action) = self.rows_by_action.write() {
            for action in RiskAction::ALL {
                *by_action.entry(action).or_insert(0) += summary.actions.get(action) as u64;
            }
        }

        if let Ok(mut buckets) = self.probability_buckets.write() {
            for row in &scored.rows {
                let bucket = (row.fraud_probability * 10.0).clamp(0.0, 9.0) as usize;
                buckets[bucket] += 1;
            }
        }
    }

    /// Record a rejected batch
    pub fn record_failure(&self, kind: &str) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    /// Rows per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.rows_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or([0; 10])
    }

    pub fn get_rows_by_action(&self) -> HashMap<RiskAction, u64> {
        self.rows_by_action
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Overall fraud rate across all scored rows, as a percentage
    pub fn fraud_rate(&self) -> f64 {
        let rows = self.rows_scored.load(Ordering::Relaxed);
        if rows > 0 {
            self.fraud_rows.load(Ordering::Relaxed) as f64 / rows as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let batches = self.batches_scored.load(Ordering::Relaxed);
        let failed = self.batches_failed.load(Ordering::Relaxed);
        let rows = self.rows_scored.load(Ordering::Relaxed);
        let fraud = self.fraud_rows.load(Ordering::Relaxed);

        let processing = self.get_processing_stats();
        let by_action = self.get_rows_by_action();
        let failures = self.get_failures_by_kind();
        let distribution = self.get_probability_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              FRAUD SCORING SERVICE - METRICS SUMMARY         ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Batches Scored: {:>8}  │  Rejected: {:>8}                ║",
            batches, failed
        );
        info!(
            "║ Rows Scored:    {:>8}  │  Throughput: {:>8.1} rows/s     ║",
            rows,
            self.get_throughput()
        );
        info!(
            "║ Fraud Rows:     {:>8}  │  Fraud Rate: {:>6.2}%             ║",
            fraud,
            self.fraud_rate()
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Batch Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Rows by Action:                                              ║");
        for action in RiskAction::ALL {
            let count = by_action.get(&action).copied().unwrap_or(0);
            let pct = if rows > 0 {
                (count as f64 / rows as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:10}: {:>8} ({:>5.1}%)                              ║", action, count, pct);
        }
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Rejections:                                                  ║");
            for (kind, count) in &failures {
                info!("║   {:20}: {:>8}                                ║", kind, count);
            }
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Fraud Probability Distribution:                              ║");
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>8} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodically logs the metrics summary
pub struct MetricsReporter {
    metrics: std::sync::Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
