//! Configuration management for the fraud scorer

use crate::pipeline::ScoringOptions;
use crate::types::action::ActionThresholds;
use crate::types::scored::OutputColumns;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Persisted classifier format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// ONNX graph plus JSON manifest of feature names
    #[default]
    Onnx,
    /// Logistic regression coefficients in JSON
    Linear,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub artifacts: ArtifactsConfig,
    pub columns: ColumnsConfig,
    pub scoring: ScoringConfig,
    pub output: OutputConfig,
    pub nats: NatsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Model and scaler artifacts, loaded once at startup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub model_path: String,
    pub model_format: ModelFormat,
    /// Feature manifest for ONNX models (default: model path with `.json`)
    pub manifest_path: Option<String>,
    pub scaler_path: String,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            model_path: "artifacts/rf_model.onnx".to_string(),
            model_format: ModelFormat::Onnx,
            manifest_path: None,
            scaler_path: "artifacts/scaler.json".to_string(),
            onnx_threads: 1,
        }
    }
}

/// Column names, matched by exact string
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    /// Ground-truth label, dropped before inference
    pub label: String,
    /// Amount column, normalized before inference
    pub amount: String,
    pub prediction: String,
    pub probability: String,
    pub action: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        let output = OutputColumns::default();
        Self {
            label: "Class".to_string(),
            amount: "Amount".to_string(),
            prediction: output.prediction,
            probability: output.probability,
            action: output.action,
        }
    }
}

/// Probability rounding and action thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub probability_decimals: u32,
    /// Apply action thresholds to the rounded probability
    pub threshold_on_rounded: bool,
    pub actions: ActionThresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            probability_decimals: 3,
            threshold_on_rounded: true,
            actions: ActionThresholds::default(),
        }
    }
}

/// Console output
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Rows shown in the preview table
    pub preview_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { preview_rows: 5 }
    }
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming CSV batches
    pub request_subject: String,
    /// Subject for reports when the request has no reply subject
    pub result_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            request_subject: "scoring.requests".to_string(),
            result_subject: "scoring.results".to_string(),
        }
    }
}

/// Service worker configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum batches scored concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    pub metrics_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            metrics_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a file, overridden by `FRAUD_SCORE__*` variables.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("FRAUD_SCORE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring
            .actions
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid [scoring.actions]")?;
        if self.columns.label == self.columns.amount {
            anyhow::bail!("Label and amount columns must differ");
        }
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        Ok(())
    }

    /// Pipeline options derived from the column and scoring sections
    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions {
            label_column: self.columns.label.clone(),
            amount_column: self.columns.amount.clone(),
            thresholds: self.scoring.actions.clone(),
            probability_decimals: self.scoring.probability_decimals,
            threshold_on_rounded: self.scoring.threshold_on_rounded,
            output: OutputColumns {
                prediction: self.columns.prediction.clone(),
                probability: self.columns.probability.clone(),
                action: self.columns.action.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.columns.label, "Class");
        assert_eq!(config.columns.amount, "Amount");
        assert_eq!(config.scoring.actions.block, 0.85);
        assert_eq!(config.scoring.actions.monitor, 0.6);
        assert_eq!(config.artifacts.model_format, ModelFormat::Onnx);
        assert!(config.scoring.threshold_on_rounded);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.scoring.probability_decimals, 3);
        assert_eq!(config.output.preview_rows, 5);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[artifacts]
model_path = "model.json"
model_format = "linear"

[scoring.actions]
block = 0.9
monitor = 0.5
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.artifacts.model_format, ModelFormat::Linear);
        assert_eq!(config.artifacts.scaler_path, "artifacts/scaler.json");
        assert_eq!(config.scoring.actions.block, 0.9);
        assert_eq!(config.columns.label, "Class");
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scoring.actions]\nblock = 0.4\nmonitor = 0.6\n").unwrap();

        assert!(AppConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn test_scoring_options() {
        let options = AppConfig::default().scoring_options();
        assert_eq!(options.label_column, "Class");
        assert_eq!(options.output.probability, "Fraud_Probability");
        assert_eq!(options.probability_decimals, 3);
    }
}
