//! Classifier abstraction and the pure-Rust logistic model

use crate::features::FeatureMatrix;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-row classifier output
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    /// Hard labels, one per row
    pub labels: Vec<i64>,
    /// Positive-class probabilities, one per row
    pub probabilities: Vec<f64>,
}

/// A pre-trained binary classifier. Never fitted here.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Feature columns the model was trained on, in training order.
    fn feature_names(&self) -> &[String];

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>>;

    /// Probability of the positive (fraud) class for each row.
    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Labels and probabilities together. Implementations that can produce
    /// both from one forward pass should override this.
    fn infer(&self, features: &FeatureMatrix) -> Result<Inference> {
        Ok(Inference {
            labels: self.predict(features)?,
            probabilities: self.predict_proba(features)?,
        })
    }
}

/// Logistic regression exported as plain coefficients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    #[serde(default = "default_linear_name")]
    pub name: String,
    pub features: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

fn default_linear_name() -> String {
    "logistic_regression".to_string()
}

impl LinearClassifier {
    pub fn new(features: Vec<String>, coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        let model = Self {
            name: default_linear_name(),
            features,
            coefficients,
            intercept,
        };
        model.validate()?;
        Ok(model)
    }

    /// Load coefficients from a JSON artifact.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read linear model from {}", path.display()))?;
        let model: LinearClassifier = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid linear model artifact {}", path.display()))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.features.len() != self.coefficients.len() {
            anyhow::bail!(
                "Linear model has {} features but {} coefficients",
                self.features.len(),
                self.coefficients.len()
            );
        }
        if self.features.is_empty() {
            anyhow::bail!("Linear model has no features");
        }
        Ok(())
    }

    fn decision(&self, row: &[f32]) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(&x, w)| x as f64 * w)
                .sum::<f64>()
    }

    fn check_width(&self, features: &FeatureMatrix) -> Result<()> {
        if features.cols() != self.coefficients.len() {
            anyhow::bail!(
                "Expected {} features, got {}",
                self.coefficients.len(),
                features.cols()
            );
        }
        Ok(())
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Classifier for LinearClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.features
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>> {
        self.check_width(features)?;
        Ok((0..features.rows())
            .map(|i| i64::from(self.decision(features.row(i)) > 0.0))
            .collect())
    }

    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        self.check_width(features)?;
        Ok((0..features.rows())
            .map(|i| sigmoid(self.decision(features.row(i))))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LinearClassifier {
        LinearClassifier::new(vec!["V1".to_string(), "Amount".to_string()], vec![2.0, 1.0], -1.0)
            .unwrap()
    }

    #[test]
    fn test_linear_predictions() {
        let m = model();
        // decisions: -1.0, 0.0, 3.0
        let features = FeatureMatrix::new(vec![0.0, 0.0, 0.5, 0.0, 1.0, 2.0], 3, 2);

        assert_eq!(m.predict(&features).unwrap(), vec![0, 0, 1]);

        let probs = m.predict_proba(&features).unwrap();
        assert!((probs[0] - 0.2689).abs() < 1e-4);
        assert_eq!(probs[1], 0.5);
        assert!((probs[2] - 0.9526).abs() < 1e-4);
    }

    #[test]
    fn test_infer_combines_outputs() {
        let m = model();
        let features = FeatureMatrix::new(vec![1.0, 2.0], 1, 2);

        let inference = m.infer(&features).unwrap();
        assert_eq!(inference.labels, vec![1]);
        assert_eq!(inference.probabilities.len(), 1);
    }

    #[test]
    fn test_width_mismatch() {
        let m = model();
        let features = FeatureMatrix::new(vec![1.0, 2.0, 3.0], 1, 3);
        assert!(m.predict(&features).is_err());
    }

    #[test]
    fn test_coefficient_count_mismatch() {
        assert!(LinearClassifier::new(vec!["V1".to_string()], vec![1.0, 2.0], 0.0).is_err());
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"features": ["V1", "Amount"], "coefficients": [0.5, -0.25], "intercept": 0.1}"#,
        )
        .unwrap();

        let m = LinearClassifier::from_path(&path).unwrap();
        assert_eq!(m.name(), "logistic_regression");
        assert_eq!(m.feature_names(), &["V1".to_string(), "Amount".to_string()]);
    }
}
