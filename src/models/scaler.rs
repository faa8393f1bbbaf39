//! Pre-fitted amount normalization

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A fitted single-column transform.
pub trait FeatureNormalizer: Send + Sync {
    /// Map raw values to the scale the classifier was trained on.
    fn transform(&self, values: &[f64]) -> Vec<f64>;

    /// Undo `transform`, when the transform is invertible.
    fn inverse_transform(&self, _values: &[f64]) -> Option<Vec<f64>> {
        None
    }
}

/// Scaler parameters exported from training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AmountScaler {
    /// `(x - mean) / scale`
    Standard { mean: f64, scale: f64 },
    /// `(x - center) / scale`
    Robust { center: f64, scale: f64 },
    /// `x * scale + min`
    MinMax { min: f64, scale: f64 },
}

impl AmountScaler {
    /// Load scaler parameters from a JSON artifact.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler from {}", path.display()))?;
        let scaler: AmountScaler = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid scaler artifact {}", path.display()))?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<()> {
        let finite = match self {
            AmountScaler::Standard { mean, scale } => mean.is_finite() && scale.is_finite(),
            AmountScaler::Robust { center, scale } => center.is_finite() && scale.is_finite(),
            AmountScaler::MinMax { min, scale } => min.is_finite() && scale.is_finite(),
        };
        if !finite {
            anyhow::bail!("Scaler parameters must be finite: {:?}", self);
        }
        if let AmountScaler::MinMax { scale, .. } = self {
            if *scale == 0.0 {
                anyhow::bail!("Min-max scaler has zero scale");
            }
        }
        Ok(())
    }

    /// (offset, divisor) such that `transform(x) = (x - offset) / divisor`
    fn affine(&self) -> (f64, f64) {
        match *self {
            AmountScaler::Standard { mean, scale } => (mean, non_zero(scale)),
            AmountScaler::Robust { center, scale } => (center, non_zero(scale)),
            AmountScaler::MinMax { min, scale } => (-min / scale, 1.0 / scale),
        }
    }
}

/// Constant features are fitted with a zero scale; they pass through unscaled.
fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}

impl FeatureNormalizer for AmountScaler {
    fn transform(&self, values: &[f64]) -> Vec<f64> {
        let (offset, divisor) = self.affine();
        values.iter().map(|x| (x - offset) / divisor).collect()
    }

    fn inverse_transform(&self, values: &[f64]) -> Option<Vec<f64>> {
        let (offset, divisor) = self.affine();
        Some(values.iter().map(|z| z * divisor + offset).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let scaler = AmountScaler::Standard {
            mean: 88.35,
            scale: 250.12,
        };
        let out = scaler.transform(&[88.35, 338.47]);

        assert!(out[0].abs() < 1e-12);
        assert!((out[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_round_trip() {
        let raw = [0.0, 2.69, 149.62, 378.66, 25691.16];
        let scalers = [
            AmountScaler::Standard { mean: 88.35, scale: 250.12 },
            AmountScaler::Robust { center: 22.0, scale: 71.565 },
            AmountScaler::MinMax { min: -0.5, scale: 0.002 },
        ];

        for scaler in &scalers {
            let scaled = scaler.transform(&raw);
            let restored = scaler.inverse_transform(&scaled).unwrap();
            for (a, b) in raw.iter().zip(&restored) {
                assert!((a - b).abs() < 1e-6, "{:?}: {} vs {}", scaler, a, b);
            }
        }
    }

    #[test]
    fn test_minmax_formula() {
        let scaler = AmountScaler::MinMax { min: -0.5, scale: 0.01 };
        let out = scaler.transform(&[50.0, 150.0]);
        assert!(out[0].abs() < 1e-12);
        assert!((out[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_scale_passes_through() {
        let scaler = AmountScaler::Standard { mean: 5.0, scale: 0.0 };
        assert_eq!(scaler.transform(&[7.0]), vec![2.0]);
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        std::fs::write(&path, r#"{"kind": "standard", "mean": 88.35, "scale": 250.12}"#).unwrap();

        let scaler = AmountScaler::from_path(&path).unwrap();
        assert_eq!(
            scaler,
            AmountScaler::Standard {
                mean: 88.35,
                scale: 250.12
            }
        );
    }

    #[test]
    fn test_load_rejects_zero_minmax() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        std::fs::write(&path, r#"{"kind": "minmax", "min": 0.0, "scale": 0.0}"#).unwrap();

        assert!(AmountScaler::from_path(&path).is_err());
    }
}
