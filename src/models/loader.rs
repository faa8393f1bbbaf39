//! Loading of persisted model and scaler artifacts

use crate::config::{ArtifactsConfig, ModelFormat};
use crate::models::classifier::{Classifier, LinearClassifier};
use crate::models::inference::OnnxClassifier;
use crate::models::scaler::{AmountScaler, FeatureNormalizer};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
    /// Output name for hard labels, if the graph has one
    pub label_name: Option<String>,
}

/// Sidecar metadata for an ONNX model.
///
/// ONNX graphs only carry the input width, not the training column names.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelManifest {
    /// Training feature columns, in order
    pub features: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Override for the probability output name
    #[serde(default)]
    pub probability_output: Option<String>,
    /// Override for the label output name
    #[serde(default)]
    pub label_output: Option<String>,
}

impl ModelManifest {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model manifest {}", path.display()))?;
        let manifest: ModelManifest = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid model manifest {}", path.display()))?;
        if manifest.features.is_empty() {
            anyhow::bail!("Model manifest {} lists no features", path.display());
        }
        Ok(manifest)
    }
}

/// Both fitted artifacts the scoring pipeline needs
pub struct Artifacts {
    pub normalizer: Arc<dyn FeatureNormalizer>,
    pub classifier: Arc<dyn Classifier>,
}

/// Loader for persisted artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load scaler and classifier. Any failure here is fatal for the process.
    pub fn load_artifacts(&self, config: &ArtifactsConfig) -> Result<Artifacts> {
        let scaler = AmountScaler::from_path(&config.scaler_path)?;
        info!(path = %config.scaler_path, scaler = ?scaler, "Scaler loaded");

        let classifier: Arc<dyn Classifier> = match config.model_format {
            ModelFormat::Onnx => {
                let manifest_path = config
                    .manifest_path
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| Path::new(&config.model_path).with_extension("json"));
                let manifest = ModelManifest::from_path(&manifest_path)?;
                let model = self.load_model(&config.model_path, &manifest)?;
                Arc::new(OnnxClassifier::new(model, manifest))
            }
            ModelFormat::Linear => Arc::new(LinearClassifier::from_path(&config.model_path)?),
        };

        info!(
            model = %classifier.name(),
            format = ?config.model_format,
            features = classifier.feature_names().len(),
            "Classifier loaded"
        );

        Ok(Artifacts {
            normalizer: Arc::new(scaler),
            classifier,
        })
    }

    /// Load a single ONNX model from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, manifest: &ModelManifest) -> Result<LoadedModel> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        ort::init().commit()?;

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = manifest.probability_output.clone().unwrap_or_else(|| {
            session
                .outputs
                .iter()
                .find(|o| o.name.contains("prob"))
                .or_else(|| session.outputs.last())
                .map(|o| o.name.clone())
                .unwrap_or_else(|| "probabilities".to_string())
        });

        let label_name = manifest.label_output.clone().or_else(|| {
            session
                .outputs
                .iter()
                .find(|o| o.name.contains("label"))
                .map(|o| o.name.clone())
        });

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            label = ?label_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name,
            session,
            input_name,
            output_name,
            label_name,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rf_model.json");
        std::fs::write(&path, r#"{"features": ["Time", "V1", "Amount"], "name": "random_forest"}"#)
            .unwrap();

        let manifest = ModelManifest::from_path(&path).unwrap();
        assert_eq!(manifest.features.len(), 3);
        assert_eq!(manifest.name.as_deref(), Some("random_forest"));
        assert!(manifest.label_output.is_none());
    }

    #[test]
    fn test_manifest_requires_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, r#"{"features": []}"#).unwrap();

        assert!(ModelManifest::from_path(&path).is_err());
    }

    #[test]
    fn test_load_linear_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        let scaler_path = dir.path().join("scaler.json");
        std::fs::write(
            &model_path,
            r#"{"features": ["V1", "Amount"], "coefficients": [1.0, 0.5], "intercept": -2.0}"#,
        )
        .unwrap();
        std::fs::write(&scaler_path, r#"{"kind": "standard", "mean": 10.0, "scale": 5.0}"#).unwrap();

        let config = ArtifactsConfig {
            model_path: model_path.display().to_string(),
            model_format: ModelFormat::Linear,
            manifest_path: None,
            scaler_path: scaler_path.display().to_string(),
            onnx_threads: 1,
        };

        let artifacts = ModelLoader::new().load_artifacts(&config).unwrap();
        assert_eq!(artifacts.classifier.feature_names().len(), 2);
        assert_eq!(artifacts.normalizer.transform(&[20.0]), vec![2.0]);
    }

    #[test]
    fn test_bundled_linear_artifacts() {
        let root = env!("CARGO_MANIFEST_DIR");
        let config = ArtifactsConfig {
            model_path: format!("{}/artifacts/linear_model.json", root),
            model_format: ModelFormat::Linear,
            manifest_path: None,
            scaler_path: format!("{}/artifacts/scaler.json", root),
            onnx_threads: 1,
        };

        let artifacts = ModelLoader::new().load_artifacts(&config).unwrap();
        let features = artifacts.classifier.feature_names();
        assert_eq!(features.len(), 30);
        assert_eq!(features.first().map(String::as_str), Some("Time"));
        assert_eq!(features.last().map(String::as_str), Some("Amount"));
    }

    #[test]
    fn test_missing_scaler_is_fatal() {
        let config = ArtifactsConfig {
            model_path: "does/not/exist.json".to_string(),
            model_format: ModelFormat::Linear,
            manifest_path: None,
            scaler_path: "does/not/exist_scaler.json".to_string(),
            onnx_threads: 1,
        };

        assert!(ModelLoader::new().load_artifacts(&config).is_err());
    }
}
