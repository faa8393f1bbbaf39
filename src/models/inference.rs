//! ONNX Runtime classifier

use crate::features::FeatureMatrix;
use crate::models::classifier::{Classifier, Inference};
use crate::models::loader::{LoadedModel, ModelManifest};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::SessionOutputs;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue};
use std::sync::RwLock;
use tracing::debug;

/// Binary classifier backed by an ONNX Runtime session.
///
/// Handles the two output layouts produced by common exporters: a
/// `[rows, classes]` probability tensor (random forest, XGBoost) and a
/// `seq(map(int64, float))` (LightGBM, CatBoost, sklearn with zipmap).
pub struct OnnxClassifier {
    name: String,
    features: Vec<String>,
    /// Session runs need exclusive access
    model: RwLock<LoadedModel>,
}

impl OnnxClassifier {
    pub fn new(model: LoadedModel, manifest: ModelManifest) -> Self {
        Self {
            name: manifest.name.unwrap_or_else(|| model.name.clone()),
            features: manifest.features,
            model: RwLock::new(model),
        }
    }

    fn run(&self, features: &FeatureMatrix) -> Result<Inference> {
        use ort::value::Tensor;

        let rows = features.rows();
        if features.cols() != self.features.len() {
            anyhow::bail!(
                "Expected {} features, got {}",
                self.features.len(),
                features.cols()
            );
        }

        // Input tensor - shape [rows, num_features]
        let shape = vec![rows as i64, features.cols() as i64];
        let input_tensor = Tensor::from_array((shape, features.as_slice().to_vec()))
            .context("Failed to create input tensor")?;

        let mut model = self
            .model
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let LoadedModel {
            session,
            input_name,
            output_name,
            label_name,
            ..
        } = &mut *model;

        let outputs = session.run(ort::inputs![input_name.as_str() => input_tensor])?;

        let probabilities = extract_probabilities(&outputs, output_name, rows, &self.name)?;

        let labels = match label_name
            .as_deref()
            .and_then(|name| outputs.get(name))
            .and_then(|output| output.try_extract_tensor::<i64>().ok())
        {
            Some((_, data)) => data.to_vec(),
            None => {
                debug!(model = %self.name, "No label output, deriving labels from probabilities");
                probabilities.iter().map(|&p| i64::from(p > 0.5)).collect()
            }
        };

        Ok(Inference {
            labels,
            probabilities,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.features
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>> {
        Ok(self.run(features)?.labels)
    }

    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        Ok(self.run(features)?.probabilities)
    }

    fn infer(&self, features: &FeatureMatrix) -> Result<Inference> {
        self.run(features)
    }
}

/// Extract per-row fraud probabilities from the session outputs
fn extract_probabilities(
    outputs: &SessionOutputs,
    output_name: &str,
    rows: usize,
    model_name: &str,
) -> Result<Vec<f64>> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(probs) = probabilities_from_value(output, rows, model_name)? {
            return Ok(probs);
        }
    }

    // Fallback: first non-label output that yields probabilities
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(probs) = probabilities_from_value(&output, rows, model_name)? {
            debug!(model = %model_name, output = %name, "Extracted probabilities (fallback)");
            return Ok(probs);
        }
    }

    Err(anyhow::anyhow!(
        "Model {} produced no probability output",
        model_name
    ))
}

fn probabilities_from_value(
    output: &DynValue,
    rows: usize,
    model_name: &str,
) -> Result<Option<Vec<f64>>> {
    let dtype = output.dtype();

    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return fraud_probs_from_tensor(&dims, data, rows).map(Some);
    }

    if DynSequenceValueType::can_downcast(&dtype) {
        return fraud_probs_from_sequence_map(output, rows, model_name).map(Some);
    }

    Ok(None)
}

/// Fraud probability per row from a `[rows, classes]` or `[rows]` tensor
fn fraud_probs_from_tensor(dims: &[i64], data: &[f32], rows: usize) -> Result<Vec<f64>> {
    let classes = match dims {
        [r, k] if *r as usize == rows => *k as usize,
        [r] if *r as usize == rows => 1,
        _ => anyhow::bail!("Unexpected probability shape {:?} for {} rows", dims, rows),
    };
    if classes == 0 || data.len() < rows * classes {
        anyhow::bail!("Probability tensor too small: shape {:?}", dims);
    }

    // Class index 1 is the fraud class
    let column = if classes >= 2 { 1 } else { 0 };
    Ok((0..rows)
        .map(|i| data[i * classes + column] as f64)
        .collect())
}

/// Fraud probability per row from `seq(map(int64, float))`
fn fraud_probs_from_sequence_map(
    output: &DynValue,
    rows: usize,
    model_name: &str,
) -> Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    if maps.len() != rows {
        anyhow::bail!(
            "Model {} returned {} probability maps for {} rows",
            model_name,
            maps.len(),
            rows
        );
    }

    let mut probs = Vec::with_capacity(rows);
    for map_value in &maps {
        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
        probs.push(fraud_prob_from_pairs(&kv_pairs)?);
    }
    Ok(probs)
}

fn fraud_prob_from_pairs(pairs: &[(i64, f32)]) -> Result<f64> {
    if let Some((_, p)) = pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Ok(*p as f64);
    }
    if let Some((_, p)) = pairs.iter().find(|(class_id, _)| *class_id == 0) {
        return Ok(1.0 - *p as f64);
    }
    Err(anyhow::anyhow!("No class probability found in map"))
}
