//! Pre-fitted model components

pub mod classifier;
pub mod inference;
pub mod loader;
pub mod scaler;

pub use classifier::{Classifier, Inference, LinearClassifier};
pub use inference::OnnxClassifier;
pub use loader::{Artifacts, ModelLoader};
pub use scaler::{AmountScaler, FeatureNormalizer};
