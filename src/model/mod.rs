//! Classifier artifacts and the interface the risk evaluator drives.
//!
//! A classifier declares the feature columns it was trained on; inputs are
//! gathered from a [`FeatureVector`] by name in that order, so an artifact
//! trained on a column the service does not produce fails at evaluation
//! time instead of silently reading zeros.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

use crate::types::FeatureVector;

mod forest;
mod logistic;
#[cfg(feature = "torch")]
mod torch;

pub use forest::{ForestModel, Node, Tree};
pub use logistic::LogisticModel;
#[cfg(feature = "torch")]
pub use torch::TorchModel;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid model artifact: {0}")]
    Invalid(String),
    #[error("model expects feature `{0}`, which is not in the feature vector")]
    UnknownFeature(String),
    #[error("model produced a non-finite probability")]
    NonFinite,
    #[error("TorchScript artifact {0} needs the `torch` feature")]
    TorchDisabled(PathBuf),
    #[cfg(feature = "torch")]
    #[error("torch: {0}")]
    Torch(#[from] tch::TchError),
}

/// A binary classifier over named features.
pub trait Classifier: Send + Sync {
    /// Training column order.
    fn feature_names(&self) -> &[String];

    /// Predicted class, 0 (low risk) or 1 (high risk).
    fn predict(&self, x: &FeatureVector) -> Result<u8, ModelError>;

    /// `[p(low), p(high)]`.
    fn predict_proba(&self, x: &FeatureVector) -> Result<[f64; 2], ModelError>;
}

/// JSON artifact, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    LogisticRegression(LogisticModel),
    RandomForest(ForestModel),
}

impl Artifact {
    pub fn into_classifier(self) -> Result<Arc<dyn Classifier>, ModelError> {
        match self {
            Artifact::LogisticRegression(m) => {
                m.validate()?;
                Ok(Arc::new(m))
            }
            Artifact::RandomForest(m) => {
                m.validate()?;
                Ok(Arc::new(m))
            }
        }
    }
}

/// Load a classifier. `.pt`/`.ts` files are TorchScript modules whose
/// feature order comes from `meta_path`; anything else is a JSON artifact.
pub fn load(
    model_path: &Path,
    meta_path: Option<&Path>,
) -> Result<Arc<dyn Classifier>, ModelError> {
    match model_path.extension().and_then(|e| e.to_str()) {
        Some("pt") | Some("ts") => load_torchscript(model_path, meta_path),
        _ => load_json(model_path),
    }
}

pub fn load_json(path: &Path) -> Result<Arc<dyn Classifier>, ModelError> {
    let text = fs::read_to_string(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let artifact: Artifact = serde_json::from_str(&text).map_err(|source| ModelError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    artifact.into_classifier()
}

#[cfg(feature = "torch")]
fn load_torchscript(
    model_path: &Path,
    meta_path: Option<&Path>,
) -> Result<Arc<dyn Classifier>, ModelError> {
    let meta_path = meta_path
        .ok_or_else(|| ModelError::Invalid("TorchScript artifacts need META_PATH".to_string()))?;
    Ok(Arc::new(TorchModel::new(model_path, meta_path)?))
}

#[cfg(not(feature = "torch"))]
fn load_torchscript(
    model_path: &Path,
    _meta_path: Option<&Path>,
) -> Result<Arc<dyn Classifier>, ModelError> {
    Err(ModelError::TorchDisabled(model_path.to_path_buf()))
}

/// Gather features in the model's column order.
pub fn ordered_features(x: &FeatureVector, names: &[String]) -> Result<Vec<f64>, ModelError> {
    names
        .iter()
        .map(|name| x.get(name).ok_or_else(|| ModelError::UnknownFeature(name.clone())))
        .collect()
}

fn check_probability(p: f64) -> Result<f64, ModelError> {
    if p.is_finite() {
        Ok(p)
    } else {
        Err(ModelError::NonFinite)
    }
}
