use serde::Deserialize;
use std::{fs, path::Path};
use tch::{kind::Kind, CModule, Device, Tensor};

use super::{check_probability, ordered_features, Classifier, ModelError};
use crate::types::FeatureVector;

#[derive(Deserialize)]
struct MetaJson {
    feat_list: Vec<String>,
}

/// TorchScript classifier producing `[1, 2]` class scores per row.
pub struct TorchModel {
    model: CModule,
    device: Device,
    feat_list: Vec<String>,
}

impl TorchModel {
    pub fn new(model_path: &Path, meta_path: &Path) -> Result<Self, ModelError> {
        let device = Device::Cpu;

        // meta.json carries the training column order
        let meta_txt = fs::read_to_string(meta_path).map_err(|source| ModelError::Read {
            path: meta_path.to_path_buf(),
            source,
        })?;
        let meta: MetaJson = serde_json::from_str(&meta_txt).map_err(|source| ModelError::Parse {
            path: meta_path.to_path_buf(),
            source,
        })?;

        let model = CModule::load_on_device(model_path, device)?;

        // Probe output shape with a dummy forward
        let in_dim = meta.feat_list.len() as i64;
        let dummy = Tensor::zeros([1, in_dim], (Kind::Float, device));
        let sz = model.forward_ts(&[dummy])?.size();
        if sz != [1, 2] {
            return Err(ModelError::Invalid(format!(
                "unexpected model output size: {:?}",
                sz
            )));
        }

        Ok(Self {
            model,
            device,
            feat_list: meta.feat_list,
        })
    }
}

impl Classifier for TorchModel {
    fn feature_names(&self) -> &[String] {
        &self.feat_list
    }

    fn predict(&self, x: &FeatureVector) -> Result<u8, ModelError> {
        let [p_low, p_high] = self.predict_proba(x)?;
        Ok(u8::from(p_high > p_low))
    }

    fn predict_proba(&self, x: &FeatureVector) -> Result<[f64; 2], ModelError> {
        let row: Vec<f32> = ordered_features(x, &self.feat_list)?
            .into_iter()
            .map(|v| v as f32)
            .collect();
        let input = Tensor::from_slice(&row)
            .reshape([1, row.len() as i64])
            .to_device(self.device);

        let scores = self.model.forward_ts(&[input])?.to_kind(Kind::Double);
        let (a, b) = (scores.double_value(&[0, 0]), scores.double_value(&[0, 1]));

        // Modules exported without a softmax head return logits.
        let already_probabilities = a >= 0.0 && b >= 0.0 && ((a + b) - 1.0).abs() < 1e-4;
        let p_high = if already_probabilities {
            b
        } else {
            scores.softmax(-1, Kind::Double).double_value(&[0, 1])
        };
        let p_high = check_probability(p_high)?;
        Ok([1.0 - p_high, p_high])
    }
}
