use serde::Deserialize;

use super::{check_probability, ordered_features, Classifier, ModelError};
use crate::types::FeatureVector;

/// Logistic regression exported as raw coefficients.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticModel {
    pub fn new(
        feature_names: Vec<String>,
        coefficients: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, ModelError> {
        let model = Self {
            feature_names,
            coefficients,
            intercept,
        };
        model.validate()?;
        Ok(model)
    }

    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.is_empty() {
            return Err(ModelError::Invalid("logistic model has no features".into()));
        }
        if self.coefficients.len() != self.feature_names.len() {
            return Err(ModelError::Invalid(format!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            )));
        }
        Ok(())
    }

    fn positive_probability(&self, x: &FeatureVector) -> Result<f64, ModelError> {
        let row = ordered_features(x, &self.feature_names)?;
        let z = self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(v, w)| v * w)
                .sum::<f64>();
        check_probability(1.0 / (1.0 + (-z).exp()))
    }
}

impl Classifier for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, x: &FeatureVector) -> Result<u8, ModelError> {
        Ok(u8::from(self.positive_probability(x)? > 0.5))
    }

    fn predict_proba(&self, x: &FeatureVector) -> Result<[f64; 2], ModelError> {
        let p = self.positive_probability(x)?;
        Ok([1.0 - p, p])
    }
}
