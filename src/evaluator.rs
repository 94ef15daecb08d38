use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::warn;

use crate::model::{Classifier, ModelError};
use crate::types::{FeatureVector, RiskClass};

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("no classifier is loaded")]
    MissingModel,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("predicted class {0} is not binary")]
    UnknownClass(u8),
    #[error("positive-class probability {0} is outside [0, 1]")]
    OutOfRange(f64),
}

/// Whether an evaluation came from the classifier or from the fallback.
/// Both produce the same response shape; only logs tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Model,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub risk: RiskClass,
    pub probability: f64, // percent
    pub outcome: EvaluationOutcome,
}

/// Wraps the classifier loaded at startup. Holds no classifier when the
/// artifact failed to load.
#[derive(Clone)]
pub struct RiskEvaluator {
    classifier: Option<Arc<dyn Classifier>>,
}

impl RiskEvaluator {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier: Some(classifier),
        }
    }

    pub fn without_model() -> Self {
        Self { classifier: None }
    }

    pub fn has_model(&self) -> bool {
        self.classifier.is_some()
    }

    /// Risk class and high-risk probability in percent.
    pub fn try_evaluate(&self, x: &FeatureVector) -> Result<(RiskClass, f64), EvaluationError> {
        let classifier = self
            .classifier
            .as_deref()
            .ok_or(EvaluationError::MissingModel)?;

        let class = classifier.predict(x)?;
        let risk = RiskClass::from_class(class).ok_or(EvaluationError::UnknownClass(class))?;
        let [_, p_high] = classifier.predict_proba(x)?;
        if !(0.0..=1.0).contains(&p_high) {
            return Err(EvaluationError::OutOfRange(p_high));
        }
        Ok((risk, p_high * 100.0))
    }

    /// Like [`try_evaluate`](Self::try_evaluate), but a failure yields low
    /// risk with a uniformly random probability.
    pub fn evaluate<R: Rng>(&self, x: &FeatureVector, rng: &mut R) -> Evaluation {
        match self.try_evaluate(x) {
            Ok((risk, probability)) => Evaluation {
                risk,
                probability,
                outcome: EvaluationOutcome::Model,
            },
            Err(err) => {
                let probability = rng.gen_range(0.0..=100.0);
                warn!(
                    error = %err,
                    probability,
                    "model evaluation failed; using fallback probability"
                );
                Evaluation {
                    risk: RiskClass::Low,
                    probability,
                    outcome: EvaluationOutcome::Fallback,
                }
            }
        }
    }
}
