use serde::Deserialize;

use super::{check_probability, ordered_features, Classifier, ModelError};
use crate::types::FeatureVector;

/// One node of a flattened decision tree. The root is node 0.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Branch {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Training sample counts (or weights) per class.
    Leaf { value: [f64; 2] },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid("tree has no nodes".into()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Branch {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(ModelError::Invalid(format!(
                            "node {} splits on feature {} of {}",
                            index, feature, n_features
                        )));
                    }
                    // Children after parents keeps traversal acyclic.
                    for child in [*left, *right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(ModelError::Invalid(format!(
                                "node {} has out-of-order child {}",
                                index, child
                            )));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if value.iter().any(|v| *v < 0.0) || value.iter().sum::<f64>() <= 0.0 {
                        return Err(ModelError::Invalid(format!(
                            "leaf {} has no class weight",
                            index
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Class distribution of the leaf `row` lands in.
    fn leaf_distribution(&self, row: &[f64]) -> [f64; 2] {
        let mut node_index = 0;
        loop {
            match &self.nodes[node_index] {
                Node::Branch {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { value } => {
                    let total = value[0] + value[1];
                    return [value[0] / total, value[1] / total];
                }
            }
        }
    }
}

/// Random forest: probabilities are the mean of the trees' leaf
/// distributions.
#[derive(Debug, Clone, Deserialize)]
pub struct ForestModel {
    feature_names: Vec<String>,
    trees: Vec<Tree>,
}

impl ForestModel {
    pub fn new(feature_names: Vec<String>, trees: Vec<Tree>) -> Result<Self, ModelError> {
        let model = Self {
            feature_names,
            trees,
        };
        model.validate()?;
        Ok(model)
    }

    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".into()));
        }
        self.trees
            .iter()
            .try_for_each(|tree| tree.validate(self.feature_names.len()))
    }
}

impl Classifier for ForestModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, x: &FeatureVector) -> Result<u8, ModelError> {
        let [p_low, p_high] = self.predict_proba(x)?;
        Ok(u8::from(p_high > p_low))
    }

    fn predict_proba(&self, x: &FeatureVector) -> Result<[f64; 2], ModelError> {
        let row = ordered_features(x, &self.feature_names)?;
        let mut sum = [0.0; 2];
        for tree in &self.trees {
            let dist = tree.leaf_distribution(&row);
            sum[0] += dist[0];
            sum[1] += dist[1];
        }
        let n = self.trees.len() as f64;
        let p_high = check_probability(sum[1] / n)?;
        Ok([1.0 - p_high, p_high])
    }
}
