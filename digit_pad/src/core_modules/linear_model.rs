// THEORY:
// A minimal stand-in for the pretrained digit model: a single softmax layer whose
// weights are read from a JSON file. It exists so the tester CLI and the web front
// can run end to end without a separate model server. Anything smarter plugs in
// through `DigitClassifier` instead.
//
// The weights are loaded lazily, on the first `load` or `predict`, and cached for
// the lifetime of the classifier. A file that is missing, malformed, or whose
// shapes disagree is reported as `InferenceError::Unavailable`.

use crate::core_modules::inference::DigitClassifier;
use crate::core_modules::model_input::ModelBatch;
use crate::error::InferenceError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Weights of a `classes x (input_side * input_side)` linear layer plus bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub input_side: usize,
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl LinearWeights {
    fn validate(&self) -> Result<(), InferenceError> {
        if self.weights.is_empty() {
            return Err(InferenceError::Unavailable(String::from("model has no classes")));
        }
        if self.weights.len() != self.bias.len() {
            return Err(InferenceError::Unavailable(format!(
                "model has {} weight rows but {} biases",
                self.weights.len(),
                self.bias.len()
            )));
        }
        let cells = self.input_side * self.input_side;
        if let Some(row) = self.weights.iter().find(|row| row.len() != cells) {
            return Err(InferenceError::InputShape {
                expected: cells,
                actual: row.len(),
            });
        }
        Ok(())
    }

    fn probabilities(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let cells = self.input_side * self.input_side;
        if input.len() != cells {
            return Err(InferenceError::InputShape {
                expected: cells,
                actual: input.len(),
            });
        }
        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + bias)
            .collect();
        Ok(softmax(&logits))
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

/// Softmax classifier backed by a JSON weights file.
pub struct LinearClassifier {
    path: Option<PathBuf>,
    weights: OnceCell<LinearWeights>,
}

impl LinearClassifier {
    /// A classifier that reads its weights from `path` on first use.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            weights: OnceCell::new(),
        }
    }

    /// A classifier with weights already in memory.
    pub fn from_weights(weights: LinearWeights) -> Result<Self, InferenceError> {
        weights.validate()?;
        Ok(Self {
            path: None,
            weights: OnceCell::new_with(Some(weights)),
        })
    }

    /// A classifier with no model behind it; every call fails.
    pub fn unconfigured() -> Self {
        Self {
            path: None,
            weights: OnceCell::new(),
        }
    }

    async fn weights(&self) -> Result<&LinearWeights, InferenceError> {
        self.weights
            .get_or_try_init(|| async move {
                let path = self.path.as_ref().ok_or_else(|| {
                    InferenceError::Unavailable(String::from("no model file configured"))
                })?;
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    warn!(path = %path.display(), error = %e, "cannot read model file");
                    InferenceError::Unavailable(format!("cannot read {}: {e}", path.display()))
                })?;
                let weights: LinearWeights = serde_json::from_str(&raw).map_err(|e| {
                    InferenceError::Unavailable(format!("cannot parse {}: {e}", path.display()))
                })?;
                weights.validate()?;
                debug!(path = %path.display(), classes = weights.bias.len(), "loaded model");
                Ok::<_, InferenceError>(weights)
            })
            .await
    }
}

impl DigitClassifier for LinearClassifier {
    fn load(&self) -> BoxFuture<'_, Result<(), InferenceError>> {
        Box::pin(async move { self.weights().await.map(|_| ()) })
    }

    fn predict<'a>(
        &'a self,
        batch: &'a ModelBatch,
    ) -> BoxFuture<'a, Result<Vec<f32>, InferenceError>> {
        Box::pin(async move {
            let weights = self.weights().await?;
            let input = batch
                .first()
                .ok_or_else(|| InferenceError::Unavailable(String::from("empty batch")))?;
            weights.probabilities(input.as_slice())
        })
    }
}
