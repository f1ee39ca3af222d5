// THEORY:
// The classifier is an external collaborator: the pad does not know how a model is
// stored or evaluated, only that it can be loaded and asked for a probability per
// digit class. `DigitClassifier` is that seam. Both operations are asynchronous and
// return a `Result`, so a missing or broken model becomes an `InferenceError` the UI
// can show rather than a callback that never fires.
//
// `Prediction` is the presentation form of the raw probability vector: one entry per
// digit, expressed as a percentage with four decimals, best guess first.

use crate::core_modules::model_input::ModelBatch;
use crate::error::InferenceError;
use futures::future::BoxFuture;
use serde::Serialize;

const PERCENT_DECIMALS: f64 = 10_000.0;

/// A pretrained model mapping a batch of drawings to class probabilities.
pub trait DigitClassifier: Send + Sync {
    /// Makes the model ready. Implementations should make repeat calls cheap.
    fn load(&self) -> BoxFuture<'_, Result<(), InferenceError>>;

    /// Returns one probability per digit class for the first input of `batch`.
    fn predict<'a>(&'a self, batch: &'a ModelBatch)
    -> BoxFuture<'a, Result<Vec<f32>, InferenceError>>;
}

/// Confidence for a single digit class, in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigitConfidence {
    pub digit: usize,
    pub confidence: f64,
}

/// Class confidences sorted from most to least likely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    ranked: Vec<DigitConfidence>,
}

impl Prediction {
    pub fn from_probabilities(probabilities: &[f32]) -> Self {
        let mut ranked: Vec<DigitConfidence> = probabilities
            .iter()
            .enumerate()
            .map(|(digit, &p)| DigitConfidence {
                digit,
                confidence: (p as f64 * 100.0 * PERCENT_DECIMALS).round() / PERCENT_DECIMALS,
            })
            .collect();
        // Stable sort: equal confidences keep ascending digit order.
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self { ranked }
    }

    pub fn ranked(&self) -> &[DigitConfidence] {
        &self.ranked
    }

    pub fn best(&self) -> Option<&DigitConfidence> {
        self.ranked.first()
    }

    /// The text shown in the pad's confidence label.
    pub fn label(&self) -> String {
        match self.best() {
            Some(best) => format!("Digit: {}", best.digit),
            None => String::from("Digit: ?"),
        }
    }
}

/// Loads the classifier, runs it on `batch` and ranks the result.
pub async fn classify(
    classifier: &dyn DigitClassifier,
    batch: &ModelBatch,
) -> Result<Prediction, InferenceError> {
    classifier.load().await?;
    let probabilities = classifier.predict(batch).await?;
    if probabilities.is_empty() {
        return Err(InferenceError::Unavailable(String::from(
            "model returned an empty probability vector",
        )));
    }
    Ok(Prediction::from_probabilities(&probabilities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::grid_reducer::GridReducer;
    use crate::core_modules::model_input::to_model_input;

    struct Fixed(Result<Vec<f32>, InferenceError>);

    impl DigitClassifier for Fixed {
        fn load(&self) -> BoxFuture<'_, Result<(), InferenceError>> {
            Box::pin(async { Ok(()) })
        }

        fn predict<'a>(
            &'a self,
            _batch: &'a ModelBatch,
        ) -> BoxFuture<'a, Result<Vec<f32>, InferenceError>> {
            Box::pin(async move { self.0.clone() })
        }
    }

    fn blank_batch() -> ModelBatch {
        let reducer = GridReducer::new(28, 1).unwrap();
        let reduction = reducer.process_frame(&vec![0u8; 28 * 28 * 4]).unwrap();
        to_model_input(&reduction.reduced).batch()
    }

    #[test]
    fn ranks_by_descending_confidence() {
        let prediction = Prediction::from_probabilities(&[0.1, 0.7, 0.2]);
        let digits: Vec<usize> = prediction.ranked().iter().map(|d| d.digit).collect();
        assert_eq!(digits, vec![1, 2, 0]);
        assert_eq!(prediction.label(), "Digit: 1");
    }

    #[test]
    fn rounds_percentages_to_four_decimals() {
        let prediction = Prediction::from_probabilities(&[0.123456789]);
        assert_eq!(prediction.ranked()[0].confidence, 12.3457);
    }

    #[test]
    fn ties_keep_digit_order() {
        let prediction = Prediction::from_probabilities(&[0.5, 0.5]);
        assert_eq!(prediction.ranked()[0].digit, 0);
        assert_eq!(prediction.ranked()[1].digit, 1);
    }

    #[tokio::test]
    async fn classify_ranks_model_output() {
        let classifier = Fixed(Ok(vec![0.05, 0.05, 0.9]));
        let prediction = classify(&classifier, &blank_batch()).await.unwrap();
        assert_eq!(prediction.best().map(|b| b.digit), Some(2));
    }

    #[tokio::test]
    async fn classify_surfaces_failures() {
        let failing = Fixed(Err(InferenceError::Unavailable("offline".into())));
        assert_eq!(
            classify(&failing, &blank_batch()).await,
            Err(InferenceError::Unavailable("offline".into()))
        );

        let empty = Fixed(Ok(Vec::new()));
        assert!(classify(&empty, &blank_batch()).await.is_err());
    }
}
