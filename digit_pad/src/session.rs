// THEORY:
// A `DrawSession` is the controller behind one pad on screen. It owns the drawing
// surface, the config, and the small amount of state a UI needs: whether a stroke
// is in progress, whether a prediction is pending, and what to show.
//
// Predictions are asynchronous and can overlap when several strokes are allowed,
// so every request carries a sequence number. Only the most recently issued request
// may update the display. A slower answer to an older drawing arrives, is logged,
// and is dropped. Nothing is cancelled; stale work is simply ignored on arrival.

use crate::core_modules::grid_reducer::Reduction;
use crate::core_modules::inference::{DigitClassifier, Prediction, classify};
use crate::core_modules::model_input::{ModelBatch, to_model_input};
use crate::core_modules::surface::DrawingSurface;
use crate::error::{ConfigurationError, InferenceError};
use crate::pipeline::{DigitPipeline, PadConfig};
use image::DynamicImage;
use tracing::{debug, warn};

/// Identifies one prediction request. Later requests compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// What the pad is currently showing.
#[derive(Debug, Clone, PartialEq)]
pub enum PadState {
    /// Nothing drawn, or cleared.
    Idle,
    /// A stroke is in progress.
    Drawing,
    /// Waiting on the classifier for `request`.
    Loading { request: RequestId },
    /// The latest prediction.
    Showing(Prediction),
    /// The classifier could not answer the latest request.
    Failed(String),
}

/// A reduced drawing ready for the classifier.
#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub id: RequestId,
    pub batch: ModelBatch,
}

/// Runs a request against `classifier`, returning the id alongside the outcome so
/// the caller can feed it back to `DrawSession::complete`.
pub async fn fulfil(
    request: PredictRequest,
    classifier: &dyn DigitClassifier,
) -> (RequestId, Result<Prediction, InferenceError>) {
    let result = classify(classifier, &request.batch).await;
    (request.id, result)
}

/// One pad on screen: the surface being drawn on, the stroke rules of its config
/// and the prediction it currently shows.
pub struct DrawSession {
    pipeline: DigitPipeline,
    surface: DrawingSurface,
    state: PadState,
    stroke_active: bool,
    strokes_completed: u32,
    last_reduction: Option<Reduction>,
    next_sequence: u64,
    latest_request: Option<RequestId>,
}

impl DrawSession {
    pub fn new(config: PadConfig) -> Result<Self, ConfigurationError> {
        let pipeline = DigitPipeline::new(config)?;
        let surface = DrawingSurface::new(pipeline.config().canvas_side(), pipeline.config().line_width);
        Ok(Self {
            pipeline,
            surface,
            state: PadState::Idle,
            stroke_active: false,
            strokes_completed: 0,
            last_reduction: None,
            next_sequence: 0,
            latest_request: None,
        })
    }

    pub fn config(&self) -> &PadConfig {
        self.pipeline.config()
    }

    pub fn state(&self) -> &PadState {
        &self.state
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn last_reduction(&self) -> Option<&Reduction> {
        self.last_reduction.as_ref()
    }

    pub fn strokes_completed(&self) -> u32 {
        self.strokes_completed
    }

    /// Whether the pad accepts a new stroke right now.
    pub fn can_draw(&self) -> bool {
        self.config().allows_multiple_draws || self.strokes_completed == 0
    }

    /// Starts a stroke. Returns `false` when the pad is locked after its single draw.
    pub fn pointer_down(&mut self, x: f32, y: f32) -> bool {
        if !self.can_draw() {
            debug!("stroke ignored, pad already holds a drawing");
            return false;
        }
        self.surface.begin_stroke(x, y);
        self.stroke_active = true;
        self.state = PadState::Drawing;
        true
    }

    /// Whether a stroke is in progress. Independent of what the pad shows, since a
    /// result may arrive mid-stroke.
    pub fn is_stroking(&self) -> bool {
        self.stroke_active
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if self.stroke_active {
            self.surface.stroke_to(x, y);
        }
    }

    /// Finishes the stroke, reduces the canvas and issues a prediction request.
    /// Returns `None` when no stroke was in progress.
    pub fn pointer_up(&mut self) -> Result<Option<PredictRequest>, ConfigurationError> {
        if !self.stroke_active {
            return Ok(None);
        }
        self.stroke_active = false;
        self.surface.end_stroke();
        self.strokes_completed += 1;
        self.issue_request().map(Some)
    }

    /// Explicit predict action.
    pub fn request_prediction(&mut self) -> Result<PredictRequest, ConfigurationError> {
        self.issue_request()
    }

    /// Replaces the drawing with an uploaded image. The pad stays idle until a
    /// prediction is requested.
    pub fn upload_image(&mut self, image: &DynamicImage) -> Result<(), ConfigurationError> {
        self.clear();
        self.surface.draw_image(image);
        self.strokes_completed = 1;
        self.last_reduction = Some(self.pipeline.reduce(self.surface.pixels())?);
        Ok(())
    }

    /// Applies the outcome of `request`. Returns `false` when a newer request has
    /// been issued since, the pad was cleared, or `request` was already applied, in
    /// which case nothing changes. Only the display state is touched.
    pub fn complete(
        &mut self,
        request: RequestId,
        result: Result<Prediction, InferenceError>,
    ) -> bool {
        if self.latest_request != Some(request) {
            debug!(
                request = request.sequence(),
                latest = ?self.latest_request.map(|r| r.sequence()),
                "dropping stale prediction"
            );
            return false;
        }
        self.latest_request = None;
        self.state = match result {
            Ok(prediction) => PadState::Showing(prediction),
            Err(err) => {
                warn!(request = request.sequence(), error = %err, "prediction failed");
                PadState::Failed(err.to_string())
            }
        };
        true
    }

    /// Issues a request and awaits it in place. Convenient when predictions cannot
    /// overlap; otherwise drive `fulfil` and `complete` separately.
    pub async fn predict_now(
        &mut self,
        classifier: &dyn DigitClassifier,
    ) -> Result<&PadState, ConfigurationError> {
        let request = self.issue_request()?;
        let (id, result) = fulfil(request, classifier).await;
        self.complete(id, result);
        Ok(&self.state)
    }

    /// The reduced grid rendered at canvas size, when the debug view is enabled.
    pub fn visualization(&self) -> Option<Vec<u8>> {
        if !self.config().can_visualize_as_28x28 {
            return None;
        }
        self.last_reduction
            .as_ref()
            .map(|r| DrawingSurface::render_reduced(&r.reduced, self.config().scale))
    }

    /// Wipes the drawing. In-flight predictions will be dropped when they arrive.
    pub fn clear(&mut self) {
        self.surface.clear();
        self.stroke_active = false;
        self.state = PadState::Idle;
        self.strokes_completed = 0;
        self.last_reduction = None;
        self.latest_request = None;
    }

    fn issue_request(&mut self) -> Result<PredictRequest, ConfigurationError> {
        let reduction = self.pipeline.reduce(self.surface.pixels())?;
        let batch = to_model_input(&reduction.reduced).batch();
        let id = RequestId(self.next_sequence);
        self.next_sequence += 1;
        self.latest_request = Some(id);
        self.last_reduction = Some(reduction);
        self.state = PadState::Loading { request: id };
        debug!(request = id.sequence(), "issued prediction request");
        Ok(PredictRequest { id, batch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(allows_multiple_draws: bool) -> PadConfig {
        PadConfig {
            scale: 2,
            grid_side: 4,
            line_width: 2.0,
            allows_multiple_draws,
            can_visualize_as_28x28: true,
        }
    }

    fn draw_dot(session: &mut DrawSession) -> Option<PredictRequest> {
        assert!(session.pointer_down(1.0, 1.0));
        session.pointer_move(3.0, 3.0);
        session.pointer_up().unwrap()
    }

    #[test]
    fn stroke_issues_request_and_enters_loading() {
        let mut session = DrawSession::new(small_config(false)).unwrap();
        let request = draw_dot(&mut session).expect("stroke should issue a request");
        assert_eq!(session.state(), &PadState::Loading { request: request.id });
        assert_eq!(request.batch.shape(), [1, 4, 4, 1]);
        assert!(session.last_reduction().is_some());
    }

    #[test]
    fn single_draw_mode_locks_after_first_stroke() {
        let mut session = DrawSession::new(small_config(false)).unwrap();
        draw_dot(&mut session);
        assert!(!session.pointer_down(5.0, 5.0));
        assert_eq!(session.pointer_up().unwrap().map(|r| r.id), None);

        session.clear();
        assert_eq!(session.state(), &PadState::Idle);
        assert!(session.pointer_down(5.0, 5.0));
    }

    #[test]
    fn multi_draw_mode_keeps_accepting_strokes() {
        let mut session = DrawSession::new(small_config(true)).unwrap();
        let first = draw_dot(&mut session).unwrap();
        let second = draw_dot(&mut session).unwrap();
        assert!(second.id > first.id);
        assert_eq!(session.strokes_completed(), 2);
    }

    #[test]
    fn stale_completion_is_dropped() {
        let mut session = DrawSession::new(small_config(true)).unwrap();
        let first = draw_dot(&mut session).unwrap();
        let second = draw_dot(&mut session).unwrap();

        let newest = Prediction::from_probabilities(&[0.1, 0.9]);
        assert!(session.complete(second.id, Ok(newest.clone())));
        let stale = Prediction::from_probabilities(&[0.9, 0.1]);
        assert!(!session.complete(first.id, Ok(stale)));
        assert_eq!(session.state(), &PadState::Showing(newest));
    }

    #[test]
    fn result_arriving_mid_stroke_keeps_the_stroke() {
        let mut session = DrawSession::new(small_config(true)).unwrap();
        let first = draw_dot(&mut session).unwrap();

        assert!(session.pointer_down(2.0, 2.0));
        assert!(session.complete(first.id, Ok(Prediction::from_probabilities(&[0.2, 0.8]))));
        assert!(session.is_stroking());
        assert_eq!(session.surface().pixel(4, 4).alpha, 0);
        session.pointer_move(6.0, 6.0);
        assert_eq!(session.surface().pixel(4, 4).alpha, 255);

        let second = session.pointer_up().unwrap().expect("second stroke should issue a request");
        assert!(second.id > first.id);
        assert!(!session.is_stroking());
        assert_eq!(session.strokes_completed(), 2);
        assert_eq!(session.state(), &PadState::Loading { request: second.id });
    }

    #[test]
    fn completion_applies_once() {
        let mut session = DrawSession::new(small_config(false)).unwrap();
        let request = draw_dot(&mut session).unwrap();
        let shown = Prediction::from_probabilities(&[0.3, 0.7]);
        assert!(session.complete(request.id, Ok(shown.clone())));
        assert!(!session.complete(request.id, Err(InferenceError::Unavailable("late".into()))));
        assert_eq!(session.state(), &PadState::Showing(shown));
    }

    #[test]
    fn completion_after_clear_is_dropped() {
        let mut session = DrawSession::new(small_config(false)).unwrap();
        let request = draw_dot(&mut session).unwrap();
        session.clear();
        assert!(!session.complete(request.id, Ok(Prediction::from_probabilities(&[1.0]))));
        assert_eq!(session.state(), &PadState::Idle);
    }

    #[test]
    fn failed_inference_is_visible() {
        let mut session = DrawSession::new(small_config(false)).unwrap();
        let request = session.request_prediction().unwrap();
        let err = InferenceError::Unavailable("model offline".into());
        assert!(session.complete(request.id, Err(err)));
        assert!(matches!(session.state(), PadState::Failed(msg) if msg.contains("model offline")));
    }

    #[test]
    fn visualization_follows_last_reduction() {
        let mut session = DrawSession::new(small_config(false)).unwrap();
        assert_eq!(session.visualization(), None);
        draw_dot(&mut session);
        let pixels = session.visualization().unwrap();
        assert_eq!(pixels.len(), 8 * 8 * 4);

        let mut hidden = DrawSession::new(PadConfig {
            can_visualize_as_28x28: false,
            ..small_config(false)
        })
        .unwrap();
        draw_dot(&mut hidden);
        assert_eq!(hidden.visualization(), None);
    }

    #[test]
    fn upload_replaces_drawing_without_requesting() {
        let mut session = DrawSession::new(small_config(false)).unwrap();
        draw_dot(&mut session);
        let image = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(3, 3, image::Luma([255])));
        session.upload_image(&image).unwrap();
        assert_eq!(session.state(), &PadState::Idle);
        let reduced = &session.last_reduction().unwrap().reduced;
        assert!(reduced.cells().iter().all(|&c| c == 255.0));
        assert!(!session.can_draw());
    }
}
