// THEORY:
// This file is the main entry point for the `digit_pad` library crate. It exposes
// the reduction engine that turns a hand-drawn canvas into the 28x28 grid a digit
// classifier expects.
//
// The primary public surface is `DigitPipeline` (stateless reduction and prediction)
// and `DrawSession` (the stateful controller behind one pad on screen). The building
// blocks in `core_modules` stay public so front ends can reuse individual stages,
// such as the drawing surface or the model-input scaling.

pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod session;

pub use core_modules::grid_reducer::{GridReducer, ReducedMatrix, Reduction};
pub use core_modules::inference::{DigitClassifier, DigitConfidence, Prediction, classify};
pub use core_modules::intensity::IntensityMatrix;
pub use core_modules::linear_model::{LinearClassifier, LinearWeights};
pub use core_modules::model_input::{ModelBatch, ModelInput, to_model_input};
pub use core_modules::surface::DrawingSurface;
pub use error::{ConfigurationError, InferenceError, PadError, PadResult};
pub use pipeline::{DigitPipeline, PadConfig};
pub use session::{DrawSession, PadState, PredictRequest, RequestId};
