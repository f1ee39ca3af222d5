// THEORY:
// The `pipeline` module is the top-level API of the pad. It bundles the reducer
// stack behind one facade: hand it a canvas buffer, get back the intensity matrix,
// the reduced grid, the model input, or a ranked prediction.
//
// All tunables live in `PadConfig`, which replaces the loose module-level settings
// a canvas script would otherwise share. The canvas side is derived from the grid
// side and the scale, so a config that validates always describes a canvas the
// reducer can divide evenly.

use crate::core_modules::grid_reducer::{GridReducer, Reduction};
use crate::core_modules::inference::{DigitClassifier, Prediction, classify};
use crate::core_modules::intensity::frame_len;
use crate::core_modules::model_input::{ModelInput, to_model_input};
use crate::error::{ConfigurationError, PadResult};
use serde::{Deserialize, Serialize};

/// Side of the grid the digit model was trained on.
pub const GRID_SIDE: usize = 28;
/// Block side for the desktop pad.
pub const DESKTOP_SCALE: usize = 24;
/// Block side for the smaller mobile pad.
pub const MOBILE_SCALE: usize = 15;
pub const DEFAULT_LINE_WIDTH: f32 = 2.0;

const ENV_SCALE: &str = "DIGIT_PAD_SCALE";
const ENV_LINE_WIDTH: &str = "DIGIT_PAD_LINE_WIDTH";
const ENV_MULTI_DRAW: &str = "DIGIT_PAD_MULTI_DRAW";
const ENV_VISUALIZE: &str = "DIGIT_PAD_VISUALIZE";

/// Configuration for the pad, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadConfig {
    /// Side of one block in canvas pixels; also the on-screen size of a grid cell.
    pub scale: usize,
    /// Side of the reduced grid in cells.
    pub grid_side: usize,
    /// Stroke width in canvas pixels.
    pub line_width: f32,
    /// Keep accepting strokes after the first one instead of locking the pad.
    pub allows_multiple_draws: bool,
    /// Render the reduced grid back at canvas size after each reduction.
    pub can_visualize_as_28x28: bool,
}

impl Default for PadConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

impl PadConfig {
    pub fn desktop() -> Self {
        Self {
            scale: DESKTOP_SCALE,
            grid_side: GRID_SIDE,
            line_width: DEFAULT_LINE_WIDTH,
            allows_multiple_draws: false,
            can_visualize_as_28x28: false,
        }
    }

    pub fn mobile() -> Self {
        Self {
            scale: MOBILE_SCALE,
            allows_multiple_draws: true,
            ..Self::desktop()
        }
    }

    pub fn canvas_side(&self) -> usize {
        self.grid_side * self.scale
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.scale == 0 {
            return Err(ConfigurationError::ZeroBlockSize);
        }
        if self.grid_side == 0 {
            return Err(ConfigurationError::EmptyCanvas);
        }
        if !self.line_width.is_finite() || self.line_width <= 0.0 {
            return Err(ConfigurationError::InvalidLineWidth(self.line_width));
        }
        Ok(())
    }

    /// Applies `DIGIT_PAD_*` environment overrides on top of `self`.
    pub fn from_env(self) -> Result<Self, ConfigurationError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key/value source. Unset keys keep their value.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        if let Some(value) = lookup(ENV_SCALE) {
            self.scale = parse_override(ENV_SCALE, &value)?;
        }
        if let Some(value) = lookup(ENV_LINE_WIDTH) {
            self.line_width = parse_override(ENV_LINE_WIDTH, &value)?;
        }
        if let Some(value) = lookup(ENV_MULTI_DRAW) {
            self.allows_multiple_draws = parse_flag(ENV_MULTI_DRAW, &value)?;
        }
        if let Some(value) = lookup(ENV_VISUALIZE) {
            self.can_visualize_as_28x28 = parse_flag(ENV_VISUALIZE, &value)?;
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_override<T: std::str::FromStr>(
    key: &'static str,
    value: &str,
) -> Result<T, ConfigurationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidOverride {
            key,
            value: value.to_string(),
        })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigurationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigurationError::InvalidOverride {
            key,
            value: value.to_string(),
        }),
    }
}

/// The main, top-level struct for the reduction engine.
#[derive(Debug, Clone)]
pub struct DigitPipeline {
    config: PadConfig,
    reducer: GridReducer,
}

impl DigitPipeline {
    pub fn new(config: PadConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let reducer = GridReducer::new(config.canvas_side(), config.scale)?;
        Ok(Self { config, reducer })
    }

    pub fn config(&self) -> &PadConfig {
        &self.config
    }

    pub fn reducer(&self) -> &GridReducer {
        &self.reducer
    }

    /// Reduces a buffer captured from a canvas of the configured size.
    pub fn reduce(&self, frame_buffer: &[u8]) -> Result<Reduction, ConfigurationError> {
        self.reducer.process_frame(frame_buffer)
    }

    /// Reduces a buffer whose dimensions come from the caller, checking them first.
    /// Any square side that is a multiple of the grid side reduces to the configured
    /// grid; the block size is derived from the side.
    pub fn reduce_frame(
        &self,
        width: u32,
        height: u32,
        frame_buffer: &[u8],
    ) -> Result<Reduction, ConfigurationError> {
        if width != height {
            return Err(ConfigurationError::NonSquareCanvas { width, height });
        }
        let side = width as usize;
        let expected = frame_len(side).ok_or(ConfigurationError::CanvasTooLarge { side })?;
        if frame_buffer.len() != expected {
            return Err(ConfigurationError::BufferLength {
                expected,
                actual: frame_buffer.len(),
            });
        }
        if side == self.reducer.canvas_side() {
            return self.reduce(frame_buffer);
        }
        let grid_side = self.reducer.grid_side();
        if side == 0 || side % grid_side != 0 {
            return Err(ConfigurationError::GridMismatch { side, grid_side });
        }
        GridReducer::new(side, side / grid_side)?.process_frame(frame_buffer)
    }

    pub fn model_input(&self, frame_buffer: &[u8]) -> Result<ModelInput, ConfigurationError> {
        Ok(to_model_input(&self.reduce(frame_buffer)?.reduced))
    }

    /// Reduces the buffer and asks `classifier` for a ranked prediction.
    pub async fn predict(
        &self,
        frame_buffer: &[u8],
        classifier: &dyn DigitClassifier,
    ) -> PadResult<(Reduction, Prediction)> {
        let reduction = self.reduce(frame_buffer)?;
        let batch = to_model_input(&reduction.reduced).batch();
        let prediction = classify(classifier, &batch).await?;
        Ok((reduction, prediction))
    }
}
