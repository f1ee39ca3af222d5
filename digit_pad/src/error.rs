// THEORY:
// Two things can go wrong on the way from a drawn canvas to a confidence score,
// and they happen at very different times:
// 1.  **Configuration**: the canvas and the block size do not fit together (a
//     non-square surface, a block size that leaves remainder rows, a buffer of the
//     wrong length). These are caught before a single block is averaged, so the
//     reducer never reads outside the intensity matrix.
// 2.  **Inference**: the external classifier could not be loaded or refused to
//     predict. The drawing session turns this into a visible failure state instead
//     of waiting in "loading" forever.
//
// `PadError` is the umbrella for callers that drive the whole pipeline.

use thiserror::Error;

/// The canvas, block size or buffer do not describe a reducible square grid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("canvas must be square, got {width}x{height}")]
    NonSquareCanvas { width: u32, height: u32 },
    #[error("canvas side must be non-zero")]
    EmptyCanvas,
    #[error("block size must be non-zero")]
    ZeroBlockSize,
    #[error("block size {block_size} does not evenly divide canvas side {side}")]
    IndivisibleSide { side: usize, block_size: usize },
    #[error("matrix row {row} holds {actual} cells, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("canvas side {side} is too large to address")]
    CanvasTooLarge { side: usize },
    #[error("canvas side {side} is not a multiple of the {grid_side}-cell grid")]
    GridMismatch { side: usize, grid_side: usize },
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("declared block area {declared} does not match measured block area {measured}")]
    BlockAreaMismatch { declared: usize, measured: usize },
    #[error("{count} blocks cannot be arranged into a square grid")]
    NonSquareBlockCount { count: usize },
    #[error("line width must be a positive number, got {0}")]
    InvalidLineWidth(f32),
    #[error("invalid value {value:?} for {key}")]
    InvalidOverride { key: &'static str, value: String },
}

/// The external classifier could not produce a probability vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("inference unavailable: {0}")]
    Unavailable(String),
    #[error("model expects {expected} input cells, got {actual}")]
    InputShape { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum PadError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PadResult<T> = Result<T, PadError>;
