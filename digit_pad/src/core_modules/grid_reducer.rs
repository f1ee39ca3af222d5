// THEORY:
// The `GridReducer` is the core of the pad. It owns the geometry of the reduction
// (canvas side and block size) and drives a canvas buffer through every stage:
// buffer -> intensity matrix -> blocks -> reduced matrix.
//
// Key architectural principles:
// 1.  **Fail Before Reading**: the divisibility of the canvas side by the block size
//     is checked once, when the reducer is built. A reducer that exists can never
//     produce a partial final row or column of blocks.
// 2.  **Explicit Normalization**: `reduce` receives the block area as a parameter and
//     compares it with the area each block actually measures. A mismatch is an error,
//     never a silently mis-scaled grid.
// 3.  **Row-Major Everywhere**: block origins are visited row by row, column by
//     column, and the reduced grid is filled in the same order, so block `i` lands
//     at `(i / grid_side, i % grid_side)`.
// 4.  **Stateless**: nothing is cached between calls. Every frame is reduced from
//     scratch.

use crate::core_modules::block::block::Block;
use crate::core_modules::intensity::{IntensityMatrix, Matrix};
use crate::core_modules::pixel::pixel::Intensity;
use crate::error::ConfigurationError;
use serde::Serialize;
use tracing::debug;

/// Cuts a square matrix into non-overlapping `block_size` tiles, row-major.
pub fn decompose(
    matrix: &Matrix<Intensity>,
    block_size: usize,
) -> Result<Vec<Block>, ConfigurationError> {
    let side = matrix.len();
    if side == 0 {
        return Err(ConfigurationError::EmptyCanvas);
    }
    if block_size == 0 {
        return Err(ConfigurationError::ZeroBlockSize);
    }
    if let Some((row, cells)) = matrix.iter().enumerate().find(|(_, r)| r.len() != side) {
        return Err(ConfigurationError::RaggedMatrix {
            row,
            expected: side,
            actual: cells.len(),
        });
    }
    if side % block_size != 0 {
        return Err(ConfigurationError::IndivisibleSide { side, block_size });
    }

    let per_axis = side / block_size;
    let mut blocks = Vec::with_capacity(per_axis * per_axis);
    for top in (0..side).step_by(block_size) {
        for left in (0..side).step_by(block_size) {
            let mut cells = Vec::with_capacity(block_size * block_size);
            for row in &matrix[top..top + block_size] {
                cells.extend_from_slice(&row[left..left + block_size]);
            }
            blocks.push(Block::new(block_size, cells));
        }
    }
    Ok(blocks)
}

/// Averages every block into one cell and lays the cells out as a square grid.
pub fn reduce(blocks: &[Block], block_area: usize) -> Result<ReducedMatrix, ConfigurationError> {
    let count = blocks.len();
    let grid_side = count.isqrt();
    if grid_side * grid_side != count {
        return Err(ConfigurationError::NonSquareBlockCount { count });
    }

    let mut cells = Vec::with_capacity(count);
    for block in blocks {
        if block.area() != block_area {
            return Err(ConfigurationError::BlockAreaMismatch {
                declared: block_area,
                measured: block.area(),
            });
        }
        cells.push(block.average(block_area));
    }
    Ok(ReducedMatrix {
        side: grid_side,
        cells,
    })
}

/// The small, block-averaged grid handed to the classifier. Cells are in 0..=255.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReducedMatrix {
    side: usize,
    cells: Vec<f32>,
}

impl ReducedMatrix {
    pub fn side(&self) -> usize {
        self.side
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.cells[row * self.side + col]
    }

    /// Row-major cells.
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub fn to_rows(&self) -> Matrix<f32> {
        if self.side == 0 {
            return Vec::new();
        }
        self.cells.chunks(self.side).map(<[f32]>::to_vec).collect()
    }
}

/// Everything one reduction produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub intensity: IntensityMatrix,
    pub reduced: ReducedMatrix,
}

/// Reduces canvases of one fixed geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridReducer {
    /// The side of the square canvas in pixels.
    canvas_side: usize,
    /// The side of a single block in pixels.
    block_size: usize,
    /// The side of the reduced grid in cells (canvas_side / block_size).
    grid_side: usize,
}

impl GridReducer {
    /// Creates a reducer, rejecting geometries that would leave remainder pixels.
    pub fn new(canvas_side: usize, block_size: usize) -> Result<Self, ConfigurationError> {
        if canvas_side == 0 {
            return Err(ConfigurationError::EmptyCanvas);
        }
        if block_size == 0 {
            return Err(ConfigurationError::ZeroBlockSize);
        }
        if canvas_side % block_size != 0 {
            return Err(ConfigurationError::IndivisibleSide {
                side: canvas_side,
                block_size,
            });
        }
        Ok(Self {
            canvas_side,
            block_size,
            grid_side: canvas_side / block_size,
        })
    }

    pub fn canvas_side(&self) -> usize {
        self.canvas_side
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn grid_side(&self) -> usize {
        self.grid_side
    }

    /// Takes a raw RGBA canvas buffer and returns both the intensity matrix and the
    /// reduced grid.
    pub fn process_frame(&self, frame_buffer: &[u8]) -> Result<Reduction, ConfigurationError> {
        let intensity = IntensityMatrix::from_buffer(frame_buffer, self.canvas_side)?;
        let blocks = decompose(intensity.rows(), self.block_size)?;
        let reduced = reduce(&blocks, self.block_size * self.block_size)?;
        debug!(
            canvas_side = self.canvas_side,
            block_size = self.block_size,
            grid_side = reduced.side(),
            "reduced canvas"
        );
        Ok(Reduction { intensity, reduced })
    }
}
