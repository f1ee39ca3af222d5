// THEORY:
// The `intensity` module is the first stage of the reducer. It turns the flat RGBA
// byte stream read off a canvas into a square matrix of gray levels, one cell per
// source pixel.
//
// Two layers live here:
// - `normalize` and `reshape` are the raw, forgiving building blocks. They never
//   fail: trailing bytes that do not form a whole pixel and trailing cells that do
//   not fill a whole row are dropped.
// - `IntensityMatrix` is the checked form the rest of the pipeline consumes. It
//   insists that the buffer describes exactly `side * side` pixels, so the block
//   decomposition downstream can index without bounds clamping.

use crate::core_modules::pixel::pixel::{CHANNELS, Intensity, Pixel};
use crate::error::ConfigurationError;

/// A row-major matrix stored as a vector of rows.
pub type Matrix<T> = Vec<Vec<T>>;

/// Converts an RGBA buffer into one gray level per pixel.
/// Bytes after the last complete pixel are ignored.
pub fn normalize(buffer: &[u8]) -> Vec<Intensity> {
    buffer
        .chunks_exact(CHANNELS)
        .map(|bytes| Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3]).intensity())
        .collect()
}

/// Splits a flat sequence into rows of `row_length` cells.
/// A trailing partial row is dropped; a zero row length yields no rows.
pub fn reshape<T: Copy>(flat: &[T], row_length: usize) -> Matrix<T> {
    if row_length == 0 {
        return Vec::new();
    }
    flat.chunks_exact(row_length).map(<[T]>::to_vec).collect()
}

/// Byte length of a square RGBA buffer of `side` pixels, `None` when it does not
/// fit in memory.
pub fn frame_len(side: usize) -> Option<usize> {
    side.checked_mul(side)?.checked_mul(CHANNELS)
}

/// Grayscale, full-resolution copy of a square canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityMatrix {
    side: usize,
    rows: Matrix<Intensity>,
}

impl IntensityMatrix {
    /// Builds the matrix from a canvas buffer of exactly `side * side` RGBA pixels.
    pub fn from_buffer(buffer: &[u8], side: usize) -> Result<Self, ConfigurationError> {
        if side == 0 {
            return Err(ConfigurationError::EmptyCanvas);
        }
        let expected = frame_len(side).ok_or(ConfigurationError::CanvasTooLarge { side })?;
        if buffer.len() != expected {
            return Err(ConfigurationError::BufferLength {
                expected,
                actual: buffer.len(),
            });
        }
        Ok(Self {
            side,
            rows: reshape(&normalize(buffer), side),
        })
    }

    /// Wraps an existing square matrix, rejecting ragged or non-square input.
    pub fn from_rows(rows: Matrix<Intensity>) -> Result<Self, ConfigurationError> {
        let side = rows.len();
        if side == 0 {
            return Err(ConfigurationError::EmptyCanvas);
        }
        if let Some((row, cells)) = rows.iter().enumerate().find(|(_, r)| r.len() != side) {
            return Err(ConfigurationError::RaggedMatrix {
                row,
                expected: side,
                actual: cells.len(),
            });
        }
        Ok(Self { side, rows })
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn rows(&self) -> &Matrix<Intensity> {
        &self.rows
    }

    pub fn get(&self, row: usize, col: usize) -> Intensity {
        self.rows[row][col]
    }
}
