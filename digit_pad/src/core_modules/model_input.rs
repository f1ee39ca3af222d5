// THEORY:
// The classifier consumes a single-channel image tensor with values in [0, 1]. This
// module is the last, purely numeric step between the reduced grid and that tensor:
// every cell is divided by 255 and given a depth axis of length one, producing the
// shape (side, side, 1). A `ModelBatch` adds the leading batch axis the model
// expects, even though the pad only ever sends one drawing at a time.

use crate::core_modules::grid_reducer::ReducedMatrix;

const MAX_INTENSITY: f32 = 255.0;

/// One normalized drawing, shape (side, side, 1), stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    side: usize,
    data: Vec<f32>,
}

/// Scales a reduced grid into the classifier's input range.
pub fn to_model_input(reduced: &ReducedMatrix) -> ModelInput {
    ModelInput {
        side: reduced.side(),
        data: reduced.cells().iter().map(|&c| c / MAX_INTENSITY).collect(),
    }
}

impl ModelInput {
    pub fn side(&self) -> usize {
        self.side
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.side, self.side, 1]
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.side + col]
    }

    /// Flat view over all cells; the depth axis has length one so it adds no stride.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Nested (row, column, channel) form.
    pub fn to_tensor(&self) -> Vec<Vec<[f32; 1]>> {
        if self.side == 0 {
            return Vec::new();
        }
        self.data
            .chunks(self.side)
            .map(|row| row.iter().map(|&v| [v]).collect())
            .collect()
    }

    pub fn batch(self) -> ModelBatch {
        ModelBatch { inputs: vec![self] }
    }
}

/// A batch of inputs, shape (n, side, side, 1).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBatch {
    inputs: Vec<ModelInput>,
}

impl ModelBatch {
    pub fn inputs(&self) -> &[ModelInput] {
        &self.inputs
    }

    pub fn first(&self) -> Option<&ModelInput> {
        self.inputs.first()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn shape(&self) -> [usize; 4] {
        let side = self.first().map_or(0, ModelInput::side);
        [self.inputs.len(), side, side, 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::grid_reducer::GridReducer;

    fn reduced_gray(value: u8) -> ReducedMatrix {
        let buffer = [value, value, value, 255].repeat(8 * 8);
        GridReducer::new(8, 2).unwrap().process_frame(&buffer).unwrap().reduced
    }

    #[test]
    fn divides_cells_by_255() {
        let input = to_model_input(&reduced_gray(51));
        assert_eq!(input.shape(), [4, 4, 1]);
        assert!(input.as_slice().iter().all(|&v| (v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn scaling_gray_levels_scales_input() {
        let full = to_model_input(&reduced_gray(200));
        let half = to_model_input(&reduced_gray(100));
        let quarter = to_model_input(&reduced_gray(50));
        for ((f, h), q) in full.as_slice().iter().zip(half.as_slice()).zip(quarter.as_slice()) {
            assert!((f * 0.5 - h).abs() < 1e-6);
            assert!((f * 0.25 - q).abs() < 1e-6);
        }
    }

    #[test]
    fn tensor_has_singleton_depth() {
        let input = to_model_input(&reduced_gray(255));
        let tensor = input.to_tensor();
        assert_eq!(tensor.len(), 4);
        assert_eq!(tensor[3].len(), 4);
        assert_eq!(tensor[3][3], [1.0]);
    }

    #[test]
    fn batch_adds_leading_axis() {
        let batch = to_model_input(&reduced_gray(0)).batch();
        assert_eq!(batch.shape(), [1, 4, 4, 1]);
        assert_eq!(batch.len(), 1);
        assert!(!batch.is_empty());
    }
}
