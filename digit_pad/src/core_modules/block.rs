// THEORY:
// The `Block` module represents one square tile of the intensity matrix. It is the
// unit of spatial pooling: every block collapses into a single cell of the reduced
// grid the digit model sees.
//
// Like `Pixel`, a `Block` is a "dumb" data container. It holds its cells and knows
// how to summarize them, but it does not know where it sits in the grid. The
// averaging divisor is passed in rather than measured so the reducer can check the
// declared block area against the real one before trusting the result.

pub mod block {
    use crate::core_modules::pixel::pixel::Intensity;

    /// A square tile of gray levels, stored row-major.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Block {
        /// The side length of the block in source pixels.
        pub size: usize,
        /// A flattened vector containing the `size * size` cells of this block.
        pub cells: Vec<Intensity>,
    }

    impl Block {
        pub fn new(size: usize, cells: Vec<Intensity>) -> Self {
            debug_assert_eq!(cells.len(), size * size);
            Self { size, cells }
        }

        /// Number of cells measured from the block's own side length.
        pub fn area(&self) -> usize {
            self.size * self.size
        }

        pub fn cell(&self, row: usize, col: usize) -> Intensity {
            self.cells[row * self.size + col]
        }

        pub fn sum(&self) -> u64 {
            self.cells.iter().map(|&c| c as u64).sum()
        }

        /// Sum of the cells divided by `block_area`.
        pub fn average(&self, block_area: usize) -> f32 {
            if block_area == 0 {
                return 0.0;
            }
            (self.sum() as f64 / block_area as f64) as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::block::Block;

    #[test]
    fn average_uses_declared_area() {
        let block = Block::new(2, vec![10, 20, 30, 40]);
        assert_eq!(block.sum(), 100);
        assert_eq!(block.area(), 4);
        assert_eq!(block.average(4), 25.0);
        assert_eq!(block.average(0), 0.0);
    }

    #[test]
    fn cells_are_row_major() {
        let block = Block::new(2, vec![1, 2, 3, 4]);
        assert_eq!(block.cell(0, 1), 2);
        assert_eq!(block.cell(1, 0), 3);
    }
}
