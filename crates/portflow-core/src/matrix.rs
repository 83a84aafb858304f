//! # Integer Matrix
//!
//! Dense, fixed-size grid of integer codes used to hold pairwise port
//! relationships during resolution. Stored row-major in a single `Vec`.

use crate::PortflowError;

/// Dense `rows x cols` integer matrix with bounds-checked access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntMatrix {
    data: Vec<i32>,
    rows: usize,
    cols: usize,
}

impl IntMatrix {
    /// Create a zero-filled matrix.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0)
    }

    /// Create a matrix with every cell set to `value`.
    #[must_use]
    pub fn filled(rows: usize, cols: usize, value: i32) -> Self {
        Self {
            data: vec![value; rows.saturating_mul(cols)],
            rows,
            cols,
        }
    }

    /// Overwrite every cell with `value`.
    pub fn fill(&mut self, value: i32) {
        self.data.fill(value);
    }

    /// `(rows, cols)`.
    #[must_use]
    pub const fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Result<i32, PortflowError> {
        let offset = self.offset(row, col)?;
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| self.out_of_range(row, col))
    }

    pub fn set(&mut self, row: usize, col: usize, value: i32) -> Result<(), PortflowError> {
        let offset = self.offset(row, col)?;
        let err = self.out_of_range(row, col);
        let cell = self.data.get_mut(offset).ok_or(err)?;
        *cell = value;
        Ok(())
    }

    fn offset(&self, row: usize, col: usize) -> Result<usize, PortflowError> {
        if row >= self.rows || col >= self.cols {
            return Err(self.out_of_range(row, col));
        }
        Ok(row * self.cols + col)
    }

    fn out_of_range(&self, row: usize, col: usize) -> PortflowError {
        PortflowError::MatrixIndexOutOfRange {
            row,
            col,
            rows: self.rows,
            cols: self.cols,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_matrix_is_zeroed() {
        let m = IntMatrix::new(3, 2);
        assert_eq!(m.dims(), (3, 2));
        for i in 0..3 {
            for j in 0..2 {
                assert_eq!(m.get(i, j).expect("get"), 0);
            }
        }
    }

    #[test]
    fn set_then_get() {
        let mut m = IntMatrix::new(2, 3);
        m.set(1, 2, 7).expect("set");
        m.set(0, 1, -1).expect("set");
        assert_eq!(m.get(1, 2).expect("get"), 7);
        assert_eq!(m.get(0, 1).expect("get"), -1);
        assert_eq!(m.get(1, 1).expect("get"), 0);
    }

    #[test]
    fn non_square_cells_do_not_alias() {
        // Row-major with stride = cols: (0, 2) and (1, 0) must be distinct.
        let mut m = IntMatrix::new(2, 3);
        m.set(0, 2, 5).expect("set");
        assert_eq!(m.get(1, 0).expect("get"), 0);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut m = IntMatrix::new(2, 2);
        assert!(matches!(
            m.get(2, 0),
            Err(PortflowError::MatrixIndexOutOfRange { row: 2, .. })
        ));
        assert!(m.set(0, 2, 1).is_err());
    }

    #[test]
    fn fill_resets_every_cell() {
        let mut m = IntMatrix::filled(2, 2, 9);
        m.fill(4);
        assert_eq!(m.get(1, 1).expect("get"), 4);
    }
}
