//! Dense numeric storage for the grid.
//!
//! [`Matrix`] is a fixed-size, row-major block of `f64`. It is the unit that
//! formulas read, bulk operations transform and the codec persists. A matrix
//! owns its data outright; cloning one is how snapshots are taken.

use super::cell_ref::CellRef;

/// Row-major `rows` x `cols` block of numbers.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix with every entry set to 0.0.
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build a matrix from row-major data. Returns None if the length does
    /// not match `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Option<Matrix> {
        let expected = rows.checked_mul(cols)?;
        if data.len() != expected {
            return None;
        }
        Some(Matrix { rows, cols, data })
    }

    /// Build a matrix from ragged rows, padding short rows with 0.0.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Matrix {
        let height = rows.len();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut data = Vec::with_capacity(height * width);
        for row in rows {
            let missing = width - row.len();
            data.extend(row);
            data.extend(std::iter::repeat_n(0.0, missing));
        }
        Matrix {
            rows: height,
            cols: width,
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn index(&self, cell: CellRef) -> Option<usize> {
        cell.in_bounds(self.rows, self.cols)
            .then(|| cell.row * self.cols + cell.col)
    }

    pub fn get(&self, cell: CellRef) -> Option<f64> {
        self.index(cell).map(|i| self.data[i])
    }

    /// Write one entry. Returns false if `cell` is out of bounds.
    pub fn set(&mut self, cell: CellRef, value: f64) -> bool {
        match self.index(cell) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Same shape, new contents. `data` must hold `rows * cols` values.
    pub(crate) fn with_same_shape(&self, data: Vec<f64>) -> Matrix {
        debug_assert_eq!(data.len(), self.data.len());
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }

    /// Apply `f` to every entry, producing a new matrix.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        self.with_same_shape(self.data.iter().map(|v| f(*v)).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    /// All entries except the one at `skip`.
    pub fn iter_excluding(&self, skip: CellRef) -> impl Iterator<Item = f64> + '_ {
        let skip_idx = self.index(skip);
        self.data
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != skip_idx)
            .map(|(_, v)| *v)
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    /// Replace every NaN and infinity with 0.0. Returns how many entries changed.
    pub fn sanitize(&mut self) -> usize {
        let mut replaced = 0;
        for v in &mut self.data {
            if !v.is_finite() {
                *v = 0.0;
                replaced += 1;
            }
        }
        replaced
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Copy into a matrix of the given shape: extra rows/cols are dropped,
    /// missing ones are zero.
    pub fn fit_to(&self, rows: usize, cols: usize) -> Matrix {
        if self.dimensions() == (rows, cols) {
            return self.clone();
        }
        let mut out = Matrix::zeros(rows, cols);
        let copy_cols = cols.min(self.cols);
        for r in 0..rows.min(self.rows) {
            let src = r * self.cols;
            let dst = r * cols;
            out.data[dst..dst + copy_cols].copy_from_slice(&self.data[src..src + copy_cols]);
        }
        out
    }
}
