//! Row-major matrix over a single contiguous allocation.
//!
//! The dataset handed to `fit` is materialized once into a flat `Vec<f32>` of
//! `num_rows * dim` elements; row access hands out borrowed `&[f32]` views.
//! The matrix is immutable after the owning index finishes construction.

use crate::error::{AnnError, Result};
use crate::vector;

/// Dense N x d matrix of `f32` backed by one contiguous buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    num_rows: usize,
    dim: usize,
}

impl Matrix {
    /// Build a matrix from an ordered sequence of equal-length rows.
    ///
    /// Fails with [`AnnError::EmptyDataset`] when `rows` is empty and with
    /// [`AnnError::DimensionMismatch`] on ragged input.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(AnnError::EmptyDataset);
        }
        let dim = rows[0].len();
        if dim == 0 {
            return Err(AnnError::InvalidParameter(
                "rows must have at least one column".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            if row.len() != dim {
                return Err(AnnError::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            data,
            num_rows: rows.len(),
            dim,
        })
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Borrowed view of row `i`.
    ///
    /// Panics when `i >= num_rows`, like slice indexing.
    #[inline]
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        let start = i * self.dim;
        &self.data[start..start + self.dim]
    }

    /// Iterator over row views.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim)
    }

    /// Scale every row to unit L2 norm in place.
    ///
    /// Fit-time preprocessing for the cosine metric; zero rows are left as-is.
    pub fn l2_normalize_rows(&mut self) {
        for row in self.data.chunks_exact_mut(self.dim) {
            vector::normalize_in_place(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_round_trip() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(m.num_rows(), 3);
        assert_eq!(m.dim(), 2);
        assert_eq!(m.row(0), &[1.0, 2.0]);
        assert_eq!(m.row(2), &[5.0, 6.0]);
        assert_eq!(m.rows().count(), 3);
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(
            err,
            AnnError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn empty_dataset_rejected() {
        assert_eq!(Matrix::from_rows(&[]).unwrap_err(), AnnError::EmptyDataset);
    }

    #[test]
    fn normalize_rows() {
        let mut m = Matrix::from_rows(&[vec![3.0, 4.0], vec![0.0, 0.0]]).unwrap();
        m.l2_normalize_rows();
        assert!((vector::norm(m.row(0)) - 1.0).abs() < 1e-6);
        // Zero rows stay zero instead of turning into NaN.
        assert_eq!(m.row(1), &[0.0, 0.0]);
    }
}
