//! Exact nearest neighbor search by linear scan.
//!
//! O(N * d) per query. Used as the ground-truth oracle for the approximate
//! indexes and as the sensible choice for small datasets.

use tracing::debug;

use crate::ann::AnnIndex;
use crate::distance::Metric;
use crate::error::{AnnError, Result};
use crate::matrix::Matrix;
use crate::topk::Neighbor;

/// Brute-force index: stores the matrix, scans every row per query.
#[derive(Debug, Clone)]
pub struct ExactIndex {
    metric: Metric,
    data: Option<Matrix>,
}

impl ExactIndex {
    /// New empty index for the given metric. All metrics are supported.
    #[must_use]
    pub fn new(metric: Metric) -> Self {
        Self { metric, data: None }
    }

    /// The metric this index ranks by.
    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn fitted(&self) -> Result<&Matrix> {
        self.data.as_ref().ok_or(AnnError::EmptyIndex)
    }

    fn check_query(&self, data: &Matrix, query: &[f32]) -> Result<()> {
        if query.len() != data.dim() {
            return Err(AnnError::DimensionMismatch {
                expected: data.dim(),
                actual: query.len(),
            });
        }
        Ok(())
    }

    /// Distances from `query` to every row, sorted ascending.
    ///
    /// The sort is stable, so equal distances keep their row order.
    fn scan(&self, data: &Matrix, query: &[f32]) -> Vec<Neighbor> {
        let mut distances: Vec<Neighbor> = data
            .rows()
            .enumerate()
            .map(|(i, row)| Neighbor {
                distance: self.metric.distance(query, row),
                index: i as u32,
            })
            .collect();
        distances.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        distances
    }
}

impl AnnIndex for ExactIndex {
    fn fit(&mut self, rows: &[Vec<f32>]) -> Result<()> {
        let data = Matrix::from_rows(rows)?;
        debug!(
            num_rows = data.num_rows(),
            dim = data.dim(),
            metric = ?self.metric,
            "exact index fitted"
        );
        self.data = Some(data);
        Ok(())
    }

    fn knn_query(&self, query: &[f32], k: usize) -> Result<Vec<u32>> {
        let data = self.fitted()?;
        self.check_query(data, query)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let k = k.min(data.num_rows());

        let distances = self.scan(data, query);
        Ok(distances.iter().take(k).map(|n| n.index).collect())
    }

    fn radius_query(&self, query: &[f32], radius: f32) -> Result<Vec<u32>> {
        let data = self.fitted()?;
        self.check_query(data, query)?;
        if radius < 0.0 {
            return Ok(Vec::new());
        }

        // The scan is sorted, so stop at the first row past the radius.
        let result = self
            .scan(data, query)
            .into_iter()
            .take_while(|n| n.distance <= radius)
            .map(|n| n.index)
            .collect();
        Ok(result)
    }
}
