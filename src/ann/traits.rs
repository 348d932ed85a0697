//! Unified trait for all index implementations.

use crate::error::Result;

/// Capability contract shared by the exact, KD-tree, random projection forest
/// and HNSW indexes.
///
/// Call sites that know the concrete index dispatch statically; heterogeneous
/// collections go through `Box<dyn AnnIndex>`.
///
/// Returned ids are 0-based row indices into the fitted dataset, ordered by
/// ascending metric distance.
pub trait AnnIndex {
    /// Build the index over an ordered sequence of equal-length rows.
    ///
    /// Requires at least one row; ragged input fails with
    /// [`crate::AnnError::DimensionMismatch`]. The index is frozen
    /// afterwards; queries never mutate it.
    fn fit(&mut self, rows: &[Vec<f32>]) -> Result<()>;

    /// The `k` nearest row indices to `query`.
    ///
    /// `k = 0` yields an empty result; `k > N` is clamped to N.
    fn knn_query(&self, query: &[f32], k: usize) -> Result<Vec<u32>>;

    /// All row indices within metric distance `radius` of `query`, ascending
    /// by distance. A negative radius yields an empty result.
    ///
    /// Not every index variant supports this; unsupported variants fail with
    /// [`crate::AnnError::UnsupportedOperation`].
    fn radius_query(&self, query: &[f32], radius: f32) -> Result<Vec<u32>>;
}
