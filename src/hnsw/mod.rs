//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor
//! index.
//!
//! # Algorithm
//!
//! A stack of undirected proximity graphs over the dataset rows:
//!
//! - **Upper layers**: sparse, long-range links for fast navigation. A point
//!   reaches layer `l` with geometrically decaying probability, so occupancy
//!   thins out exponentially going up.
//! - **Layer 0**: contains every point, with denser local links (capacity
//!   `2 * M` instead of `M`).
//! - **Search**: greedy ef=1 descent from the top-layer entry point, then a
//!   best-first beam of width `ef` on layer 0.
//!
//! Each insertion links the new point to its `M` closest discovered neighbors
//! per layer and shrinks any neighbor pushed over its degree capacity back to
//! its closest links, keeping the edge budget linear in N.
//!
//! The beam width `ef` is the recall/latency knob: construction quality comes
//! from `ef_construction`, query recall from `ef_search`.
//!
//! # References
//!
//! - Malkov & Yashunin (2018): "Efficient and robust approximate nearest
//!   neighbor search using Hierarchical Navigable Small World graphs"

mod construction;
mod search;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::ann::AnnIndex;
use crate::distance::Metric;
use crate::error::{AnnError, Result};
use crate::graph::AdjacencyGraph;
use crate::matrix::Matrix;
use crate::vector::normalize;

use search::search_layer;

/// Number of layer graphs; drawn levels are clamped to `MAX_LAYERS - 1`.
pub(crate) const MAX_LAYERS: usize = 4;

/// HNSW construction and query parameters.
#[derive(Debug, Clone)]
pub struct HnswParams {
    /// Number of neighbors linked per layer at construction time. Layer 0
    /// allows up to `2 * m`.
    pub m: usize,
    /// Beam width during construction.
    pub ef_construction: usize,
    /// Beam width during queries (widened to `k` when `k` is larger).
    pub ef_search: usize,
    /// RNG seed for level assignment; `None` draws one from OS entropy and
    /// records it.
    pub seed: Option<u64>,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 100,
            ef_search: 100,
            seed: None,
        }
    }
}

/// Multi-layer navigable small-world graph index.
#[derive(Debug)]
pub struct HnswIndex {
    pub(crate) metric: Metric,
    pub(crate) params: HnswParams,
    /// Degree capacity at layer 0 (`2 * m`).
    pub(crate) m_max0: usize,
    /// Level normalizer `1 / ln(m)`.
    pub(crate) level_norm: f64,
    resolved_seed: Option<u64>,
    data: Option<Matrix>,
    pub(crate) layers: Vec<AdjacencyGraph>,
    pub(crate) element_levels: Vec<i32>,
    pub(crate) entry_point: u32,
    /// Current top level; -1 while the graph is empty.
    pub(crate) max_level: i32,
}

impl HnswIndex {
    /// New empty index for the given metric (L2 or cosine).
    ///
    /// `m` must be at least 2 (the level normalizer divides by `ln(m)`).
    pub fn new(metric: Metric, params: HnswParams) -> Result<Self> {
        if metric != Metric::L2 && metric != Metric::Cosine {
            return Err(AnnError::UnsupportedOperation(format!(
                "hnsw supports L2 and cosine metrics, got {metric:?}"
            )));
        }
        if params.m < 2 {
            return Err(AnnError::InvalidParameter(
                "m must be at least 2".to_string(),
            ));
        }
        if params.ef_construction == 0 || params.ef_search == 0 {
            return Err(AnnError::InvalidParameter(
                "ef_construction and ef_search must be at least 1".to_string(),
            ));
        }

        let m_max0 = 2 * params.m;
        let level_norm = 1.0 / (params.m as f64).ln();
        Ok(Self {
            metric,
            params,
            m_max0,
            level_norm,
            resolved_seed: None,
            data: None,
            layers: Vec::new(),
            element_levels: Vec::new(),
            entry_point: 0,
            max_level: -1,
        })
    }

    /// The seed the index was built with, once fitted.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.resolved_seed
    }

    /// Current top level (-1 while empty).
    #[must_use]
    pub fn max_level(&self) -> i32 {
        self.max_level
    }

    /// The vertex every query descent starts from.
    #[must_use]
    pub fn entry_point(&self) -> u32 {
        self.entry_point
    }

    /// Number of layer graphs.
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Layer graph `l`.
    ///
    /// Panics when `l >= num_layers`, like slice indexing.
    #[must_use]
    pub fn layer(&self, l: usize) -> &AdjacencyGraph {
        &self.layers[l]
    }

    /// Top layer assigned to element `i` at insertion.
    #[must_use]
    pub fn element_level(&self, i: usize) -> i32 {
        self.element_levels[i]
    }

    fn check_query(data: &Matrix, query: &[f32]) -> Result<()> {
        if query.len() != data.dim() {
            return Err(AnnError::DimensionMismatch {
                expected: data.dim(),
                actual: query.len(),
            });
        }
        Ok(())
    }

    fn prepared_query(&self, query: &[f32]) -> Vec<f32> {
        if self.metric == Metric::Cosine {
            normalize(query)
        } else {
            query.to_vec()
        }
    }
}

impl AnnIndex for HnswIndex {
    fn fit(&mut self, rows: &[Vec<f32>]) -> Result<()> {
        let mut data = Matrix::from_rows(rows)?;
        if self.metric == Metric::Cosine {
            data.l2_normalize_rows();
        }

        let seed = self.params.seed.unwrap_or_else(|| rand::rng().random());
        self.resolved_seed = Some(seed);
        let mut rng = StdRng::seed_from_u64(seed);

        self.layers = (0..MAX_LAYERS).map(|_| AdjacencyGraph::new()).collect();
        self.element_levels = vec![0; data.num_rows()];
        self.entry_point = 0;
        self.max_level = -1;

        for index in 0..data.num_rows() as u32 {
            self.insert(&data, &mut rng, index)?;
        }

        debug!(
            num_rows = data.num_rows(),
            dim = data.dim(),
            m = self.params.m,
            ef_construction = self.params.ef_construction,
            max_level = self.max_level,
            bottom_edges = self.layers[0].num_edges(),
            seed,
            "hnsw index built"
        );

        self.data = Some(data);
        Ok(())
    }

    fn knn_query(&self, query: &[f32], k: usize) -> Result<Vec<u32>> {
        let Some(data) = self.data.as_ref() else {
            // An empty graph has no entry point and nothing to return.
            return Ok(Vec::new());
        };
        Self::check_query(data, query)?;
        if k == 0 || self.max_level < 0 {
            return Ok(Vec::new());
        }
        let k = k.min(data.num_rows());
        let query = self.prepared_query(query);

        // Greedy descent to layer 1, narrowing to the single closest point.
        let mut ep: Vec<u32> = vec![self.entry_point];
        let mut level = self.max_level;
        while level > 0 {
            let w = search_layer(
                data,
                &self.layers[level as usize],
                self.metric,
                &query,
                &ep,
                1,
            )?;
            if let Some(best) = w.first() {
                ep = vec![best.index];
            }
            level -= 1;
        }

        // Full beam on the bottom layer; widen to k so the result is complete.
        let ef = self.params.ef_search.max(k);
        let w = search_layer(data, &self.layers[0], self.metric, &query, &ep, ef)?;
        Ok(w.iter().take(k).map(|n| n.index).collect())
    }

    fn radius_query(&self, _query: &[f32], _radius: f32) -> Result<Vec<u32>> {
        Err(AnnError::UnsupportedOperation(
            "radius query is not supported by the hnsw index".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                let angle = i as f32 * std::f32::consts::TAU / n as f32;
                vec![angle.cos(), angle.sin()]
            })
            .collect()
    }

    fn fitted(rows: &[Vec<f32>], m: usize) -> HnswIndex {
        let mut index = HnswIndex::new(
            Metric::L2,
            HnswParams {
                m,
                ef_construction: 40,
                ef_search: 40,
                seed: Some(99),
            },
        )
        .unwrap();
        index.fit(rows).unwrap();
        index
    }

    #[test]
    fn training_points_find_themselves() {
        let rows = ring(60);
        let index = fitted(&rows, 8);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(index.knn_query(row, 1).unwrap(), vec![i as u32]);
        }
    }

    #[test]
    fn layer_membership_and_symmetry_invariants() {
        let rows = ring(120);
        let index = fitted(&rows, 4);
        for l in 0..index.num_layers() {
            let layer = index.layer(l);
            for v in 0..rows.len() as u32 {
                if !layer.has_vertex(v) {
                    assert!(index.element_level(v as usize) < l as i32);
                    continue;
                }
                assert!(index.element_level(v as usize) >= l as i32);
                for &u in layer.neighbors(v).unwrap() {
                    assert!(layer.has_edge(u, v), "edge not symmetric at layer {l}");
                    assert!(index.element_level(u as usize) >= l as i32);
                }
            }
        }
    }

    #[test]
    fn degree_capacities_hold_after_fit() {
        let rows = ring(200);
        let index = fitted(&rows, 4);
        for l in 0..index.num_layers() {
            let cap = if l == 0 { 8 } else { 4 };
            let layer = index.layer(l);
            for v in 0..rows.len() as u32 {
                if layer.has_vertex(v) {
                    assert!(layer.neighbors(v).unwrap().len() <= cap);
                }
            }
        }
    }

    #[test]
    fn layer_zero_contains_all_points() {
        let rows = ring(50);
        let index = fitted(&rows, 8);
        assert_eq!(index.layer(0).num_vertices(), 50);
    }

    #[test]
    fn unfitted_index_returns_empty() {
        let index = HnswIndex::new(Metric::L2, HnswParams::default()).unwrap();
        assert_eq!(index.knn_query(&[1.0, 0.0], 3).unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn radius_query_is_unsupported() {
        let rows = ring(10);
        let index = fitted(&rows, 4);
        assert!(matches!(
            index.radius_query(&[1.0, 0.0], 0.5).unwrap_err(),
            AnnError::UnsupportedOperation(_)
        ));
    }

    #[test]
    fn k_clamps_to_dataset_size() {
        let rows = ring(7);
        let index = fitted(&rows, 4);
        assert_eq!(index.knn_query(&[1.0, 0.0], 50).unwrap().len(), 7);
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(matches!(
            HnswIndex::new(
                Metric::L2,
                HnswParams {
                    m: 1,
                    ..HnswParams::default()
                }
            )
            .unwrap_err(),
            AnnError::InvalidParameter(_)
        ));
        assert!(matches!(
            HnswIndex::new(Metric::L2Squared, HnswParams::default()).unwrap_err(),
            AnnError::UnsupportedOperation(_)
        ));
    }
}
