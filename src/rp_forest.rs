//! Random projection forest (Annoy-style) approximate nearest neighbor index.
//!
//! An ensemble of binary trees built over the same points. Each internal node
//! splits its cell by a hyperplane through the midpoint of two randomly chosen
//! points (through the origin for cosine, where only direction matters);
//! terminal nodes store index lists.
//!
//! # Query traversal
//!
//! All trees are walked through one shared max-heap keyed by **signed**
//! hyperplane margin: the head is always the queued node whose split the query
//! clears most confidently, regardless of which tree it came from. Popping an
//! internal node enqueues its near child at `+|margin|` and its far child at
//! `-|margin|`, which sequences the far side after everything promising. The
//! k-NN walk always enqueues the far side and is bounded instead by the
//! `k * num_trees` candidate budget; the radius walk crosses a split only
//! while the plane is within the search radius.
//!
//! Candidates collect into the unique bounded heap, since several trees
//! usually reach the same rows.

use std::collections::{BinaryHeap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::ann::AnnIndex;
use crate::distance::{stored_distance, Metric};
use crate::error::{AnnError, Result};
use crate::hyperplane::Hyperplane;
use crate::matrix::Matrix;
use crate::topk::{Neighbor, UniqueTopK};
use crate::vector::{midpoint, normalize, sub, vectors_equal};

/// Random projection forest parameters.
#[derive(Debug, Clone)]
pub struct RpForestParams {
    /// Number of independent trees.
    pub num_trees: usize,
    /// Maximum number of points stored in a terminal node.
    pub leaf_size: usize,
    /// RNG seed; `None` draws one from OS entropy and records it.
    pub seed: Option<u64>,
}

impl Default for RpForestParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            leaf_size: 40,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RpNode {
    Internal {
        plane: Hyperplane,
        left: u32,
        right: u32,
    },
    Leaf {
        indices: Vec<u32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct RpTree {
    nodes: Vec<RpNode>,
    root: u32,
}

/// Forest of random projection trees over the fitted dataset.
#[derive(Debug)]
pub struct RpForestIndex {
    metric: Metric,
    params: RpForestParams,
    resolved_seed: Option<u64>,
    data: Option<Matrix>,
    trees: Vec<RpTree>,
}

/// Heap entry for the cross-tree walk; max-heap by signed margin.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    margin: f32,
    tree: u32,
    node: u32,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.margin
            .total_cmp(&other.margin)
            .then_with(|| (self.tree, self.node).cmp(&(other.tree, other.node)))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-query traversal state; one variant per query kind.
enum Visitor {
    Knn { cand: UniqueTopK },
    Radius { radius: f32, seen: HashSet<u32> },
}

impl Visitor {
    fn visit_leaf(&mut self, data: &Matrix, metric: Metric, query: &[f32], indices: &[u32]) {
        match self {
            Visitor::Knn { cand } => {
                for &idx in indices {
                    cand.push(Neighbor {
                        distance: stored_distance(metric, query, data.row(idx as usize)),
                        index: idx,
                    });
                }
            }
            Visitor::Radius { seen, .. } => {
                seen.extend(indices.iter().copied());
            }
        }
    }

    /// Whether the far side of a split at unsigned distance `margin_abs` still
    /// matters. k-NN explores it unconditionally (the candidate budget is the
    /// only brake); radius search crosses only while the plane is in range.
    fn wants_opposite(&self, margin_abs: f32) -> bool {
        match self {
            Visitor::Knn { .. } => true,
            Visitor::Radius { radius, .. } => margin_abs <= *radius,
        }
    }

    fn done(&self) -> bool {
        match self {
            Visitor::Knn { cand } => cand.is_full(),
            Visitor::Radius { .. } => false,
        }
    }
}

impl RpForestIndex {
    /// New empty forest for the given metric (L2 or cosine).
    pub fn new(metric: Metric, params: RpForestParams) -> Result<Self> {
        if metric != Metric::L2 && metric != Metric::Cosine {
            return Err(AnnError::UnsupportedOperation(format!(
                "random projection forest supports L2 and cosine metrics, got {metric:?}"
            )));
        }
        if params.num_trees == 0 {
            return Err(AnnError::InvalidParameter(
                "num_trees must be at least 1".to_string(),
            ));
        }
        if params.leaf_size == 0 {
            return Err(AnnError::InvalidParameter(
                "leaf_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            metric,
            params,
            resolved_seed: None,
            data: None,
            trees: Vec::new(),
        })
    }

    /// The seed the forest was built with, once fitted. Reusing it reproduces
    /// the exact tree structure.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.resolved_seed
    }

    fn fitted(&self) -> Result<&Matrix> {
        self.data.as_ref().ok_or(AnnError::EmptyIndex)
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

    /// Query vector in the space the forest was built in.
    fn prepared_query(&self, query: &[f32]) -> Vec<f32> {
        if self.metric == Metric::Cosine {
            normalize(query)
        } else {
            query.to_vec()
        }
    }

    fn traverse(&self, data: &Matrix, query: &[f32], visitor: &mut Visitor) {
        let mut heap = BinaryHeap::new();
        for (t, tree) in self.trees.iter().enumerate() {
            let margin = match &tree.nodes[tree.root as usize] {
                RpNode::Internal { plane, .. } => plane.margin(query),
                // A degenerate single-leaf tree has no split to rank by;
                // drain it first.
                RpNode::Leaf { .. } => f32::INFINITY,
            };
            heap.push(QueueEntry {
                margin,
                tree: t as u32,
                node: tree.root,
            });
        }

        while !visitor.done() {
            let Some(entry) = heap.pop() else {
                break;
            };
            let tree = &self.trees[entry.tree as usize];
            match &tree.nodes[entry.node as usize] {
                RpNode::Leaf { indices } => {
                    visitor.visit_leaf(data, self.metric, query, indices);
                }
                RpNode::Internal { plane, left, right } => {
                    let m = plane.margin(query);
                    let (good, opposite) = if m >= 0.0 {
                        (*right, *left)
                    } else {
                        (*left, *right)
                    };
                    heap.push(QueueEntry {
                        margin: m.abs(),
                        tree: entry.tree,
                        node: good,
                    });
                    if visitor.wants_opposite(m.abs()) {
                        heap.push(QueueEntry {
                            margin: -m.abs(),
                            tree: entry.tree,
                            node: opposite,
                        });
                    }
                }
            }
        }
    }
}

/// Attempt to split a cell by a random hyperplane.
///
/// Fails (returns `None`) when the cell has fewer than two distinct vectors or
/// when the plane does not separate it; the caller emits a leaf instead.
fn try_split(
    data: &Matrix,
    metric: Metric,
    indices: &[u32],
    rng: &mut StdRng,
) -> Option<(Hyperplane, Vec<u32>, Vec<u32>)> {
    if indices.len() < 2 {
        return None;
    }

    let i1 = rng.random_range(0..indices.len());
    let mut i2 = rng.random_range(0..indices.len());
    while i2 == i1 {
        i2 = rng.random_range(0..indices.len());
    }

    let v1 = data.row(indices[i1] as usize);
    let mut v2 = data.row(indices[i2] as usize);
    if vectors_equal(v1, v2) {
        // Unlucky draw; fall back to scanning for any distinct point. If
        // there is none the cell cannot be split at all.
        let distinct = indices
            .iter()
            .find(|&&j| !vectors_equal(v1, data.row(j as usize)))?;
        v2 = data.row(*distinct as usize);
    }

    let normal = normalize(&sub(v1, v2));
    let plane = match metric {
        // All cosine splits pass through the origin; only direction matters
        // on the unit sphere.
        Metric::Cosine => Hyperplane::new(normal, 0.0),
        _ => Hyperplane::through_point(normal, &midpoint(v1, v2)),
    };

    let mut left = Vec::new();
    let mut right = Vec::new();
    for &idx in indices {
        if plane.side(data.row(idx as usize)) {
            right.push(idx);
        } else {
            left.push(idx);
        }
    }
    if left.is_empty() || right.is_empty() {
        return None;
    }

    Some((plane, left, right))
}

/// Recursively build the subtree over `indices`, returning its arena id.
fn build_node(
    data: &Matrix,
    metric: Metric,
    leaf_size: usize,
    nodes: &mut Vec<RpNode>,
    indices: Vec<u32>,
    rng: &mut StdRng,
) -> u32 {
    if indices.len() <= leaf_size {
        nodes.push(RpNode::Leaf { indices });
        return (nodes.len() - 1) as u32;
    }

    let Some((plane, left_indices, right_indices)) = try_split(data, metric, &indices, rng) else {
        nodes.push(RpNode::Leaf { indices });
        return (nodes.len() - 1) as u32;
    };

    let left = build_node(data, metric, leaf_size, nodes, left_indices, rng);
    let right = build_node(data, metric, leaf_size, nodes, right_indices, rng);
    nodes.push(RpNode::Internal { plane, left, right });
    (nodes.len() - 1) as u32
}

impl AnnIndex for RpForestIndex {
    fn fit(&mut self, rows: &[Vec<f32>]) -> Result<()> {
        let mut data = Matrix::from_rows(rows)?;
        if self.metric == Metric::Cosine {
            data.l2_normalize_rows();
        }

        let seed = self.params.seed.unwrap_or_else(|| rand::rng().random());
        self.resolved_seed = Some(seed);

        let all_indices: Vec<u32> = (0..data.num_rows() as u32).collect();
        let mut trees = Vec::with_capacity(self.params.num_trees);
        for t in 0..self.params.num_trees {
            // Per-tree stream: trees stay independent and individually
            // reproducible regardless of build order.
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
            let mut nodes = Vec::new();
            let root = build_node(
                &data,
                self.metric,
                self.params.leaf_size,
                &mut nodes,
                all_indices.clone(),
                &mut rng,
            );
            trees.push(RpTree { nodes, root });
        }

        debug!(
            num_rows = data.num_rows(),
            dim = data.dim(),
            num_trees = trees.len(),
            leaf_size = self.params.leaf_size,
            seed,
            "random projection forest built"
        );

        self.trees = trees;
        self.data = Some(data);
        Ok(())
    }

    fn knn_query(&self, query: &[f32], k: usize) -> Result<Vec<u32>> {
        let data = self.fitted()?;
        Self::check_query(data, query)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let k = k.min(data.num_rows());
        let query = self.prepared_query(query);

        // The candidate budget caps traversal work and is the main
        // recall/latency knob.
        let budget = k * self.params.num_trees;
        let mut visitor = Visitor::Knn {
            cand: UniqueTopK::new(budget),
        };
        self.traverse(data, &query, &mut visitor);

        let Visitor::Knn { cand } = visitor else {
            unreachable!()
        };
        Ok(cand
            .into_sorted_vec()
            .iter()
            .take(k)
            .map(|n| n.index)
            .collect())
    }

    fn radius_query(&self, query: &[f32], radius: f32) -> Result<Vec<u32>> {
        let data = self.fitted()?;
        Self::check_query(data, query)?;
        if radius < 0.0 {
            return Ok(Vec::new());
        }
        let query = self.prepared_query(query);

        let mut visitor = Visitor::Radius {
            radius,
            seen: HashSet::new(),
        };
        self.traverse(data, &query, &mut visitor);

        let Visitor::Radius { seen, .. } = visitor else {
            unreachable!()
        };
        let mut hits: Vec<Neighbor> = seen
            .into_iter()
            .map(|idx| Neighbor {
                distance: stored_distance(self.metric, &query, data.row(idx as usize)),
                index: idx,
            })
            .filter(|n| n.distance <= radius)
            .collect();
        hits.sort();
        Ok(hits.iter().map(|n| n.index).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis_cross() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
            vec![0.0, -1.0],
        ]
    }

    fn fitted(metric: Metric, seed: u64) -> RpForestIndex {
        let mut index = RpForestIndex::new(
            metric,
            RpForestParams {
                num_trees: 100,
                leaf_size: 1,
                seed: Some(seed),
            },
        )
        .unwrap();
        index.fit(&axis_cross()).unwrap();
        index
    }

    #[test]
    fn knn_matches_exact_on_axis_cross() {
        let index = fitted(Metric::L2, 42);
        assert_eq!(index.knn_query(&[5.0, 0.0], 3).unwrap(), vec![0, 1, 3]);
        assert_eq!(index.knn_query(&[-0.5, -1.0], 4).unwrap(), vec![3, 2, 0, 1]);
        assert_eq!(index.knn_query(&[0.5, 0.0], 1).unwrap(), vec![0]);
    }

    #[test]
    fn radius_queries_on_axis_cross() {
        let index = fitted(Metric::L2, 42);
        assert_eq!(index.radius_query(&[5.0, 0.0], 1.0).unwrap(), Vec::<u32>::new());
        assert_eq!(index.radius_query(&[5.0, 0.0], 10.0).unwrap(), vec![0, 1, 3, 2]);
        assert_eq!(index.radius_query(&[-0.5, -1.0], 1.0).unwrap(), vec![3]);
        assert_eq!(index.radius_query(&[0.5, 0.0], 1.4).unwrap(), vec![0, 1, 3]);
    }

    #[test]
    fn same_seed_reproduces_trees_and_results() {
        let a = fitted(Metric::L2, 7);
        let b = fitted(Metric::L2, 7);
        assert_eq!(a.trees, b.trees);
        for q in [[5.0, 0.0], [-0.5, -1.0], [0.3, 0.9]] {
            assert_eq!(a.knn_query(&q, 3).unwrap(), b.knn_query(&q, 3).unwrap());
        }
    }

    #[test]
    fn identical_points_degenerate_to_single_leaf_trees() {
        let rows = vec![vec![1.0, 2.0]; 5];
        let mut index = RpForestIndex::new(
            Metric::L2,
            RpForestParams {
                num_trees: 10,
                leaf_size: 1,
                seed: Some(3),
            },
        )
        .unwrap();
        index.fit(&rows).unwrap();
        for tree in &index.trees {
            assert_eq!(tree.nodes.len(), 1);
            assert!(matches!(&tree.nodes[0], RpNode::Leaf { indices } if indices.len() == 5));
        }
        assert_eq!(index.knn_query(&[1.0, 2.0], 3).unwrap().len(), 3);
    }

    #[test]
    fn cosine_forest_normalizes_rows() {
        let index = {
            let mut index = RpForestIndex::new(
                Metric::Cosine,
                RpForestParams {
                    num_trees: 20,
                    leaf_size: 1,
                    seed: Some(11),
                },
            )
            .unwrap();
            // Same directions at different magnitudes.
            index
                .fit(&[
                    vec![10.0, 0.0],
                    vec![0.0, 3.0],
                    vec![-7.0, 0.1],
                ])
                .unwrap();
            index
        };
        assert_eq!(index.knn_query(&[0.5, 0.0], 1).unwrap(), vec![0]);
        assert_eq!(index.knn_query(&[0.0, 9.0], 1).unwrap(), vec![1]);
    }

    #[test]
    fn l2_squared_metric_rejected() {
        let err = RpForestIndex::new(Metric::L2Squared, RpForestParams::default()).unwrap_err();
        assert!(matches!(err, AnnError::UnsupportedOperation(_)));
    }
}
