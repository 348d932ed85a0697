//! KD-tree index: axis-aligned median splits, branch-and-bound traversal.
//!
//! Exact under the Euclidean metric: the far-subtree pruning test compares
//! the query's axis distance to the current worst candidate distance, which is
//! a valid lower bound for L2 but not for cosine, so no other metric is
//! accepted.
//!
//! # Algorithm
//!
//! Build recurses on `(indices, depth)`: the splitting dimension is
//! `depth % d`, the pivot is the median along it. Points strictly below the
//! pivot's coordinate go left; the pivot and everything else go right. The
//! query walk visits the near child first and crosses to the far child only
//! while the axis gap can still beat the worst kept candidate.
//!
//! Nodes live in a flat arena and reference children by index, so a tree is
//! one allocation of nodes plus the leaf index lists.

use tracing::debug;

use crate::ann::AnnIndex;
use crate::distance::{l2_distance, Metric};
use crate::error::{AnnError, Result};
use crate::matrix::Matrix;
use crate::topk::{Neighbor, UniqueTopK};

/// KD-tree construction parameters.
#[derive(Debug, Clone)]
pub struct KdTreeParams {
    /// Maximum number of points stored in a terminal node.
    pub leaf_size: usize,
}

impl Default for KdTreeParams {
    fn default() -> Self {
        Self { leaf_size: 40 }
    }
}

#[derive(Debug)]
enum KdNode {
    Internal {
        /// Median coordinate along this node's axis.
        split_value: f32,
        /// Row id of the median point itself (lives in the right subtree).
        split_index: u32,
        left: u32,
        right: u32,
    },
    Leaf {
        indices: Vec<u32>,
    },
}

/// Median-split KD-tree over the fitted dataset.
#[derive(Debug)]
pub struct KdTreeIndex {
    params: KdTreeParams,
    data: Option<Matrix>,
    nodes: Vec<KdNode>,
    root: u32,
}

impl KdTreeIndex {
    /// New empty KD-tree.
    ///
    /// Only [`Metric::L2`] is accepted; the axis-distance pruning bound is
    /// unsound for the other metrics.
    pub fn new(metric: Metric, params: KdTreeParams) -> Result<Self> {
        if metric != Metric::L2 {
            return Err(AnnError::UnsupportedOperation(format!(
                "kd-tree supports only the L2 metric, got {metric:?}"
            )));
        }
        if params.leaf_size == 0 {
            return Err(AnnError::InvalidParameter(
                "leaf_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            params,
            data: None,
            nodes: Vec::new(),
            root: 0,
        })
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

    // The candidate heap is the unique variant: an internal node's pivot also
    // lives in a leaf of its right subtree, so the same (distance, index) pair
    // is offered twice along one descent.
    fn knn_node(
        &self,
        data: &Matrix,
        node_id: u32,
        depth: usize,
        query: &[f32],
        cand: &mut UniqueTopK,
    ) {
        match &self.nodes[node_id as usize] {
            KdNode::Leaf { indices } => {
                for &idx in indices {
                    cand.push(Neighbor {
                        distance: l2_distance(query, data.row(idx as usize)),
                        index: idx,
                    });
                }
            }
            KdNode::Internal {
                split_value,
                split_index,
                left,
                right,
            } => {
                cand.push(Neighbor {
                    distance: l2_distance(query, data.row(*split_index as usize)),
                    index: *split_index,
                });

                let dim = depth % data.dim();
                // Near side must agree with the build partition: coordinates
                // strictly below the split value live in the left subtree.
                let (near, far) = if query[dim] < *split_value {
                    (*left, *right)
                } else {
                    (*right, *left)
                };

                self.knn_node(data, near, depth + 1, query, cand);
                if (query[dim] - split_value).abs() < cand.pruning_bound() {
                    self.knn_node(data, far, depth + 1, query, cand);
                }
            }
        }
    }

    fn radius_node(
        &self,
        data: &Matrix,
        node_id: u32,
        depth: usize,
        query: &[f32],
        radius: f32,
        out: &mut Vec<Neighbor>,
    ) {
        match &self.nodes[node_id as usize] {
            KdNode::Leaf { indices } => {
                for &idx in indices {
                    let distance = l2_distance(query, data.row(idx as usize));
                    if distance <= radius {
                        out.push(Neighbor {
                            distance,
                            index: idx,
                        });
                    }
                }
            }
            KdNode::Internal {
                split_value,
                split_index,
                left,
                right,
            } => {
                let distance = l2_distance(query, data.row(*split_index as usize));
                if distance <= radius {
                    out.push(Neighbor {
                        distance,
                        index: *split_index,
                    });
                }

                let dim = depth % data.dim();
                let (near, far) = if query[dim] < *split_value {
                    (*left, *right)
                } else {
                    (*right, *left)
                };

                self.radius_node(data, near, depth + 1, query, radius, out);
                if (query[dim] - split_value).abs() < radius {
                    self.radius_node(data, far, depth + 1, query, radius, out);
                }
            }
        }
    }
}

/// Recursively build the subtree over `indices`, returning its arena id.
fn build_node(
    data: &Matrix,
    leaf_size: usize,
    nodes: &mut Vec<KdNode>,
    indices: Vec<u32>,
    depth: usize,
) -> u32 {
    if indices.len() <= leaf_size {
        nodes.push(KdNode::Leaf { indices });
        return (nodes.len() - 1) as u32;
    }

    let dim = depth % data.dim();
    let mut sorted = indices;
    sorted.sort_by(|a, b| data.row(*a as usize)[dim].total_cmp(&data.row(*b as usize)[dim]));

    let mid = sorted.len() / 2;
    let split_index = sorted[mid];
    let split_value = data.row(split_index as usize)[dim];

    let mut left_indices = Vec::new();
    let mut right_indices = Vec::new();
    for &idx in &sorted {
        if data.row(idx as usize)[dim] < split_value {
            left_indices.push(idx);
        } else {
            right_indices.push(idx);
        }
    }

    // All coordinates equal along this axis: the split is degenerate, so stop
    // here instead of recursing forever.
    if left_indices.is_empty() || right_indices.is_empty() {
        nodes.push(KdNode::Leaf { indices: sorted });
        return (nodes.len() - 1) as u32;
    }

    let left = build_node(data, leaf_size, nodes, left_indices, depth + 1);
    let right = build_node(data, leaf_size, nodes, right_indices, depth + 1);
    nodes.push(KdNode::Internal {
        split_value,
        split_index,
        left,
        right,
    });
    (nodes.len() - 1) as u32
}

impl AnnIndex for KdTreeIndex {
    fn fit(&mut self, rows: &[Vec<f32>]) -> Result<()> {
        let data = Matrix::from_rows(rows)?;

        let all_indices: Vec<u32> = (0..data.num_rows() as u32).collect();
        let mut nodes = Vec::new();
        let root = build_node(&data, self.params.leaf_size, &mut nodes, all_indices, 0);

        debug!(
            num_rows = data.num_rows(),
            dim = data.dim(),
            num_nodes = nodes.len(),
            leaf_size = self.params.leaf_size,
            "kd-tree built"
        );

        self.nodes = nodes;
        self.root = root;
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

        let mut cand = UniqueTopK::new(k);
        self.knn_node(data, self.root, 0, query, &mut cand);
        Ok(cand.into_sorted_vec().iter().map(|n| n.index).collect())
    }

    fn radius_query(&self, query: &[f32], radius: f32) -> Result<Vec<u32>> {
        let data = self.fitted()?;
        Self::check_query(data, query)?;
        if radius < 0.0 {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        self.radius_node(data, self.root, 0, query, radius, &mut out);
        // A pivot row reached through both its internal node and a leaf shows
        // up twice with the same distance; sorting makes the copies adjacent.
        out.sort();
        out.dedup();
        Ok(out.iter().map(|n| n.index).collect())
    }
}
