//! Greedy best-first expansion within a single HNSW layer.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::distance::{stored_distance, Metric};
use crate::error::Result;
use crate::graph::AdjacencyGraph;
use crate::matrix::Matrix;
use crate::topk::{Neighbor, TopK};

/// Beam search over one layer graph.
///
/// Two heaps with opposite orientations drive the walk: `candidates` is a
/// min-heap (expand the closest frontier node first), `found` is the bounded
/// max-heap of the best `ef` results (its head is the worst kept result, the
/// expansion cutoff). The walk stops when the closest unexpanded candidate is
/// already worse than the worst kept result.
///
/// Returns the kept results sorted by ascending distance to `query`.
pub(crate) fn search_layer(
    data: &Matrix,
    layer: &AdjacencyGraph,
    metric: Metric,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
) -> Result<Vec<Neighbor>> {
    debug_assert!(!entry_points.is_empty());

    let mut visited: HashSet<u32> = entry_points.iter().copied().collect();
    let mut candidates: BinaryHeap<Reverse<Neighbor>> = BinaryHeap::new();
    let mut found = TopK::new(ef);

    for &ep in entry_points {
        let entry = Neighbor {
            distance: stored_distance(metric, query, data.row(ep as usize)),
            index: ep,
        };
        candidates.push(Reverse(entry));
        found.push(entry);
    }

    while let Some(Reverse(closest)) = candidates.pop() {
        // Every remaining candidate is at least this far away; once that is
        // beyond the worst kept result the frontier cannot improve anything.
        if closest.distance > found.worst().unwrap_or(f32::INFINITY) {
            break;
        }

        for &neighbor in layer.neighbors(closest.index)? {
            if !visited.insert(neighbor) {
                continue;
            }
            let entry = Neighbor {
                distance: stored_distance(metric, query, data.row(neighbor as usize)),
                index: neighbor,
            };
            if found.push(entry) {
                candidates.push(Reverse(entry));
            }
        }
    }

    Ok(found.into_sorted_vec())
}
