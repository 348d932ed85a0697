//! proxima: nearest neighbor search over dense vectors.
//!
//! Four interchangeable index structures behind one contract
//! ([`AnnIndex`]): `fit` over an N x d dataset, then `knn_query` /
//! `radius_query` returning row indices by ascending distance.
//!
//! | Index | Guarantee | Metrics | Radius search |
//! |-------|-----------|---------|---------------|
//! | [`ExactIndex`] | exact (linear scan) | L2, squared L2, cosine | yes |
//! | [`KdTreeIndex`] | exact | L2 | yes |
//! | [`RpForestIndex`] | approximate | L2, cosine | yes |
//! | [`HnswIndex`] | approximate | L2, cosine | no |
//!
//! # Which index should I use?
//!
//! 1. **Small N (< 10k) or ground truth needed**: [`ExactIndex`]. Brute force
//!    is hard to beat at small scale and is the correctness oracle for the
//!    others.
//! 2. **Low dimension, exact results**: [`KdTreeIndex`]. Axis-aligned
//!    pruning degrades as d grows; past a few dozen dimensions it scans
//!    most of the tree.
//! 3. **General purpose**: [`HnswIndex`]. Best recall/latency trade-off at
//!    scale; the beam width `ef_search` tunes recall against speed.
//! 4. **Cheap batch builds, radius queries over approximate candidates**:
//!    [`RpForestIndex`]. The `k * num_trees` candidate budget is the knob.
//!
//! # Example
//!
//! ```
//! use proxima::{AnnIndex, ExactIndex, Metric};
//!
//! # fn main() -> proxima::Result<()> {
//! let mut index = ExactIndex::new(Metric::L2);
//! index.fit(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]])?;
//!
//! assert_eq!(index.knn_query(&[0.9, 0.2], 1)?, vec![0]);
//! assert_eq!(index.radius_query(&[0.9, 0.2], 1.5)?, vec![0, 1]);
//! # Ok(())
//! # }
//! ```
//!
//! Construction is single-threaded; fitted indexes are immutable, so any
//! number of threads may query one concurrently. Builders own their RNG and
//! accept an explicit seed for reproducible structure.

pub mod ann;
pub mod distance;
pub mod error;
pub mod exact;
pub mod graph;
pub mod hnsw;
pub mod hyperplane;
pub mod kdtree;
pub mod matrix;
pub mod rp_forest;
pub mod topk;
pub mod vector;

pub use ann::AnnIndex;
pub use distance::Metric;
pub use error::{AnnError, Result};
pub use exact::ExactIndex;
pub use hnsw::{HnswIndex, HnswParams};
pub use kdtree::{KdTreeIndex, KdTreeParams};
pub use rp_forest::{RpForestIndex, RpForestParams};
