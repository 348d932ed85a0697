//! Distance metrics for dense vectors.
//!
//! A single shared definition of the supported metrics plus the registry
//! mapping stable integer identifiers to them.
//!
//! ## Important nuance
//!
//! The approximate indexes L2-normalize their stored vectors (and queries) at
//! fit/query time when the metric is cosine, and then use the faster
//! dot-product form [`cosine_distance_normalized`]. The general
//! [`cosine_distance`] computes norms on the fly and does not require
//! pre-normalized inputs.

use crate::error::{AnnError, Result};
use crate::vector;

/// Distance metric for dense vectors.
///
/// Discriminants are stable identifiers and part of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Metric {
    /// Euclidean (L2) distance.
    L2 = 0,
    /// Squared Euclidean distance (saves the square root when only the
    /// ordering matters).
    L2Squared = 1,
    /// Cosine distance `1 - cos(a, b)`.
    Cosine = 2,
}

impl Metric {
    /// Resolve a stable metric identifier.
    ///
    /// Unknown identifiers fail with [`AnnError::UnsupportedMetric`].
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Metric::L2),
            1 => Ok(Metric::L2Squared),
            2 => Ok(Metric::Cosine),
            other => Err(AnnError::UnsupportedMetric(other)),
        }
    }

    /// The stable identifier of this metric.
    #[inline]
    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Compute the distance between two vectors.
    ///
    /// If dimensions mismatch, this returns `f32::INFINITY` (so it is never
    /// selected as a nearest neighbor); the index entry points validate
    /// dimensions up front and report the mismatch as an error.
    #[inline]
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => l2_distance(a, b),
            Metric::L2Squared => l2_distance_squared(a, b),
            Metric::Cosine => cosine_distance(a, b),
        }
    }
}

/// L2 (Euclidean) distance.
#[inline]
#[must_use]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    l2_distance_squared(a, b).sqrt()
}

/// Squared L2 distance.
#[inline]
#[must_use]
pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Cosine distance `1 - cos(a, b)`.
///
/// Computes both norms, so it does **not** require pre-normalized inputs.
/// Zero vectors are at distance 1 from everything.
#[inline]
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    let na = vector::norm(a);
    let nb = vector::norm(b);
    if na < 1e-10 || nb < 1e-10 {
        return 1.0;
    }
    1.0 - (vector::dot(a, b) / (na * nb)).clamp(-1.0, 1.0)
}

/// Cosine distance for **L2-normalized** vectors, `1 - dot(a, b)`.
///
/// Faster than [`cosine_distance`] but returns nonsense if inputs are not
/// normalized.
#[inline]
#[must_use]
pub fn cosine_distance_normalized(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    1.0 - vector::dot(a, b)
}

/// Distance between a query and a stored row inside an index that has already
/// applied its fit-time preprocessing (rows and query normalized for cosine).
#[inline]
#[must_use]
pub(crate) fn stored_distance(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::L2 => l2_distance(a, b),
        Metric::L2Squared => l2_distance_squared(a, b),
        Metric::Cosine => cosine_distance_normalized(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::normalize;

    #[test]
    fn metric_ids_are_stable() {
        assert_eq!(Metric::L2.id(), 0);
        assert_eq!(Metric::L2Squared.id(), 1);
        assert_eq!(Metric::Cosine.id(), 2);
        assert_eq!(Metric::from_id(0).unwrap(), Metric::L2);
        assert_eq!(Metric::from_id(2).unwrap(), Metric::Cosine);
        assert_eq!(
            Metric::from_id(7).unwrap_err(),
            AnnError::UnsupportedMetric(7)
        );
    }

    #[test]
    fn l2_distance_basic() {
        let a = [0.0_f32, 0.0];
        let b = [3.0_f32, 4.0];
        assert!((l2_distance(&a, &b) - 5.0).abs() < 1e-6);
        assert_eq!(l2_distance_squared(&a, &b), 25.0);
    }

    #[test]
    fn cosine_distance_is_zero_for_identical() {
        let a = [1.0_f32, 2.0, 3.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_orthogonal_is_one() {
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_normalized_matches_general_form() {
        let a = normalize(&[3.0_f32, 4.0]);
        let b = normalize(&[-1.0_f32, 2.0]);
        let d1 = cosine_distance(&a, &b);
        let d2 = cosine_distance_normalized(&a, &b);
        assert!((d1 - d2).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_are_never_nearest() {
        assert_eq!(l2_distance(&[1.0], &[1.0, 2.0]), f32::INFINITY);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 2.0]), f32::INFINITY);
    }
}
