//! Hyperplanes for random projection splits.
//!
//! A d-dimensional hyperplane is a unit-norm normal vector plus a scalar
//! intercept; a point `v` lies on the plane when `dot(normal, v) + intercept
//! = 0`. The signed value of that expression is the margin: its sign picks a
//! half-space, its magnitude is the point-to-plane distance.

use crate::vector;

/// Hyperplane `{ v : dot(normal, v) + intercept = 0 }` with `|normal| = 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperplane {
    normal: Vec<f32>,
    intercept: f32,
}

impl Hyperplane {
    /// Hyperplane from a unit normal and an intercept.
    ///
    /// The normal must already be L2-normalized (checked in debug builds).
    /// An intercept of zero gives a plane through the origin, the form used
    /// by cosine-metric splits where only direction matters.
    #[must_use]
    pub fn new(normal: Vec<f32>, intercept: f32) -> Self {
        debug_assert!(vector::is_normalized(&normal));
        Self { normal, intercept }
    }

    /// Hyperplane with the given unit normal passing through the point `x0`.
    #[must_use]
    pub fn through_point(normal: Vec<f32>, x0: &[f32]) -> Self {
        debug_assert!(vector::is_normalized(&normal));
        let intercept = -vector::dot(&normal, x0);
        Self { normal, intercept }
    }

    /// Axis-aligned hyperplane: normal is the `axis`-th standard basis vector.
    #[must_use]
    pub fn axis_aligned(dim: usize, axis: usize, intercept: f32) -> Self {
        let mut normal = vec![0.0; dim];
        normal[axis] = 1.0;
        Self { normal, intercept }
    }

    /// Signed margin `dot(normal, v) + intercept`.
    #[inline]
    #[must_use]
    pub fn margin(&self, v: &[f32]) -> f32 {
        vector::dot(&self.normal, v) + self.intercept
    }

    /// Which side of the plane `v` falls on (`margin >= 0`).
    #[inline]
    #[must_use]
    pub fn side(&self, v: &[f32]) -> bool {
        self.margin(v) >= 0.0
    }

    /// Unsigned distance from `v` to the plane.
    #[inline]
    #[must_use]
    pub fn distance(&self, v: &[f32]) -> f32 {
        self.margin(v).abs()
    }

    /// Dimensionality of the plane's ambient space.
    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.normal.len()
    }

    /// The unit normal.
    #[inline]
    #[must_use]
    pub fn normal(&self) -> &[f32] {
        &self.normal
    }

    /// The intercept.
    #[inline]
    #[must_use]
    pub fn intercept(&self) -> f32 {
        self.intercept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{floats_equal, normalize, norm};

    #[test]
    fn axis_aligned_plane_distance() {
        // Vertical 2-d plane x = 5 (equation x - 5 = 0).
        let h = Hyperplane::axis_aligned(2, 0, -5.0);
        assert_eq!(h.distance(&[8.0, 3.0]), 3.0);
        assert!(h.side(&[8.0, 3.0]));
        assert!(!h.side(&[2.0, -7.0]));
    }

    #[test]
    fn diagonal_plane_side_and_distance() {
        // 45-degree line through (-2, 0) and (0, 2).
        let normal = normalize(&[-12345.123, 12345.123]);
        let h = Hyperplane::new(normal, -f32::sqrt(2.0));

        assert!(floats_equal(h.distance(&[-2.0, 0.0]), 0.0));
        assert!(floats_equal(h.distance(&[0.0, 2.0]), 0.0));

        // Two points equidistant from the plane, on opposite sides.
        let d3 = h.distance(&[1.0, 6.0]);
        let d4 = h.distance(&[4.0, 3.0]);
        assert!(floats_equal(d3, d4));
        assert!(h.side(&[1.0, 6.0]));
        assert!(!h.side(&[4.0, 3.0]));
    }

    #[test]
    fn through_point_computes_intercept() {
        // Normal (-1, 1)/sqrt(2) through midpoint (2.5, 4.5): intercept is
        // -sqrt(2), and (0, 2) lies on the plane.
        let normal = normalize(&[-1.0, 1.0]);
        let h = Hyperplane::through_point(normal, &[2.5, 4.5]);

        assert!(floats_equal(h.intercept(), -f32::sqrt(2.0)));
        assert!(floats_equal(h.distance(&[0.0, 2.0]), 0.0));
    }

    #[test]
    fn normal_is_unit_norm() {
        let h = Hyperplane::through_point(normalize(&[3.0, -4.0, 12.0]), &[1.0, 1.0, 1.0]);
        assert!((norm(h.normal()) - 1.0).abs() < 1e-5);
    }
}
