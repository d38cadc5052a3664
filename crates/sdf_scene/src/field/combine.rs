//! Smooth boolean combinators and space warps.
//!
//! The combinators blend the running field value with one node's distance. All of them expect
//! `k > 0`; node smoothing is clamped to [`crate::field::node::MIN_SMOOTHING`] on write, so the
//! evaluator never feeds them zero.
use glam::{Mat4, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a node's distance is folded into the field accumulated so far.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CombineKind {
    #[default]
    Union,
    Subtract,
    Intersect,
}

impl CombineKind {
    /// Folds `d` (this node) into `acc` (everything before it) with smoothing `k`.
    #[inline]
    pub fn apply(self, acc: f32, d: f32, k: f32) -> f32 {
        match self {
            CombineKind::Union => smooth_min(acc, d, k),
            CombineKind::Subtract => smooth_subtract(d, acc, k),
            CombineKind::Intersect => smooth_intersect(d, acc, k),
        }
    }
}

/// Polynomial smooth minimum. Never larger than `a.min(b)`.
#[inline]
pub fn smooth_min(a: f32, b: f32, k: f32) -> f32 {
    let h = (k - (a - b).abs()).max(0.0) / k;
    a.min(b) - h * h * k * 0.25
}

/// Smoothly carves `d1` out of `d2`.
#[inline]
pub fn smooth_subtract(d1: f32, d2: f32, k: f32) -> f32 {
    let h = (0.5 - 0.5 * (d2 + d1) / k).clamp(0.0, 1.0);
    lerp(d2, -d1, h) + k * h * (1.0 - h)
}

/// Smooth intersection of `d1` and `d2`.
#[inline]
pub fn smooth_intersect(d1: f32, d2: f32, k: f32) -> f32 {
    let h = (0.5 - 0.5 * (d2 - d1) / k).clamp(0.0, 1.0);
    lerp(d2, d1, h) + k * h * (1.0 - h)
}

/// Stretches space along the local axes of `world_to_local` by up to `extents` on each side.
///
/// The warped point is returned in world space so later nodes can apply their own transforms.
/// The translation of `world_to_local` is added before clamping, which keeps the stretch
/// centered on the operation node's position.
pub fn elongate(p: Vec3, extents: Vec3, world_to_local: Mat4) -> Vec3 {
    let translation = world_to_local.w_axis.truncate();
    let local = world_to_local.transform_point3(p);
    let local = local - (local + translation).clamp(-extents, extents);
    world_to_local.inverse().transform_point3(local)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{RngExt, SeedableRng};

    use super::*;

    #[test]
    fn smooth_min_never_exceeds_min() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..2_000 {
            let a = rng.random_range(-10.0..10.0);
            let b = rng.random_range(-10.0..10.0);
            let k = rng.random_range(1e-4..5.0);
            assert!(smooth_min(a, b, k) <= a.min(b), "a={a} b={b} k={k}");
        }
    }

    #[test]
    fn smooth_min_converges_to_min_as_k_shrinks() {
        let (a, b) = (0.3, 0.30001);
        let coarse = (smooth_min(a, b, 1.0) - a.min(b)).abs();
        let fine = (smooth_min(a, b, 1e-3) - a.min(b)).abs();
        let finest = (smooth_min(a, b, 1e-6) - a.min(b)).abs();
        assert!(fine < coarse);
        assert!(finest < fine);
        assert!(finest < 1e-6);
    }

    #[test]
    fn smooth_min_is_exact_when_inputs_are_far_apart() {
        assert_eq!(smooth_min(1.0, 5.0, 0.5), 1.0);
        assert_eq!(smooth_min(-2.0, 3.0, 0.5), -2.0);
    }

    #[test]
    fn smooth_subtract_matches_hard_difference_away_from_blend() {
        // Carving a far away shape leaves the base untouched.
        assert!((smooth_subtract(10.0, -1.0, 0.1) - -1.0).abs() < 1e-6);
        // Deep inside the carved shape the result is the negated cutter distance.
        assert!((smooth_subtract(-3.0, -1.0, 0.1) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn smooth_intersect_matches_hard_max_away_from_blend() {
        assert!((smooth_intersect(2.0, -1.0, 0.1) - 2.0).abs() < 1e-6);
        assert!((smooth_intersect(-2.0, 1.0, 0.1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn combine_kind_routes_argument_order() {
        let acc = -1.0;
        let d = 0.5;
        let k = 0.01;
        assert_eq!(CombineKind::Union.apply(acc, d, k), smooth_min(acc, d, k));
        assert_eq!(
            CombineKind::Subtract.apply(acc, d, k),
            smooth_subtract(d, acc, k)
        );
        assert_eq!(
            CombineKind::Intersect.apply(acc, d, k),
            smooth_intersect(d, acc, k)
        );
    }

    #[test]
    fn elongate_collapses_points_inside_extents() {
        let extents = Vec3::new(2.0, 0.0, 0.0);
        let warped = elongate(Vec3::new(1.5, 0.3, 0.0), extents, Mat4::IDENTITY);
        assert!((warped - Vec3::new(0.0, 0.3, 0.0)).length() < 1e-6);

        let beyond = elongate(Vec3::new(3.0, 0.0, 0.0), extents, Mat4::IDENTITY);
        assert!((beyond - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn zero_extents_leave_points_unchanged() {
        let world_to_local = Mat4::from_translation(Vec3::new(-1.0, 2.0, 0.5));
        let p = Vec3::new(0.25, -4.0, 3.0);
        let warped = elongate(p, Vec3::ZERO, world_to_local);
        assert!((warped - p).length() < 1e-5);
    }
}
