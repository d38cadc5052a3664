//! CPU evaluation of a scene snapshot.
//!
//! [`FieldEvaluator`] folds an ordered list of [`FieldNode`]s into one signed distance. The fold
//! starts far away from everything and walks the list front to back:
//!
//! - a shape node computes its distance at the current point and combines it into the running
//!   value with its [`CombineKind`](crate::field::combine::CombineKind) and smoothing;
//! - an operation node replaces the current point with its warped version.
//!
//! Operations are not scoped. An operation warps every node after it in the list, up to the end,
//! so its position in the order decides what it affects. The same holds for combine kinds: a
//! subtraction only carves what was accumulated before it.
//!
//! All queries are pure functions of the last snapshot handed in with
//! [`FieldEvaluator::set_data`] and [`FieldEvaluator::set_mesh_data`].
use std::sync::Arc;

use glam::Vec3;

use crate::field::material::MaterialData;
use crate::field::node::FieldNode;
use crate::field::ray::{Ray, RayHit, RayMarchConfig};
use crate::scene::settings::SettingsData;

/// Lower bound for the gradient tap distance on the CPU.
pub const MIN_NORMAL_SMOOTHING_CPU: f32 = 0.002;

/// Starting value of the fold; effectively "nothing here".
pub const FAR_DISTANCE: f32 = 1e7;

/// Result of projecting a point onto the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceProjection {
    pub point: Vec3,
    pub signed_distance: f32,
    /// Unit direction from the query point toward the surface (for points outside).
    pub direction: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct FieldEvaluator {
    settings: SettingsData,
    nodes: Arc<[FieldNode]>,
    materials: Arc<[MaterialData]>,
    samples: Arc<[f32]>,
    packed_uvs: Arc<[f32]>,
}

impl FieldEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_settings(&mut self, settings: SettingsData) {
        self.settings = settings;
    }

    /// Replaces the node and material snapshot.
    pub fn set_data(
        &mut self,
        nodes: impl Into<Arc<[FieldNode]>>,
        materials: impl Into<Arc<[MaterialData]>>,
    ) {
        self.nodes = nodes.into();
        self.materials = materials.into();
    }

    /// Replaces the pooled mesh buffers mesh nodes index into.
    pub fn set_mesh_data(
        &mut self,
        samples: impl Into<Arc<[f32]>>,
        packed_uvs: impl Into<Arc<[f32]>>,
    ) {
        self.samples = samples.into();
        self.packed_uvs = packed_uvs.into();
    }

    pub fn settings(&self) -> &SettingsData {
        &self.settings
    }

    pub fn nodes(&self) -> &[FieldNode] {
        &self.nodes
    }

    pub fn materials(&self) -> &[MaterialData] {
        &self.materials
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn packed_uvs(&self) -> &[f32] {
        &self.packed_uvs
    }

    /// Signed distance from `p` to the combined surface.
    pub fn map(&self, p: Vec3) -> f32 {
        let mut p = p;
        let mut min_dist = FAR_DISTANCE;

        for node in self.nodes.iter() {
            let Some(blend) = node.blend() else {
                p = node.warp(p);
                continue;
            };
            let Some(d) = node.sdf(p, &self.samples) else {
                continue;
            };
            min_dist = blend.combine.apply(min_dist, d, blend.smoothing());
        }

        min_dist
    }

    /// Unnormalized field gradient from four tetrahedral taps.
    ///
    /// `smoothing` overrides the settings' normal smoothing; either is floored at
    /// [`MIN_NORMAL_SMOOTHING_CPU`].
    pub fn map_gradient(&self, p: Vec3, smoothing: Option<f32>) -> Vec3 {
        let e = smoothing
            .unwrap_or(self.settings.normal_smoothing)
            .max(MIN_NORMAL_SMOOTHING_CPU);

        let xyy = Vec3::new(e, -e, -e);
        let yyx = Vec3::new(-e, -e, e);
        let yxy = Vec3::new(-e, e, -e);
        let xxx = Vec3::splat(e);

        xyy * self.map(p + xyy)
            + yyx * self.map(p + yyx)
            + yxy * self.map(p + yxy)
            + xxx * self.map(p + xxx)
    }

    /// Surface normal at `p`, or zero where the gradient vanishes.
    pub fn map_normal(&self, p: Vec3) -> Vec3 {
        self.map_gradient(p, None).normalize_or_zero()
    }

    pub fn map_normal_with(&self, p: Vec3, smoothing: f32) -> Vec3 {
        self.map_gradient(p, Some(smoothing)).normalize_or_zero()
    }

    /// Sphere traces `ray`. A miss is `None`.
    pub fn ray_march(&self, ray: &Ray, config: &RayMarchConfig) -> Option<RayHit> {
        if ray.direction == Vec3::ZERO {
            return None;
        }

        let mut t = 0.0;
        for step in 0..config.max_iterations {
            let point = ray.at(t);
            let d = self.map(point);
            if d < config.surface_distance {
                return Some(RayHit {
                    point,
                    normal: self.map_normal(point),
                    distance: t,
                    steps: step + 1,
                });
            }
            t += d;
            if t > config.max_distance {
                break;
            }
        }

        None
    }

    /// Closest point on the surface to `p`, found by one step along the normal.
    pub fn nearest_point_on_surface(&self, p: Vec3) -> Vec3 {
        self.project_to_surface(p).point
    }

    pub fn project_to_surface(&self, p: Vec3) -> SurfaceProjection {
        let signed_distance = self.map(p);
        let direction = -self.map_normal(p);
        SurfaceProjection {
            point: p + direction * signed_distance,
            signed_distance,
            direction,
        }
    }

    /// Whether a sphere at `center` touches or contains any surface.
    pub fn overlap_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.map(center) <= radius
    }

    /// Approximate overlap test between the surface and an axis-aligned box.
    ///
    /// Rejects through the bounding sphere first, then projects the center, the 8 corners and the
    /// 6 face centers onto the surface and accepts if any projection lands inside the box. Thin
    /// features that cross the box between those probes are missed.
    pub fn overlap_box(&self, center: Vec3, half_extents: Vec3) -> bool {
        let half_extents = half_extents.abs();
        if !self.overlap_sphere(center, half_extents.length()) {
            return false;
        }

        let min = center - half_extents;
        let max = center + half_extents;
        let inside = |q: Vec3| q.cmpge(min).all() && q.cmple(max).all();

        box_probes(half_extents)
            .into_iter()
            .any(|offset| inside(self.nearest_point_on_surface(center + offset)))
    }
}

fn box_probes(h: Vec3) -> [Vec3; 15] {
    [
        Vec3::ZERO,
        Vec3::new(h.x, h.y, h.z),
        Vec3::new(-h.x, -h.y, -h.z),
        Vec3::new(h.x, h.y, -h.z),
        Vec3::new(h.x, -h.y, h.z),
        Vec3::new(h.x, -h.y, -h.z),
        Vec3::new(-h.x, h.y, h.z),
        Vec3::new(-h.x, h.y, -h.z),
        Vec3::new(-h.x, -h.y, h.z),
        Vec3::new(h.x, 0.0, 0.0),
        Vec3::new(-h.x, 0.0, 0.0),
        Vec3::new(0.0, h.y, 0.0),
        Vec3::new(0.0, -h.y, 0.0),
        Vec3::new(0.0, 0.0, h.z),
        Vec3::new(0.0, 0.0, -h.z),
    ]
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec4};

    use super::*;
    use crate::field::baked::BakedMeshField;
    use crate::field::combine::CombineKind;
    use crate::field::node::{Blend, MeshSlot, OperationKind, PrimitiveKind};
    use crate::field::primitives::sdf_sphere;
    use crate::scene::pool::MeshAssetId;

    fn approx_eq(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() < eps, "{a} != {b}");
    }

    fn sphere(radius: f32, at: Vec3, combine: CombineKind) -> FieldNode {
        FieldNode::Primitive {
            kind: PrimitiveKind::Sphere,
            params: Vec4::new(radius, 0.0, 0.0, 0.0),
            blend: Blend::new(combine, false, 0.0),
            transform: Mat4::from_translation(at).inverse(),
        }
    }

    fn elongate(extents: Vec3) -> FieldNode {
        FieldNode::Operation {
            kind: OperationKind::Elongate,
            params: extents.extend(0.0),
            transform: Mat4::IDENTITY,
        }
    }

    fn evaluator(nodes: Vec<FieldNode>) -> FieldEvaluator {
        let mut eval = FieldEvaluator::new();
        let count = nodes.len();
        eval.set_data(nodes, vec![MaterialData::default(); count]);
        eval
    }

    #[test]
    fn empty_scene_is_far_everywhere() {
        let eval = FieldEvaluator::new();
        assert_eq!(eval.map(Vec3::ZERO), FAR_DISTANCE);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(eval.ray_march(&ray, &RayMarchConfig::default()).is_none());
    }

    #[test]
    fn ray_march_hits_unit_sphere() {
        let eval = evaluator(vec![sphere(1.0, Vec3::ZERO, CombineKind::Union)]);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = eval
            .ray_march(&ray, &RayMarchConfig::default())
            .expect("ray should hit");

        assert!((hit.point - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-3);
        assert!((hit.normal - Vec3::Z).length() < 1e-2);
        approx_eq(hit.distance, 4.0, 1e-3);
        assert!(hit.steps >= 1);
    }

    #[test]
    fn ray_march_misses_when_pointing_away() {
        let eval = evaluator(vec![sphere(1.0, Vec3::ZERO, CombineKind::Union)]);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        assert!(eval.ray_march(&ray, &RayMarchConfig::default()).is_none());

        let short = RayMarchConfig::new(2.0);
        let toward = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(eval.ray_march(&toward, &short).is_none());
    }

    #[test]
    fn fold_order_changes_the_result() {
        let big = sphere(1.0, Vec3::ZERO, CombineKind::Union);
        let cutter = sphere(0.5, Vec3::ZERO, CombineKind::Subtract);

        let carved = evaluator(vec![big, cutter]);
        let uncarved = evaluator(vec![cutter, big]);

        // The subtraction only carves what came before it.
        approx_eq(carved.map(Vec3::ZERO), 0.5, 1e-5);
        approx_eq(uncarved.map(Vec3::ZERO), -1.0, 1e-5);
    }

    #[test]
    fn intersection_keeps_the_overlap() {
        let a = sphere(1.0, Vec3::new(-0.5, 0.0, 0.0), CombineKind::Union);
        let b = sphere(1.0, Vec3::new(0.5, 0.0, 0.0), CombineKind::Intersect);
        let eval = evaluator(vec![a, b]);

        assert!(eval.map(Vec3::ZERO) < 0.0);
        assert!(eval.map(Vec3::new(-1.2, 0.0, 0.0)) > 0.0);
        assert!(eval.map(Vec3::new(1.2, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn operations_warp_only_later_nodes() {
        let probe = Vec3::new(2.5, 0.0, 0.0);

        let warped = evaluator(vec![
            elongate(Vec3::new(2.0, 0.0, 0.0)),
            sphere(1.0, Vec3::ZERO, CombineKind::Union),
        ]);
        approx_eq(warped.map(probe), -0.5, 1e-5);

        let unaffected = evaluator(vec![
            sphere(1.0, Vec3::ZERO, CombineKind::Union),
            elongate(Vec3::new(2.0, 0.0, 0.0)),
        ]);
        approx_eq(unaffected.map(probe), 1.5, 1e-5);
    }

    #[test]
    fn gradient_tap_distance_is_floored() {
        let eval = evaluator(vec![sphere(1.0, Vec3::ZERO, CombineKind::Union)]);
        let p = Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(
            eval.map_gradient(p, Some(0.0)),
            eval.map_gradient(p, Some(MIN_NORMAL_SMOOTHING_CPU))
        );
        assert!((eval.map_normal_with(p, 0.1) - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn nearest_point_lands_on_sphere() {
        let eval = evaluator(vec![sphere(1.0, Vec3::ZERO, CombineKind::Union)]);
        let projection = eval.project_to_surface(Vec3::new(3.0, 0.0, 0.0));
        assert!((projection.point - Vec3::X).length() < 1e-3);
        approx_eq(projection.signed_distance, 2.0, 1e-5);
        assert!((projection.direction - Vec3::NEG_X).length() < 1e-3);
    }

    #[test]
    fn overlap_queries() {
        let eval = evaluator(vec![sphere(1.0, Vec3::ZERO, CombineKind::Union)]);

        assert!(eval.overlap_sphere(Vec3::new(3.0, 0.0, 0.0), 2.5));
        assert!(!eval.overlap_sphere(Vec3::new(3.0, 0.0, 0.0), 1.5));

        assert!(eval.overlap_box(Vec3::new(1.5, 0.0, 0.0), Vec3::splat(0.6)));
        assert!(!eval.overlap_box(Vec3::new(5.0, 0.0, 0.0), Vec3::splat(0.5)));
    }

    #[test]
    fn mesh_nodes_sample_their_pool_region() {
        let baked = BakedMeshField::bake(17, Vec3::splat(-2.0), Vec3::splat(2.0), |p| {
            sdf_sphere(p, 1.0)
        })
        .unwrap();

        // Pad the front of the pooled buffer so the node has to honour its offset.
        let mut pooled = vec![100.0; 8];
        pooled.extend_from_slice(baked.samples());

        let node = FieldNode::Mesh {
            slot: MeshSlot {
                asset: MeshAssetId(1),
                size: baked.size(),
                sample_start: Some(8),
                uv_start: None,
                min_bounds: baked.min_bounds(),
                max_bounds: baked.max_bounds(),
            },
            blend: Blend::default(),
            transform: Mat4::IDENTITY,
        };

        let mut eval = evaluator(vec![node]);
        eval.set_mesh_data(pooled, Vec::<f32>::new());
        approx_eq(eval.map(Vec3::new(1.5, 0.0, 0.0)), 0.5, 0.05);
    }

    #[test]
    fn unresolved_mesh_is_skipped() {
        let node = FieldNode::Mesh {
            slot: MeshSlot::unresolved(MeshAssetId(9)),
            blend: Blend::default(),
            transform: Mat4::IDENTITY,
        };
        let eval = evaluator(vec![node, sphere(1.0, Vec3::ZERO, CombineKind::Union)]);
        approx_eq(eval.map(Vec3::new(2.0, 0.0, 0.0)), 1.0, 1e-5);
    }
}
