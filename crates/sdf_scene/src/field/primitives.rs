//! Analytic distance functions for the primitive shapes a scene can hold.
//!
//! All functions take the query point in the primitive's local space. Callers are expected to
//! transform world positions first (see [`crate::field::node::FieldNode::local_point`]).
use glam::{Mat4, Vec2, Vec3, Vec3Swizzles};

/// Sphere of radius `radius` centered at the origin.
#[inline]
pub fn sdf_sphere(p: Vec3, radius: f32) -> f32 {
    p.length() - radius
}

/// Torus lying in the XZ plane. `radii.x` is the ring radius, `radii.y` the tube radius.
#[inline]
pub fn sdf_torus(p: Vec3, radii: Vec2) -> f32 {
    let q = Vec2::new(p.xz().length() - radii.x, p.y);
    q.length() - radii.y
}

/// Exact box with the given half extents.
#[inline]
pub fn sdf_box(p: Vec3, half_extents: Vec3) -> f32 {
    let q = p.abs() - half_extents;
    q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
}

/// Box whose edges are rounded by `radius`. The rounding grows the box outward.
#[inline]
pub fn sdf_rounded_box(p: Vec3, half_extents: Vec3, radius: f32) -> f32 {
    sdf_box(p, half_extents) - radius
}

/// Wireframe box: only the twelve edges, each `edge` thick.
#[inline]
pub fn sdf_box_frame(p: Vec3, half_extents: Vec3, edge: f32) -> f32 {
    let p = p.abs() - half_extents;
    let q = (p + edge).abs() - edge;

    let x_edges =
        Vec3::new(p.x, q.y, q.z).max(Vec3::ZERO).length() + p.x.max(q.y.max(q.z)).min(0.0);
    let y_edges =
        Vec3::new(q.x, p.y, q.z).max(Vec3::ZERO).length() + q.x.max(p.y.max(q.z)).min(0.0);
    let z_edges =
        Vec3::new(q.x, q.y, p.z).max(Vec3::ZERO).length() + q.x.max(q.y.max(p.z)).min(0.0);

    x_edges.min(y_edges).min(z_edges)
}

/// Capped cylinder around the Y axis.
#[inline]
pub fn sdf_cylinder(p: Vec3, radius: f32, half_height: f32) -> f32 {
    let d = Vec2::new(p.xz().length(), p.y).abs() - Vec2::new(radius, half_height);
    d.x.max(d.y).min(0.0) + d.max(Vec2::ZERO).length()
}

/// Box distance for a point given in world space, with `world_to_local` mapping it into the
/// box's frame.
pub fn sdf_box_transformed(p: Vec3, half_extents: Vec3, world_to_local: Mat4) -> f32 {
    sdf_box(world_to_local.transform_point3(p), half_extents)
}

/// Gradient of [`sdf_box`]. Outside the box this is the normalized direction away from the
/// nearest feature; inside it is the axis of the nearest face.
pub fn box_gradient(p: Vec3, half_extents: Vec3) -> Vec3 {
    let d = p.abs() - half_extents;
    let s = Vec3::select(p.cmple(Vec3::ZERO), Vec3::NEG_ONE, Vec3::ONE);

    let dir = if d.max_element() > 0.0 {
        d.max(Vec3::ZERO).normalize_or_zero()
    } else {
        let ge_yzx = Vec3::select(d.cmpge(d.yzx()), Vec3::ONE, Vec3::ZERO);
        let ge_zxy = Vec3::select(d.cmpge(d.zxy()), Vec3::ONE, Vec3::ZERO);
        ge_yzx * ge_zxy
    };

    s * dir
}

/// Closest point on the surface of a box centered at the origin.
pub fn nearest_point_on_box(p: Vec3, half_extents: Vec3) -> Vec3 {
    p + box_gradient(p, half_extents).normalize_or_zero() * -sdf_box(p, half_extents)
}

/// Closest point on the surface of a transformed box, returned in world space.
pub fn nearest_point_on_box_transformed(p: Vec3, half_extents: Vec3, world_to_local: Mat4) -> Vec3 {
    let local = nearest_point_on_box(world_to_local.transform_point3(p), half_extents);
    world_to_local.inverse().transform_point3(local)
}

/// Whether `p` lies strictly inside the box.
pub fn is_in_box(p: Vec3, half_extents: Vec3) -> bool {
    sdf_box(p, half_extents) < 0.0
}

/// Whether the world-space point `p` lies strictly inside a transformed box.
pub fn is_in_box_transformed(p: Vec3, half_extents: Vec3, world_to_local: Mat4) -> bool {
    sdf_box_transformed(p, half_extents, world_to_local) < 0.0
}
