//! Exported node records consumed by the evaluator.
//!
//! A [`FieldNode`] is a flat snapshot of one scene node: its kind, parameters, world→local
//! transform and, for shapes, how it blends with everything before it. The scene registry
//! produces them on rebuild; the evaluator folds them in order.
use std::fmt;

use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::field::baked::{grid_len, MeshVolume};
use crate::field::combine::{elongate, CombineKind};
use crate::field::primitives::{
    sdf_box_frame, sdf_cylinder, sdf_rounded_box, sdf_sphere, sdf_torus,
};
use crate::scene::pool::MeshAssetId;

/// Smallest smoothing a node may carry. The combinators divide by it.
pub const MIN_SMOOTHING: f32 = 1e-9;

/// Analytic shape kinds.
///
/// Parameter layout in `params`:
/// - `Sphere`: `x` radius.
/// - `Torus`: `x` ring radius, `y` tube radius.
/// - `Cuboid`: `xyz` half extents, `w` rounding radius.
/// - `BoxFrame`: `xyz` half extents, `w` edge thickness.
/// - `Cylinder`: `x` radius, `y` half height.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    #[default]
    Sphere,
    Torus,
    Cuboid,
    BoxFrame,
    Cylinder,
}

impl PrimitiveKind {
    /// Distance from the local point `p` to this shape.
    #[inline]
    pub fn sdf(self, p: Vec3, params: Vec4) -> f32 {
        match self {
            PrimitiveKind::Sphere => sdf_sphere(p, params.x),
            PrimitiveKind::Torus => sdf_torus(p, Vec2::new(params.x, params.y)),
            PrimitiveKind::Cuboid => sdf_rounded_box(p, params.xyz(), params.w),
            PrimitiveKind::BoxFrame => sdf_box_frame(p, params.xyz(), params.w),
            PrimitiveKind::Cylinder => sdf_cylinder(p, params.x, params.y),
        }
    }
}

/// Space warp kinds. Only `Elongate` changes the point; the others are accepted and pass it
/// through.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OperationKind {
    #[default]
    Elongate,
    Round,
    Onion,
}

impl OperationKind {
    pub fn warps_space(self) -> bool {
        matches!(self, OperationKind::Elongate)
    }
}

/// How a shape joins the field accumulated before it.
///
/// Deserialized values go through [`Blend::new`], so loaded smoothing is clamped too.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "BlendRepr"))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blend {
    pub combine: CombineKind,
    /// Negates the shape's distance, turning it inside out.
    pub flip: bool,
    smoothing: f32,
}

impl Default for Blend {
    fn default() -> Self {
        Self {
            combine: CombineKind::Union,
            flip: false,
            smoothing: MIN_SMOOTHING,
        }
    }
}

impl Blend {
    pub fn new(combine: CombineKind, flip: bool, smoothing: f32) -> Self {
        Self {
            combine,
            flip,
            smoothing: clamp_smoothing(smoothing),
        }
    }

    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.set_smoothing(smoothing);
        self
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = clamp_smoothing(smoothing);
    }

    #[inline]
    pub fn flip_sign(&self) -> f32 {
        if self.flip {
            -1.0
        } else {
            1.0
        }
    }
}

/// Wire form of [`Blend`] before clamping.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct BlendRepr {
    combine: CombineKind,
    flip: bool,
    smoothing: f32,
}

#[cfg(feature = "serde")]
impl From<BlendRepr> for Blend {
    fn from(repr: BlendRepr) -> Self {
        Blend::new(repr.combine, repr.flip, repr.smoothing)
    }
}

fn clamp_smoothing(smoothing: f32) -> f32 {
    if smoothing.is_nan() {
        MIN_SMOOTHING
    } else {
        smoothing.max(MIN_SMOOTHING)
    }
}

/// Where a mesh node's samples live in the shared pool buffers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshSlot {
    pub asset: MeshAssetId,
    pub size: usize,
    /// `None` until the pool holds a bake for the asset.
    pub sample_start: Option<usize>,
    pub uv_start: Option<usize>,
    pub min_bounds: Vec3,
    pub max_bounds: Vec3,
}

impl MeshSlot {
    /// An unresolved slot. Contributes nothing to the field.
    pub fn unresolved(asset: MeshAssetId) -> Self {
        Self {
            asset,
            size: 0,
            sample_start: None,
            uv_start: None,
            min_bounds: Vec3::ZERO,
            max_bounds: Vec3::ZERO,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.sample_start.is_some()
    }

    /// View over this slot's region of the pooled sample buffer.
    pub fn volume<'a>(&self, samples: &'a [f32]) -> Option<MeshVolume<'a>> {
        let start = self.sample_start?;
        let len = grid_len(self.size)?;
        let region = samples.get(start..start.checked_add(len)?)?;
        MeshVolume::new(self.size, self.min_bounds, self.max_bounds, region)
    }
}

/// One exported node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldNode {
    Primitive {
        kind: PrimitiveKind,
        params: Vec4,
        blend: Blend,
        transform: Mat4,
    },
    /// Warps the query point for every node after it.
    Operation {
        kind: OperationKind,
        params: Vec4,
        transform: Mat4,
    },
    Mesh {
        slot: MeshSlot,
        blend: Blend,
        transform: Mat4,
    },
}

impl FieldNode {
    /// World→local transform.
    pub fn transform(&self) -> Mat4 {
        match self {
            FieldNode::Primitive { transform, .. }
            | FieldNode::Operation { transform, .. }
            | FieldNode::Mesh { transform, .. } => *transform,
        }
    }

    pub fn blend(&self) -> Option<Blend> {
        match self {
            FieldNode::Primitive { blend, .. } | FieldNode::Mesh { blend, .. } => Some(*blend),
            FieldNode::Operation { .. } => None,
        }
    }

    pub fn combine(&self) -> Option<CombineKind> {
        self.blend().map(|b| b.combine)
    }

    pub fn smoothing(&self) -> Option<f32> {
        self.blend().map(|b| b.smoothing())
    }

    pub fn is_operation(&self) -> bool {
        matches!(self, FieldNode::Operation { .. })
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self, FieldNode::Mesh { .. })
    }

    /// Maps a world-space point into this node's local space.
    #[inline]
    pub fn local_point(&self, p: Vec3) -> Vec3 {
        self.transform().transform_point3(p)
    }

    /// Applies this node's space warp. Shapes return `p` unchanged.
    #[inline]
    pub fn warp(&self, p: Vec3) -> Vec3 {
        match self {
            FieldNode::Operation {
                kind: OperationKind::Elongate,
                params,
                transform,
            } => elongate(p, params.xyz(), *transform),
            _ => p,
        }
    }

    /// Signed distance from the world-space point `p`, with `flip` applied.
    ///
    /// Returns `None` for operations and for mesh nodes whose samples are not in `samples`.
    pub fn sdf(&self, p: Vec3, samples: &[f32]) -> Option<f32> {
        match self {
            FieldNode::Primitive {
                kind,
                params,
                blend,
                transform,
            } => Some(kind.sdf(transform.transform_point3(p), *params) * blend.flip_sign()),
            FieldNode::Mesh {
                slot,
                blend,
                transform,
            } => {
                let volume = slot.volume(samples)?;
                let d = volume.signed_distance(transform.transform_point3(p));
                Some(d * blend.flip_sign())
            }
            FieldNode::Operation { .. } => None,
        }
    }
}

impl fmt::Display for FieldNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldNode::Primitive {
                kind,
                params,
                blend,
                ..
            } => write!(
                f,
                "[{kind:?}] params = {params}, combine = {:?}, flip = {}, smoothing = {}",
                blend.combine,
                blend.flip,
                blend.smoothing()
            ),
            FieldNode::Operation { kind, params, .. } => {
                write!(f, "[{kind:?}] params = {params}")
            }
            FieldNode::Mesh { slot, blend, .. } => {
                write!(
                    f,
                    "[Mesh {}] size = {}, bounds = {}..{}, ",
                    slot.asset, slot.size, slot.min_bounds, slot.max_bounds
                )?;
                match (slot.sample_start, slot.uv_start) {
                    (Some(s), Some(u)) => write!(f, "sample start = {s}, uv start = {u}")?,
                    (Some(s), None) => write!(f, "sample start = {s}, no uvs")?,
                    _ => write!(f, "unresolved")?,
                }
                write!(
                    f,
                    ", combine = {:?}, flip = {}, smoothing = {}",
                    blend.combine,
                    blend.flip,
                    blend.smoothing()
                )
            }
        }
    }
}
