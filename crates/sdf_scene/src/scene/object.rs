//! Authoring-side scene nodes and shared handles to them.
//!
//! A [`SceneNode`] is what hosts mutate. Every setter marks the node dirty so the owning
//! [`SceneRegistry`](crate::scene::registry::SceneRegistry) picks the change up on its next
//! tick. Nodes are shared through [`NodeRef`]; registries only keep weak handles, so dropping
//! the last `NodeRef` removes the node from every scene on the following scan.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::field::combine::CombineKind;
use crate::field::material::Material;
use crate::field::node::{Blend, FieldNode, MeshSlot, OperationKind, PrimitiveKind};
use crate::scene::pool::MeshAssetId;

/// What a node is.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    /// Analytic shape; `params` layout per [`PrimitiveKind`].
    Primitive {
        kind: PrimitiveKind,
        params: Vec4,
        blend: Blend,
    },
    /// Space warp applied to every node after it.
    Operation {
        kind: OperationKind,
        params: Vec4,
    },
    /// Baked mesh field looked up in the shared pool.
    Mesh {
        asset: MeshAssetId,
        blend: Blend,
    },
}

/// One authored node: its kind, placement, fold order and material.
#[derive(Clone, Debug)]
pub struct SceneNode {
    kind: NodeKind,
    world_to_local: Mat4,
    order: i32,
    material: Material,
    is_dirty: bool,
    is_order_dirty: bool,
}

impl SceneNode {
    /// Creates a node at the origin with order 0, the default material, and both dirty flags
    /// set.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            world_to_local: Mat4::IDENTITY,
            order: 0,
            material: Material::default(),
            is_dirty: true,
            is_order_dirty: true,
        }
    }

    /// Creates a primitive with hard-union blending.
    pub fn primitive(kind: PrimitiveKind, params: Vec4) -> Self {
        Self::new(NodeKind::Primitive {
            kind,
            params,
            blend: Blend::default(),
        })
    }

    /// Creates a sphere of `radius`.
    pub fn sphere(radius: f32) -> Self {
        Self::primitive(PrimitiveKind::Sphere, Vec4::new(radius, 0.0, 0.0, 0.0))
    }

    /// Creates a torus; `radii` is (ring radius, tube radius).
    pub fn torus(radii: Vec2) -> Self {
        Self::primitive(PrimitiveKind::Torus, Vec4::new(radii.x, radii.y, 0.0, 0.0))
    }

    /// Creates a box with the given half extents and edge rounding.
    pub fn cuboid(half_extents: Vec3, rounding: f32) -> Self {
        Self::primitive(PrimitiveKind::Cuboid, half_extents.extend(rounding))
    }

    /// Creates a box frame with the given half extents and edge thickness.
    pub fn box_frame(half_extents: Vec3, edge: f32) -> Self {
        Self::primitive(PrimitiveKind::BoxFrame, half_extents.extend(edge))
    }

    /// Creates a capped vertical cylinder.
    pub fn cylinder(radius: f32, half_height: f32) -> Self {
        Self::primitive(
            PrimitiveKind::Cylinder,
            Vec4::new(radius, half_height, 0.0, 0.0),
        )
    }

    /// Creates an operation node.
    pub fn operation(kind: OperationKind, params: Vec4) -> Self {
        Self::new(NodeKind::Operation { kind, params })
    }

    /// Creates an elongate warp stretching later nodes by `extents` per axis.
    pub fn elongate(extents: Vec3) -> Self {
        Self::operation(OperationKind::Elongate, extents.extend(0.0))
    }

    /// Creates a node drawing the baked field of `asset`.
    pub fn mesh(asset: MeshAssetId) -> Self {
        Self::new(NodeKind::Mesh {
            asset,
            blend: Blend::default(),
        })
    }

    /// Places the node in the world. The inverse is stored.
    pub fn with_local_to_world(mut self, local_to_world: Mat4) -> Self {
        self.set_local_to_world(local_to_world);
        self
    }

    /// Places the node at `translation` with no rotation or scale.
    pub fn with_translation(self, translation: Vec3) -> Self {
        self.with_local_to_world(Mat4::from_translation(translation))
    }

    /// Sets the fold order.
    pub fn with_order(mut self, order: i32) -> Self {
        self.set_order(order);
        self
    }

    /// Sets the material.
    pub fn with_material(mut self, material: Material) -> Self {
        self.set_material(material);
        self
    }

    /// Sets the combine kind and smoothing. No-op on operations.
    pub fn with_blend(mut self, combine: CombineKind, smoothing: f32) -> Self {
        self.set_combine(combine);
        self.set_smoothing(smoothing);
        self
    }

    /// Sets whether the shape is turned inside out. No-op on operations.
    pub fn with_flip(mut self, flip: bool) -> Self {
        self.set_flip(flip);
        self
    }

    /// What the node is.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Transform from world to node-local space.
    pub fn world_to_local(&self) -> Mat4 {
        self.world_to_local
    }

    /// Position in the fold; lower folds first.
    pub fn order(&self) -> i32 {
        self.order
    }

    /// The node's material.
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Blend of a shape node, `None` for operations.
    pub fn blend(&self) -> Option<&Blend> {
        match &self.kind {
            NodeKind::Primitive { blend, .. } | NodeKind::Mesh { blend, .. } => Some(blend),
            NodeKind::Operation { .. } => None,
        }
    }

    /// Asset referenced by a mesh node.
    pub fn mesh_asset(&self) -> Option<MeshAssetId> {
        match self.kind {
            NodeKind::Mesh { asset, .. } => Some(asset),
            _ => None,
        }
    }

    /// Whether the node changed since the last export.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Whether the order changed since the last sort.
    pub fn is_order_dirty(&self) -> bool {
        self.is_order_dirty
    }

    /// Sets the world→local transform.
    pub fn set_world_to_local(&mut self, world_to_local: Mat4) {
        self.world_to_local = world_to_local;
        self.is_dirty = true;
    }

    /// Sets the placement; the inverse is stored.
    pub fn set_local_to_world(&mut self, local_to_world: Mat4) {
        self.set_world_to_local(local_to_world.inverse());
    }

    /// Moves the node in the fold order.
    pub fn set_order(&mut self, order: i32) {
        if self.order != order {
            self.order = order;
            self.is_order_dirty = true;
        }
    }

    /// Sets the material.
    pub fn set_material(&mut self, material: Material) {
        self.material = material;
        self.is_dirty = true;
    }

    /// No-op on operations.
    pub fn set_combine(&mut self, combine: CombineKind) {
        if let Some(blend) = self.blend_mut() {
            blend.combine = combine;
            self.is_dirty = true;
        }
    }

    /// No-op on operations. Clamped to [`crate::field::node::MIN_SMOOTHING`].
    pub fn set_smoothing(&mut self, smoothing: f32) {
        if let Some(blend) = self.blend_mut() {
            blend.set_smoothing(smoothing);
            self.is_dirty = true;
        }
    }

    /// No-op on operations.
    pub fn set_flip(&mut self, flip: bool) {
        if let Some(blend) = self.blend_mut() {
            blend.flip = flip;
            self.is_dirty = true;
        }
    }

    /// Replaces the parameters of a primitive or operation. No-op on meshes.
    pub fn set_params(&mut self, new_params: Vec4) {
        match &mut self.kind {
            NodeKind::Primitive { params, .. } | NodeKind::Operation { params, .. } => {
                *params = new_params;
                self.is_dirty = true;
            }
            NodeKind::Mesh { .. } => {}
        }
    }

    /// Sets the radius if this node is a sphere.
    pub fn set_sphere_radius(&mut self, radius: f32) {
        if let NodeKind::Primitive {
            kind: PrimitiveKind::Sphere,
            params,
            ..
        } = &mut self.kind
        {
            params.x = radius;
            self.is_dirty = true;
        }
    }

    /// Sets the half extents if this node is a cuboid. The rounding radius is kept.
    pub fn set_cube_bounds(&mut self, half_extents: Vec3) {
        if let NodeKind::Primitive {
            kind: PrimitiveKind::Cuboid,
            params,
            ..
        } = &mut self.kind
        {
            *params = half_extents.extend(params.w);
            self.is_dirty = true;
        }
    }

    /// Forces a re-sort and re-export on the next tick.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
        self.is_order_dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.is_dirty = false;
    }

    pub(crate) fn clear_order_dirty(&mut self) {
        self.is_order_dirty = false;
    }

    fn blend_mut(&mut self) -> Option<&mut Blend> {
        match &mut self.kind {
            NodeKind::Primitive { blend, .. } | NodeKind::Mesh { blend, .. } => Some(blend),
            NodeKind::Operation { .. } => None,
        }
    }

    /// Builds the exported record. `slot` is only consulted for mesh nodes.
    pub fn to_field_node(&self, slot: impl FnOnce(MeshAssetId) -> MeshSlot) -> FieldNode {
        let transform = self.world_to_local;
        match self.kind {
            NodeKind::Primitive {
                kind,
                params,
                blend,
            } => FieldNode::Primitive {
                kind,
                params,
                blend,
                transform,
            },
            NodeKind::Operation { kind, params } => {
                let params = match kind {
                    OperationKind::Elongate => params.xyz().max(Vec3::ZERO).extend(params.w),
                    _ => params,
                };
                FieldNode::Operation {
                    kind,
                    params,
                    transform,
                }
            }
            NodeKind::Mesh { asset, blend } => FieldNode::Mesh {
                slot: slot(asset),
                blend,
                transform,
            },
        }
    }
}

/// Shared handle to a scene node.
#[derive(Clone, Debug)]
pub struct NodeRef(Arc<Mutex<SceneNode>>);

impl NodeRef {
    /// Wraps `node` in a new shared handle.
    pub fn new(node: SceneNode) -> Self {
        Self(Arc::new(Mutex::new(node)))
    }

    /// Locks the node. A poisoned lock is recovered; nodes hold no invariants a panic can break.
    pub fn lock(&self) -> MutexGuard<'_, SceneNode> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Creates a weak handle that does not keep the node alive.
    pub fn downgrade(&self) -> WeakNodeRef {
        WeakNodeRef(Arc::downgrade(&self.0))
    }
}

impl From<SceneNode> for NodeRef {
    fn from(node: SceneNode) -> Self {
        Self::new(node)
    }
}

/// Non-owning handle kept by registries.
#[derive(Clone, Debug)]
pub struct WeakNodeRef(Weak<Mutex<SceneNode>>);

impl WeakNodeRef {
    /// Returns the node if it is still alive.
    pub fn upgrade(&self) -> Option<NodeRef> {
        self.0.upgrade().map(NodeRef)
    }

    /// Whether some [`NodeRef`] still holds the node.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Whether this handle refers to `node`.
    pub fn points_to(&self, node: &NodeRef) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&node.0))
    }
}
