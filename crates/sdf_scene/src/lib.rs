#![forbid(unsafe_code)]
//! sdf_scene: signed distance field scenes with CPU-side evaluation.
//!
//! Modules:
//! - field: primitives, smooth combinators, space warps, baked mesh volumes and the evaluator
//!   (distance, gradient, ray marching, overlap and nearest-surface queries)
//! - scene: authoring nodes, the shared mesh pool, consumers and the scene registry
//!
//! For runnable demos, see the `sdf_scene_examples` crate.
pub mod error;
pub mod field;
pub mod scene;

/// Convenient re-exports for common types. Import with `use sdf_scene::prelude::*;`.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::field::{
        BakedMeshField, Blend, CombineKind, FieldEvaluator, FieldNode, Material, MaterialData,
        MaterialKind, MeshSlot, MeshVolume, OperationKind, PrimitiveKind, Ray, RayHit,
        RayMarchConfig, SurfaceProjection, MIN_SMOOTHING,
    };
    pub use crate::scene::{
        BufferHandle, ConsumerCall, DataBuffer, MeshAssetId, NodeKind, NodeRef,
        RecordingConsumer, SceneConsumer, SceneNode, SceneRegistry, Settings, SettingsData,
        SharedMeshPool, TickReport,
    };
}
