//! Signed distance field evaluation.
//!
//! This module holds everything needed to answer point queries against a scene snapshot:
//! analytic primitives, smooth combinators and space warps, baked mesh volumes, the exported
//! node and material records, and the [`FieldEvaluator`] that folds them together.
pub mod baked;
pub mod combine;
pub mod evaluator;
pub mod material;
pub mod node;
pub mod primitives;
pub mod ray;

pub use baked::{BakedMeshField, MeshVolume};
pub use combine::CombineKind;
pub use evaluator::{FieldEvaluator, SurfaceProjection};
pub use material::{Material, MaterialData, MaterialKind};
pub use node::{Blend, FieldNode, MeshSlot, OperationKind, PrimitiveKind, MIN_SMOOTHING};
pub use ray::{Ray, RayHit, RayMarchConfig};
