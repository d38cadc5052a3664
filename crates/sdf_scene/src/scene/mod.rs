//! Scene synchronization: authoring nodes, the shared mesh pool, consumers and the registry that
//! keeps exported snapshots consistent with all of them.
pub mod consumer;
pub mod object;
pub mod pool;
pub mod registry;
pub mod settings;

pub use consumer::{BufferHandle, ConsumerCall, DataBuffer, RecordingConsumer, SceneConsumer};
pub use object::{NodeKind, NodeRef, SceneNode, WeakNodeRef};
pub use pool::{MeshAssetId, PoolRebuild, SharedMeshPool};
pub use registry::{DataRebuild, SceneRegistry, TickReport};
pub use settings::{Settings, SettingsData, MIN_GROUP_SMOOTHING};
