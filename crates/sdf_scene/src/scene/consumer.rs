//! Downstream consumers of a scene's exported data.
//!
//! A consumer is anything that mirrors the scene elsewhere: a GPU uploader, a mesh extractor, a
//! debug view. The registry tells it when a new data buffer exists (only when the element count
//! changes or an update is forced), when settings change, when the shared mesh buffers were
//! rebuilt, and when it should run.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use crate::field::material::MaterialData;
use crate::field::node::FieldNode;
use crate::scene::settings::SettingsData;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one allocated [`DataBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Exported node and material records, shared with consumers.
///
/// A new buffer (with a new handle) is allocated only when the element count changes. Otherwise
/// the registry refreshes the contents in place, so a consumer holding on to the buffer always
/// sees the latest snapshot.
#[derive(Clone, Debug)]
pub struct DataBuffer {
    handle: BufferHandle,
    nodes: Arc<RwLock<Vec<FieldNode>>>,
    materials: Arc<RwLock<Vec<MaterialData>>>,
}

impl DataBuffer {
    pub fn new() -> Self {
        Self {
            handle: BufferHandle(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed)),
            nodes: Arc::default(),
            materials: Arc::default(),
        }
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nodes(&self) -> RwLockReadGuard<'_, Vec<FieldNode>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn materials(&self) -> RwLockReadGuard<'_, Vec<MaterialData>> {
        self.materials.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self, nodes: &[FieldNode], materials: &[MaterialData]) {
        let mut guard = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
        guard.extend_from_slice(nodes);
        drop(guard);

        let mut guard = self.materials.write().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
        guard.extend_from_slice(materials);
    }
}

impl Default for DataBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives a scene's exported data.
pub trait SceneConsumer {
    /// A new data buffer was allocated, or an update was forced.
    fn update_data_buffer(&mut self, buffer: &DataBuffer, count: usize);

    fn update_settings_buffer(&mut self, settings: &SettingsData);

    /// The shared mesh buffers were rebuilt, or an update was forced.
    fn update_mesh_buffers(&mut self, _samples: &Arc<[f32]>, _packed_uvs: &Arc<[f32]>) {}

    /// The scene changed and is not empty.
    fn run(&mut self);

    fn on_empty(&mut self);

    fn on_not_empty(&mut self);
}

/// A no-op consumer.
impl SceneConsumer for () {
    #[inline]
    fn update_data_buffer(&mut self, _buffer: &DataBuffer, _count: usize) {}

    #[inline]
    fn update_settings_buffer(&mut self, _settings: &SettingsData) {}

    #[inline]
    fn run(&mut self) {}

    #[inline]
    fn on_empty(&mut self) {}

    #[inline]
    fn on_not_empty(&mut self) {}
}

/// One call received by a [`RecordingConsumer`].
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum ConsumerCall {
    DataBuffer { handle: BufferHandle, count: usize },
    Settings(SettingsData),
    MeshBuffers { samples: usize, packed_uvs: usize },
    Run,
    Empty,
    NotEmpty,
}

/// Records every call. Clones share the same log, so a test can keep one clone and hand the
/// other to a registry.
#[derive(Clone, Debug, Default)]
pub struct RecordingConsumer {
    log: Arc<Mutex<Vec<ConsumerCall>>>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: ConsumerCall) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    pub fn calls(&self) -> Vec<ConsumerCall> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns and clears the recorded calls.
    pub fn take(&self) -> Vec<ConsumerCall> {
        std::mem::take(&mut *self.log.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn clear(&self) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles of every data buffer announced so far, in order.
    pub fn buffer_handles(&self) -> Vec<BufferHandle> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ConsumerCall::DataBuffer { handle, .. } => Some(handle),
                _ => None,
            })
            .collect()
    }
}

impl SceneConsumer for RecordingConsumer {
    fn update_data_buffer(&mut self, buffer: &DataBuffer, count: usize) {
        self.push(ConsumerCall::DataBuffer {
            handle: buffer.handle(),
            count,
        });
    }

    fn update_settings_buffer(&mut self, settings: &SettingsData) {
        self.push(ConsumerCall::Settings(*settings));
    }

    fn update_mesh_buffers(&mut self, samples: &Arc<[f32]>, packed_uvs: &Arc<[f32]>) {
        self.push(ConsumerCall::MeshBuffers {
            samples: samples.len(),
            packed_uvs: packed_uvs.len(),
        });
    }

    fn run(&mut self) {
        self.push(ConsumerCall::Run);
    }

    fn on_empty(&mut self) {
        self.push(ConsumerCall::Empty);
    }

    fn on_not_empty(&mut self) {
        self.push(ConsumerCall::NotEmpty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_get_distinct_handles() {
        let a = DataBuffer::new();
        let b = DataBuffer::new();
        assert_ne!(a.handle(), b.handle());
        assert!(a.is_empty());
    }

    #[test]
    fn writes_are_visible_through_clones() {
        let buffer = DataBuffer::new();
        let view = buffer.clone();
        buffer.write(&[], &[MaterialData::default(), MaterialData::default()]);
        assert_eq!(view.materials().len(), 2);
        assert_eq!(view.handle(), buffer.handle());
    }

    #[test]
    fn recording_consumer_shares_its_log() {
        let recorder = RecordingConsumer::new();
        let mut handed_out = recorder.clone();
        handed_out.on_not_empty();
        handed_out.run();
        handed_out.update_settings_buffer(&SettingsData::default());

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.calls()[0], ConsumerCall::NotEmpty);
        let taken = recorder.take();
        assert_eq!(taken.len(), 3);
        assert!(recorder.is_empty());
    }

    #[test]
    fn unit_consumer_accepts_everything() {
        let mut consumer = ();
        consumer.on_empty();
        consumer.update_data_buffer(&DataBuffer::new(), 0);
        consumer.update_mesh_buffers(&Arc::from(Vec::new()), &Arc::from(Vec::new()));
        consumer.run();
    }
}
