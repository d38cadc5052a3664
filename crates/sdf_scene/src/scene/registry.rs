//! The scene registry: ordered nodes, dirty tracking and exported snapshots.
//!
//! A [`SceneRegistry`] keeps weak handles to its nodes in fold order. Hosts mutate nodes
//! freely; once per frame they call [`SceneRegistry::tick`], which folds the nodes' dirty flags
//! together and does only the work those flags call for:
//!
//! 1. prune nodes whose last [`NodeRef`] was dropped, releasing their pool references;
//! 2. re-sort by order if any node moved;
//! 3. re-export node and material records if anything changed, including the shared mesh pool
//!    having been rebuilt since the last export (offsets may have moved);
//! 4. run consumers if anything was re-exported and the scene is not empty.
//!
//! Consumers are handed a new [`DataBuffer`] only when the element count changes; otherwise the
//! current buffer is refreshed in place.
//!
//! Queries ([`SceneRegistry::distance`], [`SceneRegistry::raycast`], ...) answer against the last
//! export and fail with [`Error::NotReady`] while a registration or update is pending.
use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::field::evaluator::{FieldEvaluator, SurfaceProjection};
use crate::field::material::MaterialData;
use crate::field::node::{FieldNode, MeshSlot};
use crate::field::ray::{Ray, RayHit, RayMarchConfig};
use crate::scene::consumer::{DataBuffer, SceneConsumer};
use crate::scene::object::{NodeKind, NodeRef, SceneNode, WeakNodeRef};
use crate::scene::pool::{MeshAssetId, SharedMeshPool};
use crate::scene::settings::{Settings, SettingsData};

#[derive(Clone, Debug)]
struct Entry {
    node: WeakNodeRef,
    /// Cached so a dropped node can still release its pool reference.
    asset: Option<MeshAssetId>,
}

/// What one [`SceneRegistry::tick`] did.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// A full update ran because the scene was not ready.
    pub updated: bool,
    /// Dropped nodes removed during the scan.
    pub pruned: usize,
    pub reordered: bool,
    pub rebuilt: bool,
    pub pool_rebuilt: bool,
    /// Consumers were run.
    pub ran: bool,
}

/// What one [`SceneRegistry::rebuild_data`] did.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataRebuild {
    pub count: usize,
    /// A new data buffer was allocated and announced.
    pub new_buffer: bool,
    pub pool_rebuilt: bool,
    /// Mesh nodes whose asset has no bake in the pool yet.
    pub unresolved: usize,
}

pub struct SceneRegistry {
    entries: Vec<Entry>,
    /// Live nodes per mesh asset. The pool is acquired on 0 -> 1 and released on 1 -> 0.
    asset_counts: HashMap<MeshAssetId, usize>,
    consumers: Vec<Box<dyn SceneConsumer + Send>>,
    settings: Settings,
    evaluator: FieldEvaluator,
    node_data: Vec<FieldNode>,
    material_data: Vec<MaterialData>,
    data_buffer: Option<DataBuffer>,
    /// Pool generation whose buffers were last pushed.
    pool_generation: Option<u64>,
    is_running: bool,
    is_enabled: bool,
    is_ready: bool,
    data_dirty: bool,
    order_dirty: bool,
    force_update_next_tick: bool,
}

impl Default for SceneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SceneRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRegistry")
            .field("nodes", &self.entries.len())
            .field("consumers", &self.consumers.len())
            .field("settings", &self.settings)
            .field("is_running", &self.is_running)
            .field("is_enabled", &self.is_enabled)
            .field("is_ready", &self.is_ready)
            .finish()
    }
}

impl SceneRegistry {
    /// Creates an enabled, running, empty registry. It becomes ready on the first tick.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            asset_counts: HashMap::new(),
            consumers: Vec::new(),
            settings: Settings::default(),
            evaluator: FieldEvaluator::new(),
            node_data: Vec::new(),
            material_data: Vec::new(),
            data_buffer: None,
            pool_generation: None,
            is_running: true,
            is_enabled: true,
            is_ready: false,
            data_dirty: true,
            order_dirty: true,
            force_update_next_tick: false,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Adds a consumer. It is brought up to date by the next tick.
    pub fn add_consumer(&mut self, consumer: impl SceneConsumer + Send + 'static) {
        self.consumers.push(Box::new(consumer));
        self.is_ready = false;
    }

    /// Adds `node` at the end of the scene. Does nothing if it is already registered.
    pub fn register(&mut self, node: &NodeRef, pool: &mut SharedMeshPool) -> Result<()> {
        if self.is_registered(node) {
            return Ok(());
        }

        let pruned = self.prune_stale(pool);
        let was_empty = self.is_empty();

        let asset = node.lock().mesh_asset();
        if let Some(asset) = asset {
            let count = self.asset_counts.entry(asset).or_insert(0);
            *count += 1;
            if *count == 1 {
                pool.acquire(asset);
            }
        }

        self.entries.push(Entry {
            node: node.downgrade(),
            asset,
        });
        self.data_dirty = true;
        self.order_dirty = true;
        self.is_ready = false;

        debug!("Registered node; scene now holds {} nodes.", self.entries.len());

        if was_empty {
            for consumer in &mut self.consumers {
                consumer.on_not_empty();
            }
        }

        pruned.map(|_| ())
    }

    /// Removes `node`. Returns whether it was registered.
    pub fn deregister(&mut self, node: &NodeRef, pool: &mut SharedMeshPool) -> Result<bool> {
        let Some(index) = self.entries.iter().position(|e| e.node.points_to(node)) else {
            return Ok(false);
        };

        let was_empty = self.is_empty();
        let entry = self.entries.remove(index);
        let released = match entry.asset {
            Some(asset) => self.release_asset(asset, pool),
            None => Ok(()),
        };
        let pruned = self.prune_stale(pool);

        self.data_dirty = true;
        self.order_dirty = true;
        self.is_ready = false;

        debug!("Deregistered node; scene now holds {} nodes.", self.entries.len());

        if !was_empty && self.is_empty() {
            for consumer in &mut self.consumers {
                consumer.on_empty();
            }
        }

        released?;
        pruned?;
        Ok(true)
    }

    /// Deregisters every node.
    pub fn clear(&mut self, pool: &mut SharedMeshPool) -> Result<()> {
        let was_empty = self.is_empty();
        let mut result = Ok(());
        for entry in std::mem::take(&mut self.entries) {
            if let Some(asset) = entry.asset {
                if let Err(err) = self.release_asset(asset, pool) {
                    result = Err(err);
                }
            }
        }
        self.data_dirty = true;
        self.is_ready = false;
        if !was_empty {
            for consumer in &mut self.consumers {
                consumer.on_empty();
            }
        }
        result
    }

    pub fn is_registered(&self, node: &NodeRef) -> bool {
        self.entries.iter().any(|e| e.node.points_to(node))
    }

    fn release_asset(&mut self, asset: MeshAssetId, pool: &mut SharedMeshPool) -> Result<()> {
        let Some(count) = self.asset_counts.get_mut(&asset) else {
            error!("Scene released mesh asset {} it never acquired.", asset);
            return Err(Error::RefCountUnderflow { asset });
        };
        *count -= 1;
        if *count == 0 {
            self.asset_counts.remove(&asset);
            pool.release(asset)?;
        }
        Ok(())
    }

    /// Removes entries whose node was dropped. Returns how many were removed.
    fn prune_stale(&mut self, pool: &mut SharedMeshPool) -> Result<usize> {
        if self.entries.iter().all(|e| e.node.is_alive()) {
            return Ok(0);
        }

        let (live, stale): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|e| e.node.is_alive());
        self.entries = live;

        let mut result = Ok(stale.len());
        for asset in stale.iter().filter_map(|e| e.asset) {
            if let Err(err) = self.release_asset(asset, pool) {
                result = Err(err);
            }
        }

        warn!("Pruned {} dropped node(s) from scene.", stale.len());
        self.data_dirty = true;
        result
    }

    /// Per-frame update. Does nothing while paused or disabled.
    pub fn tick(&mut self, pool: &mut SharedMeshPool) -> Result<TickReport> {
        let mut report = TickReport::default();
        if !self.is_running || !self.is_enabled {
            return Ok(report);
        }

        if !self.is_ready {
            self.request_update(pool, true)?;
            report.updated = true;
        }

        let was_empty = self.is_empty();
        let mut any_stale = false;
        for entry in &self.entries {
            match entry.node.upgrade() {
                Some(node) => {
                    let node = node.lock();
                    self.data_dirty |= node.is_dirty();
                    self.order_dirty |= node.is_order_dirty();
                }
                None => any_stale = true,
            }
        }

        if any_stale {
            report.pruned = self.prune_stale(pool)?;
            if !was_empty && self.is_empty() {
                for consumer in &mut self.consumers {
                    consumer.on_empty();
                }
            }
        }

        let mut changed = false;

        if self.order_dirty {
            self.reorder_objects();
            report.reordered = true;
            changed = true;
        }

        let pool_moved = pool.is_dirty() || self.pool_generation != Some(pool.generation());
        if changed || self.force_update_next_tick || pool_moved || self.data_dirty {
            debug!(
                "Rebuilding scene data (reordered: {}, forced: {}, pool moved: {}, dirty: {}).",
                changed, self.force_update_next_tick, pool_moved, self.data_dirty
            );
            let rebuild = self.rebuild_data(pool, true);
            report.rebuilt = true;
            report.pool_rebuilt = rebuild.pool_rebuilt;
            changed = true;
        }

        self.force_update_next_tick = false;

        if changed && !self.is_empty() {
            for consumer in &mut self.consumers {
                consumer.run();
            }
            report.ran = true;
        }

        Ok(report)
    }

    /// Full refresh: announces emptiness, rebuilds, pushes settings, becomes ready and runs
    /// consumers. With `only_send_buffer_on_change == false` the data and mesh buffers are
    /// announced even if they did not change.
    pub fn request_update(
        &mut self,
        pool: &mut SharedMeshPool,
        only_send_buffer_on_change: bool,
    ) -> Result<()> {
        if !self.is_enabled {
            return Ok(());
        }

        self.is_ready = false;
        self.prune_stale(pool)?;

        let is_empty = self.is_empty();
        for consumer in &mut self.consumers {
            if is_empty {
                consumer.on_empty();
            } else {
                consumer.on_not_empty();
            }
        }

        if self.order_dirty || self.any_node(|n| n.is_order_dirty()) {
            self.reorder_objects();
        }
        self.rebuild_data(pool, only_send_buffer_on_change);
        self.push_settings();

        self.is_ready = true;

        if !is_empty {
            for consumer in &mut self.consumers {
                consumer.run();
            }
        }
        Ok(())
    }

    fn any_node(&self, f: impl Fn(&SceneNode) -> bool) -> bool {
        self.entries
            .iter()
            .filter_map(|e| e.node.upgrade())
            .any(|node| {
                let guard = node.lock();
                f(&guard)
            })
    }

    /// Stable sort by node order. Dropped nodes sort last.
    pub fn reorder_objects(&mut self) {
        let mut keyed: Vec<(i32, Entry)> = self
            .entries
            .drain(..)
            .map(|entry| {
                let order = entry.node.upgrade().map_or(i32::MAX, |node| {
                    let mut node = node.lock();
                    node.clear_order_dirty();
                    node.order()
                });
                (order, entry)
            })
            .collect();
        keyed.sort_by_key(|(order, _)| *order);
        self.entries = keyed.into_iter().map(|(_, entry)| entry).collect();
        self.order_dirty = false;
        // The export mirrors entry order.
        self.data_dirty = true;
    }

    /// Re-exports every node and material, resolving mesh nodes against the pool.
    pub fn rebuild_data(
        &mut self,
        pool: &mut SharedMeshPool,
        only_send_buffer_on_change: bool,
    ) -> DataRebuild {
        self.data_dirty = false;

        // Every referenced, installed asset has a slot once this returns, so all nodes below
        // resolve against the same pool generation.
        let pool_rebuilt = pool.rebuild_if_dirty().is_some();
        let mut unresolved = 0;
        let mut skipped_operation = false;

        let previous_count = self.node_data.len();
        self.node_data.clear();
        self.material_data.clear();

        for entry in &self.entries {
            let Some(handle) = entry.node.upgrade() else {
                continue;
            };
            let mut node = handle.lock();
            node.clear_dirty();

            if let NodeKind::Operation { kind, .. } = node.kind() {
                if !kind.warps_space() && !skipped_operation {
                    warn!("{:?} operations leave space unchanged.", kind);
                    skipped_operation = true;
                }
            }

            let exported = node.to_field_node(|asset| match pool.resolve(asset) {
                Some(slot) => slot,
                None => {
                    warn!("Mesh asset {} has no baked field yet; skipping it.", asset);
                    unresolved += 1;
                    MeshSlot::unresolved(asset)
                }
            });

            self.node_data.push(exported);
            self.material_data.push(MaterialData::from(node.material()));
        }

        let count = self.node_data.len();
        let mut send = !only_send_buffer_on_change;
        let mut new_buffer = false;
        if self.data_buffer.is_none() || previous_count != count {
            self.data_buffer = Some(DataBuffer::new());
            new_buffer = true;
            send = true;
        }

        if let Some(buffer) = &self.data_buffer {
            buffer.write(&self.node_data, &self.material_data);
            if send {
                for consumer in &mut self.consumers {
                    consumer.update_data_buffer(buffer, count);
                }
            }
        }

        self.evaluator
            .set_data(self.node_data.clone(), self.material_data.clone());

        let pool_changed = pool_rebuilt || self.pool_generation != Some(pool.generation());
        if !only_send_buffer_on_change || pool_changed {
            let samples = pool.samples();
            let packed_uvs = pool.packed_uvs();
            self.evaluator
                .set_mesh_data(Arc::clone(&samples), Arc::clone(&packed_uvs));
            for consumer in &mut self.consumers {
                consumer.update_mesh_buffers(&samples, &packed_uvs);
            }
            self.pool_generation = Some(pool.generation());
        }

        DataRebuild {
            count,
            new_buffer,
            pool_rebuilt,
            unresolved,
        }
    }

    fn push_settings(&mut self) {
        let data = SettingsData::from(&self.settings);
        self.evaluator.set_settings(data);
        for consumer in &mut self.consumers {
            consumer.update_settings_buffer(&data);
        }
    }

    /// Validates and applies new settings, pushing them to consumers and the evaluator.
    pub fn set_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        self.push_settings();
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Re-enables the scene: forces a full update now and a rebuild on the next tick.
    pub fn enable(&mut self, pool: &mut SharedMeshPool) -> Result<()> {
        self.is_enabled = true;
        self.data_dirty = true;
        self.order_dirty = true;
        pool.mark_stale();

        self.request_update(pool, false)?;
        self.force_update_next_tick = true;
        Ok(())
    }

    /// Stops updating and releases the exported buffer.
    pub fn disable(&mut self) {
        self.is_enabled = false;
        self.is_ready = false;
        self.data_buffer = None;
    }

    /// Pauses or resumes ticking without releasing anything.
    pub fn set_running(&mut self, running: bool) {
        self.is_running = running;
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    /// Number of registered nodes, including dropped ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live nodes in fold order.
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.entries.iter().filter_map(|e| e.node.upgrade()).collect()
    }

    pub fn node_data(&self) -> &[FieldNode] {
        &self.node_data
    }

    pub fn material_data(&self) -> &[MaterialData] {
        &self.material_data
    }

    pub fn data_buffer(&self) -> Option<&DataBuffer> {
        self.data_buffer.as_ref()
    }

    /// The evaluator holding the last export, regardless of readiness.
    pub fn evaluator(&self) -> &FieldEvaluator {
        &self.evaluator
    }

    fn ready_evaluator(&self) -> Result<&FieldEvaluator> {
        if self.is_ready {
            Ok(&self.evaluator)
        } else {
            Err(Error::NotReady)
        }
    }

    pub fn distance(&self, p: Vec3) -> Result<f32> {
        Ok(self.ready_evaluator()?.map(p))
    }

    pub fn normal(&self, p: Vec3) -> Result<Vec3> {
        Ok(self.ready_evaluator()?.map_normal(p))
    }

    pub fn nearest_point_on_surface(&self, p: Vec3) -> Result<Vec3> {
        Ok(self.ready_evaluator()?.nearest_point_on_surface(p))
    }

    pub fn project_to_surface(&self, p: Vec3) -> Result<SurfaceProjection> {
        Ok(self.ready_evaluator()?.project_to_surface(p))
    }

    /// Ray marches the scene. A miss is `Ok(None)`.
    pub fn raycast(&self, ray: &Ray, config: &RayMarchConfig) -> Result<Option<RayHit>> {
        Ok(self.ready_evaluator()?.ray_march(ray, config))
    }

    pub fn overlap_sphere(&self, center: Vec3, radius: f32) -> Result<bool> {
        Ok(self.ready_evaluator()?.overlap_sphere(center, radius))
    }

    pub fn overlap_box(&self, center: Vec3, half_extents: Vec3) -> Result<bool> {
        Ok(self.ready_evaluator()?.overlap_box(center, half_extents))
    }
}
