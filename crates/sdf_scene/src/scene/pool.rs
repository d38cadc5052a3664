//! Deduplicated storage of baked mesh samples shared by every scene.
//!
//! The pool holds the finished bakes (keyed by [`MeshAssetId`]) and, for every asset some scene
//! references, where its samples and UVs start in two concatenated buffers. Reference counts
//! count scenes, not nodes: a scene acquires an asset when its first node on that asset
//! registers and releases it when its last one leaves.
//!
//! Offsets stay valid until the next [`SharedMeshPool::rebuild`]. Every rebuild bumps
//! [`SharedMeshPool::generation`], which scenes compare against to know their exported offsets
//! may have moved.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::field::baked::BakedMeshField;
use crate::field::node::MeshSlot;

/// Identifier of a mesh asset.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshAssetId(pub u64);

impl fmt::Display for MeshAssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for MeshAssetId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct PoolEntry {
    ref_count: usize,
    /// Layout in the concatenated buffers as of the last rebuild.
    slot: Option<MeshSlot>,
}

/// Summary of one [`SharedMeshPool::rebuild`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolRebuild {
    pub generation: u64,
    /// Assets copied into the buffers.
    pub assets: usize,
    pub sample_count: usize,
    pub uv_count: usize,
    /// Referenced assets without an installed bake.
    pub missing: Vec<MeshAssetId>,
    /// Whether either buffer changed length.
    pub resized: bool,
}

#[derive(Debug, Default)]
pub struct SharedMeshPool {
    bakes: BTreeMap<MeshAssetId, Arc<BakedMeshField>>,
    entries: BTreeMap<MeshAssetId, PoolEntry>,
    samples: Arc<[f32]>,
    packed_uvs: Arc<[f32]>,
    dirty: bool,
    generation: u64,
}

impl SharedMeshPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a finished bake, replacing any previous one. Returns the replaced bake.
    pub fn install(
        &mut self,
        asset: MeshAssetId,
        field: BakedMeshField,
    ) -> Option<Arc<BakedMeshField>> {
        let previous = self.bakes.insert(asset, Arc::new(field));
        if self.entries.contains_key(&asset) {
            self.dirty = true;
        }
        previous
    }

    /// Removes a bake. Scenes still referencing the asset see it as unresolved after the next
    /// rebuild.
    pub fn uninstall(&mut self, asset: MeshAssetId) -> Option<Arc<BakedMeshField>> {
        let removed = self.bakes.remove(&asset);
        if removed.is_some() && self.entries.contains_key(&asset) {
            self.dirty = true;
        }
        removed
    }

    pub fn bake(&self, asset: MeshAssetId) -> Option<&Arc<BakedMeshField>> {
        self.bakes.get(&asset)
    }

    pub fn is_installed(&self, asset: MeshAssetId) -> bool {
        self.bakes.contains_key(&asset)
    }

    /// Adds one scene reference. Returns the new count.
    pub fn acquire(&mut self, asset: MeshAssetId) -> usize {
        let entry = self.entries.entry(asset).or_default();
        entry.ref_count += 1;
        if entry.ref_count == 1 {
            debug!("Mesh asset {} entered the pool.", asset);
            self.dirty = true;
        }
        entry.ref_count
    }

    /// Drops one scene reference. The asset leaves the pool when its count reaches zero.
    pub fn release(&mut self, asset: MeshAssetId) -> Result<usize> {
        let Some(entry) = self.entries.get_mut(&asset) else {
            error!("Released mesh asset {} without a reference.", asset);
            return Err(Error::RefCountUnderflow { asset });
        };
        entry.ref_count = entry.ref_count.saturating_sub(1);
        let remaining = entry.ref_count;
        if remaining == 0 {
            self.entries.remove(&asset);
            debug!("Mesh asset {} left the pool.", asset);
            self.dirty = true;
        }
        Ok(remaining)
    }

    /// Number of scenes holding at least one node on `asset`.
    pub fn ref_count(&self, asset: MeshAssetId) -> usize {
        self.entries.get(&asset).map_or(0, |e| e.ref_count)
    }

    /// Whether some scene references `asset`.
    pub fn contains(&self, asset: MeshAssetId) -> bool {
        self.entries.contains_key(&asset)
    }

    /// Referenced assets in ascending id order.
    pub fn assets(&self) -> impl Iterator<Item = MeshAssetId> + '_ {
        self.entries.keys().copied()
    }

    /// Forces the next [`Self::rebuild_if_dirty`] to rebuild.
    pub fn mark_stale(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Incremented by every rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Layout of `asset` in the shared buffers, if it was copied by the last rebuild.
    pub fn resolve(&self, asset: MeshAssetId) -> Option<MeshSlot> {
        self.entries.get(&asset).and_then(|e| e.slot)
    }

    pub fn samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn packed_uvs(&self) -> Arc<[f32]> {
        Arc::clone(&self.packed_uvs)
    }

    pub fn rebuild_if_dirty(&mut self) -> Option<PoolRebuild> {
        self.dirty.then(|| self.rebuild())
    }

    /// Concatenates the samples and UVs of every referenced asset with an installed bake, in
    /// ascending id order, and records where each one starts.
    pub fn rebuild(&mut self) -> PoolRebuild {
        let previous = (self.samples.len(), self.packed_uvs.len());

        let mut samples = Vec::new();
        let mut packed_uvs = Vec::new();
        let mut missing = Vec::new();
        let mut assets = 0;

        for (asset, entry) in self.entries.iter_mut() {
            let Some(bake) = self.bakes.get(asset) else {
                entry.slot = None;
                missing.push(*asset);
                continue;
            };

            let sample_start = samples.len();
            samples.extend_from_slice(bake.samples());

            let uv_start = bake.packed_uvs().map(|uvs| {
                let start = packed_uvs.len();
                packed_uvs.extend_from_slice(uvs);
                start
            });

            entry.slot = Some(MeshSlot {
                asset: *asset,
                size: bake.size(),
                sample_start: Some(sample_start),
                uv_start,
                min_bounds: bake.min_bounds(),
                max_bounds: bake.max_bounds(),
            });
            assets += 1;
        }

        self.samples = samples.into();
        self.packed_uvs = packed_uvs.into();
        self.dirty = false;
        self.generation += 1;

        let report = PoolRebuild {
            generation: self.generation,
            assets,
            sample_count: self.samples.len(),
            uv_count: self.packed_uvs.len(),
            resized: previous != (self.samples.len(), self.packed_uvs.len()),
            missing,
        };

        info!(
            "Rebuilt mesh pool generation {}: {} assets, {} samples, {} uvs, {} missing.",
            report.generation,
            report.assets,
            report.sample_count,
            report.uv_count,
            report.missing.len()
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn flat_field(size: usize, value: f32, with_uvs: bool) -> BakedMeshField {
        let total = size * size * size;
        BakedMeshField::new(
            size,
            Vec3::splat(-1.0),
            Vec3::splat(1.0),
            vec![value; total],
            with_uvs.then(|| vec![value * 10.0; total]),
        )
        .unwrap()
    }

    #[test]
    fn asset_id_displays_with_hash() {
        assert_eq!(MeshAssetId(12).to_string(), "#12");
    }

    #[test]
    fn ref_count_tracks_scenes() {
        let mut pool = SharedMeshPool::new();
        let asset = MeshAssetId(1);

        assert_eq!(pool.acquire(asset), 1);
        assert_eq!(pool.acquire(asset), 2);
        assert_eq!(pool.ref_count(asset), 2);

        assert_eq!(pool.release(asset).unwrap(), 1);
        assert!(pool.contains(asset));

        assert_eq!(pool.release(asset).unwrap(), 0);
        assert!(!pool.contains(asset));
        assert_eq!(pool.ref_count(asset), 0);
    }

    #[test]
    fn releasing_unreferenced_asset_underflows() {
        let mut pool = SharedMeshPool::new();
        let err = pool.release(MeshAssetId(4)).unwrap_err();
        assert!(matches!(
            err,
            Error::RefCountUnderflow {
                asset: MeshAssetId(4)
            }
        ));
    }

    #[test]
    fn membership_changes_mark_the_pool_dirty() {
        let mut pool = SharedMeshPool::new();
        let asset = MeshAssetId(1);

        pool.acquire(asset);
        assert!(pool.is_dirty());
        pool.rebuild();
        assert!(!pool.is_dirty());

        pool.acquire(asset);
        assert!(!pool.is_dirty(), "second scene does not change membership");

        pool.install(asset, flat_field(2, 0.0, false));
        assert!(pool.is_dirty());
        pool.rebuild();

        pool.install(MeshAssetId(99), flat_field(2, 0.0, false));
        assert!(!pool.is_dirty(), "unreferenced bakes do not affect buffers");
    }

    #[test]
    fn rebuild_concatenates_in_ascending_id_order() {
        let mut pool = SharedMeshPool::new();
        pool.install(MeshAssetId(5), flat_field(2, 5.0, true));
        pool.install(MeshAssetId(2), flat_field(3, 2.0, false));
        pool.install(MeshAssetId(8), flat_field(2, 8.0, true));
        pool.acquire(MeshAssetId(8));
        pool.acquire(MeshAssetId(5));
        pool.acquire(MeshAssetId(2));
        pool.acquire(MeshAssetId(2));

        let report = pool.rebuild();
        assert_eq!(report.assets, 3);
        assert_eq!(report.sample_count, 27 + 8 + 8);
        assert_eq!(report.uv_count, 16);
        assert!(report.missing.is_empty());
        assert!(report.resized);

        let two = pool.resolve(MeshAssetId(2)).unwrap();
        let five = pool.resolve(MeshAssetId(5)).unwrap();
        let eight = pool.resolve(MeshAssetId(8)).unwrap();
        assert_eq!(two.sample_start, Some(0));
        assert_eq!(two.uv_start, None);
        assert_eq!(five.sample_start, Some(27));
        assert_eq!(five.uv_start, Some(0));
        assert_eq!(eight.sample_start, Some(35));
        assert_eq!(eight.uv_start, Some(8));

        let samples = pool.samples();
        assert_eq!(samples[27], 5.0);
        assert_eq!(samples[35], 8.0);
        assert_eq!(pool.packed_uvs()[8], 80.0);
    }

    #[test]
    fn missing_bakes_are_reported_and_resolved_later() {
        let mut pool = SharedMeshPool::new();
        let asset = MeshAssetId(3);
        pool.acquire(asset);

        let report = pool.rebuild();
        assert_eq!(report.missing, vec![asset]);
        assert!(pool.resolve(asset).is_none());
        let first_generation = pool.generation();

        pool.install(asset, flat_field(2, 1.0, false));
        let report = pool.rebuild_if_dirty().expect("install marks dirty");
        assert!(report.missing.is_empty());
        assert!(pool.generation() > first_generation);
        assert_eq!(pool.resolve(asset).unwrap().size, 2);
    }

    #[test]
    fn released_assets_leave_the_buffers() {
        let mut pool = SharedMeshPool::new();
        pool.install(MeshAssetId(1), flat_field(2, 1.0, false));
        pool.install(MeshAssetId(2), flat_field(2, 2.0, false));
        pool.acquire(MeshAssetId(1));
        pool.acquire(MeshAssetId(2));
        pool.rebuild();
        assert_eq!(pool.samples().len(), 16);

        pool.release(MeshAssetId(1)).unwrap();
        let report = pool.rebuild_if_dirty().unwrap();
        assert_eq!(report.sample_count, 8);
        assert_eq!(pool.resolve(MeshAssetId(2)).unwrap().sample_start, Some(0));
        assert!(pool.resolve(MeshAssetId(1)).is_none());
    }
}
