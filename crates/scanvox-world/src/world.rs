//! The world view: voxel reads and writes, the write hook, and the dirty
//! queues that drive relighting and remeshing.

use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::{Mutex, RwLock};
use scanvox_core::constants::CHUNK_WIDTH;
use scanvox_core::coords::{ChunkPos, WorldPos};
use scanvox_core::types::{BlockId, Light, Voxel};
use tracing::debug;

use crate::chunk_manager::ChunkManager;
use crate::lighting::{
    affected_chunks, relight_area, LightProcessor, RelightReport, RelightStrategy,
};

/// Observer invoked after every voxel write that changed a cell.
pub trait VoxelListener: Send + Sync {
    /// Called after `pos` changed from `old` to `new`. No chunk lock is held.
    fn voxel_written(&self, pos: WorldPos, old: Voxel, new: Voxel);
}

/// FIFO of chunk positions without duplicates.
#[derive(Default)]
struct DirtyQueue {
    queue: VecDeque<ChunkPos>,
    queued: HashSet<ChunkPos>,
}

impl DirtyQueue {
    fn push(&mut self, pos: ChunkPos) {
        if self.queued.insert(pos) {
            self.queue.push_back(pos);
        }
    }

    fn pop(&mut self) -> Option<ChunkPos> {
        let pos = self.queue.pop_front()?;
        self.queued.remove(&pos);
        Some(pos)
    }

    fn drain(&mut self) -> Vec<ChunkPos> {
        self.queued.clear();
        self.queue.drain(..).collect()
    }

    fn remove(&mut self, pos: ChunkPos) {
        if self.queued.remove(&pos) {
            self.queue.retain(|p| *p != pos);
        }
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Shared voxel world: the chunk map plus its light processor.
pub struct World {
    chunks: Arc<ChunkManager>,
    light: Arc<dyn LightProcessor>,
    relight_strategy: RelightStrategy,
    listeners: RwLock<Vec<Arc<dyn VoxelListener>>>,
    pending_light: Mutex<DirtyQueue>,
    pending_mesh: Mutex<DirtyQueue>,
}

impl World {
    /// Create a world over a chunk map with the given light processor.
    pub fn new(chunks: Arc<ChunkManager>, light: Arc<dyn LightProcessor>) -> Self {
        Self {
            chunks,
            light,
            relight_strategy: RelightStrategy::default(),
            listeners: RwLock::new(Vec::new()),
            pending_light: Mutex::new(DirtyQueue::default()),
            pending_mesh: Mutex::new(DirtyQueue::default()),
        }
    }

    /// Set the relight strategy used by [`World::process_lighting`].
    #[must_use]
    pub const fn with_relight_strategy(mut self, strategy: RelightStrategy) -> Self {
        self.relight_strategy = strategy;
        self
    }

    /// The relight strategy in use.
    pub const fn relight_strategy(&self) -> RelightStrategy {
        self.relight_strategy
    }

    /// The shared chunk map.
    pub const fn chunks(&self) -> &Arc<ChunkManager> {
        &self.chunks
    }

    /// Register a listener for voxel writes.
    pub fn add_listener(&self, listener: Arc<dyn VoxelListener>) {
        self.listeners.write().push(listener);
    }

    /// Whether the chunk at `pos` is loaded.
    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.chunks.contains(pos)
    }

    /// Block at a world position. Unloaded or out-of-range cells are air.
    pub fn block_at(&self, pos: WorldPos) -> BlockId {
        self.voxel_at(pos).block
    }

    /// Voxel at a world position. Unloaded or out-of-range cells are air.
    pub fn voxel_at(&self, pos: WorldPos) -> Voxel {
        self.voxel_if_loaded(pos).unwrap_or(Voxel::AIR)
    }

    /// Voxel at a world position, or `None` when it is not in a loaded chunk.
    pub fn voxel_if_loaded(&self, pos: WorldPos) -> Option<Voxel> {
        let (chunk, local) = pos.split()?;
        self.chunks.with_chunk(chunk, |c| c.voxel(local))
    }

    /// Light at a world position. Unloaded or out-of-range cells have full sky light.
    pub fn light_at(&self, pos: WorldPos) -> Light {
        pos.split()
            .and_then(|(chunk, local)| self.chunks.with_chunk(chunk, |c| c.light(local)))
            .unwrap_or(Light::SKY)
    }

    /// Write a block with empty metadata. See [`World::set_voxel`].
    pub fn set_block(&self, pos: WorldPos, block: BlockId) -> Option<Voxel> {
        self.set_voxel(pos, Voxel::new(block))
    }

    /// Write a voxel and return the previous one.
    ///
    /// Returns `None` without writing when the position is outside the world
    /// height or its chunk is not loaded. A write that changes the cell
    /// notifies listeners and schedules relighting and remeshing.
    pub fn set_voxel(&self, pos: WorldPos, voxel: Voxel) -> Option<Voxel> {
        let (chunk_pos, local) = pos.split()?;
        let old = self
            .chunks
            .with_chunk_mut(chunk_pos, |chunk| chunk.set_voxel(local, voxel))?;
        if old == voxel {
            return Some(old);
        }

        for listener in self.listeners.read().iter() {
            listener.voxel_written(pos, old, voxel);
        }

        {
            let mut pending = self.pending_light.lock();
            for affected in affected_chunks(&self.chunks, pos) {
                pending.push(affected);
            }
        }

        let last = CHUNK_WIDTH as u8 - 1;
        let dx = match local.x {
            0 => -1,
            x if x == last => 1,
            _ => 0,
        };
        let dz = match local.z {
            0 => -1,
            z if z == last => 1,
            _ => 0,
        };
        let mut pending = self.pending_mesh.lock();
        pending.push(chunk_pos);
        for (ox, oz) in [(dx, 0), (0, dz), (dx, dz)] {
            let neighbor = chunk_pos.offset(ox, oz);
            if (ox, oz) != (0, 0) && self.chunks.contains(neighbor) {
                pending.push(neighbor);
            }
        }
        Some(old)
    }

    /// Schedule work for a chunk that just joined the map.
    pub fn chunk_arrived(&self, pos: ChunkPos) {
        {
            let mut pending = self.pending_light.lock();
            pending.push(pos);
            for neighbor in pos.neighbors() {
                if self.chunks.contains(neighbor) {
                    pending.push(neighbor);
                }
            }
        }
        let mut pending = self.pending_mesh.lock();
        for dz in -1..=1 {
            for dx in -1..=1 {
                let neighbor = pos.offset(dx, dz);
                if self.chunks.contains(neighbor) {
                    pending.push(neighbor);
                }
            }
        }
    }

    /// Drop queued work for a chunk that left the map and remesh the border
    /// it exposed.
    pub fn chunk_evicted(&self, pos: ChunkPos) {
        self.pending_light.lock().remove(pos);
        let mut pending = self.pending_mesh.lock();
        pending.remove(pos);
        for neighbor in pos.neighbors() {
            if self.chunks.contains(neighbor) {
                pending.push(neighbor);
            }
        }
    }

    /// Relight every chunk queued by edits and arrivals.
    ///
    /// Chunks whose light changed are queued for remeshing together with
    /// their loaded neighbours, whose border faces sample that light.
    pub fn process_lighting(&self) -> RelightReport {
        let positions = self.pending_light.lock().drain();
        if positions.is_empty() {
            return RelightReport::default();
        }
        let report = relight_area(&*self.light, &self.chunks, &positions, self.relight_strategy);
        debug!(
            chunks = positions.len(),
            passes = report.passes,
            changed = report.changed.len(),
            "Processed lighting"
        );

        let mut pending = self.pending_mesh.lock();
        for &pos in &report.changed {
            pending.push(pos);
            for neighbor in pos.neighbors() {
                if self.chunks.contains(neighbor) {
                    pending.push(neighbor);
                }
            }
        }
        report
    }

    /// Pop up to `quota` chunks that need a new mesh.
    pub fn take_mesh_batch(&self, quota: usize) -> Vec<ChunkPos> {
        let mut pending = self.pending_mesh.lock();
        let mut batch = Vec::with_capacity(quota);
        while batch.len() < quota {
            let Some(pos) = pending.pop() else {
                break;
            };
            if self.chunks.contains(pos) {
                batch.push(pos);
            }
        }
        batch
    }

    /// Chunks waiting for relighting.
    pub fn pending_light_count(&self) -> usize {
        self.pending_light.lock().len()
    }

    /// Chunks waiting for a new mesh.
    pub fn pending_mesh_count(&self) -> usize {
        self.pending_mesh.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::lighting::LightEngine;

    struct Recorder(Mutex<Vec<(WorldPos, Voxel, Voxel)>>);

    impl VoxelListener for Recorder {
        fn voxel_written(&self, pos: WorldPos, old: Voxel, new: Voxel) {
            self.0.lock().push((pos, old, new));
        }
    }

    fn world_with(chunks: &[(i32, i32)]) -> World {
        let manager = Arc::new(ChunkManager::new(chunks.len()));
        for &(x, z) in chunks {
            manager.insert(Chunk::new(ChunkPos::new(x, z)));
        }
        World::new(manager, Arc::new(LightEngine::new()))
    }

    #[test]
    fn unloaded_and_out_of_range_reads() {
        let world = world_with(&[(0, 0)]);
        assert_eq!(world.block_at(WorldPos::new(100, 10, 100)), BlockId::AIR);
        assert_eq!(world.light_at(WorldPos::new(100, 10, 100)), Light::SKY);
        assert_eq!(world.light_at(WorldPos::new(1, -3, 1)), Light::SKY);
        assert_eq!(world.light_at(WorldPos::new(1, 500, 1)), Light::SKY);
        assert!(world.voxel_if_loaded(WorldPos::new(100, 10, 100)).is_none());
    }

    #[test]
    fn writes_outside_loaded_chunks_are_rejected() {
        let world = world_with(&[(0, 0)]);
        assert!(world.set_block(WorldPos::new(-1, 5, 0), BlockId::LAMP).is_none());
        assert!(world.set_block(WorldPos::new(0, 128, 0), BlockId::LAMP).is_none());
        assert_eq!(world.pending_mesh_count(), 0);
    }

    #[test]
    fn set_voxel_notifies_listeners_with_old_and_new() {
        let world = world_with(&[(0, 0)]);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        world.add_listener(recorder.clone());

        let pos = WorldPos::new(3, 4, 5);
        let old = world.set_block(pos, BlockId::GLASS);
        assert_eq!(old, Some(Voxel::AIR));
        assert_eq!(world.block_at(pos), BlockId::GLASS);

        // Rewriting the same voxel is not a change.
        world.set_block(pos, BlockId::GLASS);

        let events = recorder.0.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], (pos, Voxel::AIR, Voxel::new(BlockId::GLASS)));
    }

    #[test]
    fn border_edit_schedules_neighbor_remesh() {
        let world = world_with(&[(0, 0), (-1, 0), (0, -1), (-1, -1), (1, 0)]);
        world.set_block(WorldPos::new(0, 10, 0), BlockId::LAMP);

        let mut batch = world.take_mesh_batch(16);
        batch.sort_by_key(|p| (p.x, p.z));
        assert_eq!(
            batch,
            vec![
                ChunkPos::new(-1, -1),
                ChunkPos::new(-1, 0),
                ChunkPos::new(0, -1),
                ChunkPos::new(0, 0),
            ]
        );
    }

    #[test]
    fn interior_edit_schedules_only_its_chunk() {
        let world = world_with(&[(0, 0), (1, 0)]);
        world.set_block(WorldPos::new(8, 10, 8), BlockId::LAMP);
        assert_eq!(world.take_mesh_batch(16), vec![ChunkPos::new(0, 0)]);
    }

    #[test]
    fn process_lighting_relights_edited_area() {
        let world = world_with(&[(0, 0), (1, 0)]);
        let roof = BlockId::from_rgb(90, 90, 90);
        for x in 0..32 {
            for z in 0..16 {
                world.set_block(WorldPos::new(x, 100, z), roof);
            }
        }
        world.set_block(WorldPos::new(15, 10, 8), BlockId::LAMP);
        world.take_mesh_batch(64);

        let report = world.process_lighting();
        assert_eq!(report.passes, 3);
        assert_eq!(world.pending_light_count(), 0);
        assert_eq!(world.light_at(WorldPos::new(16, 10, 8)).block(), 14);
        assert_eq!(world.light_at(WorldPos::new(16, 10, 8)).sky(), 0);
        assert!(world.pending_mesh_count() > 0);
    }

    #[test]
    fn mesh_batch_respects_quota_and_skips_evicted() {
        let world = world_with(&[(0, 0), (5, 5), (9, 9)]);
        for pos in [ChunkPos::new(0, 0), ChunkPos::new(5, 5), ChunkPos::new(9, 9)] {
            world.chunk_arrived(pos);
        }
        world.chunks().remove(ChunkPos::new(5, 5));
        world.chunk_evicted(ChunkPos::new(5, 5));

        let first = world.take_mesh_batch(1);
        assert_eq!(first, vec![ChunkPos::new(0, 0)]);
        let rest = world.take_mesh_batch(4);
        assert_eq!(rest, vec![ChunkPos::new(9, 9)]);
    }
}
