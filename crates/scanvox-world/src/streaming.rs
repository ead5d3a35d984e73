//! Chunk streaming based on camera position.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use glam::Vec3;
use hashbrown::HashSet;
use rayon::prelude::*;
use scanvox_core::coords::{ChunkPos, WorldPos};
use tracing::{debug, info, warn};

use crate::chunk::Chunk;
use crate::generation::ChunkGenerator;
use crate::lighting::LightEngine;
use crate::persistence::{flush_chunk, ChunkStore};
use crate::world::World;

/// Priority entry for chunk loading queue.
#[derive(Debug, Clone, Copy)]
struct LoadPriority {
    pos: ChunkPos,
    /// Squared distance to camera (lower = higher priority).
    distance_sq: i32,
}

impl PartialEq for LoadPriority {
    fn eq(&self, other: &Self) -> bool {
        self.distance_sq == other.distance_sq
    }
}

impl Eq for LoadPriority {}

impl PartialOrd for LoadPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoadPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (closer chunks have higher priority)
        other.distance_sq.cmp(&self.distance_sq)
    }
}

/// Configuration for chunk streaming behavior.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Horizontal load radius in chunks.
    pub load_radius: i32,
    /// Extra chunks beyond the load radius kept before eviction.
    pub unload_margin: i32,
    /// Maximum chunks to request per update call.
    pub max_gen_per_update: usize,
    /// Threads in the worker pool. 0 uses rayon's default.
    pub worker_threads: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_radius: 8,
            unload_margin: 2,
            max_gen_per_update: 8,
            worker_threads: 0,
        }
    }
}

impl StreamingConfig {
    /// Set the load radius.
    #[must_use]
    pub const fn with_load_radius(mut self, radius: i32) -> Self {
        self.load_radius = radius;
        self
    }

    /// Set the eviction margin.
    #[must_use]
    pub const fn with_unload_margin(mut self, margin: i32) -> Self {
        self.unload_margin = margin;
        self
    }

    /// Radius beyond which loaded chunks are evicted.
    pub const fn unload_radius(&self) -> i32 {
        self.load_radius + self.unload_margin
    }
}

/// Chunks that joined or left the map during one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamUpdate {
    /// Chunks inserted into the map.
    pub arrived: Vec<ChunkPos>,
    /// Chunks removed from the map.
    pub evicted: Vec<ChunkPos>,
}

/// Where new chunks come from: the store if it has them, else the generator.
/// Every produced chunk is lit on its own before it is handed out.
#[derive(Clone)]
struct ChunkSource {
    generator: Arc<dyn ChunkGenerator>,
    store: Option<Arc<dyn ChunkStore>>,
    light: LightEngine,
}

impl ChunkSource {
    fn produce(&self, pos: ChunkPos) -> Chunk {
        let stored = self.store.as_ref().and_then(|store| match store.load_chunk(pos) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(?pos, error = %e, "Failed to load chunk, regenerating");
                None
            }
        });
        let mut chunk = stored.unwrap_or_else(|| self.generator.generate(pos));
        self.light.light_isolated(&mut chunk);
        chunk
    }

    fn produce_batch(&self, positions: &[ChunkPos]) -> Vec<Chunk> {
        positions.par_iter().map(|&pos| self.produce(pos)).collect()
    }
}

/// Work request sent to the background worker thread.
#[derive(Debug)]
enum ChunkWorkRequest {
    /// Load or generate chunks at the given positions.
    Load(Vec<ChunkPos>),
    /// Signal worker thread to shut down.
    Shutdown,
}

/// Handle to the background chunk worker thread.
struct ChunkWorkerHandle {
    /// Channel to send work requests to the worker.
    request_tx: Sender<ChunkWorkRequest>,
    /// Channel to receive completed chunks from the worker.
    result_rx: Receiver<Chunk>,
    /// Worker thread handle for joining on shutdown.
    thread: Option<JoinHandle<()>>,
}

impl ChunkWorkerHandle {
    /// Spawn a new worker thread driving a bounded rayon pool.
    fn spawn(source: ChunkSource, threads: usize) -> Self {
        let (request_tx, request_rx) = channel::bounded::<ChunkWorkRequest>(16);
        let (result_tx, result_rx) = channel::bounded::<Chunk>(256);

        let thread = thread::Builder::new()
            .name("chunk-worker".to_string())
            .spawn(move || {
                Self::worker_loop(&source, threads, &request_rx, &result_tx);
            })
            .expect("Failed to spawn chunk worker thread");

        Self {
            request_tx,
            result_rx,
            thread: Some(thread),
        }
    }

    /// Main worker loop - blocks waiting for requests and processes them.
    fn worker_loop(
        source: &ChunkSource,
        threads: usize,
        request_rx: &Receiver<ChunkWorkRequest>,
        result_tx: &Sender<Chunk>,
    ) {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("chunk-gen-{i}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "Failed to build chunk pool, using global rayon pool");
                None
            }
        };

        loop {
            match request_rx.recv() {
                Ok(ChunkWorkRequest::Load(positions)) => {
                    let chunks = match &pool {
                        Some(pool) => pool.install(|| source.produce_batch(&positions)),
                        None => source.produce_batch(&positions),
                    };
                    for chunk in chunks {
                        // Blocking send: backpressure if the main thread is slow
                        if result_tx.send(chunk).is_err() {
                            return;
                        }
                    }
                }
                Ok(ChunkWorkRequest::Shutdown) | Err(_) => return,
            }
        }
    }

    /// Send a batch of positions to load (non-blocking).
    fn send_work(&self, positions: Vec<ChunkPos>) -> Result<(), Vec<ChunkPos>> {
        self.request_tx
            .try_send(ChunkWorkRequest::Load(positions))
            .map_err(|e| match e.into_inner() {
                ChunkWorkRequest::Load(positions) => positions,
                ChunkWorkRequest::Shutdown => Vec::new(),
            })
    }

    /// Try to receive a completed chunk (non-blocking).
    fn try_recv(&self) -> Option<Chunk> {
        self.result_rx.try_recv().ok()
    }

    /// Shutdown the worker thread and wait for it to finish.
    ///
    /// Pending results are drained while waiting so the worker never stays
    /// blocked on a full result channel.
    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        loop {
            match self.request_tx.try_send(ChunkWorkRequest::Shutdown) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => break,
                Err(TrySendError::Full(_)) => self.drain_results(),
            }
        }
        while !thread.is_finished() {
            self.drain_results();
        }
        let _ = thread.join();
    }

    fn drain_results(&self) {
        while self.result_rx.try_recv().is_ok() {}
        thread::yield_now();
    }
}

impl Drop for ChunkWorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handles chunk streaming based on camera position.
pub struct ChunkStreamer {
    config: StreamingConfig,
    source: ChunkSource,
    load_queue: BinaryHeap<LoadPriority>,
    last_center: Option<ChunkPos>,
    /// Number of updates since last queue rebuild.
    updates_since_rebuild: u32,
    /// Background worker thread handle (None for sync mode).
    worker: Option<ChunkWorkerHandle>,
    /// Positions currently being processed by the worker.
    in_flight: HashSet<ChunkPos>,
}

impl ChunkStreamer {
    /// Create a synchronous streamer where chunks are produced on the calling thread.
    pub fn new(
        config: StreamingConfig,
        generator: Arc<dyn ChunkGenerator>,
        store: Option<Arc<dyn ChunkStore>>,
    ) -> Self {
        Self {
            config,
            source: ChunkSource {
                generator,
                store,
                light: LightEngine::new(),
            },
            load_queue: BinaryHeap::new(),
            last_center: None,
            updates_since_rebuild: 0,
            worker: None,
            in_flight: HashSet::new(),
        }
    }

    /// Create a streamer with a background worker thread.
    ///
    /// Loading, generation and self-lighting happen on the worker's pool,
    /// keeping the calling thread responsive.
    pub fn new_async(
        config: StreamingConfig,
        generator: Arc<dyn ChunkGenerator>,
        store: Option<Arc<dyn ChunkStore>>,
    ) -> Self {
        let mut streamer = Self::new(config, generator, store);
        streamer.worker = Some(ChunkWorkerHandle::spawn(
            streamer.source.clone(),
            streamer.config.worker_threads,
        ));
        info!(threads = streamer.config.worker_threads, "Started chunk worker");
        streamer
    }

    /// Check if this streamer is running in async mode.
    pub const fn is_async(&self) -> bool {
        self.worker.is_some()
    }

    /// Get the streaming configuration.
    pub const fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Get the number of chunks waiting to be requested.
    pub fn pending_count(&self) -> usize {
        self.load_queue.len()
    }

    /// Get the number of chunks currently being processed by the worker.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Check if the load queue should be rebuilt.
    fn should_rebuild_queue(&self, center: ChunkPos) -> bool {
        self.last_center != Some(center) || self.updates_since_rebuild > 30
    }

    /// Rebuild the load queue around the given center.
    fn rebuild_load_queue(&mut self, center: ChunkPos, world: &World) {
        self.load_queue.clear();

        let r = self.config.load_radius;
        for dz in -r..=r {
            for dx in -r..=r {
                let pos = center.offset(dx, dz);
                if !world.is_loaded(pos) && !self.in_flight.contains(&pos) {
                    let distance_sq = dx * dx + dz * dz;
                    self.load_queue.push(LoadPriority { pos, distance_sq });
                }
            }
        }
    }

    /// Update streaming state based on camera position.
    ///
    /// Inserts finished chunks, evicts chunks beyond the unload radius
    /// (saving modified ones first) and requests new chunks.
    pub fn update(&mut self, camera_pos: Vec3, world: &World) -> StreamUpdate {
        let center = WorldPos::from(camera_pos).chunk_pos();
        let mut update = StreamUpdate::default();

        if let Some(worker) = &self.worker {
            let mut received = Vec::new();
            while let Some(chunk) = worker.try_recv() {
                received.push(chunk);
            }
            for chunk in received {
                self.in_flight.remove(&chunk.pos);
                self.accept(chunk, center, world, &mut update);
            }
        }

        if self.should_rebuild_queue(center) {
            self.rebuild_load_queue(center, world);
            self.last_center = Some(center);
            self.updates_since_rebuild = 0;
        } else {
            self.updates_since_rebuild += 1;
        }

        update.evicted = self.evict_distant(center, world);

        let batch = self.next_batch(world);
        if !batch.is_empty() {
            if self.worker.is_some() {
                self.submit(batch);
            } else {
                for chunk in self.source.produce_batch(&batch) {
                    self.accept(chunk, center, world, &mut update);
                }
            }
        }

        if !update.arrived.is_empty() || !update.evicted.is_empty() {
            debug!(
                arrived = update.arrived.len(),
                evicted = update.evicted.len(),
                loaded = world.chunks().len(),
                "Streaming update"
            );
        }
        update
    }

    /// Insert a produced chunk unless it is already loaded or out of range.
    fn accept(&self, chunk: Chunk, center: ChunkPos, world: &World, update: &mut StreamUpdate) {
        let pos = chunk.pos;
        if world.is_loaded(pos) || pos.chebyshev_distance(center) > self.config.unload_radius() {
            return;
        }
        world.chunks().insert(chunk);
        world.chunk_arrived(pos);
        update.arrived.push(pos);
    }

    /// Pop up to `max_gen_per_update` positions that still need loading.
    fn next_batch(&mut self, world: &World) -> Vec<ChunkPos> {
        let limit = if self.worker.is_some() {
            let max_in_flight = self.config.max_gen_per_update * 4;
            self.config
                .max_gen_per_update
                .min(max_in_flight.saturating_sub(self.in_flight.len()))
        } else {
            self.config.max_gen_per_update
        };

        let mut batch = Vec::with_capacity(limit);
        while batch.len() < limit {
            let Some(entry) = self.load_queue.pop() else {
                break;
            };
            if !world.is_loaded(entry.pos) && !self.in_flight.contains(&entry.pos) {
                batch.push(entry.pos);
            }
        }
        batch
    }

    /// Submit a batch to the worker thread.
    fn submit(&mut self, batch: Vec<ChunkPos>) {
        let Some(worker) = &self.worker else {
            return;
        };
        for &pos in &batch {
            self.in_flight.insert(pos);
        }
        if let Err(returned) = worker.send_work(batch) {
            // Queue was full; put them back at the front of the load queue
            for pos in returned {
                self.in_flight.remove(&pos);
                self.load_queue.push(LoadPriority { pos, distance_sq: 0 });
            }
        }
    }

    /// Remove chunks beyond the unload radius, saving modified ones.
    fn evict_distant(&mut self, center: ChunkPos, world: &World) -> Vec<ChunkPos> {
        let radius = self.config.unload_radius();
        let distant = world.chunks().chunks_outside_radius(center, radius);
        for &pos in &distant {
            if let Some(mut chunk) = world.chunks().remove(pos) {
                self.save_if_modified(&mut chunk);
            }
            world.chunk_evicted(pos);
        }
        self.in_flight
            .retain(|pos| pos.chebyshev_distance(center) <= radius);
        distant
    }

    fn save_if_modified(&self, chunk: &mut Chunk) {
        let Some(store) = &self.source.store else {
            return;
        };
        if let Err(e) = flush_chunk(store.as_ref(), chunk) {
            warn!(pos = ?chunk.pos, error = %e, "Failed to save chunk");
        }
    }

    /// Save every modified loaded chunk. Returns how many were written.
    pub fn flush_all(&self, world: &World) -> usize {
        let Some(store) = &self.source.store else {
            return 0;
        };
        let mut saved = 0;
        for pos in world.chunks().modified_chunks() {
            let result = world
                .chunks()
                .with_chunk_mut(pos, |chunk| flush_chunk(store.as_ref(), chunk));
            match result {
                Some(Ok(true)) => saved += 1,
                Some(Err(e)) => warn!(?pos, error = %e, "Failed to save chunk"),
                _ => {}
            }
        }
        info!(saved, "Flushed modified chunks");
        saved
    }

    /// Load a specific chunk on the calling thread, bypassing the queue.
    pub fn force_load(&self, pos: ChunkPos, world: &World) {
        if !world.is_loaded(pos) {
            world.chunks().insert(self.source.produce(pos));
            world.chunk_arrived(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_manager::ChunkManager;
    use crate::generation::TerrainGenerator;
    use crate::persistence::MemoryChunkStore;
    use scanvox_core::types::BlockId;

    fn test_config() -> StreamingConfig {
        StreamingConfig {
            load_radius: 1,
            unload_margin: 1,
            max_gen_per_update: 16,
            worker_threads: 2,
        }
    }

    fn test_world() -> World {
        World::new(Arc::new(ChunkManager::new(64)), Arc::new(LightEngine::new()))
    }

    fn generator() -> Arc<dyn ChunkGenerator> {
        Arc::new(TerrainGenerator::with_seed(42))
    }

    #[test]
    fn load_priority_ordering() {
        let mut heap = BinaryHeap::new();

        heap.push(LoadPriority {
            pos: ChunkPos::new(10, 0),
            distance_sq: 100,
        });
        heap.push(LoadPriority {
            pos: ChunkPos::new(1, 0),
            distance_sq: 1,
        });
        heap.push(LoadPriority {
            pos: ChunkPos::new(5, 0),
            distance_sq: 25,
        });

        // Closest should come first
        assert_eq!(heap.pop().unwrap().distance_sq, 1);
        assert_eq!(heap.pop().unwrap().distance_sq, 25);
        assert_eq!(heap.pop().unwrap().distance_sq, 100);
    }

    #[test]
    fn streamer_loads_chunks_around_camera() {
        let world = test_world();
        let mut streamer = ChunkStreamer::new(test_config(), generator(), None);

        let update = streamer.update(Vec3::new(8.0, 80.0, 8.0), &world);

        assert_eq!(update.arrived.len(), 9);
        assert!(world.is_loaded(ChunkPos::new(0, 0)));
        assert!(world.is_loaded(ChunkPos::new(-1, 1)));
        assert!(world.pending_light_count() > 0);
        assert!(world.pending_mesh_count() > 0);
    }

    #[test]
    fn streamer_evicts_and_saves_modified_chunks() {
        let world = test_world();
        let store = Arc::new(MemoryChunkStore::new());
        let mut streamer = ChunkStreamer::new(test_config(), generator(), Some(store.clone()));

        streamer.update(Vec3::new(8.0, 80.0, 8.0), &world);
        let edit = WorldPos::new(3, 125, 3);
        world.set_block(edit, BlockId::GLASS);

        let update = streamer.update(Vec3::new(500.0, 80.0, 500.0), &world);
        assert!(update.evicted.contains(&ChunkPos::new(0, 0)));
        assert!(!world.is_loaded(ChunkPos::new(0, 0)));
        // Only the edited chunk is written.
        assert_eq!(store.len(), 1);

        streamer.update(Vec3::new(8.0, 80.0, 8.0), &world);
        assert_eq!(world.block_at(edit), BlockId::GLASS);
    }

    #[test]
    fn flush_all_saves_without_evicting() {
        let world = test_world();
        let store = Arc::new(MemoryChunkStore::new());
        let mut streamer = ChunkStreamer::new(test_config(), generator(), Some(store.clone()));
        streamer.update(Vec3::new(8.0, 80.0, 8.0), &world);

        world.set_block(WorldPos::new(3, 125, 3), BlockId::GLASS);
        world.set_block(WorldPos::new(20, 125, 3), BlockId::GLASS);

        assert_eq!(streamer.flush_all(&world), 2);
        assert_eq!(store.len(), 2);
        assert!(world.chunks().modified_chunks().is_empty());
    }

    #[test]
    fn force_load_chunk() {
        let world = test_world();
        let streamer = ChunkStreamer::new(test_config(), generator(), None);
        let pos = ChunkPos::new(100, 100);

        assert!(!world.is_loaded(pos));
        streamer.force_load(pos, &world);
        assert!(world.is_loaded(pos));
    }

    #[test]
    fn sync_streamer_is_not_async() {
        let streamer = ChunkStreamer::new(test_config(), generator(), None);
        assert!(!streamer.is_async());
    }

    #[test]
    fn async_streamer_loads_chunks() {
        let world = test_world();
        let mut streamer = ChunkStreamer::new_async(test_config(), generator(), None);
        assert!(streamer.is_async());

        let camera_pos = Vec3::new(8.0, 80.0, 8.0);
        for _ in 0..200 {
            streamer.update(camera_pos, &world);
            if world.chunks().len() == 9 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }

        assert_eq!(world.chunks().len(), 9);
        assert_eq!(streamer.in_flight_count(), 0);
    }
}
