//! The engine: world, streaming, fluids, meshes and the renderer wired
//! together and driven one tick or one frame at a time.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use glam::Vec3;
use scanvox_render::{CameraPose, FrameBuffer, MeshCache, RenderConfig, Renderer};
use scanvox_world::{
    ChunkManager, ChunkStore, ChunkStreamer, FileChunkStore, FluidSimulator, LightEngine,
    MemoryChunkStore, RelightStrategy, StreamingConfig, TerrainGenerator, World, WorldSeed,
};
use tracing::{debug, info, trace_span};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Chunks kept loaded and drawn around the camera.
    pub render_distance: u32,
    /// Chunk meshes rebuilt per frame at most.
    pub mesh_quota: usize,
    /// Relight passes run after edits and arrivals.
    pub relight_strategy: RelightStrategy,
    /// Terrain seed.
    pub seed: WorldSeed,
    /// Generate chunks on a background worker instead of the frame thread.
    pub async_streaming: bool,
    /// Directory for saved chunks. `None` keeps edits in memory only.
    pub save_dir: Option<PathBuf>,
    /// Fluid cells evaluated per tick.
    pub fluid_budget: usize,
    /// Ticks in one full day.
    pub day_length_ticks: u32,
    /// Day phase at startup.
    pub start_time: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render_distance: 6,
            mesh_quota: 4,
            relight_strategy: RelightStrategy::default(),
            seed: 42,
            async_streaming: true,
            save_dir: None,
            fluid_budget: 4096,
            day_length_ticks: 12_000,
            start_time: 0.3,
        }
    }
}

impl EngineConfig {
    /// Set the render distance in chunks.
    #[must_use]
    pub const fn with_render_distance(mut self, chunks: u32) -> Self {
        self.render_distance = chunks;
        self
    }

    /// Set the per-frame mesh rebuild quota.
    #[must_use]
    pub const fn with_mesh_quota(mut self, quota: usize) -> Self {
        self.mesh_quota = quota;
        self
    }

    /// Set the relight strategy.
    #[must_use]
    pub const fn with_relight_strategy(mut self, strategy: RelightStrategy) -> Self {
        self.relight_strategy = strategy;
        self
    }

    /// Set the terrain seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: WorldSeed) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable the background chunk worker.
    #[must_use]
    pub const fn with_async_streaming(mut self, enabled: bool) -> Self {
        self.async_streaming = enabled;
        self
    }

    /// Persist chunks under `dir`.
    #[must_use]
    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    /// Set the starting day phase.
    #[must_use]
    pub const fn with_start_time(mut self, phase: f32) -> Self {
        self.start_time = phase;
        self
    }
}

/// Work done by one [`Engine::prepare_frame`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Chunks that finished loading.
    pub arrived: usize,
    /// Chunks unloaded.
    pub evicted: usize,
    /// Chunks whose light changed.
    pub relit: usize,
    /// Chunk meshes rebuilt.
    pub meshed: usize,
}

/// A running voxel world and its renderer.
pub struct Engine {
    config: EngineConfig,
    world: World,
    streamer: ChunkStreamer,
    fluids: FluidSimulator,
    meshes: MeshCache,
    renderer: Renderer,
    world_time: f32,
    ticks: u64,
}

impl Engine {
    /// Create an engine. Fails only when the save directory cannot be opened.
    pub fn new(config: EngineConfig, render: RenderConfig) -> anyhow::Result<Self> {
        let radius = config.render_distance as i32;
        let side = (2 * (radius + 2) + 1) as usize;
        let chunks = Arc::new(ChunkManager::new(side * side));
        let world = World::new(chunks, Arc::new(LightEngine::new()))
            .with_relight_strategy(config.relight_strategy);

        let store: Arc<dyn ChunkStore> = match &config.save_dir {
            Some(dir) => Arc::new(
                FileChunkStore::open(dir)
                    .with_context(|| format!("Failed to open save directory {}", dir.display()))?,
            ),
            None => Arc::new(MemoryChunkStore::new()),
        };
        let generator = Arc::new(TerrainGenerator::with_seed(config.seed));
        let streaming = StreamingConfig::default().with_load_radius(radius);
        let streamer = if config.async_streaming {
            ChunkStreamer::new_async(streaming, generator, Some(store))
        } else {
            ChunkStreamer::new(streaming, generator, Some(store))
        };

        let fluids = FluidSimulator::attach(&world).with_budget(config.fluid_budget);
        let renderer = Renderer::new(render.with_render_distance(config.render_distance));

        info!(
            seed = config.seed,
            render_distance = config.render_distance,
            persistent = config.save_dir.is_some(),
            "Engine created"
        );

        Ok(Self {
            world_time: config.start_time.rem_euclid(1.0),
            config,
            world,
            streamer,
            fluids,
            meshes: MeshCache::new(),
            renderer,
            ticks: 0,
        })
    }

    /// The engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The voxel world.
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The fluid simulator.
    pub const fn fluids(&self) -> &FluidSimulator {
        &self.fluids
    }

    /// Cached chunk meshes.
    pub const fn meshes(&self) -> &MeshCache {
        &self.meshes
    }

    pub const fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Current day phase in `[0, 1)`.
    pub const fn world_time(&self) -> f32 {
        self.world_time
    }

    pub fn set_world_time(&mut self, phase: f32) {
        self.world_time = phase.rem_euclid(1.0);
    }

    /// Simulation ticks run so far.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance the simulation by one fixed tick: fluid flow and the clock.
    ///
    /// Returns the number of voxels the fluid step wrote.
    pub fn tick(&mut self) -> usize {
        let written = self.fluids.tick(&self.world);
        let step = 1.0 / self.config.day_length_ticks.max(1) as f32;
        self.world_time = (self.world_time + step).rem_euclid(1.0);
        self.ticks += 1;
        written
    }

    /// Stream chunks around `camera_pos`, relight pending chunks and
    /// rebuild up to the mesh quota.
    pub fn prepare_frame(&mut self, camera_pos: Vec3) -> PrepareReport {
        let _span = trace_span!("engine.prepare_frame").entered();

        let streamed = self.streamer.update(camera_pos, &self.world);
        let relit = self.world.process_lighting();
        let meshed = self.meshes.update(&self.world, self.config.mesh_quota);

        let report = PrepareReport {
            arrived: streamed.arrived.len(),
            evicted: streamed.evicted.len(),
            relit: relit.changed.len(),
            meshed,
        };
        if report != PrepareReport::default() {
            debug!(?report, "Prepared frame");
        }
        report
    }

    /// Draw the world from `camera` at the current time of day.
    pub fn render(&mut self, camera: &CameraPose) -> &FrameBuffer {
        self.renderer.render_frame(&self.meshes, camera, self.world_time)
    }

    /// Whether every chunk in range is loaded and meshed.
    pub fn is_settled(&self) -> bool {
        self.streamer.pending_count() == 0
            && self.streamer.in_flight_count() == 0
            && self.world.pending_light_count() == 0
            && self.world.pending_mesh_count() == 0
    }

    /// Save every modified chunk. Returns how many were written.
    pub fn save_all(&self) -> usize {
        self.streamer.flush_all(&self.world)
    }
}
