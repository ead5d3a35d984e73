//! World storage, lighting and streaming for the Scanvox engine.
//!
//! This crate owns the voxel side of the renderer:
//! - `Chunk` storage and the shared `ChunkManager` map
//! - BFS flood-fill lighting across chunk seams
//! - The `World` view with the voxel write hook and relight scheduling
//! - Cellular fluid flow
//! - Generation and persistence collaborators, and chunk streaming

pub mod chunk;
pub mod chunk_manager;
pub mod fluid;
pub mod generation;
pub mod lighting;
pub mod persistence;
pub mod streaming;
pub mod world;

pub use chunk::{Chunk, ChunkState};
pub use chunk_manager::{ChunkManager, Neighborhood};
pub use fluid::FluidSimulator;
pub use generation::{ChunkGenerator, TerrainConfig, TerrainGenerator};
pub use lighting::{LightEngine, LightProcessor, RelightReport, RelightStrategy};
pub use persistence::{ChunkStore, FileChunkStore, MemoryChunkStore};
pub use streaming::{ChunkStreamer, StreamUpdate, StreamingConfig};
pub use world::{VoxelListener, World};

/// World seed for procedural generation.
pub type WorldSeed = u64;
