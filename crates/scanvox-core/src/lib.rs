//! Core types, coordinates, and errors for the Scanvox engine.
//!
//! This crate provides the foundational types used throughout the engine:
//! - Block ids, packed light and fluid metadata
//! - Coordinate systems (world, chunk, local, segment)
//! - Face directions and occlusion masks
//! - Bounding boxes and the engine error type

pub mod coords;
pub mod error;
pub mod math;
pub mod types;

pub use coords::{ChunkPos, Direction, FaceMask, LocalPos, SegmentPos, WorldPos};
pub use error::{Error, Result};
pub use types::{BlockId, Fluid, FluidMeta, Light, Voxel};

/// Engine-wide constants
pub mod constants {
    /// Chunk size along X in voxels
    pub const CHUNK_WIDTH: usize = 16;
    /// Chunk size along Y in voxels
    pub const CHUNK_HEIGHT: usize = 128;
    /// Chunk size along Z in voxels
    pub const CHUNK_DEPTH: usize = 16;
    /// Total voxels in a chunk (16 * 128 * 16)
    pub const CHUNK_VOLUME: usize = CHUNK_WIDTH * CHUNK_HEIGHT * CHUNK_DEPTH;
    /// Bits needed for a horizontal position within a chunk (4 bits for 0-15)
    pub const CHUNK_BITS: u32 = 4;

    /// Edge length of a segment in voxels
    pub const SEGMENT_SIZE: usize = 4;
    /// Bits needed for a position within a segment
    pub const SEGMENT_BITS: u32 = 2;
    /// Segments per chunk along X
    pub const SEGMENTS_X: usize = CHUNK_WIDTH / SEGMENT_SIZE;
    /// Segments per chunk along Y
    pub const SEGMENTS_Y: usize = CHUNK_HEIGHT / SEGMENT_SIZE;
    /// Segments per chunk along Z
    pub const SEGMENTS_Z: usize = CHUNK_DEPTH / SEGMENT_SIZE;
    /// Segments per chunk (4 * 32 * 4)
    pub const SEGMENTS_PER_CHUNK: usize = SEGMENTS_X * SEGMENTS_Y * SEGMENTS_Z;

    /// Maximum value of either light channel
    pub const MAX_LIGHT: u8 = 15;
    /// Fluid level of a source block
    pub const FLUID_SOURCE_LEVEL: u8 = 8;
    /// Manhattan reach of a single light source
    pub const LIGHT_RANGE: i32 = 15;
}
