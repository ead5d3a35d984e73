//! Chunk data structure for voxel world storage.

use scanvox_core::constants::CHUNK_VOLUME;
use scanvox_core::coords::{ChunkPos, LocalPos};
use scanvox_core::types::{BlockId, FluidMeta, Light, Voxel};

/// State of a chunk in the loading pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChunkState {
    /// Chunk has blocks and metadata but no light.
    #[default]
    Generated,
    /// Chunk was lit on its own, without neighbour light.
    Lit,
    /// Chunk has been relit together with its loaded neighbours.
    Ready,
}

/// A 16x128x16 column of voxels stored as three parallel flat arrays.
///
/// All arrays are indexed by [`LocalPos::to_index`].
#[derive(Clone)]
pub struct Chunk {
    /// Position in chunk coordinates.
    pub pos: ChunkPos,
    /// Current state in the loading pipeline.
    pub state: ChunkState,
    blocks: Box<[BlockId]>,
    light: Box<[Light]>,
    metadata: Box<[FluidMeta]>,
    modified: bool,
}

impl Chunk {
    /// Create a new chunk full of air.
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            state: ChunkState::Generated,
            blocks: vec![BlockId::AIR; CHUNK_VOLUME].into_boxed_slice(),
            light: vec![Light::DARK; CHUNK_VOLUME].into_boxed_slice(),
            metadata: vec![FluidMeta(0); CHUNK_VOLUME].into_boxed_slice(),
            modified: false,
        }
    }

    /// Create a chunk from dense block and metadata arrays.
    ///
    /// Returns `None` if either array does not hold exactly one chunk.
    pub fn from_parts(
        pos: ChunkPos,
        blocks: Vec<BlockId>,
        metadata: Vec<FluidMeta>,
    ) -> Option<Self> {
        if blocks.len() != CHUNK_VOLUME || metadata.len() != CHUNK_VOLUME {
            return None;
        }
        Some(Self {
            pos,
            state: ChunkState::Generated,
            blocks: blocks.into_boxed_slice(),
            light: vec![Light::DARK; CHUNK_VOLUME].into_boxed_slice(),
            metadata: metadata.into_boxed_slice(),
            modified: false,
        })
    }

    /// Block at a local position.
    #[inline]
    pub fn block(&self, pos: LocalPos) -> BlockId {
        self.blocks[pos.to_index()]
    }

    /// Block and metadata at a local position.
    #[inline]
    pub fn voxel(&self, pos: LocalPos) -> Voxel {
        let index = pos.to_index();
        Voxel::with_metadata(self.blocks[index], self.metadata[index])
    }

    /// Light at a local position.
    #[inline]
    pub fn light(&self, pos: LocalPos) -> Light {
        self.light[pos.to_index()]
    }

    /// Metadata at a local position.
    #[inline]
    pub fn metadata(&self, pos: LocalPos) -> FluidMeta {
        self.metadata[pos.to_index()]
    }

    /// Write a voxel, returning the previous one. Marks the chunk modified on change.
    pub fn set_voxel(&mut self, pos: LocalPos, voxel: Voxel) -> Voxel {
        let index = pos.to_index();
        let old = Voxel::with_metadata(self.blocks[index], self.metadata[index]);
        if old != voxel {
            self.blocks[index] = voxel.block;
            self.metadata[index] = voxel.metadata;
            self.modified = true;
        }
        old
    }

    /// Write a block with empty metadata.
    pub fn set_block(&mut self, pos: LocalPos, block: BlockId) -> Voxel {
        self.set_voxel(pos, Voxel::new(block))
    }

    /// Fill an inclusive box of local coordinates, clipped to the chunk.
    pub fn fill(&mut self, min: (i32, i32, i32), max: (i32, i32, i32), voxel: Voxel) {
        for y in min.1..=max.1 {
            for z in min.2..=max.2 {
                for x in min.0..=max.0 {
                    if let Some(pos) = LocalPos::checked(x, y, z) {
                        self.set_voxel(pos, voxel);
                    }
                }
            }
        }
    }

    /// All blocks in index order.
    #[inline]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// All metadata bytes in index order.
    #[inline]
    pub fn metadata_slice(&self) -> &[FluidMeta] {
        &self.metadata
    }

    /// All light values in index order.
    #[inline]
    pub fn light_slice(&self) -> &[Light] {
        &self.light
    }

    /// Replace the whole light array with a freshly computed one.
    ///
    /// This single copy is the only point at which readers can observe new
    /// light. Returns whether anything changed.
    pub fn publish_light(&mut self, scratch: &[Light]) -> bool {
        debug_assert_eq!(scratch.len(), CHUNK_VOLUME);
        if *self.light == *scratch {
            return false;
        }
        self.light.copy_from_slice(scratch);
        true
    }

    /// Whether the chunk changed since it was last saved.
    #[inline]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Flag the chunk as saved (or as freshly generated).
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Check if this chunk is empty (all air).
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|block| block.is_air())
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("state", &self.state)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}
