//! Chunk manager with spatial indexing.

use hashbrown::HashMap;
use parking_lot::RwLock;
use scanvox_core::constants::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH};
use scanvox_core::coords::{ChunkPos, LocalPos};
use scanvox_core::types::{BlockId, Light, Voxel};

use crate::chunk::Chunk;

/// Manages all loaded chunks with spatial indexing.
///
/// Provides thread-safe access to chunks via `RwLock`.
pub struct ChunkManager {
    /// All loaded chunks indexed by position.
    chunks: RwLock<HashMap<ChunkPos, Chunk>>,
}

impl ChunkManager {
    /// Create a new chunk manager with room for `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        Self {
            chunks: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Check if a chunk exists at the given position.
    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.chunks.read().contains_key(&pos)
    }

    /// Get the number of loaded chunks.
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    /// Check if no chunks are loaded.
    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    /// Insert or replace a chunk at the given position.
    pub fn insert(&self, chunk: Chunk) {
        let mut chunks = self.chunks.write();
        chunks.insert(chunk.pos, chunk);
    }

    /// Remove a chunk at the given position.
    pub fn remove(&self, pos: ChunkPos) -> Option<Chunk> {
        let mut chunks = self.chunks.write();
        chunks.remove(&pos)
    }

    /// Get all loaded chunk positions.
    pub fn positions(&self) -> Vec<ChunkPos> {
        self.chunks.read().keys().copied().collect()
    }

    /// Execute a function with read access to a chunk.
    ///
    /// Returns `None` if the chunk doesn't exist.
    pub fn with_chunk<F, R>(&self, pos: ChunkPos, f: F) -> Option<R>
    where
        F: FnOnce(&Chunk) -> R,
    {
        let chunks = self.chunks.read();
        chunks.get(&pos).map(f)
    }

    /// Execute a function with write access to a chunk.
    ///
    /// Returns `None` if the chunk doesn't exist.
    pub fn with_chunk_mut<F, R>(&self, pos: ChunkPos, f: F) -> Option<R>
    where
        F: FnOnce(&mut Chunk) -> R,
    {
        let mut chunks = self.chunks.write();
        chunks.get_mut(&pos).map(f)
    }

    /// Execute a function with read access to a chunk and its eight
    /// horizontal neighbours.
    ///
    /// Returns `None` if the center chunk doesn't exist.
    pub fn with_neighborhood<F, R>(&self, pos: ChunkPos, f: F) -> Option<R>
    where
        F: FnOnce(&Neighborhood<'_>) -> R,
    {
        let chunks = self.chunks.read();
        let center = chunks.get(&pos)?;
        let mut neighbors = [[None; 3]; 3];
        for (dz, row) in neighbors.iter_mut().enumerate() {
            for (dx, slot) in row.iter_mut().enumerate() {
                *slot = chunks.get(&pos.offset(dx as i32 - 1, dz as i32 - 1));
            }
        }
        Some(f(&Neighborhood { center, neighbors }))
    }

    /// Get chunks farther than `radius` from a center position.
    pub fn chunks_outside_radius(&self, center: ChunkPos, radius: i32) -> Vec<ChunkPos> {
        let chunks = self.chunks.read();
        chunks
            .keys()
            .filter(|pos| pos.chebyshev_distance(center) > radius)
            .copied()
            .collect()
    }

    /// Get chunks with unsaved edits.
    pub fn modified_chunks(&self) -> Vec<ChunkPos> {
        let chunks = self.chunks.read();
        chunks
            .iter()
            .filter(|(_, chunk)| chunk.is_modified())
            .map(|(pos, _)| *pos)
            .collect()
    }
}

impl Default for ChunkManager {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// A chunk plus read access to its 3x3 horizontal neighbourhood.
///
/// Sampling takes coordinates relative to the center chunk and is total:
/// cells in unloaded chunks or outside the world's height read as air with
/// full sky light.
pub struct Neighborhood<'a> {
    center: &'a Chunk,
    /// Indexed `[dz + 1][dx + 1]`.
    neighbors: [[Option<&'a Chunk>; 3]; 3],
}

impl<'a> Neighborhood<'a> {
    /// A neighbourhood where every neighbour is unloaded.
    pub fn isolated(chunk: &'a Chunk) -> Self {
        let mut neighbors = [[None; 3]; 3];
        neighbors[1][1] = Some(chunk);
        Self {
            center: chunk,
            neighbors,
        }
    }

    /// The center chunk.
    #[inline]
    pub const fn center(&self) -> &'a Chunk {
        self.center
    }

    /// A loaded neighbour at a chunk offset in -1..=1.
    #[inline]
    pub fn neighbor(&self, dx: i32, dz: i32) -> Option<&'a Chunk> {
        if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dz) {
            return None;
        }
        self.neighbors[(dz + 1) as usize][(dx + 1) as usize]
    }

    #[inline]
    fn resolve(&self, x: i32, y: i32, z: i32) -> Option<(&'a Chunk, LocalPos)> {
        if y < 0 || y >= CHUNK_HEIGHT as i32 {
            return None;
        }
        let dx = x.div_euclid(CHUNK_WIDTH as i32);
        let dz = z.div_euclid(CHUNK_DEPTH as i32);
        let chunk = self.neighbor(dx, dz)?;
        let local = LocalPos::checked(
            x.rem_euclid(CHUNK_WIDTH as i32),
            y,
            z.rem_euclid(CHUNK_DEPTH as i32),
        )?;
        Some((chunk, local))
    }

    /// Block at center-relative coordinates.
    #[inline]
    pub fn block(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.resolve(x, y, z)
            .map_or(BlockId::AIR, |(chunk, local)| chunk.block(local))
    }

    /// Block and metadata at center-relative coordinates.
    #[inline]
    pub fn voxel(&self, x: i32, y: i32, z: i32) -> Voxel {
        self.resolve(x, y, z)
            .map_or(Voxel::AIR, |(chunk, local)| chunk.voxel(local))
    }

    /// Light at center-relative coordinates.
    #[inline]
    pub fn light(&self, x: i32, y: i32, z: i32) -> Light {
        self.resolve(x, y, z)
            .map_or(Light::SKY, |(chunk, local)| chunk.light(local))
    }

    /// Whether the cell is a fully opaque block.
    #[inline]
    pub fn is_opaque(&self, x: i32, y: i32, z: i32) -> bool {
        self.block(x, y, z).is_opaque()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkState;

    #[test]
    fn insert_and_retrieve() {
        let manager = ChunkManager::new(100);
        let pos = ChunkPos::new(1, 3);
        manager.insert(Chunk::new(pos));

        assert!(manager.contains(pos));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn remove_chunk() {
        let manager = ChunkManager::new(100);
        let pos = ChunkPos::new(1, 3);
        manager.insert(Chunk::new(pos));
        let removed = manager.remove(pos);

        assert!(removed.is_some());
        assert!(!manager.contains(pos));
        assert!(manager.is_empty());
    }

    #[test]
    fn chunks_outside_radius() {
        let manager = ChunkManager::new(100);
        for x in -5..=5 {
            for z in -5..=5 {
                manager.insert(Chunk::new(ChunkPos::new(x, z)));
            }
        }

        let far = manager.chunks_outside_radius(ChunkPos::new(0, 0), 2);
        assert_eq!(far.len(), 121 - 25);
    }

    #[test]
    fn with_chunk_access() {
        let manager = ChunkManager::new(100);
        let pos = ChunkPos::new(1, 3);
        manager.insert(Chunk::new(pos));

        let state = manager.with_chunk(pos, |c| c.state);
        assert_eq!(state, Some(ChunkState::Generated));

        manager.with_chunk_mut(pos, |c| {
            c.state = ChunkState::Ready;
        });

        let state = manager.with_chunk(pos, |c| c.state);
        assert_eq!(state, Some(ChunkState::Ready));
    }

    #[test]
    fn modified_chunks_tracks_edits() {
        let manager = ChunkManager::new(4);
        let pos = ChunkPos::new(0, 0);
        manager.insert(Chunk::new(pos));
        assert!(manager.modified_chunks().is_empty());

        manager.with_chunk_mut(pos, |c| c.set_block(LocalPos::new(0, 0, 0), BlockId::LAMP));
        assert_eq!(manager.modified_chunks(), vec![pos]);
    }

    #[test]
    fn neighborhood_samples_across_borders() {
        let manager = ChunkManager::new(4);
        let mut east = Chunk::new(ChunkPos::new(1, 0));
        east.set_block(LocalPos::new(0, 10, 5), BlockId::GLASS);
        manager.insert(Chunk::new(ChunkPos::new(0, 0)));
        manager.insert(east);

        let (east_block, west_block, below, west_light) = manager
            .with_neighborhood(ChunkPos::new(0, 0), |hood| {
                (
                    hood.block(16, 10, 5),
                    hood.block(-1, 10, 5),
                    hood.block(3, -1, 3),
                    hood.light(-1, 10, 5),
                )
            })
            .unwrap();

        assert_eq!(east_block, BlockId::GLASS);
        assert_eq!(west_block, BlockId::AIR);
        assert_eq!(below, BlockId::AIR);
        assert_eq!(west_light, Light::SKY);
    }

    #[test]
    fn neighborhood_of_missing_chunk_is_none() {
        let manager = ChunkManager::new(4);
        assert!(manager.with_neighborhood(ChunkPos::new(0, 0), |_| ()).is_none());
    }
}
