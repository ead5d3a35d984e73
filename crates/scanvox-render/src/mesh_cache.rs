//! Cache of chunk meshes keyed by chunk position.

use std::sync::Arc;

use hashbrown::HashMap;
use rayon::prelude::*;
use scanvox_core::coords::{ChunkPos, FaceMask, SegmentPos};
use scanvox_world::{ChunkManager, World};
use tracing::debug;

use crate::mesh::{ChunkMesh, MeshBuilder, SegmentMesh};
use crate::visibility::OcclusionSource;

/// Built meshes for loaded chunks.
///
/// `revision` advances whenever a mesh is added, replaced or removed so
/// consumers can tell when occlusion data changed.
#[derive(Default)]
pub struct MeshCache {
    meshes: HashMap<ChunkPos, Arc<ChunkMesh>>,
    builder: MeshBuilder,
    revision: u64,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mesh of a chunk, if built.
    pub fn get(&self, pos: ChunkPos) -> Option<&Arc<ChunkMesh>> {
        self.meshes.get(&pos)
    }

    /// Geometry of one segment, if its chunk is meshed.
    pub fn segment(&self, pos: SegmentPos) -> Option<&SegmentMesh> {
        if !pos.in_world() {
            return None;
        }
        self.meshes
            .get(&pos.chunk_pos())
            .map(|mesh| mesh.segment(pos.local_index()))
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.meshes.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Insert a prebuilt mesh.
    pub fn insert(&mut self, mesh: ChunkMesh) {
        self.meshes.insert(mesh.pos, Arc::new(mesh));
        self.revision += 1;
    }

    /// Drop the mesh of an evicted chunk.
    pub fn remove(&mut self, pos: ChunkPos) -> bool {
        let removed = self.meshes.remove(&pos).is_some();
        if removed {
            self.revision += 1;
        }
        removed
    }

    /// Mesh the given chunks in parallel. Chunks that are not loaded are
    /// skipped. Returns how many meshes were built.
    pub fn rebuild(&mut self, chunks: &ChunkManager, positions: &[ChunkPos]) -> usize {
        let builder = self.builder;
        let built: Vec<ChunkMesh> = positions
            .par_iter()
            .filter_map(|&pos| chunks.with_neighborhood(pos, |hood| builder.build(hood)))
            .collect();

        let count = built.len();
        for mesh in built {
            self.insert(mesh);
        }
        count
    }

    /// Rebuild up to `quota` chunks from the world's remesh queue and drop
    /// meshes whose chunk has been unloaded.
    pub fn update(&mut self, world: &World, quota: usize) -> usize {
        let chunks = world.chunks();
        let before = self.meshes.len();
        self.meshes.retain(|pos, _| chunks.contains(*pos));
        if self.meshes.len() != before {
            self.revision += 1;
        }

        let batch = world.take_mesh_batch(quota);
        if batch.is_empty() {
            return 0;
        }
        let built = self.rebuild(chunks, &batch);
        debug!(built, queued = world.pending_mesh_count(), "Rebuilt chunk meshes");
        built
    }

    /// Total triangles across all cached meshes.
    pub fn triangle_count(&self) -> usize {
        self.meshes.values().map(|m| m.triangle_count()).sum()
    }
}

impl OcclusionSource for MeshCache {
    fn occlusion(&self, pos: SegmentPos) -> Option<FaceMask> {
        if !pos.in_world() {
            return None;
        }
        self.meshes
            .get(&pos.chunk_pos())
            .map(|mesh| mesh.occlusion(pos.local_index()))
    }
}
