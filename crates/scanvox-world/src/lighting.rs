//! BFS flood-fill lighting.
//!
//! Each chunk's light array is recomputed from scratch: sky light is seeded
//! by walking every column down from the top of the world, block light is
//! seeded at emitters, light is imported from the border layers of loaded
//! neighbours, and a breadth-first relaxation spreads both channels through
//! every cell that transmits light. The result is published with a single
//! array copy under the chunk map's write lock.

use std::collections::VecDeque;

use scanvox_core::constants::{
    CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_VOLUME, CHUNK_WIDTH, LIGHT_RANGE, MAX_LIGHT,
};
use scanvox_core::coords::{ChunkPos, Direction, LocalPos, WorldPos};
use scanvox_core::types::{BlockId, Light};
use tracing::trace;

use crate::chunk::{Chunk, ChunkState};
use crate::chunk_manager::{ChunkManager, Neighborhood};

/// Recomputes the light of one chunk in a chunk map.
pub trait LightProcessor: Send + Sync {
    /// Relight `pos` against its currently loaded neighbours.
    ///
    /// Returns whether the published light changed. Missing chunks are a no-op.
    fn relight(&self, chunks: &ChunkManager, pos: ChunkPos) -> bool;
}

/// How many passes to run over a set of chunks after an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelightStrategy {
    /// A fixed number of passes. Light may under-propagate across long seams.
    FixedPasses(u32),
    /// Repeat passes until no chunk changes, up to a cap.
    UntilStable { max_passes: u32 },
}

impl Default for RelightStrategy {
    fn default() -> Self {
        Self::FixedPasses(3)
    }
}

impl RelightStrategy {
    const fn max_passes(self) -> u32 {
        match self {
            Self::FixedPasses(n) | Self::UntilStable { max_passes: n } => n,
        }
    }
}

/// Outcome of relighting a set of chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelightReport {
    /// Passes actually run.
    pub passes: u32,
    /// Chunks whose light changed in any pass, without duplicates.
    pub changed: Vec<ChunkPos>,
}

impl RelightReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.passes = self.passes.max(other.passes);
        for pos in other.changed {
            if !self.changed.contains(&pos) {
                self.changed.push(pos);
            }
        }
    }
}

/// Default flood-fill light processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightEngine;

impl LightEngine {
    /// Create a new light engine.
    pub const fn new() -> Self {
        Self
    }

    /// Compute the light array of the neighbourhood's center chunk.
    pub fn compute(&self, hood: &Neighborhood<'_>) -> Vec<Light> {
        let chunk = hood.center();
        let blocks = chunk.blocks();
        let metadata = chunk.metadata_slice();
        let mut light = vec![Light::DARK; CHUNK_VOLUME];
        let mut queue: VecDeque<u32> = VecDeque::with_capacity(4096);

        seed_sky(blocks, &mut light, &mut queue);

        for (index, (block, meta)) in blocks.iter().zip(metadata).enumerate() {
            let emission = block.emission(*meta);
            if emission > 0 {
                light[index] = light[index].max(Light::new(0, emission));
                queue.push_back(index as u32);
            }
        }

        import_borders(hood, blocks, &mut light, &mut queue);
        propagate(blocks, &mut light, &mut queue);
        light
    }

    /// Light a chunk on its own, ignoring neighbours.
    ///
    /// Used by the chunk workers before a chunk joins the shared map.
    pub fn light_isolated(&self, chunk: &mut Chunk) {
        let scratch = self.compute(&Neighborhood::isolated(chunk));
        chunk.publish_light(&scratch);
        chunk.state = ChunkState::Lit;
    }
}

impl LightProcessor for LightEngine {
    fn relight(&self, chunks: &ChunkManager, pos: ChunkPos) -> bool {
        let Some(scratch) = chunks.with_neighborhood(pos, |hood| self.compute(hood)) else {
            return false;
        };
        chunks
            .with_chunk_mut(pos, |chunk| {
                chunk.state = ChunkState::Ready;
                chunk.publish_light(&scratch)
            })
            .unwrap_or(false)
    }
}

/// Relight a set of chunks using the given strategy.
pub fn relight_area(
    processor: &dyn LightProcessor,
    chunks: &ChunkManager,
    positions: &[ChunkPos],
    strategy: RelightStrategy,
) -> RelightReport {
    let _span = tracing::trace_span!("relight_area", chunks = positions.len()).entered();
    let mut report = RelightReport::default();
    for _ in 0..strategy.max_passes() {
        report.passes += 1;
        let mut any_changed = false;
        for &pos in positions {
            if processor.relight(chunks, pos) {
                any_changed = true;
                if !report.changed.contains(&pos) {
                    report.changed.push(pos);
                }
            }
        }
        if !any_changed && matches!(strategy, RelightStrategy::UntilStable { .. }) {
            break;
        }
    }
    trace!(passes = report.passes, changed = report.changed.len(), "Relit area");
    report
}

/// Loaded chunks whose light can be affected by an edit at `edit`.
///
/// This is the edit's own chunk plus every neighbour whose horizontal
/// footprint lies within light range of the edited column.
pub fn affected_chunks(chunks: &ChunkManager, edit: WorldPos) -> Vec<ChunkPos> {
    let home = edit.chunk_pos();
    let mut affected = Vec::with_capacity(9);
    for dz in -1..=1 {
        for dx in -1..=1 {
            let pos = home.offset(dx, dz);
            if pos.manhattan_to_column(edit.x, edit.z) <= LIGHT_RANGE && chunks.contains(pos) {
                affected.push(pos);
            }
        }
    }
    affected
}

fn seed_sky(blocks: &[BlockId], light: &mut [Light], queue: &mut VecDeque<u32>) {
    for z in 0..CHUNK_DEPTH as u8 {
        for x in 0..CHUNK_WIDTH as u8 {
            for y in (0..CHUNK_HEIGHT as u8).rev() {
                let index = LocalPos::new(x, y, z).to_index();
                let block = blocks[index];
                if block.is_air() {
                    light[index] = Light::SKY;
                    queue.push_back(index as u32);
                } else if !block.transmits_light() {
                    break;
                }
            }
        }
    }
}

fn import_borders(
    hood: &Neighborhood<'_>,
    blocks: &[BlockId],
    light: &mut [Light],
    queue: &mut VecDeque<u32>,
) {
    let last = CHUNK_WIDTH as u8 - 1;
    for dir in Direction::HORIZONTAL {
        let offset = dir.offset();
        let Some(neighbor) = hood.neighbor(offset.x, offset.z) else {
            continue;
        };
        for y in 0..CHUNK_HEIGHT as u8 {
            for i in 0..CHUNK_WIDTH as u8 {
                let (here, there) = match dir {
                    Direction::NegX => (LocalPos::new(0, y, i), LocalPos::new(last, y, i)),
                    Direction::PosX => (LocalPos::new(last, y, i), LocalPos::new(0, y, i)),
                    Direction::NegZ => (LocalPos::new(i, y, 0), LocalPos::new(i, y, last)),
                    _ => (LocalPos::new(i, y, last), LocalPos::new(i, y, 0)),
                };
                let index = here.to_index();
                if raise(light, blocks, index, neighbor.light(there)) {
                    queue.push_back(index as u32);
                }
            }
        }
    }
}

fn propagate(blocks: &[BlockId], light: &mut [Light], queue: &mut VecDeque<u32>) {
    while let Some(index) = queue.pop_front() {
        let source = light[index as usize];
        if source.sky() <= 1 && source.block() <= 1 {
            continue;
        }
        let pos = LocalPos::from_index(index as usize).to_ivec3();
        for dir in Direction::ALL {
            let next = pos + dir.offset();
            let Some(next) = LocalPos::checked(next.x, next.y, next.z) else {
                continue;
            };
            let next = next.to_index();
            if raise(light, blocks, next, source) {
                queue.push_back(next as u32);
            }
        }
    }
}

/// Offer `source` (attenuated by the target's absorption) to a cell.
/// Returns whether either channel increased.
#[inline]
fn raise(light: &mut [Light], blocks: &[BlockId], index: usize, source: Light) -> bool {
    let block = blocks[index];
    if !block.transmits_light() {
        return false;
    }
    let absorption = block.absorption();
    let candidate = Light::new(
        source.sky().saturating_sub(absorption),
        source.block().saturating_sub(absorption),
    );
    let current = light[index];
    let raised = current.max(candidate);
    if raised == current {
        return false;
    }
    debug_assert!(raised.sky() <= MAX_LIGHT && raised.block() <= MAX_LIGHT);
    light[index] = raised;
    true
}
