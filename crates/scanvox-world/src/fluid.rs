//! Cellular fluid flow.
//!
//! Fluid cells carry a fill level and the direction of the cell they flowed
//! from. Every write near a fluid re-activates the surrounding cells; each
//! tick the simulator re-evaluates a bounded number of active cells, letting
//! fluid fall, spread sideways, or decay once its parent has gone.

use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::Mutex;
use scanvox_core::constants::FLUID_SOURCE_LEVEL;
use scanvox_core::coords::{Direction, WorldPos};
use scanvox_core::types::{Fluid, FluidMeta, Voxel};
use tracing::trace;

use crate::world::{VoxelListener, World};

/// Default number of cells evaluated per tick.
pub const DEFAULT_TICK_BUDGET: usize = 256;

/// Level given to fluid falling into the cell below.
const FALLING_LEVEL: u8 = FLUID_SOURCE_LEVEL - 1;

/// Cells waiting to be re-evaluated.
#[derive(Default)]
struct FluidActivity {
    cells: Mutex<ActiveCells>,
}

#[derive(Default)]
struct ActiveCells {
    queue: VecDeque<WorldPos>,
    queued: HashSet<WorldPos>,
}

impl FluidActivity {
    fn activate(&self, pos: WorldPos) {
        let mut cells = self.cells.lock();
        if cells.queued.insert(pos) {
            cells.queue.push_back(pos);
        }
    }

    fn take(&self, budget: usize) -> Vec<WorldPos> {
        let mut cells = self.cells.lock();
        let count = budget.min(cells.queue.len());
        let batch: Vec<WorldPos> = cells.queue.drain(..count).collect();
        for pos in &batch {
            cells.queued.remove(pos);
        }
        batch
    }

    fn len(&self) -> usize {
        self.cells.lock().queue.len()
    }
}

impl VoxelListener for FluidActivity {
    fn voxel_written(&self, pos: WorldPos, _old: Voxel, _new: Voxel) {
        self.activate(pos);
        for dir in Direction::ALL {
            self.activate(pos.step(dir));
        }
    }
}

/// Fluid simulator attached to a [`World`] as a voxel listener.
pub struct FluidSimulator {
    activity: Arc<FluidActivity>,
    budget: usize,
}

impl FluidSimulator {
    /// Create a simulator and register it on the world.
    pub fn attach(world: &World) -> Self {
        let activity = Arc::new(FluidActivity::default());
        world.add_listener(activity.clone());
        Self {
            activity,
            budget: DEFAULT_TICK_BUDGET,
        }
    }

    /// Set the number of cells evaluated per tick.
    #[must_use]
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget.max(1);
        self
    }

    /// Queue a cell for evaluation on the next tick.
    pub fn activate(&self, pos: WorldPos) {
        self.activity.activate(pos);
    }

    /// Number of cells waiting for evaluation.
    pub fn pending(&self) -> usize {
        self.activity.len()
    }

    /// Evaluate up to the tick budget of active cells.
    ///
    /// Returns the number of voxels written.
    pub fn tick(&self, world: &World) -> usize {
        let batch = self.activity.take(self.budget);
        if batch.is_empty() {
            return 0;
        }
        let writes: usize = batch.iter().map(|&pos| update_cell(world, pos)).sum();
        trace!(evaluated = batch.len(), writes, "Fluid tick");
        writes
    }
}

fn update_cell(world: &World, pos: WorldPos) -> usize {
    let Some(voxel) = world.voxel_if_loaded(pos) else {
        return 0;
    };
    let Some(fluid) = voxel.block.fluid() else {
        return 0;
    };
    let meta = voxel.metadata;

    if !meta.is_source() && !is_supported(world, pos, fluid, meta) {
        return usize::from(world.set_voxel(pos, Voxel::AIR).is_some());
    }

    let below = pos.step(Direction::NegY);
    match world.voxel_if_loaded(below) {
        Some(v) if v.is_air() => {
            let falling = Voxel::with_metadata(
                fluid.block(),
                FluidMeta::new(FALLING_LEVEL, Some(Direction::PosY)),
            );
            return usize::from(world.set_voxel(below, falling).is_some());
        }
        Some(v) if v.block.fluid() == Some(fluid) => return 0,
        _ => {}
    }

    let level = meta.level();
    if level <= 1 {
        return 0;
    }
    let spread = level - 1;
    let mut writes = 0;
    for dir in Direction::HORIZONTAL {
        let target = pos.step(dir);
        let Some(existing) = world.voxel_if_loaded(target) else {
            continue;
        };
        let flows = existing.is_air()
            || (existing.block.fluid() == Some(fluid)
                && !existing.metadata.is_source()
                && existing.metadata.level() < spread);
        if flows {
            let meta = FluidMeta::new(spread, Some(dir.opposite()));
            let child = Voxel::with_metadata(fluid.block(), meta);
            if world.set_voxel(target, child).is_some() {
                writes += 1;
            }
        }
    }
    writes
}

/// A non-source cell is supported while its parent is the same fluid and
/// either above it or at a higher level. Parents in unloaded chunks count as
/// support so fluid never drains across the load boundary.
fn is_supported(world: &World, pos: WorldPos, fluid: Fluid, meta: FluidMeta) -> bool {
    let Some(parent_dir) = meta.parent() else {
        return false;
    };
    let Some(parent) = world.voxel_if_loaded(pos.step(parent_dir)) else {
        return true;
    };
    if parent.block.fluid() != Some(fluid) {
        return false;
    }
    parent_dir == Direction::PosY || parent.metadata.level() > meta.level()
}
