//! Procedural terrain generation.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rayon::prelude::*;
use scanvox_core::constants::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH};
use scanvox_core::coords::{ChunkPos, LocalPos};
use scanvox_core::types::{BlockId, Fluid, Voxel};

use crate::chunk::Chunk;
use crate::WorldSeed;

/// Produces the blocks and metadata of a chunk. Light is left dark.
pub trait ChunkGenerator: Send + Sync {
    /// Generate the chunk at `pos`.
    fn generate(&self, pos: ChunkPos) -> Chunk;
}

/// Surface colours.
const GRASS: BlockId = BlockId::from_rgb(0x5F, 0xA0, 0x4E);
const DIRT: BlockId = BlockId::from_rgb(0x7A, 0x5A, 0x3A);
const SAND: BlockId = BlockId::from_rgb(0xDC, 0xCB, 0x8E);
const STONE: BlockId = BlockId::from_rgb(0x80, 0x80, 0x80);
const BEDROCK: BlockId = BlockId::from_rgb(0x30, 0x30, 0x30);

/// Terrain generator configuration.
#[derive(Debug, Clone)]
pub struct TerrainConfig {
    /// Seed for noise generation.
    pub seed: WorldSeed,
    /// Sea level (Y coordinate). Columns below it are filled with water.
    pub sea_level: i32,
    /// Horizontal scale of terrain features.
    pub terrain_scale: f64,
    /// Peak-to-trough terrain height variation.
    pub terrain_height: f64,
    /// Number of noise octaves for detail.
    pub octaves: usize,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Depth of dirt layer below surface.
    pub dirt_depth: u32,
    /// One dry surface column in this many gets a lamp. 0 disables lamps.
    pub lamp_rarity: u64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            sea_level: 48,
            terrain_scale: 80.0,
            terrain_height: 48.0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            dirt_depth: 3,
            lamp_rarity: 509,
        }
    }
}

/// Procedural terrain generator using fractal noise.
#[derive(Clone)]
pub struct TerrainGenerator {
    config: TerrainConfig,
    height_noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given configuration.
    pub fn new(config: TerrainConfig) -> Self {
        let height_noise = Fbm::<Perlin>::new(config.seed as u32)
            .set_octaves(config.octaves)
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.persistence);

        Self {
            config,
            height_noise,
        }
    }

    /// Create a terrain generator with default configuration.
    pub fn with_seed(seed: WorldSeed) -> Self {
        Self::new(TerrainConfig {
            seed,
            ..Default::default()
        })
    }

    /// Get the terrain configuration.
    pub const fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Get terrain height at world XZ coordinates.
    ///
    /// Returns the Y coordinate of the topmost solid block, clamped so that
    /// at least a few air layers remain above it.
    pub fn height_at(&self, world_x: i32, world_z: i32) -> i32 {
        let nx = f64::from(world_x) / self.config.terrain_scale;
        let nz = f64::from(world_z) / self.config.terrain_scale;

        // Noise returns roughly [-1, 1], centered on sea level
        let noise_value = self.height_noise.get([nx, nz]);
        let height =
            (noise_value * 0.5 * self.config.terrain_height) as i32 + self.config.sea_level;
        height.clamp(1, CHUNK_HEIGHT as i32 - 8)
    }

    /// Determine block type at a given world Y relative to surface height.
    fn block_at_depth(&self, world_y: i32, surface_height: i32) -> BlockId {
        let beach = surface_height <= self.config.sea_level + 1;
        if world_y == 0 {
            BEDROCK
        } else if world_y > surface_height {
            BlockId::AIR
        } else if world_y == surface_height {
            if beach {
                SAND
            } else {
                GRASS
            }
        } else if world_y > surface_height - self.config.dirt_depth as i32 {
            if beach {
                SAND
            } else {
                DIRT
            }
        } else {
            STONE
        }
    }

    fn has_lamp(&self, world_x: i32, world_z: i32) -> bool {
        self.config.lamp_rarity != 0
            && column_hash(self.config.seed, world_x, world_z) % self.config.lamp_rarity == 0
    }

    /// Generate a chunk's blocks at the given position.
    pub fn generate_chunk(&self, pos: ChunkPos) -> Chunk {
        let mut chunk = Chunk::new(pos);
        let origin = pos.origin();
        let water = Voxel::fluid_source(Fluid::Water);

        for lz in 0..CHUNK_DEPTH as u8 {
            for lx in 0..CHUNK_WIDTH as u8 {
                let world_x = origin.x + i32::from(lx);
                let world_z = origin.z + i32::from(lz);
                let surface = self.height_at(world_x, world_z);

                for ly in 0..CHUNK_HEIGHT as u8 {
                    let y = i32::from(ly);
                    let local = LocalPos::new(lx, ly, lz);
                    let block = self.block_at_depth(y, surface);
                    if !block.is_air() {
                        chunk.set_block(local, block);
                    } else if y <= self.config.sea_level {
                        chunk.set_voxel(local, water);
                    }
                }

                if surface > self.config.sea_level && self.has_lamp(world_x, world_z) {
                    chunk.set_block(LocalPos::new(lx, (surface + 1) as u8, lz), BlockId::LAMP);
                }
            }
        }

        chunk.clear_modified();
        chunk
    }

    /// Generate multiple chunks in parallel.
    pub fn generate_chunks_parallel(&self, positions: &[ChunkPos]) -> Vec<Chunk> {
        positions
            .par_iter()
            .map(|&pos| self.generate_chunk(pos))
            .collect()
    }
}

impl ChunkGenerator for TerrainGenerator {
    fn generate(&self, pos: ChunkPos) -> Chunk {
        self.generate_chunk(pos)
    }
}

/// SplitMix64 over the seed and column coordinates.
fn column_hash(seed: WorldSeed, x: i32, z: i32) -> u64 {
    let mut h = seed
        ^ ((u64::from(x as u32) << 32) | u64::from(z as u32)).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_deterministic() {
        let gen1 = TerrainGenerator::with_seed(12345);
        let gen2 = TerrainGenerator::with_seed(12345);

        // Same seed should produce same heights
        for x in -100..100 {
            for z in -100..100 {
                assert_eq!(gen1.height_at(x, z), gen2.height_at(x, z));
            }
        }
    }

    #[test]
    fn different_seeds_different_terrain() {
        let gen1 = TerrainGenerator::with_seed(12345);
        let gen2 = TerrainGenerator::with_seed(54321);

        // Different seeds should produce different heights (statistically)
        let mut differences = 0;
        for x in 0..10 {
            for z in 0..10 {
                if gen1.height_at(x * 7, z * 7) != gen2.height_at(x * 7, z * 7) {
                    differences += 1;
                }
            }
        }
        assert!(differences > 50, "Seeds should produce different terrain");
    }

    #[test]
    fn chunk_has_ground_and_open_sky() {
        let gen = TerrainGenerator::with_seed(42);
        let chunk = gen.generate_chunk(ChunkPos::new(0, 0));

        assert!(!chunk.is_empty());
        assert!(!chunk.is_modified());
        for z in 0..16 {
            for x in 0..16 {
                assert_eq!(chunk.block(LocalPos::new(x, 0, z)), BEDROCK);
                assert!(chunk.block(LocalPos::new(x, 127, z)).is_air());
            }
        }
    }

    #[test]
    fn columns_below_sea_level_hold_water() {
        let gen = TerrainGenerator::with_seed(7);
        let sea = gen.config().sea_level;
        let chunk = gen.generate_chunk(ChunkPos::new(3, -2));
        let origin = chunk.pos.origin();

        for z in 0..16u8 {
            for x in 0..16u8 {
                let surface = gen.height_at(origin.x + i32::from(x), origin.z + i32::from(z));
                for y in (surface + 1)..=sea {
                    assert_eq!(chunk.block(LocalPos::new(x, y as u8, z)), BlockId::WATER);
                }
                let top = chunk.voxel(LocalPos::new(x, (sea.max(surface) + 2) as u8, z));
                assert!(top.is_air());
            }
        }
    }

    #[test]
    fn parallel_generation_matches_sequential() {
        let gen = TerrainGenerator::with_seed(42);
        let positions = vec![ChunkPos::new(0, 0), ChunkPos::new(1, 0), ChunkPos::new(0, 1)];

        for chunk in gen.generate_chunks_parallel(&positions) {
            let sequential = gen.generate_chunk(chunk.pos);
            assert_eq!(chunk.blocks(), sequential.blocks());
            assert_eq!(chunk.metadata_slice(), sequential.metadata_slice());
        }
    }
}
