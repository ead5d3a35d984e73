//! Coordinate systems for the voxel world.

use crate::constants::{
    CHUNK_BITS, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, SEGMENTS_X, SEGMENTS_Y, SEGMENTS_Z,
    SEGMENT_BITS, SEGMENT_SIZE,
};
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// One of the six axis-aligned cube faces.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    NegX = 0,
    PosX = 1,
    NegY = 2,
    PosY = 3,
    NegZ = 4,
    PosZ = 5,
}

impl Direction {
    /// All six directions in index order.
    pub const ALL: [Self; 6] = [
        Self::NegX,
        Self::PosX,
        Self::NegY,
        Self::PosY,
        Self::NegZ,
        Self::PosZ,
    ];

    /// The four horizontal directions.
    pub const HORIZONTAL: [Self; 4] = [Self::NegX, Self::PosX, Self::NegZ, Self::PosZ];

    /// Index of this direction (0..6).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Direction from its index, if in range.
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::NegX),
            1 => Some(Self::PosX),
            2 => Some(Self::NegY),
            3 => Some(Self::PosY),
            4 => Some(Self::NegZ),
            5 => Some(Self::PosZ),
            _ => None,
        }
    }

    /// Unit offset along this direction.
    #[inline]
    pub const fn offset(self) -> IVec3 {
        match self {
            Self::NegX => IVec3::new(-1, 0, 0),
            Self::PosX => IVec3::new(1, 0, 0),
            Self::NegY => IVec3::new(0, -1, 0),
            Self::PosY => IVec3::new(0, 1, 0),
            Self::NegZ => IVec3::new(0, 0, -1),
            Self::PosZ => IVec3::new(0, 0, 1),
        }
    }

    /// The direction pointing the other way.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Self::NegX => Self::PosX,
            Self::PosX => Self::NegX,
            Self::NegY => Self::PosY,
            Self::PosY => Self::NegY,
            Self::NegZ => Self::PosZ,
            Self::PosZ => Self::NegZ,
        }
    }

    /// Axis index (0 = X, 1 = Y, 2 = Z).
    #[inline]
    pub const fn axis(self) -> usize {
        (self as usize) >> 1
    }

    /// Whether this direction points along the positive axis.
    #[inline]
    pub const fn is_positive(self) -> bool {
        (self as usize) & 1 == 1
    }

    /// Occlusion mask bit for this face.
    #[inline]
    pub const fn mask(self) -> FaceMask {
        FaceMask::from_bits_truncate(1 << (self as u8))
    }
}

bitflags! {
    /// Six-bit set of cube faces, one bit per [`Direction`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FaceMask: u8 {
        const NEG_X = 1 << 0;
        const POS_X = 1 << 1;
        const NEG_Y = 1 << 2;
        const POS_Y = 1 << 3;
        const NEG_Z = 1 << 4;
        const POS_Z = 1 << 5;
    }
}

impl FaceMask {
    /// Whether the face in `dir` is set.
    #[inline]
    pub const fn has(self, dir: Direction) -> bool {
        self.bits() & dir.mask().bits() != 0
    }
}

/// Position within a chunk (x, z in 0..16, y in 0..128).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    _pad: u8,
}

impl LocalPos {
    /// Create a new local position
    #[inline]
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        debug_assert!((x as usize) < CHUNK_WIDTH);
        debug_assert!((y as usize) < CHUNK_HEIGHT);
        debug_assert!((z as usize) < CHUNK_DEPTH);
        Self { x, y, z, _pad: 0 }
    }

    /// Create from signed coordinates, returning `None` outside the chunk.
    #[inline]
    pub const fn checked(x: i32, y: i32, z: i32) -> Option<Self> {
        if x < 0
            || y < 0
            || z < 0
            || x >= CHUNK_WIDTH as i32
            || y >= CHUNK_HEIGHT as i32
            || z >= CHUNK_DEPTH as i32
        {
            return None;
        }
        Some(Self::new(x as u8, y as u8, z as u8))
    }

    /// Convert to linear index for flat array storage (`x + 16 * (z + 16 * y)`)
    #[inline]
    pub const fn to_index(self) -> usize {
        self.x as usize + CHUNK_WIDTH * (self.z as usize + CHUNK_DEPTH * self.y as usize)
    }

    /// Create from linear index
    #[inline]
    pub const fn from_index(index: usize) -> Self {
        let x = (index % CHUNK_WIDTH) as u8;
        let z = ((index / CHUNK_WIDTH) % CHUNK_DEPTH) as u8;
        let y = (index / (CHUNK_WIDTH * CHUNK_DEPTH)) as u8;
        Self { x, y, z, _pad: 0 }
    }

    /// Signed coordinates of this position.
    #[inline]
    pub const fn to_ivec3(self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }
}

/// Chunk position in chunk coordinates. Chunks span the full world height.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    /// Create a new chunk position
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// World position of the chunk's minimum corner
    #[inline]
    pub const fn origin(self) -> WorldPos {
        WorldPos::new(self.x << CHUNK_BITS, 0, self.z << CHUNK_BITS)
    }

    /// Offset by a number of chunks
    #[inline]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// Get the four orthogonally neighboring chunk positions (-X, +X, -Z, +Z)
    pub const fn neighbors(self) -> [Self; 4] {
        [
            Self::new(self.x - 1, self.z),
            Self::new(self.x + 1, self.z),
            Self::new(self.x, self.z - 1),
            Self::new(self.x, self.z + 1),
        ]
    }

    /// Chebyshev distance in chunks
    #[inline]
    pub const fn chebyshev_distance(self, other: Self) -> i32 {
        let dx = (self.x - other.x).abs();
        let dz = (self.z - other.z).abs();
        if dx > dz {
            dx
        } else {
            dz
        }
    }

    /// Manhattan distance in voxels from a world column to this chunk's footprint
    pub fn manhattan_to_column(self, x: i32, z: i32) -> i32 {
        let origin = self.origin();
        let dx = axis_gap(x, origin.x, origin.x + CHUNK_WIDTH as i32 - 1);
        let dz = axis_gap(z, origin.z, origin.z + CHUNK_DEPTH as i32 - 1);
        dx + dz
    }
}

#[inline]
const fn axis_gap(value: i32, min: i32, max: i32) -> i32 {
    if value < min {
        min - value
    } else if value > max {
        value - max
    } else {
        0
    }
}

/// World position in voxel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl WorldPos {
    /// Create a new world position
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Get the chunk containing this position
    #[inline]
    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(self.x >> CHUNK_BITS, self.z >> CHUNK_BITS)
    }

    /// Get the local position within the chunk, `None` when y is outside the world
    #[inline]
    pub const fn local_pos(self) -> Option<LocalPos> {
        let mask = (CHUNK_WIDTH - 1) as i32;
        LocalPos::checked(self.x & mask, self.y, self.z & mask)
    }

    /// Split into chunk and local position
    #[inline]
    pub const fn split(self) -> Option<(ChunkPos, LocalPos)> {
        match self.local_pos() {
            Some(local) => Some((self.chunk_pos(), local)),
            None => None,
        }
    }

    /// Create from chunk and local position
    #[inline]
    pub const fn from_chunk_local(chunk: ChunkPos, local: LocalPos) -> Self {
        Self::new(
            (chunk.x << CHUNK_BITS) + local.x as i32,
            local.y as i32,
            (chunk.z << CHUNK_BITS) + local.z as i32,
        )
    }

    /// Step one voxel in a direction
    #[inline]
    pub fn step(self, dir: Direction) -> Self {
        let o = dir.offset();
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    /// Segment containing this voxel
    #[inline]
    pub const fn segment_pos(self) -> SegmentPos {
        SegmentPos::new(
            self.x >> SEGMENT_BITS,
            self.y >> SEGMENT_BITS,
            self.z >> SEGMENT_BITS,
        )
    }

    /// Convert to floating point Vec3
    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

impl From<Vec3> for WorldPos {
    fn from(v: Vec3) -> Self {
        Self::new(v.x.floor() as i32, v.y.floor() as i32, v.z.floor() as i32)
    }
}

/// Position of a 4x4x4 segment in world segment coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SegmentPos {
    /// Create a new segment position
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Segment containing a world-space point
    #[inline]
    pub fn containing(point: Vec3) -> Self {
        WorldPos::from(point).segment_pos()
    }

    /// Rebuild a world segment position from a chunk and a local segment index
    #[inline]
    pub const fn from_chunk_index(chunk: ChunkPos, index: usize) -> Self {
        let sx = (index % SEGMENTS_X) as i32;
        let sz = ((index / SEGMENTS_X) % SEGMENTS_Z) as i32;
        let sy = (index / (SEGMENTS_X * SEGMENTS_Z)) as i32;
        Self::new(
            chunk.x * SEGMENTS_X as i32 + sx,
            sy,
            chunk.z * SEGMENTS_Z as i32 + sz,
        )
    }

    /// Chunk owning this segment
    #[inline]
    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(
            self.x >> (CHUNK_BITS - SEGMENT_BITS),
            self.z >> (CHUNK_BITS - SEGMENT_BITS),
        )
    }

    /// Index of this segment inside its chunk (`sx + 4 * (sz + 4 * sy)`)
    #[inline]
    pub const fn local_index(self) -> usize {
        let sx = (self.x & (SEGMENTS_X as i32 - 1)) as usize;
        let sz = (self.z & (SEGMENTS_Z as i32 - 1)) as usize;
        sx + SEGMENTS_X * (sz + SEGMENTS_Z * self.y as usize)
    }

    /// Whether the segment lies inside the world's vertical range
    #[inline]
    pub const fn in_world(self) -> bool {
        self.y >= 0 && self.y < SEGMENTS_Y as i32
    }

    /// Step one segment in a direction
    #[inline]
    pub fn step(self, dir: Direction) -> Self {
        let o = dir.offset();
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    /// World-space minimum corner
    #[inline]
    pub fn min_corner(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32) * SEGMENT_SIZE as f32
    }
}
