//! Core voxel types: block ids, packed light, and fluid metadata.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::constants::{FLUID_SOURCE_LEVEL, MAX_LIGHT};
use crate::coords::Direction;

/// Block value stored in a chunk.
///
/// `0` is air, `1..=255` are reserved special blocks, and every other value is
/// a packed `0xAARRGGBB` colour block.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct BlockId(pub i32);

impl BlockId {
    /// Air block (empty space)
    pub const AIR: Self = Self(0);
    /// Water, a translucent fluid
    pub const WATER: Self = Self(1);
    /// Lava, a glowing fluid
    pub const LAVA: Self = Self(2);
    /// Lamp, an opaque emissive block
    pub const LAMP: Self = Self(3);
    /// Glass, a translucent solid
    pub const GLASS: Self = Self(4);
    /// Highest id reserved for special blocks
    pub const SPECIAL_MAX: i32 = 255;

    /// Create an opaque colour block
    #[inline]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb(0xFF, r, g, b)
    }

    /// Create a colour block with alpha
    #[inline]
    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        let packed = (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32;
        Self(packed as i32)
    }

    /// Returns true if this block is air (empty)
    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }

    /// Returns true for the reserved low ids
    #[inline]
    pub const fn is_special(self) -> bool {
        self.0 > 0 && self.0 <= Self::SPECIAL_MAX
    }

    /// The fluid this block is made of, if any
    #[inline]
    pub const fn fluid(self) -> Option<Fluid> {
        match self {
            Self::WATER => Some(Fluid::Water),
            Self::LAVA => Some(Fluid::Lava),
            _ => None,
        }
    }

    /// Returns true for fluid blocks
    #[inline]
    pub const fn is_fluid(self) -> bool {
        self.fluid().is_some()
    }

    /// Packed `0xAARRGGBB` colour used for shading
    #[inline]
    pub const fn argb(self) -> u32 {
        match self {
            Self::AIR => 0,
            Self::WATER => 0xA0_2F_5F_C8,
            Self::LAVA => 0xFF_E8_5A_10,
            Self::LAMP => 0xFF_F5_E0_8A,
            Self::GLASS => 0x60_C8_E6_F0,
            _ if self.is_special() => 0xFF_FF_00_FF,
            _ => self.0 as u32,
        }
    }

    /// Alpha channel of the block colour
    #[inline]
    pub const fn alpha(self) -> u8 {
        (self.argb() >> 24) as u8
    }

    /// Fully opaque blocks hide faces behind them and stop light.
    #[inline]
    pub const fn is_opaque(self) -> bool {
        !self.is_air() && !self.is_fluid() && self.alpha() == 0xFF
    }

    /// Non-air blocks drawn in the alpha-blended pass
    #[inline]
    pub const fn is_translucent(self) -> bool {
        !self.is_air() && self.alpha() < 0xFF
    }

    /// Light passes through air, fluids and translucent blocks
    #[inline]
    pub const fn transmits_light(self) -> bool {
        !self.is_opaque()
    }

    /// Light lost when entering this block
    #[inline]
    pub const fn absorption(self) -> u8 {
        if self.is_fluid() {
            2
        } else {
            1
        }
    }

    /// Block light emitted by this block given its metadata
    #[inline]
    pub const fn emission(self, meta: FluidMeta) -> u8 {
        match self {
            Self::LAMP => MAX_LIGHT,
            _ => match self.fluid() {
                Some(fluid) => fluid.emission(meta.level()),
                None => 0,
            },
        }
    }
}

/// Fluid kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fluid {
    Water,
    Lava,
}

impl Fluid {
    /// Block id of this fluid
    #[inline]
    pub const fn block(self) -> BlockId {
        match self {
            Self::Water => BlockId::WATER,
            Self::Lava => BlockId::LAVA,
        }
    }

    /// Block light emitted at a fill level (0..=8)
    #[inline]
    pub const fn emission(self, level: u8) -> u8 {
        match self {
            Self::Water => 0,
            Self::Lava => {
                let level = if level > FLUID_SOURCE_LEVEL {
                    FLUID_SOURCE_LEVEL
                } else {
                    level
                };
                ((level as u16 * MAX_LIGHT as u16 + 7) / FLUID_SOURCE_LEVEL as u16) as u8
            }
        }
    }
}

/// Packed light value: sky light in the high nibble, block light in the low nibble.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Light(pub u8);

impl Light {
    /// No light at all
    pub const DARK: Self = Self(0);
    /// Full sky light, no block light. Used for unloaded and out-of-range cells.
    pub const SKY: Self = Self(MAX_LIGHT << 4);
    /// Both channels at maximum
    pub const FULL: Self = Self(0xFF);

    /// Pack two channels, clamping each to 0..=15
    #[inline]
    pub const fn new(sky: u8, block: u8) -> Self {
        let sky = if sky > MAX_LIGHT { MAX_LIGHT } else { sky };
        let block = if block > MAX_LIGHT { MAX_LIGHT } else { block };
        Self(sky << 4 | block)
    }

    /// Sky light channel (0..=15)
    #[inline]
    pub const fn sky(self) -> u8 {
        self.0 >> 4
    }

    /// Block light channel (0..=15)
    #[inline]
    pub const fn block(self) -> u8 {
        self.0 & 0x0F
    }

    /// Per-channel maximum of two light values
    #[inline]
    pub const fn max(self, other: Self) -> Self {
        let sky = if self.sky() > other.sky() {
            self.sky()
        } else {
            other.sky()
        };
        let block = if self.block() > other.block() {
            self.block()
        } else {
            other.block()
        };
        Self::new(sky, block)
    }
}

/// Fluid metadata byte: fill level in the low nibble, parent direction in the high nibble.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct FluidMeta(pub u8);

impl FluidMeta {
    /// Full source block without a parent
    pub const SOURCE: Self = Self(FLUID_SOURCE_LEVEL);

    /// Pack a level (clamped to 0..=8) and an optional parent direction
    #[inline]
    pub const fn new(level: u8, parent: Option<Direction>) -> Self {
        let level = if level > FLUID_SOURCE_LEVEL {
            FLUID_SOURCE_LEVEL
        } else {
            level
        };
        let parent = match parent {
            Some(dir) => dir as u8 + 1,
            None => 0,
        };
        Self(parent << 4 | level)
    }

    /// Fill level (0..=8)
    #[inline]
    pub const fn level(self) -> u8 {
        let level = self.0 & 0x0F;
        if level > FLUID_SOURCE_LEVEL {
            FLUID_SOURCE_LEVEL
        } else {
            level
        }
    }

    /// Direction of the cell this fluid flowed from
    #[inline]
    pub const fn parent(self) -> Option<Direction> {
        match self.0 >> 4 {
            0 => None,
            n => Direction::from_index(n as usize - 1),
        }
    }

    /// Whether this is a source block
    #[inline]
    pub const fn is_source(self) -> bool {
        self.level() == FLUID_SOURCE_LEVEL
    }
}

/// A block together with its metadata byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Voxel {
    /// The block value
    pub block: BlockId,
    /// Metadata byte (fluid level and parent direction)
    pub metadata: FluidMeta,
    _pad: [u8; 3],
}

impl Voxel {
    /// Air voxel
    pub const AIR: Self = Self::new(BlockId::AIR);

    /// Create a new voxel with the given block
    #[inline]
    pub const fn new(block: BlockId) -> Self {
        Self::with_metadata(block, FluidMeta(0))
    }

    /// Create a new voxel with block and metadata
    #[inline]
    pub const fn with_metadata(block: BlockId, metadata: FluidMeta) -> Self {
        Self {
            block,
            metadata,
            _pad: [0; 3],
        }
    }

    /// Source block of the given fluid
    #[inline]
    pub const fn fluid_source(fluid: Fluid) -> Self {
        Self::with_metadata(fluid.block(), FluidMeta::SOURCE)
    }

    /// Returns true if this voxel is air
    #[inline]
    pub const fn is_air(&self) -> bool {
        self.block.is_air()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_air() {
        assert!(BlockId::AIR.is_air());
        assert!(!BlockId::AIR.is_opaque());
        assert!(BlockId::AIR.transmits_light());
    }

    #[test]
    fn colour_blocks_are_not_special() {
        let stone = BlockId::from_rgb(128, 128, 128);
        assert!(!stone.is_special());
        assert!(stone.is_opaque());
        assert_eq!(stone.argb(), 0xFF80_8080);

        let tinted = BlockId::from_argb(0x80, 10, 20, 30);
        assert!(tinted.is_translucent());
        assert!(!tinted.is_opaque());
    }

    #[test]
    fn fluids_transmit_and_absorb_more() {
        assert!(BlockId::WATER.is_fluid());
        assert!(BlockId::WATER.transmits_light());
        assert_eq!(BlockId::WATER.absorption(), 2);
        assert_eq!(BlockId::AIR.absorption(), 1);
        assert!(BlockId::LAMP.is_opaque());
        assert!(!BlockId::GLASS.is_opaque());
    }

    #[test]
    fn emission_levels() {
        assert_eq!(BlockId::LAMP.emission(FluidMeta(0)), 15);
        assert_eq!(BlockId::LAVA.emission(FluidMeta::SOURCE), 15);
        assert_eq!(BlockId::LAVA.emission(FluidMeta::new(1, None)), 2);
        assert_eq!(BlockId::WATER.emission(FluidMeta::SOURCE), 0);
        assert_eq!(BlockId::from_rgb(1, 2, 3).emission(FluidMeta(0)), 0);
    }

    #[test]
    fn light_packing() {
        let light = Light::new(12, 3);
        assert_eq!(light.sky(), 12);
        assert_eq!(light.block(), 3);
        assert_eq!(Light::new(40, 40), Light::FULL);
        assert_eq!(Light::new(2, 9).max(Light::new(7, 1)), Light::new(7, 9));
    }

    #[test]
    fn fluid_meta_packing() {
        let meta = FluidMeta::new(5, Some(Direction::PosZ));
        assert_eq!(meta.level(), 5);
        assert_eq!(meta.parent(), Some(Direction::PosZ));
        assert!(!meta.is_source());
        assert!(FluidMeta::SOURCE.is_source());
        assert_eq!(FluidMeta::SOURCE.parent(), None);
        assert_eq!(FluidMeta::new(12, None).level(), 8);
    }

    #[test]
    fn voxel_default_is_air() {
        assert!(Voxel::default().is_air());
        assert_eq!(Voxel::AIR, Voxel::default());
    }

    #[test]
    fn voxel_padding_stays_zeroed() {
        let voxel = Voxel::with_metadata(BlockId::LAVA, FluidMeta::SOURCE);
        let bytes = bytemuck::bytes_of(&voxel);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[5..], &[0, 0, 0]);
    }
}
