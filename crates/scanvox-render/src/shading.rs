//! Time-of-day and face shading.

use std::f32::consts::TAU;

use glam::Vec3;
use scanvox_core::constants::MAX_LIGHT;
use scanvox_core::coords::Direction;
use scanvox_core::types::Light;

use crate::frame::pack_rgb;

const DAY_SKY: Vec3 = Vec3::new(0x87 as f32 / 255.0, 0xCE as f32 / 255.0, 0xEB as f32 / 255.0);
const NIGHT_SKY: Vec3 = Vec3::new(0x0B as f32 / 255.0, 0x10 as f32 / 255.0, 0x26 as f32 / 255.0);

/// Wrap a world time into a day phase in `[0, 1)`.
#[inline]
pub fn day_phase(world_time: f32) -> f32 {
    let phase = world_time.rem_euclid(1.0);
    if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

/// Sun strength for a day phase: 1.0 at noon (0.25), 0.15 through the night.
#[inline]
pub fn sun_intensity(phase: f32) -> f32 {
    0.15 + 0.85 * (TAU * phase).sin().max(0.0)
}

/// Background colour for a day phase.
pub fn sky_color(phase: f32) -> u32 {
    let t = (sun_intensity(phase) - 0.15) / 0.85;
    pack_rgb(NIGHT_SKY.lerp(DAY_SKY, t))
}

/// Directional shade so adjacent faces read apart.
#[inline]
pub const fn face_shade(face: Direction) -> f32 {
    match face {
        Direction::PosY => 1.0,
        Direction::NegY => 0.5,
        Direction::NegX | Direction::PosX => 0.8,
        Direction::NegZ | Direction::PosZ => 0.65,
    }
}

/// Brightness of a face from its sampled light, direction and the sun,
/// clamped to `[floor, 1]`.
pub fn light_factor(light: Light, face: Direction, sun: f32, floor: f32) -> f32 {
    let max = f32::from(MAX_LIGHT);
    let sky = f32::from(light.sky()) / max * sun;
    let block = f32::from(light.block()) / max;
    (sky.max(block) * face_shade(face)).clamp(floor.clamp(0.0, 1.0), 1.0)
}

/// Linear RGB of a packed `0xAARRGGBB` block colour scaled by `factor`.
pub fn shade_color(argb: u32, factor: f32) -> Vec3 {
    crate::frame::unpack_rgb(argb) * factor
}

/// Alpha channel of a packed block colour in `[0, 1]`.
#[inline]
pub fn alpha_of(argb: u32) -> f32 {
    f32::from((argb >> 24) as u8) / 255.0
}
