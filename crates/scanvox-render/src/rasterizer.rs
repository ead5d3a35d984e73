//! Scanline-free triangle fill using edge functions.
//!
//! Vertices are snapped to a 1/16 pixel grid and the three edge functions are
//! evaluated in integers, stepped incrementally so the per-pixel cost is
//! constant. Pixel centres exactly on an edge follow the top-left rule, so
//! triangles sharing an edge never both cover a pixel. Both windings fill;
//! culling happens before this stage.

use glam::Vec3;

use crate::frame::{pack_rgb, unpack_rgb, FrameBuffer};

/// Subpixel steps per pixel.
const SUBPIXEL: i64 = 16;

/// Vertices are clamped to this many pixels from the origin so edge
/// products stay within `i64`.
const GUARD_BAND: f32 = (1 << 25) as f32;

/// A projected vertex: pixel coordinates, view depth and ambient brightness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenVertex {
    pub x: f32,
    pub y: f32,
    /// View-space depth, strictly positive after near clipping.
    pub z: f32,
    pub ao: f32,
}

impl ScreenVertex {
    pub const fn new(x: f32, y: f32, z: f32, ao: f32) -> Self {
        Self { x, y, z, ao }
    }

    fn snapped(&self) -> (i64, i64) {
        (snap(self.x), snap(self.y))
    }
}

/// How fragments combine with the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendMode {
    /// Replace colour and write depth.
    Opaque,
    /// Alpha-blend over the existing colour, depth tested but not written.
    Blend { alpha: f32 },
}

#[inline]
fn snap(v: f32) -> i64 {
    (v.clamp(-GUARD_BAND, GUARD_BAND) * SUBPIXEL as f32).round() as i64
}

#[inline]
const fn edge(a: (i64, i64), b: (i64, i64), p: (i64, i64)) -> i64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

/// Whether pixel centres exactly on the edge `p -> q` belong to a
/// positively wound triangle: the interior lies to the right (a left edge),
/// or the edge is horizontal with the interior below (a top edge).
#[inline]
const fn owns_edge(p: (i64, i64), q: (i64, i64)) -> bool {
    let dx = -(q.1 - p.1);
    dx > 0 || (dx == 0 && q.0 - p.0 > 0)
}

/// Rasterize one triangle and return the number of pixels written.
pub fn fill_triangle(
    frame: &mut FrameBuffer,
    v: &[ScreenVertex; 3],
    rgb: Vec3,
    mode: BlendMode,
) -> u32 {
    if v.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return 0;
    }
    let [a, mut b, mut c] = *v;
    let mut area = edge(a.snapped(), b.snapped(), c.snapped());
    if area == 0 {
        return 0;
    }
    if area < 0 {
        std::mem::swap(&mut b, &mut c);
        area = -area;
    }

    let width = frame.width();
    let height = frame.height();
    if width == 0 || height == 0 {
        return 0;
    }

    // Pixel (px, py) covers [px, px+1) with its centre at +0.5.
    let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as u32;
    let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as u32;
    let max_x = (a.x.max(b.x).max(c.x).ceil().max(0.0) as u32).min(width);
    let max_y = (a.y.max(b.y).max(c.y).ceil().max(0.0) as u32).min(height);
    if min_x >= max_x || min_y >= max_y {
        return 0;
    }

    let inv_area = 1.0 / area as f32;
    let inv_z = [1.0 / a.z, 1.0 / b.z, 1.0 / c.z];
    let ao_z = [a.ao * inv_z[0], b.ao * inv_z[1], c.ao * inv_z[2]];

    // Edge opposite each vertex, as (start, end).
    let (sa, sb, sc) = (a.snapped(), b.snapped(), c.snapped());
    let edges = [(sb, sc), (sc, sa), (sa, sb)];
    let start = (
        i64::from(min_x) * SUBPIXEL + SUBPIXEL / 2,
        i64::from(min_y) * SUBPIXEL + SUBPIXEL / 2,
    );
    let mut row = [0_i64; 3];
    let mut min_edge = [0_i64; 3];
    let mut step_x = [0_i64; 3];
    let mut step_y = [0_i64; 3];
    for (i, &(p, q)) in edges.iter().enumerate() {
        // Unowned edges need a strictly positive value, which for integers is >= 1.
        min_edge[i] = i64::from(!owns_edge(p, q));
        row[i] = edge(p, q, start);
        step_x[i] = -(q.1 - p.1) * SUBPIXEL;
        step_y[i] = (q.0 - p.0) * SUBPIXEL;
    }

    let (color, depth) = frame.planes_mut();
    let mut written = 0;
    for py in min_y..max_y {
        let mut e = row;
        let base = (py * width) as usize;
        for px in min_x..max_x {
            if e[0] >= min_edge[0] && e[1] >= min_edge[1] && e[2] >= min_edge[2] {
                let w = [
                    e[0] as f32 * inv_area,
                    e[1] as f32 * inv_area,
                    e[2] as f32 * inv_area,
                ];
                let recip = w[0] * inv_z[0] + w[1] * inv_z[1] + w[2] * inv_z[2];
                if recip > 0.0 {
                    let z = 1.0 / recip;
                    let idx = base + px as usize;
                    if z < depth[idx] {
                        let ao = (w[0] * ao_z[0] + w[1] * ao_z[1] + w[2] * ao_z[2]) * z;
                        let src = rgb * ao;
                        match mode {
                            BlendMode::Opaque => {
                                color[idx] = pack_rgb(src);
                                depth[idx] = z;
                            }
                            BlendMode::Blend { alpha } => {
                                let dst = unpack_rgb(color[idx]);
                                color[idx] = pack_rgb(dst.lerp(src, alpha));
                            }
                        }
                        written += 1;
                    }
                }
            }
            for i in 0..3 {
                e[i] += step_x[i];
            }
        }
        for i in 0..3 {
            row[i] += step_y[i];
        }
    }
    written
}
