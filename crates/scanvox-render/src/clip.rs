//! Near-plane clipping of view-space triangles.

use glam::Vec3;

/// View-space vertex carrying its interpolated ambient brightness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewVertex {
    pub pos: Vec3,
    pub ao: f32,
}

impl ViewVertex {
    pub const fn new(pos: Vec3, ao: f32) -> Self {
        Self { pos, ao }
    }

    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            pos: self.pos.lerp(other.pos, t),
            ao: self.ao + (other.ao - self.ao) * t,
        }
    }
}

/// Result of clipping one triangle: zero, three or four vertices.
#[derive(Debug, Clone, Copy)]
pub struct ClippedPolygon {
    verts: [ViewVertex; 4],
    len: usize,
}

impl ClippedPolygon {
    const EMPTY: Self = Self {
        verts: [ViewVertex::new(Vec3::ZERO, 0.0); 4],
        len: 0,
    };

    fn push(&mut self, v: ViewVertex) {
        self.verts[self.len] = v;
        self.len += 1;
    }

    /// Vertices of the clipped polygon in winding order.
    pub fn vertices(&self) -> &[ViewVertex] {
        &self.verts[..self.len]
    }

    pub const fn is_empty(&self) -> bool {
        self.len < 3
    }

    /// Fan-triangulate the polygon.
    pub fn triangles(&self) -> impl Iterator<Item = [ViewVertex; 3]> + '_ {
        (1..self.len.saturating_sub(1)).map(|i| [self.verts[0], self.verts[i], self.verts[i + 1]])
    }
}

/// Clip a triangle against the plane `z = near`, keeping `z >= near`.
///
/// A triangle fully in front is returned unchanged, one fully behind yields
/// nothing, and a straddling triangle becomes one or two triangles whose new
/// vertices lie exactly on the plane.
pub fn clip_near(tri: [ViewVertex; 3], near: f32) -> ClippedPolygon {
    let mut out = ClippedPolygon::EMPTY;
    let inside = tri.map(|v| v.pos.z >= near);
    if inside.iter().all(|&i| i) {
        for v in tri {
            out.push(v);
        }
        return out;
    }
    if !inside.iter().any(|&i| i) {
        return out;
    }

    for i in 0..3 {
        let (a, b) = (tri[i], tri[(i + 1) % 3]);
        let (a_in, b_in) = (inside[i], inside[(i + 1) % 3]);
        if a_in {
            out.push(a);
        }
        if a_in != b_in {
            let t = (near - a.pos.z) / (b.pos.z - a.pos.z);
            let mut v = a.lerp(b, t);
            v.pos.z = near;
            out.push(v);
        }
    }
    out
}
