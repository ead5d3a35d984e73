//! Chunk meshing into per-segment triangle lists.
//!
//! Every non-air voxel contributes a quad for each face that borders a
//! non-opaque cell. Triangles are bucketed by the 4x4x4 segment owning the
//! voxel and split into an opaque and a translucent list. Each segment also
//! gets a six-bit occlusion mask used by the visibility search.

use glam::{IVec3, Vec3};
use scanvox_core::constants::{
    CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, SEGMENTS_PER_CHUNK, SEGMENTS_X, SEGMENTS_Z,
    SEGMENT_BITS, SEGMENT_SIZE,
};
use scanvox_core::coords::{ChunkPos, Direction, FaceMask};
use scanvox_core::types::{Light, Voxel};
use scanvox_world::Neighborhood;
use tracing::trace_span;

/// Brightness for each ambient occlusion level, darkest first.
const AO_BRIGHTNESS: [f32; 4] = [0.25, 0.5, 0.75, 1.0];

/// Lowest drawn fluid surface.
const MIN_FLUID_HEIGHT: f32 = 0.1;

/// Unit-cube corners of each face, counter-clockwise seen from outside.
/// Indexed by [`Direction::index`].
const FACE_CORNERS: [[[u8; 3]; 4]; 6] = [
    // -X
    [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]],
    // +X
    [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]],
    // -Y
    [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]],
    // +Y
    [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]],
    // -Z
    [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]],
    // +Z
    [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]],
];

/// A mesh vertex in world space with its ambient brightness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Vec3,
    pub ao: f32,
}

/// One triangle with flat per-face attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub verts: [Vertex; 3],
    /// Packed `0xAARRGGBB` block colour.
    pub color: u32,
    /// Light sampled from the cell the face looks into.
    pub light: Light,
    pub face: Direction,
}

impl Triangle {
    /// Unnormalised face normal from the winding.
    #[inline]
    pub fn normal(&self) -> Vec3 {
        let [a, b, c] = self.verts;
        (b.pos - a.pos).cross(c.pos - a.pos)
    }

    /// Whether the front side faces a viewer at `eye`.
    #[inline]
    pub fn faces(&self, eye: Vec3) -> bool {
        self.normal().dot(self.verts[0].pos - eye) < 0.0
    }
}

/// Triangles owned by one segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentMesh {
    pub opaque: Vec<Triangle>,
    pub transparent: Vec<Triangle>,
}

impl SegmentMesh {
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }
}

/// Meshed geometry and occlusion masks for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkMesh {
    pub pos: ChunkPos,
    segments: Vec<SegmentMesh>,
    occlusion: Vec<FaceMask>,
}

impl ChunkMesh {
    fn empty(pos: ChunkPos) -> Self {
        Self {
            pos,
            segments: vec![SegmentMesh::default(); SEGMENTS_PER_CHUNK],
            occlusion: vec![FaceMask::empty(); SEGMENTS_PER_CHUNK],
        }
    }

    /// Segment mesh by local segment index.
    #[inline]
    pub fn segment(&self, index: usize) -> &SegmentMesh {
        &self.segments[index]
    }

    /// Occlusion mask by local segment index.
    #[inline]
    pub fn occlusion(&self, index: usize) -> FaceMask {
        self.occlusion[index]
    }

    pub fn segments(&self) -> &[SegmentMesh] {
        &self.segments
    }

    pub fn opaque_count(&self) -> usize {
        self.segments.iter().map(|s| s.opaque.len()).sum()
    }

    pub fn transparent_count(&self) -> usize {
        self.segments.iter().map(|s| s.transparent.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.segments.iter().map(SegmentMesh::triangle_count).sum()
    }
}

/// Local segment index owning a chunk-local voxel.
#[inline]
const fn segment_index(x: i32, y: i32, z: i32) -> usize {
    let sx = (x >> SEGMENT_BITS) as usize;
    let sz = (z >> SEGMENT_BITS) as usize;
    let sy = (y >> SEGMENT_BITS) as usize;
    sx + SEGMENTS_X * (sz + SEGMENTS_Z * sy)
}

/// Builds [`ChunkMesh`]es from a chunk neighbourhood.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshBuilder;

impl MeshBuilder {
    pub const fn new() -> Self {
        Self
    }

    /// Mesh the center chunk of `hood`, sampling across seams.
    pub fn build(&self, hood: &Neighborhood<'_>) -> ChunkMesh {
        let center = hood.center();
        let _span = trace_span!("mesh_chunk", x = center.pos.x, z = center.pos.z).entered();

        let mut mesh = ChunkMesh::empty(center.pos);
        let origin = center.pos.origin().to_vec3();

        for y in 0..CHUNK_HEIGHT as i32 {
            for z in 0..CHUNK_DEPTH as i32 {
                for x in 0..CHUNK_WIDTH as i32 {
                    let voxel = hood.voxel(x, y, z);
                    if voxel.is_air() {
                        continue;
                    }
                    let segment = &mut mesh.segments[segment_index(x, y, z)];
                    let cell = IVec3::new(x, y, z);
                    for dir in Direction::ALL {
                        emit_face(hood, cell, voxel, dir, origin, segment);
                    }
                }
            }
        }

        for (index, mask) in mesh.occlusion.iter_mut().enumerate() {
            *mask = segment_occlusion(hood, index);
        }
        mesh
    }
}

/// Whether a voxel shows its face towards `neighbor`.
fn face_visible(voxel: Voxel, neighbor: Voxel, dir: Direction) -> bool {
    if neighbor.block.is_opaque() {
        return false;
    }
    let Some(fluid) = voxel.block.fluid() else {
        return neighbor.block != voxel.block;
    };
    if neighbor.block.fluid() != Some(fluid) {
        return true;
    }
    dir.axis() != 1 && neighbor.metadata.level() < voxel.metadata.level()
}

/// Surface height of the fluid at a cell, 1.0 under more of the same fluid.
fn fluid_height(hood: &Neighborhood<'_>, cell: IVec3, voxel: Voxel) -> f32 {
    let above = hood.block(cell.x, cell.y + 1, cell.z);
    if above == voxel.block {
        1.0
    } else {
        (f32::from(voxel.metadata.level()) / 9.0).max(MIN_FLUID_HEIGHT)
    }
}

fn emit_face(
    hood: &Neighborhood<'_>,
    cell: IVec3,
    voxel: Voxel,
    dir: Direction,
    origin: Vec3,
    out: &mut SegmentMesh,
) {
    let outside = cell + dir.offset();
    let neighbor = hood.voxel(outside.x, outside.y, outside.z);
    if !face_visible(voxel, neighbor, dir) {
        return;
    }

    let (bottom, top) = if voxel.block.is_fluid() {
        let top = fluid_height(hood, cell, voxel);
        let bottom = if dir.axis() != 1 && neighbor.block == voxel.block {
            fluid_height(hood, outside, neighbor).min(top)
        } else {
            0.0
        };
        (bottom, top)
    } else {
        (0.0, 1.0)
    };
    if top <= bottom {
        return;
    }

    let base = origin + cell.as_vec3();
    let corners = FACE_CORNERS[dir.index()];
    let verts = corners.map(|c| Vertex {
        pos: base
            + Vec3::new(
                f32::from(c[0]),
                if c[1] == 1 { top } else { bottom },
                f32::from(c[2]),
            ),
        ao: corner_ao(hood, outside, dir, c),
    });

    let color = voxel.block.argb();
    let light = hood.light(outside.x, outside.y, outside.z);
    let list = if voxel.block.is_translucent() {
        &mut out.transparent
    } else {
        &mut out.opaque
    };
    for [i, j, k] in [[0, 1, 2], [0, 2, 3]] {
        list.push(Triangle {
            verts: [verts[i], verts[j], verts[k]],
            color,
            light,
            face: dir,
        });
    }
}

/// Brightness of a face corner from the three cells around it in the face's
/// outward layer.
fn corner_ao(hood: &Neighborhood<'_>, outside: IVec3, dir: Direction, corner: [u8; 3]) -> f32 {
    let axis = dir.axis();
    let (t1, t2) = ((axis + 1) % 3, (axis + 2) % 3);
    let step = |t: usize| {
        let mut v = IVec3::ZERO;
        v[t] = if corner[t] == 1 { 1 } else { -1 };
        v
    };
    let (s1, s2) = (step(t1), step(t2));
    let opaque = |p: IVec3| hood.is_opaque(p.x, p.y, p.z);

    let side1 = opaque(outside + s1);
    let side2 = opaque(outside + s2);
    let level = if side1 && side2 {
        0
    } else {
        3 - (usize::from(side1) + usize::from(side2) + usize::from(opaque(outside + s1 + s2)))
    };
    AO_BRIGHTNESS[level]
}

/// Faces of a segment whose 16 boundary voxels are all opaque.
fn segment_occlusion(hood: &Neighborhood<'_>, index: usize) -> FaceMask {
    let size = SEGMENT_SIZE as i32;
    let sx = (index % SEGMENTS_X) as i32 * size;
    let sz = ((index / SEGMENTS_X) % SEGMENTS_Z) as i32 * size;
    let sy = (index / (SEGMENTS_X * SEGMENTS_Z)) as i32 * size;

    let mut mask = FaceMask::empty();
    for dir in Direction::ALL {
        let axis = dir.axis();
        let fixed = if dir.is_positive() { size - 1 } else { 0 };
        let (t1, t2) = ((axis + 1) % 3, (axis + 2) % 3);
        let solid = (0..size).all(|a| {
            (0..size).all(|b| {
                let mut p = IVec3::new(sx, sy, sz);
                p[axis] += fixed;
                p[t1] += a;
                p[t2] += b;
                hood.is_opaque(p.x, p.y, p.z)
            })
        });
        if solid {
            mask |= dir.mask();
        }
    }
    mask
}
