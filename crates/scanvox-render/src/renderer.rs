//! Frame orchestration: visibility, opaque pass, sorted transparent pass.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace_span};

use crate::camera::{CameraPose, Projection, ViewTransform};
use crate::clip::{clip_near, ViewVertex};
use crate::debug::{visualize_depth, DebugMode};
use crate::frame::FrameBuffer;
use crate::mesh::Triangle;
use crate::mesh_cache::MeshCache;
use crate::rasterizer::{fill_triangle, BlendMode, ScreenVertex};
use crate::shading::{alpha_of, day_phase, light_factor, shade_color, sky_color, sun_intensity};
use crate::visibility::{VisibilityConfig, VisibilityIndex};

/// Renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near clip distance.
    pub near: f32,
    /// Lowest light factor a face is drawn with. Zero leaves unlit faces black.
    #[serde(default)]
    pub ambient_floor: f32,
    #[serde(skip)]
    pub debug_mode: DebugMode,
    pub visibility: VisibilityConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            fov_y: 70f32.to_radians(),
            near: 0.05,
            ambient_floor: 0.0,
            debug_mode: DebugMode::None,
            visibility: VisibilityConfig::default(),
        }
    }
}

impl RenderConfig {
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub const fn with_fov(mut self, fov_y: f32) -> Self {
        self.fov_y = fov_y;
        self
    }

    #[must_use]
    pub const fn with_ambient_floor(mut self, floor: f32) -> Self {
        self.ambient_floor = floor;
        self
    }

    #[must_use]
    pub const fn with_debug_mode(mut self, mode: DebugMode) -> Self {
        self.debug_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_render_distance(mut self, chunks: u32) -> Self {
        self.visibility.render_distance = chunks;
        self
    }

    pub fn projection(&self) -> Projection {
        Projection::from_fov(self.width, self.height, self.fov_y, self.near)
    }

    /// Distance mapped to black by the depth view.
    pub fn far(&self) -> f32 {
        (self.visibility.render_distance.max(1) * 16) as f32
    }
}

/// Per-frame triangle counts by pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Segments from the visibility list that had a mesh.
    pub visible_segments: usize,
    /// Triangles read from visible segments.
    pub gathered: usize,
    /// Triangles moved into view space.
    pub transformed: usize,
    /// Triangles facing away from the camera.
    pub culled: usize,
    /// Front-facing opaque triangles.
    pub opaque: usize,
    /// Front-facing translucent triangles.
    pub transparent: usize,
    /// Triangles removed entirely by the near plane.
    pub clipped: usize,
    /// Triangles handed to the rasterizer after clipping.
    pub rasterized: usize,
    /// Pixels written.
    pub pixels: u64,
}

/// A front-facing translucent triangle waiting for the sorted pass.
struct PendingBlend {
    depth: f32,
    verts: [ViewVertex; 3],
    rgb: Vec3,
    alpha: f32,
}

/// Software renderer owning the frame buffer and visibility cache.
pub struct Renderer {
    config: RenderConfig,
    frame: FrameBuffer,
    visibility: VisibilityIndex,
    mesh_revision: Option<u64>,
    stats: FrameStats,
    blend_queue: Vec<PendingBlend>,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            frame: FrameBuffer::new(config.width, config.height),
            visibility: VisibilityIndex::new(config.visibility),
            config,
            mesh_revision: None,
            stats: FrameStats::default(),
            blend_queue: Vec::new(),
        }
    }

    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub const fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Counters from the last rendered frame.
    pub const fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub const fn visibility(&self) -> &VisibilityIndex {
        &self.visibility
    }

    pub const fn debug_mode(&self) -> DebugMode {
        self.config.debug_mode
    }

    pub fn set_debug_mode(&mut self, mode: DebugMode) {
        self.config.debug_mode = mode;
    }

    /// Advance to the next debug mode and return it.
    pub fn cycle_debug_mode(&mut self) -> DebugMode {
        self.config.debug_mode = self.config.debug_mode.next();
        self.config.debug_mode
    }

    /// Change the output size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.frame.resize(width, height);
    }

    /// Render one frame.
    ///
    /// `world_time` is wrapped into a day phase where 0.25 is noon and 0.75
    /// is midnight. Segments whose chunk has no mesh yet are skipped.
    pub fn render_frame(
        &mut self,
        meshes: &MeshCache,
        camera: &CameraPose,
        world_time: f32,
    ) -> &FrameBuffer {
        let _span = trace_span!("render_frame").entered();

        let phase = day_phase(world_time);
        let sun = sun_intensity(phase);
        let floor = self.config.ambient_floor;
        self.frame.clear(sky_color(phase));
        self.stats = FrameStats::default();

        let noclip = self.config.visibility.noclip || self.config.debug_mode.noclip();
        self.visibility.set_config(self.config.visibility.with_noclip(noclip));
        if self.mesh_revision != Some(meshes.revision()) {
            self.visibility.invalidate();
            self.mesh_revision = Some(meshes.revision());
        }

        let projection = self.config.projection();
        let view = camera.view();
        let eye = camera.position;
        let visible = self.visibility.refresh(camera, &projection, meshes);

        let stats = &mut self.stats;
        let frame = &mut self.frame;
        let blend_queue = &mut self.blend_queue;
        blend_queue.clear();

        {
            let _span = trace_span!("opaque_pass").entered();
            for &segment in visible {
                let Some(mesh) = meshes.segment(segment) else {
                    continue;
                };
                stats.visible_segments += 1;

                for tri in &mesh.opaque {
                    let Some(verts) = to_view(tri, &view, eye, stats) else {
                        continue;
                    };
                    stats.opaque += 1;
                    let rgb = shade_color(tri.color, light_factor(tri.light, tri.face, sun, floor));
                    draw(frame, &projection, verts, rgb, BlendMode::Opaque, stats);
                }

                for tri in &mesh.transparent {
                    let Some(verts) = to_view(tri, &view, eye, stats) else {
                        continue;
                    };
                    stats.transparent += 1;
                    blend_queue.push(PendingBlend {
                        depth: (verts[0].pos.z + verts[1].pos.z + verts[2].pos.z) / 3.0,
                        verts,
                        rgb: shade_color(tri.color, light_factor(tri.light, tri.face, sun, floor)),
                        alpha: alpha_of(tri.color),
                    });
                }
            }
        }

        {
            let _span = trace_span!("transparent_pass").entered();
            blend_queue.sort_by(|a, b| b.depth.total_cmp(&a.depth));
            for pending in blend_queue.iter() {
                let mode = BlendMode::Blend {
                    alpha: pending.alpha,
                };
                draw(frame, &projection, pending.verts, pending.rgb, mode, stats);
            }
        }

        if self.config.debug_mode == DebugMode::Depth {
            visualize_depth(&mut self.frame, self.config.far());
        }

        debug!(
            segments = self.stats.visible_segments,
            gathered = self.stats.gathered,
            culled = self.stats.culled,
            rasterized = self.stats.rasterized,
            pixels = self.stats.pixels,
            "Frame rendered"
        );
        &self.frame
    }
}

/// Transform a triangle into view space, dropping back faces.
fn to_view(
    tri: &Triangle,
    view: &ViewTransform,
    eye: Vec3,
    stats: &mut FrameStats,
) -> Option<[ViewVertex; 3]> {
    stats.gathered += 1;
    if !tri.faces(eye) {
        stats.culled += 1;
        return None;
    }
    stats.transformed += 1;
    Some(tri.verts.map(|v| ViewVertex::new(view.to_view(v.pos), v.ao)))
}

/// Near-clip, project and fill a view-space triangle.
fn draw(
    frame: &mut FrameBuffer,
    projection: &Projection,
    verts: [ViewVertex; 3],
    rgb: Vec3,
    mode: BlendMode,
    stats: &mut FrameStats,
) {
    let polygon = clip_near(verts, projection.near);
    if polygon.is_empty() {
        stats.clipped += 1;
        return;
    }
    for tri in polygon.triangles() {
        let screen = tri.map(|v| {
            let (x, y) = projection.project(v.pos);
            ScreenVertex::new(x, y, v.pos.z, v.ao)
        });
        stats.rasterized += 1;
        stats.pixels += u64::from(fill_triangle(frame, &screen, rgb, mode));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scanvox_core::coords::ChunkPos;
    use scanvox_core::types::{BlockId, Voxel};
    use scanvox_world::{Chunk, ChunkManager, LightEngine};

    const STONE: BlockId = BlockId::from_rgb(0x80, 0x80, 0x80);

    fn wall_cache() -> MeshCache {
        wall_cache_lit(true)
    }

    fn wall_cache_lit(lit: bool) -> MeshCache {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        chunk.fill((0, 60, 8), (15, 72, 8), Voxel::new(STONE));
        if lit {
            LightEngine::new().light_isolated(&mut chunk);
        }
        let manager = ChunkManager::new(1);
        manager.insert(chunk);

        let mut cache = MeshCache::new();
        cache.rebuild(&manager, &[ChunkPos::new(0, 0)]);
        cache
    }

    fn small_renderer() -> Renderer {
        Renderer::new(
            RenderConfig::default()
                .with_size(64, 48)
                .with_fov(1.2)
                .with_render_distance(1),
        )
    }

    fn camera() -> CameraPose {
        CameraPose::new(Vec3::new(8.0, 66.0, 2.0), 0.0, 0.0)
    }

    #[test]
    fn empty_world_is_all_sky() {
        let mut renderer = small_renderer();
        let frame = renderer.render_frame(&MeshCache::new(), &camera(), 0.25);
        let sky = sky_color(0.25);
        assert!(frame.color().iter().all(|&c| c == sky));
        assert_eq!(renderer.stats().gathered, 0);
    }

    #[test]
    fn wall_in_front_fills_the_view() {
        let cache = wall_cache();
        let mut renderer = small_renderer();
        let frame = renderer.render_frame(&cache, &camera(), 0.25);

        let center = frame.depth_at(32, 24).unwrap();
        assert_relative_eq!(center, 6.0, epsilon = 1e-3);
        assert_ne!(frame.pixel(32, 24), Some(sky_color(0.25)));

        let stats = *renderer.stats();
        assert!(stats.visible_segments > 0);
        assert!(stats.culled > 0);
        assert!(stats.pixels > 0);
        assert_eq!(stats.gathered, stats.culled + stats.transformed);
        assert_eq!(stats.transformed, stats.opaque + stats.transparent);
    }

    #[test]
    fn midnight_is_darker_than_noon() {
        let cache = wall_cache();
        let mut renderer = small_renderer();
        let noon = renderer.render_frame(&cache, &camera(), 0.25).pixel(32, 24).unwrap();
        let midnight = renderer.render_frame(&cache, &camera(), 0.75).pixel(32, 24).unwrap();
        assert!((midnight & 0xFF) < (noon & 0xFF));
    }

    #[test]
    fn unlit_wall_is_black_without_a_floor() {
        let cache = wall_cache_lit(false);
        let mut renderer = small_renderer();
        assert_eq!(renderer.render_frame(&cache, &camera(), 0.25).pixel(32, 24), Some(0));

        let mut floored = Renderer::new(
            RenderConfig::default()
                .with_size(64, 48)
                .with_fov(1.2)
                .with_render_distance(1)
                .with_ambient_floor(0.2),
        );
        let pixel = floored.render_frame(&cache, &camera(), 0.25).pixel(32, 24).unwrap();
        assert!((pixel & 0xFF) > 0);
    }

    #[test]
    fn depth_mode_draws_grayscale() {
        let cache = wall_cache();
        let mut renderer = small_renderer();
        renderer.set_debug_mode(DebugMode::Depth);
        let frame = renderer.render_frame(&cache, &camera(), 0.25);

        let c = frame.pixel(32, 24).unwrap();
        assert_eq!(c >> 16, c & 0xFF);
        assert_eq!(frame.pixel(0, 0), frame.pixel(63, 0));
    }

    #[test]
    fn visibility_is_reused_between_identical_frames() {
        let cache = wall_cache();
        let mut renderer = small_renderer();
        renderer.render_frame(&cache, &camera(), 0.25);
        renderer.render_frame(&cache, &camera(), 0.30);
        assert_eq!(renderer.visibility().searches(), 1);

        assert_eq!(renderer.cycle_debug_mode(), DebugMode::Depth);
        assert_eq!(renderer.cycle_debug_mode(), DebugMode::NoClip);
        renderer.render_frame(&cache, &camera(), 0.25);
        assert_eq!(renderer.visibility().searches(), 2);
    }
}
