//! CPU rendering pipeline for the Scanvox engine.
//!
//! This crate provides:
//! - Segment meshing with face culling, ambient occlusion and fluid heights
//! - A quota-limited mesh cache
//! - Breadth-first visibility over 4x4x4 segments
//! - Camera transforms, near-plane clipping and an edge-function rasterizer
//! - Frame orchestration, debug modes and screenshot capture

pub mod camera;
pub mod clip;
pub mod debug;
pub mod frame;
pub mod mesh;
pub mod mesh_cache;
pub mod rasterizer;
pub mod renderer;
pub mod screenshot;
pub mod shading;
pub mod visibility;

pub use camera::{CameraPose, Frustum, Projection, ViewTransform};
pub use clip::{clip_near, ClippedPolygon, ViewVertex};
pub use debug::{visualize_depth, DebugMode};
pub use frame::FrameBuffer;
pub use mesh::{ChunkMesh, MeshBuilder, SegmentMesh, Triangle, Vertex};
pub use mesh_cache::MeshCache;
pub use rasterizer::{fill_triangle, BlendMode, ScreenVertex};
pub use renderer::{FrameStats, RenderConfig, Renderer};
pub use shading::{day_phase, sky_color, sun_intensity};
pub use screenshot::{
    parse_frame_indices, save_frame, save_screenshot, ScreenshotConfig, ScreenshotError,
};
pub use visibility::{Generation, OcclusionSource, VisibilityConfig, VisibilityIndex};
