//! Engine loop and application framework for the Scanvox engine.
//!
//! This crate wires the world and renderer crates into an [`Engine`] and
//! drives it from a headless loop:
//! - Fixed-rate simulation ticks (fluids, time of day)
//! - Per-frame streaming, relighting and mesh rebuilds
//! - Frame pacing and FPS statistics
//! - Saving modified chunks on shutdown
//!
//! # Example
//!
//! ```no_run
//! use scanvox_app::{run_app, AppConfig, AppContext, CameraPose, FrameContext, VoxelApp};
//!
//! struct MyApp {
//!     camera: CameraPose,
//! }
//!
//! impl VoxelApp for MyApp {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp { camera: CameraPose::default() })
//!     }
//!
//!     fn update(&mut self, _ctx: &mut AppContext, dt: f32) {
//!         self.camera.yaw += dt * 0.2;
//!     }
//!
//!     fn render(&mut self, ctx: &mut AppContext, _frame: &FrameContext) -> anyhow::Result<()> {
//!         ctx.engine.prepare_frame(self.camera.position);
//!         ctx.engine.render(&self.camera);
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default().with_max_frames(100))
//! }
//! ```

mod app;
mod context;
mod engine;
mod frame;
mod runner;

pub use app::VoxelApp;
pub use context::AppContext;
pub use engine::{Engine, EngineConfig, PrepareReport};
pub use frame::FrameContext;
pub use runner::{run_app, AppConfig};

// Re-export commonly used types for convenience
pub use scanvox_render::{CameraPose, DebugMode, FrameBuffer, RenderConfig};
