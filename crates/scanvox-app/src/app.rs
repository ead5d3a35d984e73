//! `VoxelApp` trait definition.

use crate::context::AppContext;
use crate::frame::FrameContext;

/// Trait for Scanvox applications.
///
/// Implement this trait to drive the engine from [`crate::run_app`]. The
/// runner owns the loop: per-frame `update`, zero or more fixed-rate
/// `fixed_update` ticks, then `render`.
pub trait VoxelApp: Sized {
    /// Initialize the application.
    ///
    /// Called once after the engine has been created.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update per-frame state such as the camera.
    ///
    /// # Arguments
    /// * `ctx` - Application context with engine access
    /// * `dt` - Delta time in seconds since last frame
    fn update(&mut self, ctx: &mut AppContext, dt: f32);

    /// Run one fixed simulation tick.
    ///
    /// Default implementation advances the engine's fluids and clock.
    fn fixed_update(&mut self, ctx: &mut AppContext) {
        ctx.engine.tick();
    }

    /// Render a frame.
    ///
    /// Called every frame after `update()` and any pending ticks. Typically
    /// prepares the engine around the camera and draws it.
    fn render(&mut self, ctx: &mut AppContext, frame: &FrameContext) -> anyhow::Result<()>;

    /// Cleanup before shutdown.
    ///
    /// Modified chunks are saved after this returns.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
