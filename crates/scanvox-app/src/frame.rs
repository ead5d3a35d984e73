//! Per-frame context for rendering.

/// Context for the current frame being rendered.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Delta time since last frame in seconds.
    pub dt: f32,
    /// Current frame number.
    pub frame_number: u64,
    /// Fixed ticks run before this frame.
    pub ticks: u32,
    /// Fraction of a tick left in the accumulator, for interpolation.
    pub alpha: f32,
}

impl FrameContext {
    pub(crate) const fn new(dt: f32, frame_number: u64, ticks: u32, alpha: f32) -> Self {
        Self {
            dt,
            frame_number,
            ticks,
            alpha,
        }
    }
}
