//! Application context.

use std::time::{Duration, Instant};

use crate::engine::Engine;

/// Application context shared across all app methods.
pub struct AppContext {
    /// The running engine.
    pub engine: Engine,
    /// Total frames rendered.
    pub frame_count: u64,
    /// Total fixed ticks run.
    pub tick_count: u64,
    /// Time of last frame (for delta time calculation).
    pub(crate) last_frame_time: Instant,
    started: Instant,
    exit_requested: bool,
}

impl AppContext {
    pub(crate) fn new(engine: Engine) -> Self {
        let now = Instant::now();
        Self {
            engine,
            frame_count: 0,
            tick_count: 0,
            last_frame_time: now,
            started: now,
            exit_requested: false,
        }
    }

    /// Output width in pixels.
    pub fn width(&self) -> u32 {
        self.engine.renderer().frame().width()
    }

    /// Output height in pixels.
    pub fn height(&self) -> u32 {
        self.engine.renderer().frame().height()
    }

    /// Wall time since startup.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop the loop after the current frame.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub const fn exit_requested(&self) -> bool {
        self.exit_requested
    }
}
