//! Application runner and fixed-timestep loop.

use std::thread;
use std::time::{Duration, Instant};

use scanvox_render::RenderConfig;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::app::VoxelApp;
use crate::context::AppContext;
use crate::engine::{Engine, EngineConfig};
use crate::frame::FrameContext;

/// Ticks a single slow frame may catch up on before time is dropped.
const MAX_TICKS_PER_FRAME: u32 = 5;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Application title, used in logs.
    pub title: String,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Fixed simulation ticks per second.
    pub tick_rate: u32,
    /// Stop after this many frames (None to run until exit is requested).
    pub max_frames: Option<u64>,
    /// Engine settings.
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Scanvox Engine".to_string(),
            width: 640,
            height: 360,
            target_fps: Some(60),
            tick_rate: 20,
            max_frames: None,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the output dimensions.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS. Zero means unlimited.
    #[must_use]
    pub const fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = if fps == 0 { None } else { Some(fps) };
        self
    }

    /// Set the simulation tick rate.
    #[must_use]
    pub const fn with_tick_rate(mut self, rate: u32) -> Self {
        self.tick_rate = rate;
        self
    }

    /// Stop after `frames` frames.
    #[must_use]
    pub const fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Set the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Accumulates frame time and hands out whole fixed ticks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedTimestep {
    tick: Duration,
    accumulator: Duration,
}

impl FixedTimestep {
    pub(crate) fn new(tick_rate: u32) -> Self {
        Self {
            tick: Duration::from_secs(1) / tick_rate.max(1),
            accumulator: Duration::ZERO,
        }
    }

    /// Add elapsed time and return how many ticks are due.
    pub(crate) fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator = (self.accumulator + elapsed).min(self.tick * MAX_TICKS_PER_FRAME);
        let mut due = 0;
        while self.accumulator >= self.tick {
            self.accumulator -= self.tick;
            due += 1;
        }
        due
    }

    /// Fraction of the next tick already accumulated.
    pub(crate) fn alpha(&self) -> f32 {
        self.accumulator.as_secs_f32() / self.tick.as_secs_f32()
    }
}

/// Run a `VoxelApp` with the given configuration.
///
/// Initializes logging, creates the engine and runs the loop until the
/// application requests exit or `max_frames` is reached.
pub fn run_app<A: VoxelApp>(config: AppConfig) -> anyhow::Result<()> {
    // Initialize logging
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
    if installed.is_err() {
        debug!("Tracing subscriber already installed");
    }

    info!("{} starting...", config.title);

    let render = RenderConfig::default().with_size(config.width, config.height);
    let engine = Engine::new(config.engine.clone(), render)?;
    let mut ctx = AppContext::new(engine);
    let app = A::init(&mut ctx)?;
    info!("Application ready!");

    let mut state = AppState {
        ctx,
        app,
        timestep: FixedTimestep::new(config.tick_rate),
        target_frame_time: config
            .target_fps
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1)))),
        max_frames: config.max_frames,
        min_fps: f64::MAX,
        max_fps: 0.0,
        fps_sum: 0.0,
    };

    let result = loop {
        if state.finished() {
            break Ok(());
        }
        if let Err(e) = state.run_frame() {
            break Err(e);
        }
    };

    state.cleanup();
    result
}

/// Internal application state.
struct AppState<A: VoxelApp> {
    ctx: AppContext,
    app: A,
    timestep: FixedTimestep,
    target_frame_time: Option<Duration>,
    max_frames: Option<u64>,
    // FPS tracking
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
}

impl<A: VoxelApp> AppState<A> {
    fn finished(&self) -> bool {
        self.ctx.exit_requested()
            || self
                .max_frames
                .is_some_and(|max| self.ctx.frame_count >= max)
    }

    fn run_frame(&mut self) -> anyhow::Result<()> {
        let frame_start = Instant::now();

        let elapsed = frame_start.duration_since(self.ctx.last_frame_time);
        self.ctx.last_frame_time = frame_start;
        let dt = elapsed.as_secs_f32();
        if dt > 0.0 {
            let fps = 1.0 / f64::from(dt);
            self.min_fps = self.min_fps.min(fps);
            self.max_fps = self.max_fps.max(fps);
            self.fps_sum += fps;
        }

        self.app.update(&mut self.ctx, dt);

        let ticks = self.timestep.advance(elapsed);
        for _ in 0..ticks {
            self.app.fixed_update(&mut self.ctx);
            self.ctx.tick_count += 1;
        }

        let frame = FrameContext::new(dt, self.ctx.frame_count, ticks, self.timestep.alpha());
        self.app.render(&mut self.ctx, &frame)?;
        self.ctx.frame_count += 1;

        // Frame pacing
        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn cleanup(&mut self) {
        // Print FPS statistics
        if self.ctx.frame_count > 0 {
            let avg_fps = self.fps_sum / self.ctx.frame_count as f64;
            info!("FPS Statistics:");
            info!("  Min: {:.1}", self.min_fps);
            info!("  Max: {:.1}", self.max_fps);
            info!("  Avg: {:.1}", avg_fps);
            info!("  Total frames: {}", self.ctx.frame_count);
            info!("  Total ticks: {}", self.ctx.tick_count);
        }

        info!("Starting cleanup...");
        self.app.cleanup(&mut self.ctx);
        self.ctx.engine.save_all();
        info!("Cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use approx::assert_relative_eq;
    use glam::Vec3;
    use scanvox_render::CameraPose;

    use super::*;

    #[test]
    fn timestep_hands_out_whole_ticks() {
        let mut step = FixedTimestep::new(20);
        assert_eq!(step.advance(Duration::from_millis(30)), 0);
        assert_relative_eq!(step.alpha(), 0.6, epsilon = 1e-4);
        assert_eq!(step.advance(Duration::from_millis(30)), 1);
        assert_eq!(step.advance(Duration::from_millis(100)), 2);
    }

    #[test]
    fn timestep_drops_time_after_a_stall() {
        let mut step = FixedTimestep::new(20);
        assert_eq!(step.advance(Duration::from_secs(10)), MAX_TICKS_PER_FRAME);
        assert_eq!(step.advance(Duration::ZERO), 0);
    }

    #[test]
    fn target_fps_zero_is_unlimited() {
        let config = AppConfig::new("test").with_target_fps(0);
        assert!(config.target_fps.is_none());
    }

    static RENDERED: AtomicU64 = AtomicU64::new(0);

    struct CountingApp {
        camera: CameraPose,
    }

    impl VoxelApp for CountingApp {
        fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
            Ok(Self {
                camera: CameraPose::new(Vec3::new(8.5, 100.0, 8.5), 0.0, 1.0),
            })
        }

        fn update(&mut self, _ctx: &mut AppContext, dt: f32) {
            self.camera.yaw += dt;
        }

        fn render(&mut self, ctx: &mut AppContext, frame: &FrameContext) -> anyhow::Result<()> {
            assert_eq!(frame.frame_number, ctx.frame_count);
            ctx.engine.prepare_frame(self.camera.position);
            ctx.engine.render(&self.camera);
            RENDERED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn runs_until_max_frames() {
        let config = AppConfig::new("test")
            .with_size(32, 24)
            .with_target_fps(0)
            .with_max_frames(3)
            .with_engine(
                EngineConfig::default()
                    .with_render_distance(1)
                    .with_async_streaming(false),
            );
        run_app::<CountingApp>(config).unwrap();
        assert_eq!(RENDERED.load(Ordering::SeqCst), 3);
    }

    struct QuittingApp;

    impl VoxelApp for QuittingApp {
        fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
            assert_eq!((ctx.width(), ctx.height()), (16, 8));
            Ok(Self)
        }

        fn update(&mut self, _ctx: &mut AppContext, _dt: f32) {}

        fn render(&mut self, ctx: &mut AppContext, _frame: &FrameContext) -> anyhow::Result<()> {
            ctx.request_exit();
            Ok(())
        }
    }

    #[test]
    fn request_exit_stops_the_loop() {
        let config = AppConfig::new("test")
            .with_size(16, 8)
            .with_max_frames(1000)
            .with_engine(
                EngineConfig::default()
                    .with_render_distance(1)
                    .with_async_streaming(false),
            );
        run_app::<QuittingApp>(config).unwrap();
    }

    struct FailingApp;

    impl VoxelApp for FailingApp {
        fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
            Ok(Self)
        }

        fn update(&mut self, _ctx: &mut AppContext, _dt: f32) {}

        fn render(&mut self, _ctx: &mut AppContext, _frame: &FrameContext) -> anyhow::Result<()> {
            anyhow::bail!("render failed")
        }
    }

    #[test]
    fn render_errors_end_the_run() {
        let config = AppConfig::new("test")
            .with_size(16, 8)
            .with_max_frames(10)
            .with_engine(
                EngineConfig::default()
                    .with_render_distance(1)
                    .with_async_streaming(false),
            );
        let err = run_app::<FailingApp>(config).unwrap_err();
        assert_eq!(err.to_string(), "render failed");
    }
}
