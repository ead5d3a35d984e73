//! Viewer application: an orbiting camera over streamed terrain.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use glam::Vec3;
use tracing::{error, info};

use scanvox_app::{
    AppConfig, AppContext, CameraPose, DebugMode, EngineConfig, FrameContext, VoxelApp,
};
use scanvox_render::{save_frame, ScreenshotConfig};

/// Orbit speed in radians per second.
const ORBIT_SPEED: f32 = 0.15;

/// Point the camera circles around.
const ORBIT_CENTER: Vec3 = Vec3::new(8.0, 56.0, 8.0);

/// Upper bound on startup waits for terrain, in milliseconds.
const WARMUP_LIMIT_MS: u32 = 20_000;

/// Log frame statistics every this many frames.
const STATS_INTERVAL: u64 = 120;

/// Viewer options parsed from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerParams {
    pub seed: u64,
    pub render_distance: u32,
    pub width: u32,
    pub height: u32,
    pub max_frames: Option<u64>,
    pub target_fps: u32,
    pub debug_mode: DebugMode,
    pub time: Option<f32>,
    pub orbit_radius: f32,
    pub orbit_height: f32,
    pub save_dir: Option<PathBuf>,
    pub warmup: bool,
}

impl Default for ViewerParams {
    fn default() -> Self {
        Self {
            seed: 42,
            render_distance: 6,
            width: 640,
            height: 360,
            max_frames: None,
            target_fps: 60,
            debug_mode: DebugMode::None,
            time: None,
            orbit_radius: 48.0,
            orbit_height: 110.0,
            save_dir: None,
            warmup: true,
        }
    }
}

impl ViewerParams {
    /// Parse viewer parameters from command line arguments.
    pub fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::parse_args(&args)
    }

    /// Parse from a slice of arguments. The first entry is the program name.
    ///
    /// Unknown flags are left for [`ScreenshotConfig`]; unparsable values keep
    /// the default.
    pub fn parse_args(args: &[String]) -> Self {
        let mut params = Self::default();

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).map(String::as_str);
            let consumed = match (args[i].as_str(), value) {
                ("--seed", Some(v)) => set(&mut params.seed, v),
                ("--render-distance", Some(v)) => set(&mut params.render_distance, v),
                ("--width", Some(v)) => set(&mut params.width, v),
                ("--height", Some(v)) => set(&mut params.height, v),
                ("--fps", Some(v)) => set(&mut params.target_fps, v),
                ("--radius", Some(v)) => set(&mut params.orbit_radius, v),
                ("--altitude", Some(v)) => set(&mut params.orbit_height, v),
                ("--max-frames", Some(v)) => {
                    v.parse::<u64>().map(|n| params.max_frames = Some(n)).is_ok()
                }
                ("--time", Some(v)) => v.parse::<f32>().map(|t| params.time = Some(t)).is_ok(),
                ("--save-dir", Some(v)) => {
                    params.save_dir = Some(PathBuf::from(v));
                    true
                }
                ("--debug", Some(v)) => match DebugMode::from_name(v) {
                    Some(mode) => {
                        params.debug_mode = mode;
                        true
                    }
                    None => false,
                },
                ("--no-warmup", _) => {
                    params.warmup = false;
                    false
                }
                _ => false,
            };
            if consumed {
                i += 1;
            }
            i += 1;
        }

        params
    }

    /// Application configuration for these parameters.
    pub fn app_config(&self) -> AppConfig {
        let mut engine = EngineConfig::default()
            .with_seed(self.seed)
            .with_render_distance(self.render_distance);
        if let Some(dir) = &self.save_dir {
            engine = engine.with_save_dir(dir);
        }
        if let Some(time) = self.time {
            engine = engine.with_start_time(time);
        }

        let mut config = AppConfig::new("Scanvox Engine - Orbit Demo")
            .with_size(self.width, self.height)
            .with_target_fps(self.target_fps)
            .with_engine(engine);
        config.max_frames = self.max_frames;
        config
    }
}

/// Parse `value` into `slot`, returning whether it was consumed.
fn set<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.parse() {
        Ok(v) => {
            *slot = v;
            true
        }
        Err(_) => false,
    }
}

/// Camera position on the orbit at `angle`, looking at the center.
fn orbit_pose(angle: f32, radius: f32, height: f32) -> CameraPose {
    let eye = Vec3::new(
        ORBIT_CENTER.x + radius * angle.cos(),
        height,
        ORBIT_CENTER.z + radius * angle.sin(),
    );
    CameraPose::looking_at(eye, ORBIT_CENTER)
}

/// Viewer application state.
pub struct Viewer {
    camera: CameraPose,
    orbit_angle: f32,
    params: ViewerParams,
    screenshot_config: ScreenshotConfig,
    /// Pin the clock when a start time was requested.
    frozen_time: Option<f32>,
}

impl Viewer {
    /// Stream until the terrain around the camera is meshed.
    fn warm_up(&self, ctx: &mut AppContext) {
        info!("Waiting for terrain...");
        for _ in 0..WARMUP_LIMIT_MS {
            ctx.engine.prepare_frame(self.camera.position);
            if ctx.engine.is_settled() {
                info!(
                    chunks = ctx.engine.world().chunks().len(),
                    triangles = ctx.engine.meshes().triangle_count(),
                    "Terrain ready"
                );
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        info!("Terrain still streaming, starting anyway");
    }

    fn capture_screenshot(&self, ctx: &AppContext, frame_number: u64) {
        let output_path = self.screenshot_config.output_path(frame_number);
        if let Err(e) = save_frame(ctx.engine.renderer().frame(), &output_path) {
            error!("Failed to save screenshot: {e}");
        }
    }
}

impl VoxelApp for Viewer {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let screenshot_config = ScreenshotConfig::from_args();
        if screenshot_config.enabled {
            info!(
                "Screenshot capture enabled: {:?} frames, output pattern: {}",
                screenshot_config.frames, screenshot_config.output_pattern
            );
        }

        let params = ViewerParams::from_args();
        info!(
            "Viewer config: seed={}, render_distance={}, debug={:?}",
            params.seed, params.render_distance, params.debug_mode
        );
        ctx.engine.renderer_mut().set_debug_mode(params.debug_mode);

        let viewer = Self {
            camera: orbit_pose(0.0, params.orbit_radius, params.orbit_height),
            orbit_angle: 0.0,
            frozen_time: params.time,
            params,
            screenshot_config,
        };
        if viewer.params.warmup {
            viewer.warm_up(ctx);
        }
        Ok(viewer)
    }

    fn update(&mut self, _ctx: &mut AppContext, dt: f32) {
        self.orbit_angle = (self.orbit_angle + ORBIT_SPEED * dt) % std::f32::consts::TAU;
        self.camera = orbit_pose(
            self.orbit_angle,
            self.params.orbit_radius,
            self.params.orbit_height,
        );
    }

    fn fixed_update(&mut self, ctx: &mut AppContext) {
        ctx.engine.tick();
        if let Some(time) = self.frozen_time {
            ctx.engine.set_world_time(time);
        }
    }

    fn render(&mut self, ctx: &mut AppContext, frame: &FrameContext) -> anyhow::Result<()> {
        let frame_number = frame.frame_number;
        ctx.engine.prepare_frame(self.camera.position);
        ctx.engine.render(&self.camera);

        if frame_number % STATS_INTERVAL == 0 {
            let stats = *ctx.engine.renderer().stats();
            info!(
                frame = frame_number,
                segments = stats.visible_segments,
                triangles = stats.rasterized,
                pixels = stats.pixels,
                chunks = ctx.engine.world().chunks().len(),
                time = ctx.engine.world_time(),
                "Frame stats"
            );
        }

        // Handle screenshot capture
        if self.screenshot_config.should_capture(frame_number) {
            self.capture_screenshot(ctx, frame_number);
        }

        // Check if we should exit after capturing
        if self.screenshot_config.exit_after_capture
            && self.screenshot_config.all_captured(frame_number + 1)
        {
            info!("All screenshots captured, requesting exit...");
            ctx.request_exit();
        }

        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut AppContext) {
        info!(
            frames = ctx.frame_count,
            ticks = ctx.engine.ticks(),
            loaded = ctx.engine.world().chunks().len(),
            "Viewer shutting down"
        );
    }
}
