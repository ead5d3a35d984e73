//! Scanvox Engine Demo Viewer
//!
//! Renders procedurally generated terrain on the CPU with chunk streaming,
//! flood-fill lighting and a day/night cycle. The camera orbits the spawn
//! area; frames can be written to PNG files.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p scanvox-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! ### Screenshot options
//! - `-S, --screenshot`: Enable screenshot capture mode
//! - `-o, --output <PATTERN>`: Output path pattern (use `{}` for frame number)
//! - `-f, --frames <FRAMES>`: Frame indices to capture (e.g., "0,10,20" or "0-5")
//! - `--exit-after`: Exit after capturing all specified frames
//!
//! ### World options
//! - `--seed <N>`: World generation seed (default: 42)
//! - `--render-distance <N>`: Chunks loaded and drawn around the camera (default: 6)
//! - `--save-dir <DIR>`: Persist edited chunks under this directory
//! - `--time <PHASE>`: Fix the time of day (0.25 noon, 0.75 midnight)
//!
//! ### View options
//! - `--width <N>`, `--height <N>`: Frame size (default: 640x360)
//! - `--fps <N>`: Frame rate cap, 0 for unlimited (default: 60)
//! - `--max-frames <N>`: Stop after N frames
//! - `--radius <N>`, `--altitude <N>`: Orbit radius and camera height
//! - `--debug <MODE>`: Debug view: none, depth, noclip
//! - `--no-warmup`: Start rendering before the terrain has streamed in
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use scanvox_app::run_app;

use crate::app::{Viewer, ViewerParams};

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    run_app::<Viewer>(ViewerParams::from_args().app_config())
}

fn print_help() {
    eprintln!(
        "Scanvox Engine Demo Viewer

USAGE:
    cargo run -p scanvox-viewer -- [OPTIONS]

SCREENSHOT OPTIONS:
    -S, --screenshot        Enable screenshot capture mode
    -o, --output <PATTERN>  Output path pattern (use {{}} for frame number)
                            Default: screenshot_{{}}.png
    -f, --frames <FRAMES>   Frame indices to capture
                            Examples: \"0\" \"0,10,20\" \"0-5\" \"0,5-10,20\"
                            Default: 0
    --exit-after            Exit after capturing all specified frames

WORLD OPTIONS:
    --seed <N>              World generation seed (default: 42)
    --render-distance <N>   Chunk radius loaded and drawn (default: 6)
    --save-dir <DIR>        Persist edited chunks under DIR
    --time <PHASE>          Fix the time of day: 0.25 noon, 0.75 midnight

VIEW OPTIONS:
    --width <N>             Frame width (default: 640)
    --height <N>            Frame height (default: 360)
    --fps <N>               Frame rate cap, 0 for unlimited (default: 60)
    --max-frames <N>        Stop after N frames
    --radius <N>            Orbit radius in blocks (default: 48)
    --altitude <N>          Camera height (default: 110)
    --debug <MODE>          none, depth or noclip
    --no-warmup             Start before the terrain has streamed in

OTHER:
    -h, --help              Print this help message

EXAMPLES:
    # Orbit with default settings
    cargo run -p scanvox-viewer

    # Capture frames during the orbit at midnight and exit
    cargo run -p scanvox-viewer -- --time 0.75 -S -f 0,50,100 -o orbit_{{}}.png --exit-after

    # Depth view at a smaller render distance
    cargo run -p scanvox-viewer -- --render-distance 3 --debug depth

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
