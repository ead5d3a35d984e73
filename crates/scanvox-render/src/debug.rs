//! Debug rendering modes.
//!
//! Toggled from the viewer to inspect depth or to disable occlusion culling.

use crate::frame::FrameBuffer;

/// Debug visualization mode for rendering.
///
/// Cycled with [`DebugMode::next`] in the viewer.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugMode {
    /// Normal rendering (default).
    #[default]
    None = 0,
    /// Grayscale depth, near is bright.
    Depth = 1,
    /// Visibility search ignores occlusion masks.
    NoClip = 2,
}

impl DebugMode {
    /// Cycle to the next debug mode.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::None => Self::Depth,
            Self::Depth => Self::NoClip,
            Self::NoClip => Self::None,
        }
    }

    /// Whether the visibility search should skip occlusion.
    pub const fn noclip(self) -> bool {
        matches!(self, Self::NoClip)
    }

    /// Parse a mode name as given on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" | "off" => Some(Self::None),
            "depth" => Some(Self::Depth),
            "noclip" => Some(Self::NoClip),
            _ => None,
        }
    }
}

/// Replace colour with a grayscale depth ramp. Empty pixels go black.
pub fn visualize_depth(frame: &mut FrameBuffer, far: f32) {
    let far = far.max(f32::EPSILON);
    let (color, depth) = frame.planes_mut();
    for (c, &d) in color.iter_mut().zip(depth.iter()) {
        let v = if d.is_finite() {
            ((1.0 - (d / far).clamp(0.0, 1.0)) * 255.0) as u32
        } else {
            0
        };
        *c = v << 16 | v << 8 | v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_cycle() {
        let mut mode = DebugMode::default();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(mode, DebugMode::None);
        assert_eq!(seen, vec![DebugMode::None, DebugMode::Depth, DebugMode::NoClip]);
        assert!(DebugMode::NoClip.noclip());
        assert_eq!(DebugMode::from_name("Depth"), Some(DebugMode::Depth));
        assert_eq!(DebugMode::from_name("wireframe"), None);
    }

    #[test]
    fn depth_ramp() {
        let mut frame = FrameBuffer::new(2, 1);
        frame.clear(0x00FF_0000);
        frame.planes_mut().1[0] = 0.0;
        visualize_depth(&mut frame, 100.0);

        assert_eq!(frame.pixel(0, 0), Some(0x00FF_FFFF));
        assert_eq!(frame.pixel(1, 0), Some(0));
    }
}
