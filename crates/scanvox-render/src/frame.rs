//! Software frame buffer: packed colour plus a depth plane.

/// Colour and depth planes of one rendered frame.
///
/// Colours are packed `0x00RRGGBB`. Depth stores view-space distance along
/// the viewing axis; smaller is closer and `f32::INFINITY` means empty.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    color: Vec<u32>,
    depth: Vec<f32>,
}

impl FrameBuffer {
    /// Allocate a cleared frame.
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![0; len],
            depth: vec![f32::INFINITY; len],
        }
    }

    /// Reset every pixel to `color` and infinite depth.
    pub fn clear(&mut self, color: u32) {
        self.color.fill(color & 0x00FF_FFFF);
        self.depth.fill(f32::INFINITY);
    }

    /// Reallocate if the dimensions changed.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width != self.width || height != self.height {
            *self = Self::new(width, height);
        }
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn color(&self) -> &[u32] {
        &self.color
    }

    #[inline]
    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    /// Mutable colour and depth planes at once.
    #[inline]
    pub fn planes_mut(&mut self) -> (&mut [u32], &mut [f32]) {
        (&mut self.color, &mut self.depth)
    }

    /// Colour at a pixel, if inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.color[(y * self.width + x) as usize])
    }

    /// Depth at a pixel, if inside the frame.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        (x < self.width && y < self.height).then(|| self.depth[(y * self.width + x) as usize])
    }

    /// Colour plane expanded to tightly packed RGBA8.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.color.len() * 4);
        for &c in &self.color {
            out.extend_from_slice(&[(c >> 16) as u8, (c >> 8) as u8, c as u8, 0xFF]);
        }
        out
    }
}

/// Pack an RGB triple in `[0, 1]` into `0x00RRGGBB`.
#[inline]
pub fn pack_rgb(rgb: glam::Vec3) -> u32 {
    let c = (rgb.clamp(glam::Vec3::ZERO, glam::Vec3::ONE) * 255.0).round();
    (c.x as u32) << 16 | (c.y as u32) << 8 | c.z as u32
}

/// Unpack `0x??RRGGBB` into an RGB triple in `[0, 1]`.
#[inline]
pub fn unpack_rgb(color: u32) -> glam::Vec3 {
    glam::Vec3::new(
        ((color >> 16) & 0xFF) as f32,
        ((color >> 8) & 0xFF) as f32,
        (color & 0xFF) as f32,
    ) / 255.0
}
