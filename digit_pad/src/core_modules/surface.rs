// THEORY:
// `DrawingSurface` is the Rust-side stand-in for the HTML canvas the user draws on.
// It keeps a square RGBA buffer laid out exactly like `ImageData`, so whatever it
// produces can be handed to the reducer unchanged, and whatever a browser sends can
// be reduced the same way.
//
// Three things can put pixels on it:
// - strokes, as round-capped line segments of the configured line width;
// - an uploaded image, scaled to fill the square;
// - nothing, after `clear`, which restores the transparent black of a fresh canvas.
//
// `render_reduced` goes the other way, for the debug view: every cell of a reduced
// grid is painted back as a `scale x scale` gray square at full canvas size.

use crate::core_modules::grid_reducer::ReducedMatrix;
use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use image::DynamicImage;
use image::imageops::FilterType;

/// Square RGBA drawing buffer.
#[derive(Debug, Clone)]
pub struct DrawingSurface {
    side: usize,
    pixels: Vec<u8>,
    line_width: f32,
    stroke_color: Pixel,
    cursor: Option<(f32, f32)>,
}

impl DrawingSurface {
    /// A transparent black surface that draws white strokes.
    pub fn new(side: usize, line_width: f32) -> Self {
        Self {
            side,
            pixels: vec![0; side * side * CHANNELS],
            line_width,
            stroke_color: Pixel::gray(u8::MAX),
            cursor: None,
        }
    }

    pub fn with_stroke_color(mut self, color: Pixel) -> Self {
        self.stroke_color = color;
        self
    }

    pub fn side(&self) -> usize {
        self.side
    }

    /// RGBA bytes, row-major, ready for the reducer.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Pixel {
        let i = (y * self.side + x) * CHANNELS;
        Pixel::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        )
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
        self.cursor = None;
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&b| b == 0)
    }

    /// Starts a stroke and stamps a dot at the starting point.
    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        self.draw_segment((x, y), (x, y));
        self.cursor = Some((x, y));
    }

    /// Extends the current stroke to `(x, y)`. Ignored outside a stroke.
    pub fn stroke_to(&mut self, x: f32, y: f32) {
        if let Some(from) = self.cursor {
            self.draw_segment(from, (x, y));
            self.cursor = Some((x, y));
        }
    }

    pub fn end_stroke(&mut self) {
        self.cursor = None;
    }

    /// Replaces the surface content with `image`, stretched to the full square.
    pub fn draw_image(&mut self, image: &DynamicImage) {
        let side = self.side as u32;
        let resized = image.resize_exact(side, side, FilterType::Triangle);
        self.pixels = resized.to_rgba8().into_raw();
        self.cursor = None;
    }

    /// Paints every reduced cell as an opaque gray `scale x scale` square.
    pub fn render_reduced(reduced: &ReducedMatrix, scale: usize) -> Vec<u8> {
        let side = reduced.side() * scale;
        let mut pixels = Vec::with_capacity(side * side * CHANNELS);
        for y in 0..side {
            for x in 0..side {
                let value = reduced.get(y / scale, x / scale).round().clamp(0.0, 255.0) as u8;
                let bytes: [u8; CHANNELS] = Pixel::gray(value).into();
                pixels.extend_from_slice(&bytes);
            }
        }
        pixels
    }

    fn draw_segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        // Always cover at least the pixel under the pointer.
        let radius = (self.line_width / 2.0).max(0.5);
        let max = self.side as f32;
        let x0 = (from.0.min(to.0) - radius).floor().clamp(0.0, max) as usize;
        let x1 = (from.0.max(to.0) + radius).ceil().clamp(0.0, max) as usize;
        let y0 = (from.1.min(to.1) - radius).floor().clamp(0.0, max) as usize;
        let y1 = (from.1.max(to.1) + radius).ceil().clamp(0.0, max) as usize;
        let color: [u8; CHANNELS] = self.stroke_color.into();

        for y in y0..y1 {
            for x in x0..x1 {
                let center = (x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(center, from, to) <= radius {
                    let i = (y * self.side + x) * CHANNELS;
                    self.pixels[i..i + CHANNELS].copy_from_slice(&color);
                }
            }
        }
    }
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / length_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
