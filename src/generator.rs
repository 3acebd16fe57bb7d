//! Procedural test patterns.

use image::RgbaImage;
use tiny_skia::{
    Color, GradientStop, LinearGradient, Paint, PathBuilder, Pixmap, Point, Rect, SpreadMode, Stroke,
    Transform,
};
use tracing::debug;

/// The two fixed patterns a generator can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Static test card
    Card,
    /// Scrolling color gradient, a function of time
    Gradient,
}

/// Draws patterns into the output buffer. The target's dimensions are the
/// resolution parameter; `time` is ignored by static patterns.
pub trait PatternGenerator: Send {
    fn render(&mut self, pattern: Pattern, time: f32, target: &mut RgbaImage);
}

fn background() -> Color {
    Color::from_rgba8(48, 48, 48, 255)
}

const BARS: [[u8; 3]; 7] = [
    [191, 191, 191],
    [191, 191, 0],
    [0, 191, 191],
    [0, 191, 0],
    [191, 0, 191],
    [191, 0, 0],
    [0, 0, 191],
];

/// CPU pattern generator built on tiny-skia.
#[derive(Default)]
pub struct SkiaGenerator {
    canvas: Option<Pixmap>,
}

impl SkiaGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn canvas(&mut self, width: u32, height: u32) -> Option<&mut Pixmap> {
        let stale = self
            .canvas
            .as_ref()
            .map_or(true, |canvas| canvas.width() != width || canvas.height() != height);
        if stale {
            debug!("Allocating {}x{} pattern canvas", width, height);
            self.canvas = Pixmap::new(width, height);
        }
        self.canvas.as_mut()
    }

    fn draw_card(canvas: &mut Pixmap) {
        let (w, h) = (canvas.width() as f32, canvas.height() as f32);
        canvas.fill(background());

        let mut paint = Paint::default();
        paint.anti_alias = false;

        // Square grid anchored at the center, cell size from the height so
        // cells stay square at any aspect ratio.
        let cell = (h / 8.0).max(2.0);
        paint.set_color_rgba8(96, 96, 96, 255);
        let mut x = (w / 2.0) % cell;
        while x < w {
            if let Some(line) = Rect::from_xywh(x.floor(), 0.0, 1.0, h) {
                canvas.fill_rect(line, &paint, Transform::identity(), None);
            }
            x += cell;
        }
        let mut y = (h / 2.0) % cell;
        while y < h {
            if let Some(line) = Rect::from_xywh(0.0, y.floor(), w, 1.0) {
                canvas.fill_rect(line, &paint, Transform::identity(), None);
            }
            y += cell;
        }

        // Color bars across the middle band.
        let bar_w = w / BARS.len() as f32;
        for (i, [r, g, b]) in BARS.iter().enumerate() {
            paint.set_color_rgba8(*r, *g, *b, 255);
            if let Some(bar) = Rect::from_xywh(i as f32 * bar_w, h * 0.375, bar_w.ceil(), h * 0.25) {
                canvas.fill_rect(bar, &paint, Transform::identity(), None);
            }
        }

        // Center circle and crosshair.
        paint.anti_alias = true;
        paint.set_color_rgba8(255, 255, 255, 255);
        if let Some(circle) = PathBuilder::from_circle(w / 2.0, h / 2.0, h * 0.4) {
            let stroke = Stroke {
                width: (h / 180.0).max(1.0),
                ..Default::default()
            };
            canvas.stroke_path(&circle, &paint, &stroke, Transform::identity(), None);
        }
        let mut cross = PathBuilder::new();
        cross.move_to(w / 2.0, h * 0.45);
        cross.line_to(w / 2.0, h * 0.55);
        cross.move_to(w / 2.0 - h * 0.05, h / 2.0);
        cross.line_to(w / 2.0 + h * 0.05, h / 2.0);
        if let Some(cross) = cross.finish() {
            let stroke = Stroke {
                width: (h / 180.0).max(1.0),
                ..Default::default()
            };
            canvas.stroke_path(&cross, &paint, &stroke, Transform::identity(), None);
        }
        paint.anti_alias = false;
        if let Some(dot) = Rect::from_xywh((w / 2.0).floor() - 1.0, (h / 2.0).floor() - 1.0, 3.0, 3.0) {
            canvas.fill_rect(dot, &paint, Transform::identity(), None);
        }
    }

    fn draw_gradient(canvas: &mut Pixmap, time: f32) {
        let w = canvas.width() as f32;
        let shift = (time * 0.25).rem_euclid(1.0) * w;

        let stops = vec![
            GradientStop::new(0.0, Color::from_rgba8(255, 0, 0, 255)),
            GradientStop::new(1.0 / 3.0, Color::from_rgba8(0, 255, 0, 255)),
            GradientStop::new(2.0 / 3.0, Color::from_rgba8(0, 0, 255, 255)),
            GradientStop::new(1.0, Color::from_rgba8(255, 0, 0, 255)),
        ];
        let shader = LinearGradient::new(
            Point::from_xy(shift, 0.0),
            Point::from_xy(shift + w, 0.0),
            stops,
            SpreadMode::Repeat,
            Transform::identity(),
        );

        canvas.fill(background());
        if let Some(shader) = shader {
            let paint = Paint {
                shader,
                ..Default::default()
            };
            if let Some(area) = Rect::from_xywh(0.0, 0.0, w, canvas.height() as f32) {
                canvas.fill_rect(area, &paint, Transform::identity(), None);
            }
        }
    }
}

impl PatternGenerator for SkiaGenerator {
    fn render(&mut self, pattern: Pattern, time: f32, target: &mut RgbaImage) {
        let (width, height) = target.dimensions();
        let Some(canvas) = self.canvas(width, height) else {
            return;
        };

        match pattern {
            Pattern::Card => Self::draw_card(canvas),
            Pattern::Gradient => Self::draw_gradient(canvas, time),
        }

        // Every pattern is opaque, so premultiplied and straight RGBA agree.
        let pixels: &mut [u8] = &mut *target;
        pixels.copy_from_slice(canvas.data());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_is_opaque_and_marks_center() {
        let mut generator = SkiaGenerator::new();
        let mut target = RgbaImage::new(64, 36);
        generator.render(Pattern::Card, 0.0, &mut target);

        assert!(target.pixels().all(|p| p.0[3] == 255));
        assert_eq!(target.get_pixel(32, 18).0, [255, 255, 255, 255]);
        assert_eq!(target.get_pixel(1, 1).0, [48, 48, 48, 255]);
    }

    #[test]
    fn test_card_ignores_time() {
        let mut generator = SkiaGenerator::new();
        let mut first = RgbaImage::new(32, 18);
        let mut second = RgbaImage::new(32, 18);
        generator.render(Pattern::Card, 0.0, &mut first);
        generator.render(Pattern::Card, 12.5, &mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn test_gradient_moves_with_time() {
        let mut generator = SkiaGenerator::new();
        let mut first = RgbaImage::new(40, 4);
        let mut later = RgbaImage::new(40, 4);
        generator.render(Pattern::Gradient, 0.0, &mut first);
        generator.render(Pattern::Gradient, 1.0, &mut later);
        assert!(first.pixels().all(|p| p.0[3] == 255));
        assert_ne!(first, later);
    }

    #[test]
    fn test_canvas_follows_target_size() {
        let mut generator = SkiaGenerator::new();
        let mut small = RgbaImage::new(8, 8);
        generator.render(Pattern::Card, 0.0, &mut small);
        let mut wide = RgbaImage::new(20, 5);
        generator.render(Pattern::Card, 0.0, &mut wide);
        assert!(wide.pixels().all(|p| p.0[3] == 255));
    }
}
