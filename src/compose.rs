//! Aspect-fit compositing of a source image into the output buffer.
//!
//! The blit samples the source through a normalized rectangle: destination
//! coordinate `(u, v)` in `[0, 1]²` reads the source at
//! `(u * scale.x + offset.x, v * scale.y + offset.y)`. A negative `scale.y`
//! walks the source rows bottom-to-top, which is how vertical flip is applied.

use image::{imageops, GenericImageView, Rgba, RgbaImage};

/// Normalized sampling rectangle used for one blit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlitRect {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

impl BlitRect {
    /// Source coordinate sampled for destination coordinate `(u, v)`.
    pub fn map(&self, u: f32, v: f32) -> (f32, f32) {
        (u * self.scale[0] + self.offset[0], v * self.scale[1] + self.offset[1])
    }
}

/// Computes the sampling rectangle for a `source` sized image blitted into a
/// `destination` sized buffer.
///
/// `scale = min(1, aspect_dst / aspect_src)` on X and
/// `min(1, aspect_src / aspect_dst)` on Y; the Y component is negated when
/// `vertical_flip` is set, and `offset = (1 - scale) / 2`.
pub fn fit(source: (u32, u32), destination: (u32, u32), vertical_flip: bool) -> BlitRect {
    let aspect_src = source.0 as f32 / source.1 as f32;
    let aspect_dst = destination.0 as f32 / destination.1 as f32;

    let mut scale = [
        (aspect_dst / aspect_src).min(1.0),
        (aspect_src / aspect_dst).min(1.0),
    ];
    if vertical_flip {
        scale[1] = -scale[1];
    }
    let offset = [(1.0 - scale[0]) / 2.0, (1.0 - scale[1]) / 2.0];

    BlitRect { scale, offset }
}

/// Composites `source` into `destination`.
///
/// An absent or empty source is a no-op: the destination keeps whatever the
/// previous composite left in it. Returns whether a blit happened.
pub fn compose<I>(source: Option<&I>, destination: &mut RgbaImage, vertical_flip: bool) -> bool
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let Some(source) = source else {
        return false;
    };
    let (src_w, src_h) = source.dimensions();
    let (dst_w, dst_h) = destination.dimensions();
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return false;
    }

    let rect = fit((src_w, src_h), (dst_w, dst_h), vertical_flip);
    blit(source, destination, rect);
    true
}

/// Resamples `source` into every pixel of `destination` through `rect`.
/// Reads outside the source are clamped to its edge.
pub fn blit<I>(source: &I, destination: &mut RgbaImage, rect: BlitRect)
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let (dst_w, dst_h) = destination.dimensions();
    let inv_w = 1.0 / dst_w as f32;
    let inv_h = 1.0 / dst_h as f32;

    for (x, y, pixel) in destination.enumerate_pixels_mut() {
        let u = (x as f32 + 0.5) * inv_w;
        let v = (y as f32 + 0.5) * inv_h;
        let (su, sv) = rect.map(u, v);
        if let Some(sample) = imageops::sample_bilinear(source, su.clamp(0.0, 1.0), sv.clamp(0.0, 1.0)) {
            *pixel = sample;
        }
    }
}
