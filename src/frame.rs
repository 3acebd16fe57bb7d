//! Video frame types and pixel format conversions.

use bytemuck::{Pod, Zeroable};
use image::{ImageBuffer, Rgba};

/// Pixel formats a provider may hand to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGB with 8 bits per channel
    Rgb,
    /// RGBA with 8 bits per channel
    Rgba,
    /// YUV 4:2:2 packed (Y0 U0 Y1 V0), native format of most UVC webcams
    Yuyv,
    /// Semi-planar YUV 4:2:0 (Y plane followed by interleaved UV)
    Nv12,
}

impl PixelFormat {
    /// Size in bytes of a `width` x `height` image in this format.
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            PixelFormat::Rgb => w * h * 3,
            PixelFormat::Rgba => w * h * 4,
            PixelFormat::Yuyv => w * h * 2,
            PixelFormat::Nv12 => w * h + (w + w % 2) * h.div_ceil(2),
        }
    }
}

/// A single frame produced by a capture device, decoder or network receiver.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Presentation timestamp in microseconds, if the producer knows it
    pub timestamp_us: Option<u64>,
    pub data: Vec<u8>,
}

impl VideoFrame {
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            timestamp_us: None,
            data,
        }
    }

    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = Some(timestamp_us);
        self
    }

    /// Returns true when `data` holds exactly one frame of the declared format.
    pub fn is_complete(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.format.frame_len(self.width, self.height)
    }

    /// Borrows an RGBA frame as an image view without copying.
    /// Returns `None` for other formats or truncated data.
    pub fn rgba_view(&self) -> Option<ImageBuffer<Rgba<u8>, &[u8]>> {
        if self.format != PixelFormat::Rgba {
            return None;
        }
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }

    /// Converts this frame to RGBA. Returns `None` if the data is truncated or
    /// the color conversion fails.
    pub fn to_rgba(&self) -> Option<VideoFrame> {
        if !self.is_complete() {
            tracing::debug!(
                "Dropping incomplete {:?} frame ({} bytes for {}x{})",
                self.format,
                self.data.len(),
                self.width,
                self.height
            );
            return None;
        }

        let rgba_data = match self.format {
            PixelFormat::Rgba => return Some(self.clone()),
            PixelFormat::Rgb => {
                let mut rgba = Vec::with_capacity(self.data.len() / 3 * 4);
                for px in self.data.chunks_exact(3) {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
                rgba
            }
            PixelFormat::Yuyv => self.yuv_to_rgba(ezk_image::PixelFormat::YUYV)?,
            PixelFormat::Nv12 => self.yuv_to_rgba(ezk_image::PixelFormat::NV12)?,
        };

        Some(VideoFrame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgba,
            timestamp_us: self.timestamp_us,
            data: rgba_data,
        })
    }

    fn yuv_to_rgba(&self, src_format: ezk_image::PixelFormat) -> Option<Vec<u8>> {
        let width = self.width as usize;
        let height = self.height as usize;
        let mut rgba_data = vec![0u8; width * height * 4];

        let src_color = ezk_image::ColorInfo::YUV(ezk_image::YuvColorInfo {
            transfer: ezk_image::ColorTransfer::Linear,
            primaries: ezk_image::ColorPrimaries::BT709,
            space: ezk_image::ColorSpace::BT709,
            full_range: false,
        });
        let dst_color = ezk_image::ColorInfo::RGB(ezk_image::RgbColorInfo {
            transfer: ezk_image::ColorTransfer::Linear,
            primaries: ezk_image::ColorPrimaries::BT709,
        });

        let src_image =
            ezk_image::Image::from_buffer(src_format, &self.data[..], None, width, height, src_color).ok()?;
        let mut dst_image = ezk_image::Image::from_buffer(
            ezk_image::PixelFormat::RGBA,
            &mut rgba_data[..],
            None,
            width,
            height,
            dst_color,
        )
        .ok()?;

        if let Err(e) = ezk_image::convert(&src_image, &mut dst_image) {
            tracing::warn!("Color conversion from {:?} failed: {:?}", self.format, e);
            return None;
        }
        Some(rgba_data)
    }
}

/// Vertex for rendering a full-screen quad.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl QuadVertex {
    pub const VERTICES: &'static [QuadVertex] = &[
        QuadVertex { position: [-1.0, -1.0], tex_coords: [0.0, 1.0] },
        QuadVertex { position: [1.0, -1.0], tex_coords: [1.0, 1.0] },
        QuadVertex { position: [1.0, 1.0], tex_coords: [1.0, 0.0] },
        QuadVertex { position: [-1.0, 1.0], tex_coords: [0.0, 0.0] },
    ];

    pub const INDICES: &'static [u16] = &[0, 1, 2, 2, 3, 0];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}
