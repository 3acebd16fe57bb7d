//! Nokhwa-based webcam capture backend.

use super::{AsyncCapture, CameraInfo, CaptureBackend, CaptureConfig, CaptureDevice, CaptureOpener};
use crate::error::SourceError;
use crate::frame::{PixelFormat, VideoFrame};
use anyhow::{anyhow, Context, Result};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use tracing::{debug, info, warn};

/// Webcam capture using the nokhwa library.
pub struct NokhwaCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl NokhwaCapture {
    /// Looks up a device index by its human-readable name.
    pub fn resolve_index(name: &str) -> Result<u32> {
        Self::list_devices()?
            .into_iter()
            .find(|device| device.name == name)
            .map(|device| device.index)
            .ok_or_else(|| anyhow!("no capture device named '{}'", name))
    }

    fn requested_format(config: &CaptureConfig) -> RequestedFormat<'static> {
        let request = match (config.has_resolution(), config.fps > 0) {
            (true, true) => RequestedFormatType::Closest(CameraFormat::new(
                Resolution::new(config.width, config.height),
                FrameFormat::MJPEG,
                config.fps,
            )),
            (true, false) => RequestedFormatType::HighestResolution(Resolution::new(config.width, config.height)),
            (false, true) => RequestedFormatType::HighestFrameRate(config.fps),
            (false, false) => RequestedFormatType::None,
        };
        RequestedFormat::new::<RgbFormat>(request)
    }
}

impl CaptureBackend for NokhwaCapture {
    fn list_devices() -> Result<Vec<CameraInfo>> {
        let devices = nokhwa::query(ApiBackend::Auto).context("query capture devices")?;
        Ok(devices
            .into_iter()
            .map(|d| CameraInfo {
                index: d.index().as_index().unwrap_or(0),
                name: d.human_name().to_string(),
            })
            .collect())
    }

    fn open(config: &CaptureConfig) -> Result<Self> {
        let index = Self::resolve_index(&config.device_name)?;
        let requested = Self::requested_format(config);
        debug!(
            "Opening camera {} ({}) at {}x{} @ {} fps (0 = device default)",
            index, config.device_name, config.width, config.height, config.fps
        );

        let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
            Ok(camera) => camera,
            Err(e) => {
                // Some drivers reject format hints they cannot match closely;
                // retry with whatever the device prefers.
                warn!("Camera rejected requested format ({}), falling back to device default", e);
                Camera::new(
                    CameraIndex::Index(index),
                    RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
                )
                .with_context(|| format!("open camera '{}'", config.device_name))?
            }
        };
        camera
            .open_stream()
            .with_context(|| format!("open stream on camera '{}'", config.device_name))?;

        let resolution = camera.resolution();
        info!(
            "Camera '{}' opened with {} @ {} fps ({:?})",
            config.device_name,
            resolution,
            camera.frame_rate(),
            camera.frame_format()
        );

        Ok(Self {
            camera,
            width: resolution.width(),
            height: resolution.height(),
        })
    }

    fn capture_frame(&mut self) -> Result<VideoFrame> {
        let buffer = self.camera.frame()?;
        let resolution = buffer.resolution();
        let (width, height) = (resolution.width(), resolution.height());

        // Uncompressed YUV is handed over as-is and converted on the tick
        // thread; everything else goes through nokhwa's decoder.
        let native = match buffer.source_frame_format() {
            FrameFormat::YUYV => Some(PixelFormat::Yuyv),
            FrameFormat::NV12 => Some(PixelFormat::Nv12),
            _ => None,
        };
        if let Some(format) = native {
            let frame = VideoFrame::from_data(width, height, format, buffer.buffer().to_vec());
            if frame.is_complete() {
                return Ok(frame);
            }
        }

        let decoded = buffer.decode_image::<RgbFormat>()?;
        Ok(VideoFrame::from_data(width, height, PixelFormat::Rgb, decoded.into_raw()))
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Opens nokhwa devices behind an `AsyncCapture` worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct NokhwaOpener;

impl CaptureOpener for NokhwaOpener {
    fn list_devices(&self) -> Result<Vec<CameraInfo>> {
        NokhwaCapture::list_devices()
    }

    fn open(&self, config: &CaptureConfig) -> std::result::Result<Box<dyn CaptureDevice>, SourceError> {
        if config.device_name.is_empty() {
            return Err(SourceError::ResourceUnavailable("no capture device name configured".into()));
        }
        NokhwaCapture::resolve_index(&config.device_name)
            .map_err(|e| SourceError::ResourceUnavailable(e.to_string()))?;
        Ok(Box::new(AsyncCapture::spawn::<NokhwaCapture>(config.clone())))
    }
}
