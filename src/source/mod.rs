//! The image source: one output buffer fed by whichever provider is selected.
//!
//! `ImageSource` is a state machine over [`SourceKind`]. Every setter releases
//! the live provider resource before building the one for the new
//! configuration, and `update` polls that resource once per tick,
//! compositing into the output buffer whenever it has something to show.

mod backends;
mod provider;
#[cfg(test)]
pub(crate) mod testing;

pub use backends::{Backends, GeneratorFactory};
pub use provider::ProviderResource;

use crate::buffer::{BufferManager, OutputBuffer, OutputSpec};
use crate::compose::compose;
use crate::error::SourceError;
use crate::fetch::FetchState;
use crate::frame::VideoFrame;
use crate::generator::{Pattern, PatternGenerator};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, trace, warn};

/// Which provider feeds the output buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    StaticImage,
    ImageUrl,
    VideoFile,
    VideoUrl,
    LiveCapture,
    NetworkReceiver,
    RenderView,
    #[default]
    GeneratedCard,
    GeneratedGradient,
}

/// An image or video asset configured for the source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceAsset {
    Image(Arc<RgbaImage>),
    Video(PathBuf),
}

/// A render-capable view that can draw straight into the output buffer.
///
/// The source never owns the view. It hands the view its target every tick
/// and clears it again when the view stops being the active source.
pub trait RenderView {
    fn set_target(&mut self, target: Option<OutputBuffer>);

    /// Views that render on their own schedule return true; the source then
    /// only assigns the target.
    fn is_self_driving(&self) -> bool;

    fn render(&mut self);
}

pub type RenderViewHandle = Arc<Mutex<dyn RenderView + Send>>;

/// Everything that describes the active source.
#[derive(Clone, Default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub asset: Option<SourceAsset>,
    pub url: Option<String>,
    /// Capture device name or network receiver name, depending on `kind`
    pub device_name: String,
    /// Requested capture size; zero means device default
    pub capture_resolution: (u32, u32),
    /// Requested capture rate; zero means device default
    pub capture_frame_rate: u32,
    pub render_view: Option<RenderViewHandle>,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("kind", &self.kind)
            .field("asset", &self.asset.as_ref().map(|asset| match asset {
                SourceAsset::Image(image) => format!("image {}x{}", image.width(), image.height()),
                SourceAsset::Video(path) => format!("video {}", path.display()),
            }))
            .field("url", &self.url)
            .field("device_name", &self.device_name)
            .field("capture_resolution", &self.capture_resolution)
            .field("capture_frame_rate", &self.capture_frame_rate)
            .field("render_view", &self.render_view.is_some())
            .finish()
    }
}

/// Runtime media-source multiplexer.
pub struct ImageSource {
    config: SourceConfig,
    output: BufferManager,
    backends: Backends,
    /// Shared across kind switches; dropped when the output changes
    generator: Option<Box<dyn PatternGenerator>>,
    resource: ProviderResource,
}

impl ImageSource {
    /// Builds the source and initializes the configured kind. Fails only for
    /// an invalid output resolution.
    pub fn new(config: SourceConfig, output: OutputSpec, backends: Backends) -> Result<Self, SourceError> {
        let output = BufferManager::new(output)?;
        info!("Image source starting as {:?}", config.kind);
        let mut source = Self {
            config,
            output,
            backends,
            generator: None,
            resource: ProviderResource::Released,
        };
        source.init();
        Ok(source)
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn resource(&self) -> &ProviderResource {
        &self.resource
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn kind(&self) -> SourceKind {
        self.config.kind
    }

    pub fn set_kind(&mut self, kind: SourceKind) {
        info!("Source kind {:?} -> {:?}", self.config.kind, kind);
        self.config.kind = kind;
        self.transition();
    }

    pub fn output_resolution(&self) -> (u32, u32) {
        self.output.spec().resolution
    }

    /// Fails with `InvalidResolution` and leaves everything as it was if
    /// either dimension is zero.
    pub fn set_output_resolution(&mut self, resolution: (u32, u32)) -> Result<(), SourceError> {
        let spec = OutputSpec {
            resolution,
            ..self.output.spec().clone()
        };
        self.reconfigure_output(spec)
    }

    pub fn output_destination(&self) -> Option<&OutputBuffer> {
        self.output.spec().destination.as_ref()
    }

    pub fn set_output_destination(&mut self, destination: Option<OutputBuffer>) -> Result<(), SourceError> {
        let spec = OutputSpec {
            destination,
            ..self.output.spec().clone()
        };
        self.reconfigure_output(spec)
    }

    pub fn source_asset(&self) -> Option<&SourceAsset> {
        self.config.asset.as_ref()
    }

    pub fn set_source_asset(&mut self, asset: Option<SourceAsset>) {
        self.config.asset = asset;
        self.transition();
    }

    pub fn source_url(&self) -> Option<&str> {
        self.config.url.as_deref()
    }

    pub fn set_source_url(&mut self, url: Option<String>) {
        self.config.url = url;
        self.transition();
    }

    pub fn device_name(&self) -> &str {
        &self.config.device_name
    }

    pub fn set_device_name(&mut self, name: impl Into<String>) {
        self.config.device_name = name.into();
        self.transition();
    }

    pub fn capture_resolution(&self) -> (u32, u32) {
        self.config.capture_resolution
    }

    pub fn set_capture_resolution(&mut self, resolution: (u32, u32)) {
        self.config.capture_resolution = resolution;
        self.transition();
    }

    pub fn capture_frame_rate(&self) -> u32 {
        self.config.capture_frame_rate
    }

    pub fn set_capture_frame_rate(&mut self, fps: u32) {
        self.config.capture_frame_rate = fps;
        self.transition();
    }

    pub fn render_view(&self) -> Option<&RenderViewHandle> {
        self.config.render_view.as_ref()
    }

    pub fn set_render_view(&mut self, view: Option<RenderViewHandle>) {
        self.config.render_view = view;
        self.transition();
    }

    /// The live output buffer. The handle stays valid across ticks until the
    /// output configuration changes.
    pub fn as_buffer(&mut self) -> OutputBuffer {
        self.output.current()
    }

    /// Copy of the last completed composite.
    pub fn as_image(&mut self) -> RgbaImage {
        self.output.current().snapshot()
    }

    /// Runs one tick: polls the active provider and composites whatever it
    /// has ready. A provider that is not ready leaves the buffer untouched.
    pub fn update(&mut self, time: f32) {
        let target = self.output.current();
        let written = match self.config.kind {
            SourceKind::StaticImage => match &self.config.asset {
                Some(SourceAsset::Image(image)) => {
                    target.write_with(|dst| compose(Some(&**image), dst, false))
                }
                _ => false,
            },
            SourceKind::ImageUrl => self.poll_fetch(&target),
            SourceKind::VideoFile | SourceKind::VideoUrl => match &mut self.resource {
                ProviderResource::StreamPlayer { player: Some(player) } => player
                    .frame(time)
                    .is_some_and(|frame| composite_frame(&target, frame, false)),
                _ => false,
            },
            SourceKind::LiveCapture => match &mut self.resource {
                // Only fresh frames are composited; the device flag decides
                // row order.
                ProviderResource::CaptureHandle { device: Some(device) } => {
                    let flip = device.vertically_mirrored();
                    device
                        .poll_frame()
                        .is_some_and(|frame| composite_frame(&target, &frame, flip))
                }
                _ => false,
            },
            SourceKind::NetworkReceiver => match &mut self.resource {
                ProviderResource::NetworkSubscription {
                    subscription: Some(subscription),
                    ..
                } => {
                    let flip = subscription.vertically_mirrored();
                    subscription
                        .latest_frame()
                        .is_some_and(|frame| composite_frame(&target, frame, flip))
                }
                _ => false,
            },
            SourceKind::RenderView => self.drive_view(&target),
            SourceKind::GeneratedCard => false,
            SourceKind::GeneratedGradient => self.render_pattern(&target, Pattern::Gradient, time),
        };
        if written {
            trace!("Composited {:?} at t={:.3} (generation {})", self.config.kind, time, target.generation());
        }
    }

    fn transition(&mut self) {
        self.resource.release();
        self.init();
    }

    fn init(&mut self) {
        self.resource = ProviderResource::acquire(&self.config, &self.backends);
        if self.config.kind == SourceKind::GeneratedCard {
            let target = self.output.current();
            self.render_pattern(&target, Pattern::Card, 0.0);
        }
    }

    fn reconfigure_output(&mut self, spec: OutputSpec) -> Result<(), SourceError> {
        spec.validate()?;
        self.resource.release();
        if self.generator.take().is_some() {
            debug!("Releasing pattern generator");
        }
        self.output.reconfigure(spec)?;
        self.init();
        Ok(())
    }

    fn render_pattern(&mut self, target: &OutputBuffer, pattern: Pattern, time: f32) -> bool {
        let factory = &self.backends.generator;
        let generator = self.generator.get_or_insert_with(|| factory());
        target.write_with(|image| {
            generator.render(pattern, time, image);
            true
        })
    }

    fn poll_fetch(&mut self, target: &OutputBuffer) -> bool {
        let ProviderResource::HttpImageFetch { request } = &mut self.resource else {
            return false;
        };
        let Some(pending) = request else {
            return false;
        };
        match pending.poll() {
            FetchState::Pending => false,
            FetchState::Ready(image) => {
                info!("Image URL delivered {}x{}", image.width(), image.height());
                *request = None;
                target.write_with(|dst| compose(Some(&image), dst, false))
            }
            FetchState::Failed(e) => {
                warn!("Image URL fetch failed: {}", e);
                *request = None;
                false
            }
        }
    }

    fn drive_view(&mut self, target: &OutputBuffer) -> bool {
        let ProviderResource::RenderView { view: Some(view) } = &self.resource else {
            return false;
        };
        let before = target.generation();
        let mut view = view.lock().unwrap_or_else(PoisonError::into_inner);
        view.set_target(Some(target.clone()));
        if !view.is_self_driving() {
            view.render();
        }
        target.generation() != before
    }
}

impl Drop for ImageSource {
    fn drop(&mut self) {
        debug!("Tearing down {:?} source", self.config.kind);
        self.resource.release();
        self.output.release();
    }
}

/// Composites a provider frame, converting it to RGBA first if needed.
fn composite_frame(target: &OutputBuffer, frame: &VideoFrame, vertical_flip: bool) -> bool {
    if let Some(view) = frame.rgba_view() {
        return target.write_with(|dst| compose(Some(&view), dst, vertical_flip));
    }
    let Some(converted) = frame.to_rgba() else {
        return false;
    };
    let view = converted.rgba_view();
    target.write_with(|dst| compose(view.as_ref(), dst, vertical_flip))
}

#[cfg(test)]
mod tests {
    use super::testing::{solid_image, striped_frame, FakeBackends, FakeView, CARD_COLOR};
    use super::*;
    use crate::capture::CaptureConfig;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn small_output() -> OutputSpec {
        OutputSpec {
            destination: None,
            resolution: (4, 4),
        }
    }

    fn source(fakes: &FakeBackends, config: SourceConfig) -> ImageSource {
        ImageSource::new(config, small_output(), fakes.backends()).unwrap()
    }

    #[test]
    fn test_card_renders_once_at_init() {
        let fakes = FakeBackends::new();
        let spec = OutputSpec {
            destination: None,
            resolution: (640, 360),
        };
        let mut source = ImageSource::new(SourceConfig::default(), spec, fakes.backends()).unwrap();

        let buffer = source.as_buffer();
        assert_eq!(buffer.dimensions(), (640, 360));
        assert_eq!(buffer.generation(), 1);
        assert_eq!(buffer.read().get_pixel(320, 180).0, CARD_COLOR);

        for tick in 0..5 {
            source.update(tick as f32 / 30.0);
        }
        assert_eq!(buffer.generation(), 1);
        assert_eq!(fakes.renders(), 1);
    }

    #[test]
    fn test_gradient_renders_every_tick() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::GeneratedGradient,
                ..Default::default()
            },
        );
        let buffer = source.as_buffer();
        assert_eq!(buffer.generation(), 0);

        source.update(0.0);
        source.update(0.5);
        source.update(1.0);
        assert_eq!(buffer.generation(), 3);
        assert_eq!(buffer.read().get_pixel(0, 0).0, [10, 0, 200, 255]);
    }

    #[test]
    fn test_kind_switch_releases_before_acquire() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::LiveCapture,
                device_name: "Cam0".into(),
                url: Some("rtsp://feed".into()),
                ..Default::default()
            },
        );

        source.set_kind(SourceKind::VideoUrl);
        source.set_kind(SourceKind::NetworkReceiver);
        assert!(!source.resource().is_live());
        source.set_device_name("studio-a");
        assert!(source.resource().is_live());

        assert_eq!(
            fakes.events(),
            vec![
                "capture:open:Cam0",
                "capture:close:Cam0",
                "player:open:rtsp://feed",
                "player:close:rtsp://feed",
                "network:subscribe:studio-a",
            ]
        );
    }

    #[test]
    fn test_parameter_change_reopens_device() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::LiveCapture,
                device_name: "Cam0".into(),
                ..Default::default()
            },
        );
        source.set_capture_frame_rate(60);
        assert_eq!(source.capture_frame_rate(), 60);

        assert_eq!(
            fakes.events(),
            vec!["capture:open:Cam0", "capture:close:Cam0", "capture:open:Cam0"]
        );
        let configs = fakes.capture_configs.lock().unwrap();
        assert_eq!(configs[0].fps, 0);
        assert_eq!(configs[1].fps, 60);
    }

    #[test]
    fn test_live_capture_composites_only_new_frames() {
        let fakes = FakeBackends::new();
        fakes.capture_mirrored.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::LiveCapture,
                device_name: "Cam0".into(),
                capture_resolution: (1280, 720),
                capture_frame_rate: 30,
                ..Default::default()
            },
        );
        assert_eq!(
            fakes.capture_configs.lock().unwrap()[0],
            CaptureConfig {
                device_name: "Cam0".into(),
                width: 1280,
                height: 720,
                fps: 30,
            }
        );

        let buffer = source.as_buffer();
        source.update(0.0);
        assert_eq!(buffer.generation(), 0);

        fakes.capture_frames.lock().unwrap().push_back(striped_frame(2, &[RED, BLUE]));
        source.update(0.033);
        assert_eq!(buffer.generation(), 1);
        // The device reports bottom-to-top rows, so the image lands flipped.
        assert_eq!(buffer.read().get_pixel(1, 0).0, BLUE);
        assert_eq!(buffer.read().get_pixel(1, 3).0, RED);

        source.update(0.066);
        source.update(0.1);
        assert_eq!(buffer.generation(), 1);
    }

    #[test]
    fn test_image_url_composites_once() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::ImageUrl,
                url: Some("http://images/a.png".into()),
                ..Default::default()
            },
        );
        let buffer = source.as_buffer();
        source.update(0.0);
        source.update(0.1);
        assert_eq!(buffer.generation(), 0);

        *fakes.fetch_result.lock().unwrap() = Some(Ok(solid_image(2, 2, [1, 2, 3, 255])));
        source.update(0.2);
        assert_eq!(buffer.generation(), 1);
        assert_eq!(buffer.read().get_pixel(2, 2).0, [1, 2, 3, 255]);
        assert!(!source.resource().is_live());

        *fakes.fetch_result.lock().unwrap() = Some(Ok(solid_image(2, 2, [9, 9, 9, 255])));
        for tick in 0..10 {
            source.update(0.3 + tick as f32);
        }
        assert_eq!(buffer.generation(), 1);
        assert_eq!(
            fakes.events(),
            vec!["fetch:http://images/a.png", "fetch:drop:http://images/a.png"]
        );
    }

    #[test]
    fn test_failed_fetch_leaves_source_inert() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::ImageUrl,
                url: Some("http://images/missing.png".into()),
                ..Default::default()
            },
        );
        *fakes.fetch_result.lock().unwrap() = Some(Err(SourceError::Fetch("404".into())));
        source.update(0.0);
        assert!(!source.resource().is_live());
        assert_eq!(source.as_buffer().generation(), 0);
    }

    #[test]
    fn test_image_url_abandoned_for_card() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::ImageUrl,
                url: Some("http://images/slow.png".into()),
                ..Default::default()
            },
        );
        source.set_kind(SourceKind::GeneratedCard);
        assert_eq!(
            fakes.events(),
            vec![
                "fetch:http://images/slow.png",
                "fetch:drop:http://images/slow.png",
                "generator:new",
            ]
        );

        *fakes.fetch_result.lock().unwrap() = Some(Ok(solid_image(2, 2, [1, 2, 3, 255])));
        source.update(0.0);
        source.update(0.1);
        let buffer = source.as_buffer();
        assert_eq!(buffer.generation(), 1);
        assert_eq!(buffer.read().get_pixel(0, 0).0, CARD_COLOR);
    }

    #[test]
    fn test_not_ready_ticks_keep_previous_content() {
        let fakes = FakeBackends::new();
        let mut source = source(&fakes, SourceConfig::default());
        let before = source.as_image();

        for kind in [
            SourceKind::StaticImage,
            SourceKind::ImageUrl,
            SourceKind::VideoFile,
            SourceKind::VideoUrl,
            SourceKind::LiveCapture,
            SourceKind::NetworkReceiver,
            SourceKind::RenderView,
        ] {
            source.set_kind(kind);
            source.update(0.0);
            source.update(1.0);
        }
        assert_eq!(source.as_buffer().generation(), 1);
        assert_eq!(source.as_image(), before);
    }

    #[test]
    fn test_external_destination_frees_internal_buffer() {
        let fakes = FakeBackends::new();
        let mut source = source(&fakes, SourceConfig::default());
        let weak = source.as_buffer().downgrade();
        assert!(weak.upgrade().is_some());

        let external = OutputBuffer::new(16, 9).unwrap();
        source.set_output_destination(Some(external.clone())).unwrap();
        assert!(weak.upgrade().is_none());
        assert!(source.as_buffer().ptr_eq(&external));
        assert!(source.output_destination().is_some());
        // The card is redrawn into the caller's buffer with a fresh generator.
        assert_eq!(external.generation(), 1);
        assert_eq!(fakes.renders(), 2);
        assert_eq!(fakes.events(), vec!["generator:new", "generator:new"]);

        drop(source);
        assert_eq!(external.dimensions(), (16, 9));
    }

    #[test]
    fn test_invalid_resolution_is_rejected_without_teardown() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::LiveCapture,
                device_name: "Cam1".into(),
                ..Default::default()
            },
        );
        let err = source.set_output_resolution((0, 10)).unwrap_err();
        assert!(matches!(err, SourceError::InvalidResolution { width: 0, height: 10 }));
        assert_eq!(source.output_resolution(), (4, 4));
        assert_eq!(fakes.events(), vec!["capture:open:Cam1"]);

        assert!(ImageSource::new(
            SourceConfig::default(),
            OutputSpec {
                destination: None,
                resolution: (8, 0)
            },
            fakes.backends()
        )
        .is_err());
    }

    #[test]
    fn test_resolution_change_reallocates_buffer() {
        let fakes = FakeBackends::new();
        let mut source = source(&fakes, SourceConfig::default());
        let before = source.as_buffer();
        source.set_output_resolution((8, 2)).unwrap();
        let after = source.as_buffer();
        assert!(!after.ptr_eq(&before));
        assert_eq!(after.dimensions(), (8, 2));
        assert_eq!(after.generation(), 1);
    }

    #[test]
    fn test_static_image_composites_asset() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::StaticImage,
                asset: Some(SourceAsset::Image(Arc::new(solid_image(8, 8, BLUE)))),
                ..Default::default()
            },
        );
        source.update(0.0);
        source.update(0.1);
        let buffer = source.as_buffer();
        assert_eq!(buffer.generation(), 2);
        assert_eq!(buffer.read().get_pixel(3, 3).0, BLUE);
    }

    #[test]
    fn test_video_composites_every_tick_once_decoded() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::VideoFile,
                asset: Some(SourceAsset::Video(PathBuf::from("clip.mp4"))),
                ..Default::default()
            },
        );
        let buffer = source.as_buffer();
        source.update(0.0);
        assert_eq!(buffer.generation(), 0);

        *fakes.player_frame.lock().unwrap() = Some(striped_frame(2, &[RED, BLUE]));
        source.update(0.1);
        source.update(0.2);
        assert_eq!(buffer.generation(), 2);
        // Video decoders deliver top-to-bottom rows.
        assert_eq!(buffer.read().get_pixel(0, 0).0, RED);
        assert_eq!(fakes.events(), vec!["player:open:clip.mp4"]);
    }

    #[test]
    fn test_network_receiver_shows_latest_frame() {
        let fakes = FakeBackends::new();
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::NetworkReceiver,
                device_name: "studio-b".into(),
                ..Default::default()
            },
        );
        let buffer = source.as_buffer();
        source.update(0.0);
        assert_eq!(buffer.generation(), 0);

        *fakes.network_frame.lock().unwrap() = Some(striped_frame(4, &[RED, RED, BLUE, BLUE]));
        source.update(0.1);
        assert_eq!(buffer.read().get_pixel(0, 0).0, RED);
        assert_eq!(buffer.read().get_pixel(0, 3).0, BLUE);
        source.update(0.2);
        assert_eq!(buffer.generation(), 2);
    }

    #[test]
    fn test_render_view_is_driven_and_detached() {
        let fakes = FakeBackends::new();
        let view = Arc::new(Mutex::new(FakeView::default()));
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::RenderView,
                render_view: Some(view.clone()),
                ..Default::default()
            },
        );
        let buffer = source.as_buffer();
        source.update(0.0);
        source.update(0.1);
        {
            let view = view.lock().unwrap();
            assert_eq!(view.renders, 2);
            assert!(view.target.as_ref().is_some_and(|target| target.ptr_eq(&buffer)));
        }
        assert_eq!(buffer.generation(), 2);
        assert_eq!(buffer.read().get_pixel(0, 0).0, [0, 255, 0, 255]);

        source.set_kind(SourceKind::GeneratedGradient);
        assert!(view.lock().unwrap().target.is_none());
    }

    #[test]
    fn test_self_driving_view_only_gets_target() {
        let fakes = FakeBackends::new();
        let view = Arc::new(Mutex::new(FakeView {
            self_driving: true,
            ..Default::default()
        }));
        let mut source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::RenderView,
                render_view: Some(view.clone()),
                ..Default::default()
            },
        );
        source.update(0.0);
        let view = view.lock().unwrap();
        assert_eq!(view.renders, 0);
        assert!(view.target.is_some());
    }

    #[test]
    fn test_drop_releases_live_resource() {
        let fakes = FakeBackends::new();
        let source = source(
            &fakes,
            SourceConfig {
                kind: SourceKind::LiveCapture,
                device_name: "Cam0".into(),
                ..Default::default()
            },
        );
        drop(source);
        assert_eq!(fakes.events(), vec!["capture:open:Cam0", "capture:close:Cam0"]);
    }
}
