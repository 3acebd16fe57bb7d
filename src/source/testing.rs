//! In-memory backends that record what the core asks of them.

use super::backends::Backends;
use super::RenderView;
use crate::buffer::OutputBuffer;
use crate::capture::{CameraInfo, CaptureConfig, CaptureDevice, CaptureOpener};
use crate::error::SourceError;
use crate::fetch::{FetchState, ImageFetcher, PendingImage};
use crate::frame::{PixelFormat, VideoFrame};
use crate::generator::{Pattern, PatternGenerator};
use crate::network::{NetworkSubscription, SourceDirectory};
use crate::video::{PlayerOpener, StreamPlayer, StreamSource};
use image::{Rgba, RgbaImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CARD_COLOR: [u8; 4] = [200, 10, 10, 255];

type Log = Arc<Mutex<Vec<String>>>;
type Slot<T> = Arc<Mutex<Option<T>>>;

fn record(log: &Log, event: String) {
    log.lock().unwrap().push(event);
}

/// Shared state behind a set of fake backends.
#[derive(Default)]
pub struct FakeBackends {
    log: Log,
    pub capture_configs: Arc<Mutex<Vec<CaptureConfig>>>,
    pub capture_frames: Arc<Mutex<VecDeque<VideoFrame>>>,
    pub capture_mirrored: Arc<AtomicBool>,
    pub fetch_result: Slot<Result<RgbaImage, SourceError>>,
    pub player_frame: Slot<VideoFrame>,
    pub network_frame: Slot<VideoFrame>,
    pub renders: Arc<AtomicUsize>,
}

impl FakeBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn backends(&self) -> Backends {
        let log = self.log.clone();
        let renders = self.renders.clone();
        Backends {
            capture: Box::new(RecordingOpener {
                log: self.log.clone(),
                configs: self.capture_configs.clone(),
                frames: self.capture_frames.clone(),
                mirrored: self.capture_mirrored.clone(),
            }),
            fetcher: Box::new(ScriptedFetcher {
                log: self.log.clone(),
                result: self.fetch_result.clone(),
            }),
            player: Box::new(FakePlayerOpener {
                log: self.log.clone(),
                frame: self.player_frame.clone(),
            }),
            directory: Box::new(FakeDirectory {
                log: self.log.clone(),
                frame: self.network_frame.clone(),
            }),
            generator: Box::new(move || -> Box<dyn PatternGenerator> {
                record(&log, "generator:new".into());
                Box::new(CountingGenerator { renders: renders.clone() })
            }),
        }
    }
}

/// An RGBA frame whose rows are filled with the given colors, top to bottom.
pub fn striped_frame(width: u32, rows: &[[u8; 4]]) -> VideoFrame {
    let mut data = Vec::new();
    for row in rows {
        for _ in 0..width {
            data.extend_from_slice(row);
        }
    }
    VideoFrame::from_data(width, rows.len() as u32, PixelFormat::Rgba, data)
}

pub fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

struct RecordingOpener {
    log: Log,
    configs: Arc<Mutex<Vec<CaptureConfig>>>,
    frames: Arc<Mutex<VecDeque<VideoFrame>>>,
    mirrored: Arc<AtomicBool>,
}

const DEVICES: [&str; 2] = ["Cam0", "Cam1"];

impl CaptureOpener for RecordingOpener {
    fn list_devices(&self) -> anyhow::Result<Vec<CameraInfo>> {
        Ok(DEVICES
            .iter()
            .enumerate()
            .map(|(index, name)| CameraInfo { index: index as u32, name: name.to_string() })
            .collect())
    }

    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureDevice>, SourceError> {
        if !DEVICES.contains(&config.device_name.as_str()) {
            return Err(SourceError::ResourceUnavailable(config.device_name.clone()));
        }
        record(&self.log, format!("capture:open:{}", config.device_name));
        self.configs.lock().unwrap().push(config.clone());
        Ok(Box::new(FakeDevice {
            name: config.device_name.clone(),
            log: self.log.clone(),
            frames: self.frames.clone(),
            mirrored: self.mirrored.load(Ordering::SeqCst),
        }))
    }
}

struct FakeDevice {
    name: String,
    log: Log,
    frames: Arc<Mutex<VecDeque<VideoFrame>>>,
    mirrored: bool,
}

impl CaptureDevice for FakeDevice {
    fn poll_frame(&mut self) -> Option<VideoFrame> {
        self.frames.lock().unwrap().pop_front()
    }

    fn vertically_mirrored(&self) -> bool {
        self.mirrored
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        record(&self.log, format!("capture:close:{}", self.name));
    }
}

struct ScriptedFetcher {
    log: Log,
    result: Slot<Result<RgbaImage, SourceError>>,
}

impl ImageFetcher for ScriptedFetcher {
    fn fetch(&self, url: &str) -> Box<dyn PendingImage> {
        record(&self.log, format!("fetch:{}", url));
        Box::new(ScriptedRequest {
            url: url.to_string(),
            log: self.log.clone(),
            result: self.result.clone(),
        })
    }
}

struct ScriptedRequest {
    url: String,
    log: Log,
    result: Slot<Result<RgbaImage, SourceError>>,
}

impl PendingImage for ScriptedRequest {
    fn poll(&mut self) -> FetchState {
        match self.result.lock().unwrap().take() {
            None => FetchState::Pending,
            Some(Ok(image)) => FetchState::Ready(image),
            Some(Err(e)) => FetchState::Failed(e),
        }
    }
}

impl Drop for ScriptedRequest {
    fn drop(&mut self) {
        record(&self.log, format!("fetch:drop:{}", self.url));
    }
}

struct FakePlayerOpener {
    log: Log,
    frame: Slot<VideoFrame>,
}

impl PlayerOpener for FakePlayerOpener {
    fn open(&self, source: &StreamSource) -> Box<dyn StreamPlayer> {
        let name = match source {
            StreamSource::File(path) => path.display().to_string(),
            StreamSource::Url(url) => url.clone(),
        };
        record(&self.log, format!("player:open:{}", name));
        Box::new(FakePlayer {
            name,
            log: self.log.clone(),
            frame: self.frame.clone(),
            current: None,
        })
    }
}

struct FakePlayer {
    name: String,
    log: Log,
    frame: Slot<VideoFrame>,
    current: Option<VideoFrame>,
}

impl StreamPlayer for FakePlayer {
    fn frame(&mut self, _time: f32) -> Option<&VideoFrame> {
        self.current = self.frame.lock().unwrap().clone();
        self.current.as_ref()
    }
}

impl Drop for FakePlayer {
    fn drop(&mut self) {
        record(&self.log, format!("player:close:{}", self.name));
    }
}

pub const RECEIVERS: [&str; 2] = ["studio-a", "studio-b"];

struct FakeDirectory {
    log: Log,
    frame: Slot<VideoFrame>,
}

impl SourceDirectory for FakeDirectory {
    fn source_names(&self) -> Vec<String> {
        RECEIVERS.iter().map(|name| name.to_string()).collect()
    }

    fn subscribe(&self, name: &str) -> Result<Box<dyn NetworkSubscription>, SourceError> {
        if !RECEIVERS.contains(&name) {
            return Err(SourceError::ResourceUnavailable(name.to_string()));
        }
        record(&self.log, format!("network:subscribe:{}", name));
        Ok(Box::new(FakeSubscription {
            name: name.to_string(),
            log: self.log.clone(),
            frame: self.frame.clone(),
            latest: None,
        }))
    }
}

struct FakeSubscription {
    name: String,
    log: Log,
    frame: Slot<VideoFrame>,
    latest: Option<VideoFrame>,
}

impl NetworkSubscription for FakeSubscription {
    fn latest_frame(&mut self) -> Option<&VideoFrame> {
        if let Some(frame) = self.frame.lock().unwrap().take() {
            self.latest = Some(frame);
        }
        self.latest.as_ref()
    }
}

impl Drop for FakeSubscription {
    fn drop(&mut self) {
        record(&self.log, format!("network:close:{}", self.name));
    }
}

struct CountingGenerator {
    renders: Arc<AtomicUsize>,
}

impl PatternGenerator for CountingGenerator {
    fn render(&mut self, pattern: Pattern, time: f32, target: &mut RgbaImage) {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let color = match pattern {
            Pattern::Card => CARD_COLOR,
            Pattern::Gradient => [(time * 10.0) as u8, 0, 200, 255],
        };
        for pixel in target.pixels_mut() {
            *pixel = Rgba(color);
        }
    }
}

/// Render view that paints its target green when asked to render.
#[derive(Default)]
pub struct FakeView {
    pub target: Option<OutputBuffer>,
    pub self_driving: bool,
    pub renders: usize,
}

impl RenderView for FakeView {
    fn set_target(&mut self, target: Option<OutputBuffer>) {
        self.target = target;
    }

    fn is_self_driving(&self) -> bool {
        self.self_driving
    }

    fn render(&mut self) {
        self.renders += 1;
        if let Some(target) = &self.target {
            target.write_with(|image| {
                for pixel in image.pixels_mut() {
                    *pixel = Rgba([0, 255, 0, 255]);
                }
                true
            });
        }
    }
}
