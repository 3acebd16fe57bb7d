//! Live capture devices.
//!
//! A `CaptureBackend` is a blocking, single-threaded camera driver. The core
//! never talks to one directly: `AsyncCapture` runs the backend on a worker
//! thread and exposes the non-blocking `CaptureDevice` view the tick loop
//! polls.

mod nokhwa_backend;

pub use nokhwa_backend::{NokhwaCapture, NokhwaOpener};

use crate::error::SourceError;
use crate::frame::VideoFrame;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Trait for blocking webcam capture backends.
pub trait CaptureBackend {
    /// Returns a list of available camera devices.
    fn list_devices() -> Result<Vec<CameraInfo>>
    where
        Self: Sized;

    /// Opens the named camera with the requested format hints.
    fn open(config: &CaptureConfig) -> Result<Self>
    where
        Self: Sized;

    /// Blocks until the next frame is available.
    fn capture_frame(&mut self) -> Result<VideoFrame>;

    /// Returns the negotiated frame dimensions.
    fn frame_size(&self) -> (u32, u32);

    /// Whether the device delivers rows bottom-to-top.
    fn vertically_mirrored(&self) -> bool {
        false
    }
}

/// Information about a camera device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Device index
    pub index: u32,
    /// Human-readable name
    pub name: String,
}

/// Configuration for camera capture. Zero width, height or fps means "use
/// the device default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureConfig {
    pub device_name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CaptureConfig {
    pub fn has_resolution(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Non-blocking view of an open capture device, polled once per tick.
pub trait CaptureDevice: Send {
    /// Returns the frame delivered since the previous poll, if any.
    fn poll_frame(&mut self) -> Option<VideoFrame>;

    /// Whether frames from this device must be flipped vertically.
    fn vertically_mirrored(&self) -> bool;
}

/// Enumerates and opens capture devices.
pub trait CaptureOpener {
    fn list_devices(&self) -> Result<Vec<CameraInfo>>;

    /// Starts capturing from the configured device. Fails with
    /// `ResourceUnavailable` when no device matches the name.
    fn open(&self, config: &CaptureConfig) -> std::result::Result<Box<dyn CaptureDevice>, SourceError>;
}

/// Longest a drop waits for the capture thread to exit.
const JOIN_TIMEOUT: Duration = Duration::from_millis(500);

struct CaptureShared {
    latest: Mutex<Option<VideoFrame>>,
    running: AtomicBool,
    mirrored: AtomicBool,
}

/// Runs a `CaptureBackend` on its own thread and keeps the newest frame.
///
/// The backend is opened on the worker so drivers whose handles are not
/// `Send` work too. Dropping an `AsyncCapture` stops the worker and waits up
/// to `JOIN_TIMEOUT` for it to close the device. A worker stuck inside the
/// driver is detached and closes the device when its read returns.
pub struct AsyncCapture {
    shared: Arc<CaptureShared>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncCapture {
    pub fn spawn<B: CaptureBackend + 'static>(config: CaptureConfig) -> Self {
        let shared = Arc::new(CaptureShared {
            latest: Mutex::new(None),
            running: AtomicBool::new(true),
            mirrored: AtomicBool::new(false),
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(format!("capture:{}", config.device_name))
            .spawn(move || Self::capture_loop::<B>(config, worker_shared));

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to start capture thread: {}", e);
                None
            }
        };

        Self { shared, worker }
    }

    fn capture_loop<B: CaptureBackend>(config: CaptureConfig, shared: Arc<CaptureShared>) {
        let mut backend = match B::open(&config) {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Capture device '{}' unavailable: {:#}", config.device_name, e);
                return;
            }
        };
        let (width, height) = backend.frame_size();
        info!("Capturing from '{}' at {}x{}", config.device_name, width, height);
        shared.mirrored.store(backend.vertically_mirrored(), Ordering::Release);

        let mut failures = 0u32;
        while shared.running.load(Ordering::Acquire) {
            match backend.capture_frame() {
                Ok(frame) => {
                    failures = 0;
                    *shared.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
                }
                Err(e) => {
                    failures += 1;
                    if failures == 1 || failures % 100 == 0 {
                        warn!("Capture from '{}' failed ({}x): {:#}", config.device_name, failures, e);
                    }
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
        debug!("Capture thread for '{}' finished", config.device_name);
    }
}

impl CaptureDevice for AsyncCapture {
    fn poll_frame(&mut self) -> Option<VideoFrame> {
        self.shared.latest.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn vertically_mirrored(&self) -> bool {
        self.shared.mirrored.load(Ordering::Acquire)
    }
}

impl Drop for AsyncCapture {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        let Some(worker) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + JOIN_TIMEOUT;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                warn!("Capture thread did not stop within {:?}, detaching it", JOIN_TIMEOUT);
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        if worker.join().is_err() {
            warn!("Capture thread panicked");
        }
    }
}
