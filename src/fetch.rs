//! One-shot HTTP image downloads.

use crate::error::SourceError;
use image::RgbaImage;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Largest payload accepted from an image URL.
const MAX_IMAGE_BYTES: usize = 64 * 1024 * 1024;

/// Longest wait for a TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket read timeout. An abandoned request notices within one interval.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Total time a request may take before it fails.
const REQUEST_DEADLINE: Duration = Duration::from_secs(60);

/// Outcome of polling an in-flight request.
#[derive(Debug)]
pub enum FetchState {
    Pending,
    Ready(RgbaImage),
    Failed(SourceError),
}

/// An image request in flight. Dropping it abandons the request: whatever
/// arrives later is discarded.
pub trait PendingImage: Send {
    /// Non-blocking check. Returns `Ready`/`Failed` exactly once; later polls
    /// report `Failed` as well.
    fn poll(&mut self) -> FetchState;
}

/// Issues asynchronous image requests.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Box<dyn PendingImage>;
}

/// Fetches images with `ureq` on a short-lived worker thread.
///
/// The socket uses a short read timeout so the worker can see that its
/// request was abandoned and close the connection.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    deadline: Duration,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_poll_interval(POLL_INTERVAL)
    }

    pub fn with_poll_interval(interval: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(CONNECT_TIMEOUT)
                .timeout_read(interval)
                .build(),
            deadline: REQUEST_DEADLINE,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Box<dyn PendingImage> {
        let (tx, rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let request = Request {
            url: url.to_string(),
            cancelled: cancelled.clone(),
            deadline: Instant::now() + self.deadline,
        };
        let agent = self.agent.clone();
        debug!("Requesting image {}", request.url);

        let spawned = thread::Builder::new().name("image-fetch".into()).spawn(move || {
            let result = download(&agent, &request).and_then(|bytes| decode(&bytes));
            if tx.send(result).is_err() {
                debug!("Image request for {} was abandoned", request.url);
            }
        });
        if let Err(e) = spawned {
            warn!("Failed to start image request: {}", e);
        }

        Box::new(HttpRequest { rx, cancelled })
    }
}

/// Worker-side view of one request.
struct Request {
    url: String,
    cancelled: Arc<AtomicBool>,
    deadline: Instant,
}

impl Request {
    /// Fails once the request was abandoned or ran out of time.
    fn check(&self) -> Result<(), SourceError> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(SourceError::Fetch(format!("{}: request abandoned", self.url)));
        }
        if Instant::now() >= self.deadline {
            return Err(SourceError::Fetch(format!("{}: timed out", self.url)));
        }
        Ok(())
    }
}

fn download(agent: &ureq::Agent, request: &Request) -> Result<Vec<u8>, SourceError> {
    // A timeout while waiting for the status line resends the GET.
    let response = loop {
        request.check()?;
        match agent.get(&request.url).call() {
            Ok(response) => break response,
            Err(e) if is_timeout(&e) => trace!("No answer from {} yet", request.url),
            Err(e) => return Err(SourceError::Fetch(format!("{}: {}", request.url, e))),
        }
    };
    read_body(response.into_reader(), request, MAX_IMAGE_BYTES)
}

/// Reads the whole body, checking for abandonment between socket reads.
fn read_body(mut reader: impl Read, request: &Request, max_bytes: usize) -> Result<Vec<u8>, SourceError> {
    let mut bytes = Vec::new();
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if bytes.len() + n > max_bytes {
                    return Err(SourceError::Fetch(format!(
                        "{}: payload exceeds {} bytes",
                        request.url, max_bytes
                    )));
                }
                bytes.extend_from_slice(&chunk[..n]);
            }
            Err(e) if is_io_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
        request.check()?;
    }
    if bytes.is_empty() {
        return Err(SourceError::Fetch(format!("{}: empty response", request.url)));
    }
    Ok(bytes)
}

fn is_io_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn is_timeout(e: &ureq::Error) -> bool {
    let ureq::Error::Transport(transport) = e else {
        return false;
    };
    transport.kind() == ureq::ErrorKind::Io
        && std::error::Error::source(transport)
            .and_then(|source| source.downcast_ref::<io::Error>())
            .is_some_and(is_io_timeout)
}

/// Decodes an encoded image payload (PNG, JPEG, ...) into RGBA.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, SourceError> {
    let image = image::load_from_memory(bytes).map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(image.into_rgba8())
}

struct HttpRequest {
    rx: Receiver<Result<RgbaImage, SourceError>>,
    cancelled: Arc<AtomicBool>,
}

impl PendingImage for HttpRequest {
    fn poll(&mut self) -> FetchState {
        match self.rx.try_recv() {
            Ok(Ok(image)) => FetchState::Ready(image),
            Ok(Err(e)) => FetchState::Failed(e),
            Err(TryRecvError::Empty) => FetchState::Pending,
            Err(TryRecvError::Disconnected) => {
                FetchState::Failed(SourceError::Fetch("request worker exited without a result".into()))
            }
        }
    }
}

impl Drop for HttpRequest {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
