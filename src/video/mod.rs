//! Video decoding for file, URL and live network sources.
//!
//! Decoding runs the `ffmpeg` command-line tool on a worker thread and reads
//! raw RGBA frames from its stdout. Probing and streaming-platform URL
//! resolution happen on the same worker, so opening a player never blocks
//! the tick loop.

use crate::frame::{PixelFormat, VideoFrame};
use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Where a stream player reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    File(PathBuf),
    Url(String),
}

impl StreamSource {
    fn input(&self) -> String {
        match self {
            StreamSource::File(path) => path.to_string_lossy().into_owned(),
            StreamSource::Url(url) => url.clone(),
        }
    }
}

/// A looping player whose current frame follows the tick clock.
pub trait StreamPlayer: Send {
    /// Frame to show at `time` seconds, or `None` while nothing is decoded yet.
    fn frame(&mut self, time: f32) -> Option<&VideoFrame>;
}

/// Creates stream players. Opening never fails: a player that cannot decode
/// simply never produces a frame.
pub trait PlayerOpener {
    fn open(&self, source: &StreamSource) -> Box<dyn StreamPlayer>;
}

/// Opens `VideoPlayer`s backed by the ffmpeg CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegOpener;

impl PlayerOpener for FfmpegOpener {
    fn open(&self, source: &StreamSource) -> Box<dyn StreamPlayer> {
        Box::new(VideoPlayer::open(source.clone()))
    }
}

/// Supported streaming platforms
enum StreamingPlatform {
    YouTube,
    Twitch,
}

/// Check if a URL belongs to a known streaming platform by parsing the domain.
fn detect_streaming_platform(input: &str) -> Option<StreamingPlatform> {
    let parsed = Url::parse(input).ok()?;
    let host = parsed.host_str()?;
    let domain = host.strip_prefix("www.").unwrap_or(host);

    match domain {
        "youtube.com" | "youtu.be" | "m.youtube.com" => Some(StreamingPlatform::YouTube),
        "twitch.tv" => Some(StreamingPlatform::Twitch),
        _ => None,
    }
}

fn is_network_input(input: &str) -> bool {
    Url::parse(input).map(|url| url.scheme() != "file").unwrap_or(false)
}

/// Stream properties reported by ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
struct StreamInfo {
    width: u32,
    height: u32,
    fps: f32,
}

/// Parses `width,height,r_frame_rate` as printed by
/// `ffprobe -show_entries stream=width,height,r_frame_rate -of csv=p=0`.
fn parse_probe(output: &str) -> Result<StreamInfo> {
    let line = output.lines().find(|l| !l.trim().is_empty()).ok_or_else(|| anyhow!("empty ffprobe output"))?;
    let mut parts = line.trim().split(',');
    let width: u32 = parts.next().unwrap_or_default().parse().context("ffprobe width")?;
    let height: u32 = parts.next().unwrap_or_default().parse().context("ffprobe height")?;
    let fps = parts.next().map(parse_fps).unwrap_or(30.0);
    if width == 0 || height == 0 {
        return Err(anyhow!("ffprobe reported an empty frame size"));
    }
    Ok(StreamInfo {
        width,
        height,
        fps: if fps > 0.0 { fps } else { 30.0 },
    })
}

fn parse_fps(s: &str) -> f32 {
    if let Some((num, den)) = s.split_once('/') {
        let n: f32 = num.trim().parse().unwrap_or(0.0);
        let d: f32 = den.trim().parse().unwrap_or(1.0);
        if d == 0.0 { 0.0 } else { n / d }
    } else {
        s.trim().parse().unwrap_or(30.0)
    }
}

/// What the decoder does when the input ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndOfStream {
    /// Restart from the beginning, keeping timestamps monotonic.
    Loop,
    /// Reconnect after a short pause.
    Reconnect,
}

/// State shared between a decoder handle and its worker thread.
struct WorkerControl {
    stop: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl WorkerControl {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Spawns `command` with a piped stdout and registers the child so a
    /// stopping handle can kill it.
    fn spawn(&self, command: &mut Command) -> Result<(ChildStdout, Option<std::process::ChildStderr>)> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {:?}", command.get_program()))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("child has no stdout"))?;
        let stderr = child.stderr.take();

        let mut slot = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if self.stopped() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("decoder stopped"));
        }
        *slot = Some(child);
        Ok((stdout, stderr))
    }

    /// Waits for the registered child and reports whether it exited cleanly.
    fn reap(&self) -> bool {
        let child = self.child.lock().unwrap_or_else(PoisonError::into_inner).take();
        match child {
            Some(mut child) => {
                if self.stopped() {
                    let _ = child.kill();
                }
                child.wait().map(|status| status.success()).unwrap_or(false)
            }
            None => false,
        }
    }

    /// Runs a short-lived helper and returns its stdout.
    fn output(&self, command: &mut Command) -> Result<String> {
        command.stderr(Stdio::null());
        let (mut stdout, _) = self.spawn(command)?;
        let mut text = String::new();
        let read = stdout.read_to_string(&mut text);
        let success = self.reap();
        read.context("read helper output")?;
        if !success {
            return Err(anyhow!("{:?} exited with an error", command.get_program()));
        }
        Ok(text)
    }

    fn kill(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(child) = self.child.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
            let _ = child.kill();
        }
    }
}

/// Background ffmpeg decode of one input into a bounded frame queue.
///
/// Dropping the decoder kills any running subprocess and joins the worker,
/// so no process outlives its player.
struct Decoder {
    frames: Option<Receiver<VideoFrame>>,
    control: Arc<WorkerControl>,
    worker: Option<JoinHandle<()>>,
}

impl Decoder {
    fn spawn(source: StreamSource, end: EndOfStream) -> Self {
        // Bounded so decoding never runs far ahead of playback.
        let (tx, rx) = mpsc::sync_channel(5);
        let control = Arc::new(WorkerControl {
            stop: AtomicBool::new(false),
            child: Mutex::new(None),
        });

        let worker_control = control.clone();
        let worker = thread::Builder::new()
            .name("video-decode".into())
            .spawn(move || {
                if let Err(e) = decode_worker(&source, end, tx, &worker_control) {
                    if !worker_control.stopped() {
                        warn!("Decoding {} stopped: {:#}", source.input(), e);
                    }
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start decode thread: {}", e);
                None
            }
        };

        Self {
            frames: Some(rx),
            control,
            worker,
        }
    }

    fn try_recv(&self) -> Option<VideoFrame> {
        match self.frames.as_ref()?.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.control.kill();
        // Unblocks a worker waiting on a full queue.
        self.frames.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Decode thread panicked");
            }
        }
    }
}

fn resolve_input(source: &StreamSource, control: &WorkerControl) -> Result<String> {
    let input = source.input();
    let StreamSource::Url(_) = source else {
        return Ok(input);
    };

    let resolved = match detect_streaming_platform(&input) {
        Some(StreamingPlatform::YouTube) => {
            info!("Detected YouTube URL, resolving stream via yt-dlp...");
            control.output(Command::new("yt-dlp").args([
                "-g",
                "-f",
                "bestvideo[height<=1080][vcodec^=avc1]/bestvideo[height<=1080]/best",
                input.as_str(),
            ]))?
        }
        Some(StreamingPlatform::Twitch) => {
            info!("Detected Twitch URL, resolving stream via streamlink...");
            control.output(Command::new("streamlink").args(["--stream-url", input.as_str(), "best"]))?
        }
        None => return Ok(input),
    };

    resolved
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no stream URL resolved for {}", input))
}

fn probe(input: &str, control: &WorkerControl) -> Result<StreamInfo> {
    let output = control.output(Command::new("ffprobe").args([
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height,r_frame_rate",
        "-of",
        "csv=p=0",
        input,
    ]))?;
    parse_probe(&output)
}

fn decode_worker(
    source: &StreamSource,
    end: EndOfStream,
    tx: SyncSender<VideoFrame>,
    control: &WorkerControl,
) -> Result<()> {
    let input = resolve_input(source, control)?;
    let info = probe(&input, control)?;
    info!("Video {}: {}x{} @ {:.2} fps", source.input(), info.width, info.height, info.fps);

    let frame_len = PixelFormat::Rgba.frame_len(info.width, info.height);
    let frame_us = 1_000_000.0 / info.fps as f64;
    let network = is_network_input(&input);
    let mut frame_index: u64 = 0;

    while !control.stopped() {
        let mut args: Vec<&str> = vec!["-hide_banner", "-loglevel", "error"];
        if network {
            args.extend_from_slice(&[
                "-reconnect",
                "1",
                "-reconnect_streamed",
                "1",
                "-reconnect_delay_max",
                "5",
                "-thread_queue_size",
                "512",
            ]);
        }
        args.extend_from_slice(&["-i", input.as_str(), "-f", "rawvideo", "-pix_fmt", "rgba", "-"]);

        debug!("Starting ffmpeg for {}", source.input());
        let (mut stdout, stderr) = match control.spawn(Command::new("ffmpeg").args(&args).stderr(Stdio::piped())) {
            Ok(pipes) => pipes,
            Err(e) if control.stopped() => return Err(e),
            Err(e) => {
                error!("Failed to spawn ffmpeg: {:#}", e);
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        };
        if let Some(stderr) = stderr {
            spawn_stderr_logger(stderr);
        }

        let mut buffer = vec![0u8; frame_len];
        let mut produced = 0u64;
        loop {
            if let Err(e) = stdout.read_exact(&mut buffer) {
                if e.kind() != std::io::ErrorKind::UnexpectedEof && !control.stopped() {
                    warn!("Error reading from ffmpeg: {}", e);
                }
                break;
            }

            let timestamp_us = (frame_index as f64 * frame_us) as u64;
            frame_index += 1;
            produced += 1;
            let frame = VideoFrame::from_data(info.width, info.height, PixelFormat::Rgba, buffer.clone())
                .with_timestamp(timestamp_us);
            if tx.send(frame).is_err() {
                control.kill();
                control.reap();
                return Ok(());
            }
        }

        control.reap();
        if produced == 0 && !control.stopped() {
            warn!("ffmpeg produced no frames for {}, retrying shortly", source.input());
            thread::sleep(Duration::from_secs(1));
            continue;
        }
        match end {
            EndOfStream::Loop => debug!("Video loop restarting"),
            EndOfStream::Reconnect => {
                if !control.stopped() {
                    info!("Stream {} ended, reconnecting", source.input());
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }
    Ok(())
}

fn spawn_stderr_logger(mut stderr: std::process::ChildStderr) {
    let _ = thread::Builder::new().name("ffmpeg-stderr".into()).spawn(move || {
        let mut buf = [0u8; 1024];
        loop {
            match stderr.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    for line in String::from_utf8_lossy(&buf[..n]).lines() {
                        if !line.trim().is_empty() {
                            error!("ffmpeg: {}", line);
                        }
                    }
                }
            }
        }
    });
}

/// A looping video player paced by frame timestamps.
pub struct VideoPlayer {
    decoder: Decoder,
    current_frame: Option<VideoFrame>,
    next_frame: Option<VideoFrame>,
    /// Tick time of the first request, the origin of playback time
    start_time: Option<f32>,
}

impl VideoPlayer {
    /// Starts decoding `source` in the background.
    pub fn open(source: StreamSource) -> Self {
        info!("Opening video {}", source.input());
        Self {
            decoder: Decoder::spawn(source, EndOfStream::Loop),
            current_frame: None,
            next_frame: None,
            start_time: None,
        }
    }

    fn is_due(frame: &VideoFrame, playback_us: u64) -> bool {
        frame.timestamp_us.unwrap_or(0) <= playback_us
    }
}

impl StreamPlayer for VideoPlayer {
    fn frame(&mut self, time: f32) -> Option<&VideoFrame> {
        let start = *self.start_time.get_or_insert(time);
        let playback_us = ((time - start).max(0.0) as f64 * 1_000_000.0) as u64;

        if let Some(next) = &self.next_frame {
            if !Self::is_due(next, playback_us) {
                return self.current_frame.as_ref();
            }
            self.current_frame = self.next_frame.take();
        }

        // Drain everything that is due, skipping frames if playback lags.
        while let Some(frame) = self.decoder.try_recv() {
            if Self::is_due(&frame, playback_us) {
                self.current_frame = Some(frame);
            } else {
                self.next_frame = Some(frame);
                break;
            }
        }

        self.current_frame.as_ref()
    }
}

/// A live network stream that always exposes the newest decoded frame.
pub struct LiveStream {
    decoder: Decoder,
    latest: Option<VideoFrame>,
}

impl LiveStream {
    pub fn open(url: &str) -> Self {
        info!("Connecting to live stream {}", url);
        Self {
            decoder: Decoder::spawn(StreamSource::Url(url.to_string()), EndOfStream::Reconnect),
            latest: None,
        }
    }

    /// Newest frame received so far.
    pub fn latest(&mut self) -> Option<&VideoFrame> {
        while let Some(frame) = self.decoder.try_recv() {
            self.latest = Some(frame);
        }
        self.latest.as_ref()
    }
}
