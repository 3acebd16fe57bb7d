//! Image Source CLI: drives one source and previews its output.

use anyhow::{Context, Result};
use clap::Parser;
use image_source::network::StreamDirectory;
use image_source::output::PreviewRenderer;
use image_source::selector;
use image_source::settings::{Settings, SettingsWatcher};
use image_source::utils::{FpsCounter, TickClock};
use image_source::{Backends, ImageSource, SourceKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

/// Runtime media-source multiplexer.
#[derive(Parser, Debug)]
#[command(name = "image-source")]
#[command(about = "Feed one output image from stills, video, webcams, network streams or test patterns")]
struct Args {
    /// YAML settings file, watched for changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source kind
    #[arg(short, long, value_enum)]
    kind: Option<SourceKind>,

    /// Capture device or network receiver name
    #[arg(short, long)]
    device: Option<String>,

    /// Image or video URL
    #[arg(short, long)]
    url: Option<String>,

    /// Image or video file
    #[arg(short, long)]
    asset: Option<PathBuf>,

    /// Output width
    #[arg(long)]
    width: Option<u32>,

    /// Output height
    #[arg(long)]
    height: Option<u32>,

    /// Requested capture width (0 = device default)
    #[arg(long)]
    capture_width: Option<u32>,

    /// Requested capture height (0 = device default)
    #[arg(long)]
    capture_height: Option<u32>,

    /// Requested capture frame rate (0 = device default)
    #[arg(long)]
    fps: Option<u32>,

    /// Updates per second
    #[arg(long, default_value = "30")]
    tick_rate: f32,

    /// Network receiver as NAME=URL (repeatable)
    #[arg(long = "receiver", value_parser = parse_receiver)]
    receivers: Vec<(String, String)>,

    /// Select a live source by label, e.g. "UVC - HD Webcam"
    #[arg(long)]
    select: Option<String>,

    /// List capture devices and exit
    #[arg(long)]
    list_devices: bool,

    /// List selectable live sources and exit
    #[arg(long)]
    list_sources: bool,

    /// Run without a window until Ctrl-C
    #[arg(long)]
    headless: bool,

    /// Write the final output image to this PNG on exit
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn parse_receiver(value: &str) -> std::result::Result<(String, String), String> {
    let (name, url) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URL, got '{}'", value))?;
    if name.trim().is_empty() || url.trim().is_empty() {
        return Err(format!("expected NAME=URL, got '{}'", value));
    }
    Ok((name.trim().to_string(), url.trim().to_string()))
}

impl Args {
    /// Settings from the config file (if any) with command-line overrides.
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(kind) = self.kind {
            settings.kind = kind;
        }
        if let Some(device) = &self.device {
            settings.source.device = device.clone();
        }
        if let Some(url) = &self.url {
            settings.source.url = Some(url.clone());
        }
        if let Some(asset) = &self.asset {
            settings.source.asset = Some(asset.clone());
        }
        if let Some(width) = self.width {
            settings.output.resolution.0 = width;
        }
        if let Some(height) = self.height {
            settings.output.resolution.1 = height;
        }
        if let Some(width) = self.capture_width {
            settings.source.capture_resolution.0 = width;
        }
        if let Some(height) = self.capture_height {
            settings.source.capture_resolution.1 = height;
        }
        if let Some(fps) = self.fps {
            settings.source.capture_fps = fps;
        }
        settings.receivers.extend(self.receivers.iter().cloned());
        Ok(settings)
    }
}

/// Source plus the bookkeeping shared by window and headless modes.
struct Runner {
    source: ImageSource,
    directory: StreamDirectory,
    watcher: Option<SettingsWatcher>,
    clock: TickClock,
    fps: FpsCounter,
}

impl Runner {
    fn new(args: &Args) -> Result<Self> {
        let settings = args.settings()?;
        let directory = StreamDirectory::new();
        directory.replace_all(settings.receivers.clone());

        let backends = Backends::with_directory(directory.clone());
        let mut source = ImageSource::new(settings.source_config(), settings.output_spec(), backends)?;
        if let Some(label) = &args.select {
            selector::select(&mut source, label)?;
        }

        let watcher = match &args.config {
            Some(path) => match SettingsWatcher::new(path.clone(), Settings::load(path)?) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!("Hot reload disabled: {:#}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            source,
            directory,
            watcher,
            clock: TickClock::new(args.tick_rate),
            fps: FpsCounter::new(),
        })
    }

    /// Ticks the source if one is due. Returns whether it ticked.
    fn poll(&mut self) -> bool {
        if !self.clock.poll() {
            return false;
        }
        self.reload();
        self.source.update(self.clock.elapsed());
        if let Some(fps) = self.fps.update() {
            debug!("[Perf] {:?} source at {:.2} ticks/s", self.source.kind(), fps);
        }
        true
    }

    fn reload(&mut self) {
        let Some((old, new)) = self.watcher.as_mut().and_then(SettingsWatcher::check_for_changes) else {
            return;
        };
        match new.apply(&old, &mut self.source, &self.directory) {
            Ok(applied) => {
                info!("Applied {} settings change(s)", applied);
                if let Some(watcher) = &mut self.watcher {
                    watcher.commit(new);
                }
            }
            Err(e) => error!("Rejected settings change: {}", e),
        }
    }
}

/// Application state for the preview window.
struct PreviewApp {
    runner: Runner,
    window: Option<Arc<Window>>,
    renderer: Option<PreviewRenderer>,
}

impl PreviewApp {
    fn present(&mut self) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };
        let buffer = self.runner.source.as_buffer();
        if let Err(e) = renderer.render(&buffer) {
            error!("Render error: {}", e);
        }
    }
}

impl ApplicationHandler for PreviewApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let (width, height) = self.runner.source.output_resolution();
        let scale = (1280.0 / width as f32).min(720.0 / height as f32).min(1.0);
        let window_attrs = WindowAttributes::default()
            .with_title("Image Source")
            .with_inner_size(PhysicalSize::new(
                ((width as f32 * scale) as u32).max(1),
                ((height as f32 * scale) as u32).max(1),
            ));

        match event_loop.create_window(window_attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                match PreviewRenderer::new(window) {
                    Ok(renderer) => {
                        self.renderer = Some(renderer);
                        info!("Preview window created");
                    }
                    Err(e) => {
                        error!("Failed to create renderer: {}", e);
                        event_loop.exit();
                    }
                }
            }
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window closed");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size);
                }
            }
            WindowEvent::RedrawRequested => {
                if self.runner.poll() {
                    self.present();
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.list_devices || args.list_sources {
        let directory = StreamDirectory::new();
        directory.replace_all(args.settings()?.receivers);
        let backends = Backends::with_directory(directory);
        if args.list_devices {
            println!("Available capture devices:");
            match backends.capture.list_devices() {
                Ok(devices) => {
                    for device in devices {
                        println!("  [{}] {}", device.index, device.name);
                    }
                }
                Err(e) => eprintln!("Failed to list devices: {:#}", e),
            }
        }
        if args.list_sources {
            println!("Selectable sources:");
            for option in selector::list_options(&backends) {
                println!("  {}", option);
            }
        }
        return Ok(());
    }

    info!("Starting image source...");
    let runner = Runner::new(&args)?;

    if args.headless {
        run_headless(runner, args.snapshot)
    } else {
        run_window_mode(runner, args.snapshot)
    }
}

fn run_window_mode(runner: Runner, snapshot: Option<PathBuf>) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PreviewApp {
        runner,
        window: None,
        renderer: None,
    };
    event_loop.run_app(&mut app)?;

    save_snapshot(&mut app.runner.source, snapshot)
}

fn run_headless(mut runner: Runner, snapshot: Option<PathBuf>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        r.store(false, Ordering::SeqCst);
    })?;

    info!("Running headless, press Ctrl-C to stop");
    while running.load(Ordering::SeqCst) {
        if !runner.poll() {
            thread::sleep(runner.clock.remaining());
        }
    }

    save_snapshot(&mut runner.source, snapshot)
}

fn save_snapshot(source: &mut ImageSource, path: Option<PathBuf>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let image = source.as_image();
    image
        .save(&path)
        .with_context(|| format!("write snapshot {}", path.display()))?;
    info!("Wrote {}x{} snapshot to {}", image.width(), image.height(), path.display());
    Ok(())
}
