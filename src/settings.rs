//! YAML configuration with hot reload.

use crate::buffer::OutputSpec;
use crate::error::SourceError;
use crate::network::StreamDirectory;
use crate::source::{ImageSource, SourceAsset, SourceConfig, SourceKind};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Extensions loaded as still images; every other asset is treated as video.
const IMAGE_EXTENSIONS: [&str; 9] = ["png", "jpg", "jpeg", "bmp", "gif", "tga", "tif", "tiff", "webp"];

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub kind: SourceKind,
    pub output: OutputSettings,
    pub source: SourceSettings,
    /// Network receiver name -> stream URL
    pub receivers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub resolution: (u32, u32),
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            resolution: OutputSpec::default().resolution,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub asset: Option<PathBuf>,
    pub url: Option<String>,
    /// Capture device or network receiver name
    pub device: String,
    pub capture_resolution: (u32, u32),
    pub capture_fps: u32,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("read settings {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parse settings {}", path.display()))
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn output_spec(&self) -> OutputSpec {
        OutputSpec {
            destination: None,
            resolution: self.output.resolution,
        }
    }

    /// Source configuration described by these settings. An asset that
    /// cannot be loaded is logged and left unset.
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            kind: self.kind,
            asset: self.load_asset(),
            url: self.source.url.clone(),
            device_name: self.source.device.clone(),
            capture_resolution: self.source.capture_resolution,
            capture_frame_rate: self.source.capture_fps,
            render_view: None,
        }
    }

    fn load_asset(&self) -> Option<SourceAsset> {
        let path = self.source.asset.as_ref()?;
        match load_asset(path) {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!("Asset {} unavailable: {:#}", path.display(), e);
                None
            }
        }
    }

    /// Applies the fields that differ from `old` to `source`, each through
    /// its own setter. Returns how many setters ran.
    pub fn apply(
        &self,
        old: &Settings,
        source: &mut ImageSource,
        directory: &StreamDirectory,
    ) -> Result<usize, SourceError> {
        let mut applied = 0;
        self.output_spec().validate()?;

        if self.output.resolution != old.output.resolution {
            source.set_output_resolution(self.output.resolution)?;
            applied += 1;
        }
        if self.receivers != old.receivers {
            directory.replace_all(self.receivers.clone());
            // Resubscribe so a changed URL for the current name takes effect.
            if source.kind() == SourceKind::NetworkReceiver && self.source.device == old.source.device {
                source.set_device_name(self.source.device.clone());
                applied += 1;
            }
        }
        if self.source.asset != old.source.asset {
            source.set_source_asset(self.load_asset());
            applied += 1;
        }
        if self.source.url != old.source.url {
            source.set_source_url(self.source.url.clone());
            applied += 1;
        }
        if self.source.device != old.source.device {
            source.set_device_name(self.source.device.clone());
            applied += 1;
        }
        if self.source.capture_resolution != old.source.capture_resolution {
            source.set_capture_resolution(self.source.capture_resolution);
            applied += 1;
        }
        if self.source.capture_fps != old.source.capture_fps {
            source.set_capture_frame_rate(self.source.capture_fps);
            applied += 1;
        }
        if self.kind != old.kind {
            source.set_kind(self.kind);
            applied += 1;
        }

        Ok(applied)
    }
}

/// Loads `path` as an image asset when its extension names an image format,
/// otherwise returns it as a video asset.
pub fn load_asset(path: &Path) -> Result<SourceAsset> {
    let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if !is_image {
        return Ok(SourceAsset::Video(path.to_path_buf()));
    }
    let image = image::open(path).with_context(|| format!("open image {}", path.display()))?;
    info!("Loaded image asset {} ({}x{})", path.display(), image.width(), image.height());
    Ok(SourceAsset::Image(Arc::new(image.into_rgba8())))
}

/// Watches a settings file and reports parsed changes.
pub struct SettingsWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    current: Settings,
}

impl SettingsWatcher {
    pub fn new(path: PathBuf, current: Settings) -> Result<Self> {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(tx, notify::Config::default()).context("create settings watcher")?;
        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .with_context(|| format!("watch {}", path.display()))?;
        info!("Watching settings file {} for changes", path.display());
        Ok(Self {
            path,
            _watcher: watcher,
            rx,
            current,
        })
    }

    /// Returns `(old, new)` when the file changed, still parses and differs
    /// from the last committed settings. A file that fails to parse keeps the
    /// previous settings in effect. `new` only becomes the baseline once it
    /// is passed to `commit`.
    pub fn check_for_changes(&mut self) -> Option<(Settings, Settings)> {
        let mut needs_reload = false;
        while let Ok(res) = self.rx.try_recv() {
            match res {
                Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                    needs_reload = true;
                }
                Ok(_) => {}
                Err(e) => warn!("Settings watch error: {}", e),
            }
        }
        if !needs_reload {
            return None;
        }

        match Settings::load(&self.path) {
            Ok(new) => self.stage(new),
            Err(e) => {
                error!("Keeping previous settings: {:#}", e);
                None
            }
        }
    }

    fn stage(&self, new: Settings) -> Option<(Settings, Settings)> {
        if new == self.current {
            return None;
        }
        info!("Settings file changed");
        Some((self.current.clone(), new))
    }

    /// Records settings that were applied to the source.
    pub fn commit(&mut self, settings: Settings) {
        self.current = settings;
    }

    pub fn current(&self) -> &Settings {
        &self.current
    }
}
