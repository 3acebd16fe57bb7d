//! Provider resource pool: the one live backend resource per source kind.

use super::backends::Backends;
use super::{RenderViewHandle, SourceAsset, SourceConfig, SourceKind};
use crate::capture::{CaptureConfig, CaptureDevice};
use crate::fetch::PendingImage;
use crate::generator::Pattern;
use crate::network::NetworkSubscription;
use crate::video::{StreamPlayer, StreamSource};
use std::sync::PoisonError;
use tracing::{debug, info, warn};

/// Backend resource held for the active source kind.
///
/// Every variant that wraps a backend handle keeps it in an `Option`: `None`
/// means the resource was constructed without the configuration it needs (or
/// has already delivered its one shot) and will never become ready on its
/// own.
#[derive(Default)]
pub enum ProviderResource {
    /// Nothing held: either the kind needs no resource or it was released.
    #[default]
    Released,
    HttpImageFetch {
        request: Option<Box<dyn PendingImage>>,
    },
    StreamPlayer {
        player: Option<Box<dyn StreamPlayer>>,
    },
    CaptureHandle {
        device: Option<Box<dyn CaptureDevice>>,
    },
    NetworkSubscription {
        name: String,
        subscription: Option<Box<dyn NetworkSubscription>>,
    },
    RenderView {
        view: Option<RenderViewHandle>,
    },
    GeneratorBinding {
        pattern: Pattern,
    },
}

impl ProviderResource {
    /// Builds the resource for `config.kind`.
    ///
    /// Never fails: missing configuration or an unavailable backend yields a
    /// resource that stays not ready until the next reconfiguration.
    pub fn acquire(config: &SourceConfig, backends: &Backends) -> Self {
        match config.kind {
            SourceKind::StaticImage => {
                if !matches!(config.asset, Some(SourceAsset::Image(_))) {
                    warn!("Static image source has no image asset");
                }
                ProviderResource::Released
            }
            SourceKind::ImageUrl => {
                let request = match non_empty(config.url.as_deref()) {
                    Some(url) => {
                        info!("Fetching image from {}", url);
                        Some(backends.fetcher.fetch(url))
                    }
                    None => {
                        warn!("Image URL source has no URL");
                        None
                    }
                };
                ProviderResource::HttpImageFetch { request }
            }
            SourceKind::VideoFile => {
                let player = match &config.asset {
                    Some(SourceAsset::Video(path)) => {
                        Some(backends.player.open(&StreamSource::File(path.clone())))
                    }
                    _ => {
                        warn!("Video file source has no video asset");
                        None
                    }
                };
                ProviderResource::StreamPlayer { player }
            }
            SourceKind::VideoUrl => {
                let player = match non_empty(config.url.as_deref()) {
                    Some(url) => Some(backends.player.open(&StreamSource::Url(url.to_string()))),
                    None => {
                        warn!("Video URL source has no URL");
                        None
                    }
                };
                ProviderResource::StreamPlayer { player }
            }
            SourceKind::LiveCapture => {
                let capture = CaptureConfig {
                    device_name: config.device_name.clone(),
                    width: config.capture_resolution.0,
                    height: config.capture_resolution.1,
                    fps: config.capture_frame_rate,
                };
                let device = match backends.capture.open(&capture) {
                    Ok(device) => {
                        info!("Opened capture device '{}'", capture.device_name);
                        Some(device)
                    }
                    Err(e) => {
                        warn!("Capture source not ready: {}", e);
                        None
                    }
                };
                ProviderResource::CaptureHandle { device }
            }
            SourceKind::NetworkReceiver => {
                let subscription = match backends.directory.subscribe(&config.device_name) {
                    Ok(subscription) => {
                        info!("Subscribed to network source '{}'", config.device_name);
                        Some(subscription)
                    }
                    Err(e) => {
                        warn!("Network source not ready: {}", e);
                        None
                    }
                };
                ProviderResource::NetworkSubscription {
                    name: config.device_name.clone(),
                    subscription,
                }
            }
            SourceKind::RenderView => {
                if config.render_view.is_none() {
                    warn!("Render view source has no view");
                }
                ProviderResource::RenderView {
                    view: config.render_view.clone(),
                }
            }
            SourceKind::GeneratedCard => ProviderResource::GeneratorBinding { pattern: Pattern::Card },
            SourceKind::GeneratedGradient => ProviderResource::GeneratorBinding {
                pattern: Pattern::Gradient,
            },
        }
    }

    /// Whether a backend handle is currently held.
    pub fn is_live(&self) -> bool {
        match self {
            ProviderResource::Released => false,
            ProviderResource::HttpImageFetch { request } => request.is_some(),
            ProviderResource::StreamPlayer { player } => player.is_some(),
            ProviderResource::CaptureHandle { device } => device.is_some(),
            ProviderResource::NetworkSubscription { subscription, .. } => subscription.is_some(),
            ProviderResource::RenderView { view } => view.is_some(),
            ProviderResource::GeneratorBinding { .. } => true,
        }
    }

    /// Drops whatever this resource holds. Safe to call any number of times.
    ///
    /// Backends finish their own teardown inside `Drop` (capture threads are
    /// joined, decoder subprocesses killed), so by the time this returns the
    /// underlying device or socket is closed.
    pub fn release(&mut self) {
        match std::mem::take(self) {
            ProviderResource::Released => {}
            ProviderResource::HttpImageFetch { request } => {
                if request.is_some() {
                    debug!("Abandoning in-flight image request");
                }
            }
            ProviderResource::StreamPlayer { player } => {
                if player.is_some() {
                    debug!("Closing stream player");
                }
            }
            ProviderResource::CaptureHandle { device } => {
                if let Some(device) = device {
                    debug!("Closing capture device");
                    drop(device);
                }
            }
            ProviderResource::NetworkSubscription { name, subscription } => {
                if subscription.is_some() {
                    debug!("Unsubscribing from network source '{}'", name);
                }
            }
            ProviderResource::RenderView { view } => {
                if let Some(view) = view {
                    debug!("Detaching render view");
                    view.lock().unwrap_or_else(PoisonError::into_inner).set_target(None);
                }
            }
            ProviderResource::GeneratorBinding { pattern } => {
                debug!("Unbinding {:?} generator", pattern);
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}
