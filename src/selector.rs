//! Runtime source selection by label.
//!
//! Capture devices are listed as `"UVC - <name>"` and network receivers as
//! `"NDI - <name>"`. Selecting a label sets the device/receiver name first and
//! then switches the kind, so the new kind opens with the right name.

use crate::error::SourceError;
use crate::source::{Backends, ImageSource, SourceKind};
use std::fmt;
use tracing::{info, warn};

const CAPTURE_PREFIX: &str = "UVC - ";
const NETWORK_PREFIX: &str = "NDI - ";

/// One selectable live source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOption {
    Capture(String),
    Network(String),
}

impl SourceOption {
    /// Parses a label produced by `Display`.
    pub fn parse(label: &str) -> Result<Self, SourceError> {
        if let Some(name) = label.strip_prefix(CAPTURE_PREFIX) {
            Ok(SourceOption::Capture(name.to_string()))
        } else if let Some(name) = label.strip_prefix(NETWORK_PREFIX) {
            Ok(SourceOption::Network(name.to_string()))
        } else {
            Err(SourceError::ResourceUnavailable(format!("unrecognized source label '{}'", label)))
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceOption::Capture(_) => SourceKind::LiveCapture,
            SourceOption::Network(_) => SourceKind::NetworkReceiver,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SourceOption::Capture(name) | SourceOption::Network(name) => name,
        }
    }

    /// The option matching the source's current selection, if it is a live
    /// source.
    pub fn current(source: &ImageSource) -> Option<Self> {
        let name = source.device_name().to_string();
        match source.kind() {
            SourceKind::LiveCapture => Some(SourceOption::Capture(name)),
            SourceKind::NetworkReceiver => Some(SourceOption::Network(name)),
            _ => None,
        }
    }
}

impl fmt::Display for SourceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOption::Capture(name) => write!(f, "{}{}", CAPTURE_PREFIX, name),
            SourceOption::Network(name) => write!(f, "{}{}", NETWORK_PREFIX, name),
        }
    }
}

/// Capture devices followed by network receivers. A failing device query is
/// logged and contributes no entries.
pub fn list_options(backends: &Backends) -> Vec<SourceOption> {
    let mut options = Vec::new();
    match backends.capture.list_devices() {
        Ok(devices) => options.extend(devices.into_iter().map(|device| SourceOption::Capture(device.name))),
        Err(e) => warn!("Could not enumerate capture devices: {:#}", e),
    }
    options.extend(backends.directory.source_names().into_iter().map(SourceOption::Network));
    options
}

/// Switches `source` to the live source named by `label`.
pub fn select(source: &mut ImageSource, label: &str) -> Result<SourceOption, SourceError> {
    let option = SourceOption::parse(label)?;
    info!("Selecting {}", option);
    source.set_device_name(option.name());
    source.set_kind(option.kind());
    Ok(option)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::OutputSpec;
    use crate::source::testing::FakeBackends;
    use crate::source::SourceConfig;

    #[test]
    fn test_lists_devices_then_receivers() {
        let fakes = FakeBackends::new();
        let labels: Vec<String> = list_options(&fakes.backends()).iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["UVC - Cam0", "UVC - Cam1", "NDI - studio-a", "NDI - studio-b"]);
    }

    #[test]
    fn test_label_round_trip_and_rejection() {
        assert_eq!(SourceOption::parse("UVC - Cam 0").unwrap(), SourceOption::Capture("Cam 0".into()));
        assert_eq!(SourceOption::parse("NDI - HOST (Feed)").unwrap().kind(), SourceKind::NetworkReceiver);
        assert!(matches!(SourceOption::parse("RTMP - x"), Err(SourceError::ResourceUnavailable(_))));
        assert!(SourceOption::parse("Cam0").is_err());
    }

    #[test]
    fn test_select_sets_name_before_kind() {
        let fakes = FakeBackends::new();
        let spec = OutputSpec {
            destination: None,
            resolution: (4, 4),
        };
        let mut source = ImageSource::new(SourceConfig::default(), spec, fakes.backends()).unwrap();
        assert_eq!(SourceOption::current(&source), None);

        let option = select(&mut source, "NDI - studio-b").unwrap();
        assert_eq!(option, SourceOption::Network("studio-b".into()));
        assert_eq!(SourceOption::current(&source), Some(option));
        assert!(source.resource().is_live());

        select(&mut source, "UVC - Cam1").unwrap();
        assert_eq!(source.kind(), SourceKind::LiveCapture);
        assert_eq!(
            fakes.events(),
            vec![
                "generator:new",
                "network:subscribe:studio-b",
                "network:close:studio-b",
                "capture:open:Cam1",
            ]
        );
    }

    #[test]
    fn test_unknown_label_leaves_source_alone() {
        let fakes = FakeBackends::new();
        let mut source = ImageSource::new(SourceConfig::default(), OutputSpec::default(), fakes.backends()).unwrap();
        assert!(select(&mut source, "Webcam").is_err());
        assert_eq!(source.kind(), SourceKind::GeneratedCard);
    }
}
