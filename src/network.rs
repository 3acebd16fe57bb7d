//! Named network video sources.
//!
//! A `SourceDirectory` maps human-readable receiver names to live
//! subscriptions. `StreamDirectory` is the bundled implementation: a
//! shareable name → URL table whose subscriptions decode through
//! [`LiveStream`].

use crate::error::SourceError;
use crate::frame::VideoFrame;
use crate::video::LiveStream;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// A live subscription to one named source.
pub trait NetworkSubscription: Send {
    /// Most recently received frame; `None` until the first one arrives.
    fn latest_frame(&mut self) -> Option<&VideoFrame>;

    /// Whether this source reports bottom-to-top rows. Network sources are
    /// upright unless they say otherwise.
    fn vertically_mirrored(&self) -> bool {
        false
    }
}

/// Directory/discovery service for network sources.
pub trait SourceDirectory {
    /// Names currently known to the directory.
    fn source_names(&self) -> Vec<String>;

    /// Subscribes to `name`. Fails with `ResourceUnavailable` when the name is
    /// unknown.
    fn subscribe(&self, name: &str) -> Result<Box<dyn NetworkSubscription>, SourceError>;
}

impl NetworkSubscription for LiveStream {
    fn latest_frame(&mut self) -> Option<&VideoFrame> {
        self.latest()
    }
}

/// Name → stream URL table. Clones share the same table, so entries added at
/// runtime are visible to every holder.
#[derive(Clone, Default)]
pub struct StreamDirectory {
    sources: Arc<RwLock<BTreeMap<String, String>>>,
}

impl StreamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a source.
    pub fn insert(&self, name: impl Into<String>, url: impl Into<String>) {
        let (name, url) = (name.into(), url.into());
        info!("Network source '{}' -> {}", name, url);
        self.sources.write().unwrap_or_else(PoisonError::into_inner).insert(name, url);
    }

    /// Replaces the whole table.
    pub fn replace_all(&self, sources: BTreeMap<String, String>) {
        *self.sources.write().unwrap_or_else(PoisonError::into_inner) = sources;
    }

    pub fn url_for(&self, name: &str) -> Option<String> {
        self.sources.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }
}

impl SourceDirectory for StreamDirectory {
    fn source_names(&self) -> Vec<String> {
        self.sources.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    fn subscribe(&self, name: &str) -> Result<Box<dyn NetworkSubscription>, SourceError> {
        if name.is_empty() {
            return Err(SourceError::ResourceUnavailable("no network source name configured".into()));
        }
        let url = self
            .url_for(name)
            .ok_or_else(|| SourceError::ResourceUnavailable(format!("no network source named '{}'", name)))?;
        Ok(Box::new(LiveStream::open(&url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_lists_sorted_names() {
        let directory = StreamDirectory::new();
        directory.insert("studio-b", "rtsp://b.local/live");
        directory.insert("studio-a", "rtsp://a.local/live");
        assert_eq!(directory.source_names(), vec!["studio-a", "studio-b"]);
    }

    #[test]
    fn test_clones_share_entries() {
        let directory = StreamDirectory::new();
        let shared = directory.clone();
        shared.insert("cam", "srt://host:9000");
        assert_eq!(directory.url_for("cam").as_deref(), Some("srt://host:9000"));

        directory.replace_all(BTreeMap::new());
        assert!(shared.source_names().is_empty());
    }

    #[test]
    fn test_unknown_or_empty_name_is_unavailable() {
        let directory = StreamDirectory::new();
        assert!(matches!(directory.subscribe("ghost"), Err(SourceError::ResourceUnavailable(_))));
        assert!(matches!(directory.subscribe(""), Err(SourceError::ResourceUnavailable(_))));
    }
}
