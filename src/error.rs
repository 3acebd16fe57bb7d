//! Error types shared by the source core and its backends.

use thiserror::Error;

/// Errors surfaced by the image source core.
///
/// Only configuration-time violations (`InvalidResolution`) are returned from
/// setters. Everything else is produced by backends and absorbed by the core,
/// which logs it and leaves the affected resource not ready. A frame that is
/// not decoded yet is not an error at all: pollers return `None`.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Output dimensions must both be positive.
    #[error("invalid output resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    /// A named device or network source could not be found or opened.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// An HTTP request failed.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A payload could not be decoded into an image.
    #[error("decode failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
