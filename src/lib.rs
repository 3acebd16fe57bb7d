//! Image Source: runtime media-source multiplexer.
//!
//! One output image fed by a still image, a fetched image, a video file or
//! stream, a webcam, a named network stream, a render view, or a generated
//! test pattern, switchable at runtime.

pub mod buffer;
pub mod capture;
pub mod compose;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod generator;
pub mod network;
pub mod output;
pub mod selector;
pub mod settings;
pub mod source;
pub mod utils;
pub mod video;

pub use buffer::{OutputBuffer, OutputSpec};
pub use error::SourceError;
pub use source::{Backends, ImageSource, SourceAsset, SourceConfig, SourceKind};
