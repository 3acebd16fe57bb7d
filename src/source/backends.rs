//! External collaborators an `ImageSource` draws resources from.

use crate::capture::{CaptureOpener, NokhwaOpener};
use crate::fetch::{HttpFetcher, ImageFetcher};
use crate::generator::{PatternGenerator, SkiaGenerator};
use crate::network::{SourceDirectory, StreamDirectory};
use crate::video::{FfmpegOpener, PlayerOpener};

/// Builds a fresh pattern generator when the source first needs one.
pub type GeneratorFactory = Box<dyn Fn() -> Box<dyn PatternGenerator>>;

/// The set of primitives the provider pool is built on.
pub struct Backends {
    pub capture: Box<dyn CaptureOpener>,
    pub fetcher: Box<dyn ImageFetcher>,
    pub player: Box<dyn PlayerOpener>,
    pub directory: Box<dyn SourceDirectory>,
    pub generator: GeneratorFactory,
}

impl Backends {
    /// Default backends with a caller-owned network directory, so receivers
    /// can be registered after the source is built.
    pub fn with_directory(directory: StreamDirectory) -> Self {
        Self {
            capture: Box::new(NokhwaOpener),
            fetcher: Box::new(HttpFetcher::new()),
            player: Box::new(FfmpegOpener),
            directory: Box::new(directory),
            generator: Box::new(|| -> Box<dyn PatternGenerator> { Box::new(SkiaGenerator::new()) }),
        }
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self::with_directory(StreamDirectory::new())
    }
}
