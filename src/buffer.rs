//! Output buffer handle and its manager.

use crate::error::SourceError;
use image::RgbaImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tracing::debug;

/// Shared handle to an RGBA image that sources composite into.
///
/// Cloning the handle is cheap and every clone refers to the same storage.
/// Readers may look at the image at any time and see the last completed
/// composite.
#[derive(Clone)]
pub struct OutputBuffer {
    inner: Arc<BufferInner>,
}

struct BufferInner {
    width: u32,
    height: u32,
    image: RwLock<RgbaImage>,
    generation: AtomicU64,
}

impl OutputBuffer {
    /// Allocates a black buffer of the given size.
    pub fn new(width: u32, height: u32) -> Result<Self, SourceError> {
        validate_resolution(width, height)?;
        Ok(Self::wrap(RgbaImage::new(width, height)))
    }

    fn wrap(image: RgbaImage) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                width: image.width(),
                height: image.height(),
                image: RwLock::new(image),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.inner.width, self.inner.height)
    }

    /// Number of completed writes into this buffer.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Read access to the current contents.
    pub fn read(&self) -> RwLockReadGuard<'_, RgbaImage> {
        self.inner.image.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the current contents out.
    pub fn snapshot(&self) -> RgbaImage {
        self.read().clone()
    }

    /// Runs `f` with exclusive access to the pixels. The generation is bumped
    /// only when `f` reports that it wrote something.
    pub fn write_with(&self, f: impl FnOnce(&mut RgbaImage) -> bool) -> bool {
        let mut image = self.inner.image.write().unwrap_or_else(PoisonError::into_inner);
        let written = f(&mut image);
        if written {
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
        }
        written
    }

    /// True if both handles refer to the same storage.
    pub fn ptr_eq(&self, other: &OutputBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[cfg(test)]
    pub(crate) fn downgrade(&self) -> std::sync::Weak<impl Sized> {
        Arc::downgrade(&self.inner)
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("generation", &self.generation())
            .finish()
    }
}

fn validate_resolution(width: u32, height: u32) -> Result<(), SourceError> {
    if width == 0 || height == 0 {
        return Err(SourceError::InvalidResolution { width, height });
    }
    Ok(())
}

/// Where composites go: a caller-supplied buffer, or an internally owned one
/// sized to `resolution`.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub destination: Option<OutputBuffer>,
    pub resolution: (u32, u32),
}

impl OutputSpec {
    pub fn validate(&self) -> Result<(), SourceError> {
        validate_resolution(self.resolution.0, self.resolution.1)
    }
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            destination: None,
            resolution: (1920, 1080),
        }
    }
}

/// Owns or borrows the destination image.
///
/// The internal buffer is allocated on first use and kept across ticks. An
/// external destination is only ever borrowed: dropping our handle never
/// frees the caller's storage.
pub struct BufferManager {
    spec: OutputSpec,
    internal: Option<OutputBuffer>,
}

impl BufferManager {
    pub fn new(spec: OutputSpec) -> Result<Self, SourceError> {
        spec.validate()?;
        Ok(Self { spec, internal: None })
    }

    pub fn spec(&self) -> &OutputSpec {
        &self.spec
    }

    /// Returns the buffer composites should target, allocating the internal
    /// buffer the first time it is needed.
    pub fn current(&mut self) -> OutputBuffer {
        if let Some(external) = &self.spec.destination {
            return external.clone();
        }
        let (width, height) = self.spec.resolution;
        self.internal
            .get_or_insert_with(|| {
                debug!("Allocating internal output buffer {}x{}", width, height);
                OutputBuffer::wrap(RgbaImage::new(width, height))
            })
            .clone()
    }

    /// Applies a new output configuration. The internal buffer is released
    /// when the resolution changes or an external destination takes over.
    pub fn reconfigure(&mut self, spec: OutputSpec) -> Result<(), SourceError> {
        spec.validate()?;
        let resolution_changed = spec.resolution != self.spec.resolution;
        let external_supplied = spec.destination.is_some();
        self.spec = spec;
        if resolution_changed || external_supplied {
            self.release();
        }
        Ok(())
    }

    /// Drops the internally owned buffer, if any.
    pub fn release(&mut self) {
        if let Some(buffer) = self.internal.take() {
            debug!("Releasing internal output buffer {}x{}", buffer.width(), buffer.height());
        }
    }

    pub fn owns_buffer(&self) -> bool {
        self.internal.is_some()
    }
}
