//! Preview output for the image source.

pub mod window_output;

pub use window_output::PreviewRenderer;
