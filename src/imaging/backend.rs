//! Backend traits and shared types.
//!
//! Pixel work is split across two traits:
//!
//! - [`RasterBackend`]: allocate a canvas, fill a rectangle, resample one
//!   canvas into another, and load/measure/draw text.
//! - [`CodecBackend`]: decode and encode files. It extends
//!   [`RasterBackend`] so decoded images are canvases of the same type.
//!
//! Canvases are owned values. Releasing one is dropping it, so a handle
//! that replaces its working canvas frees the old buffer exactly once.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). It uses the `image` crate for
//! codecs and resampling, `ab_glyph` for fonts.

use super::color::{ColorSpec, Rgb};
use super::params::{ImageFormat, Quality};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: ImageFormat,
        message: String,
    },
    #[error("Invalid font file: {0}")]
    InvalidFont(PathBuf),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl BackendError {
    /// Whether the error means the file simply isn't there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Pixel size of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned pixel rectangle. The origin may lie off-canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole canvas.
    pub fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Measured extent of a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextBox {
    /// Horizontal advance of the run.
    pub width: f64,
    /// Ink height of the run.
    pub height: f64,
}

/// A decoded source image.
#[derive(Debug)]
pub struct Decoded<C> {
    pub canvas: C,
    pub dimensions: Dimensions,
    pub format: ImageFormat,
}

/// Canvas and text primitives.
pub trait RasterBackend {
    /// An owned pixel buffer. Dropping it releases the buffer.
    type Canvas;
    /// A loaded font face.
    type Font;

    /// Allocate a `width`×`height` canvas. Both must be at least 1.
    fn allocate_canvas(&self, width: u32, height: u32) -> Result<Self::Canvas, BackendError>;

    /// Overwrite `rect` with `color`. [`ColorSpec::Alpha`] writes fully
    /// transparent pixels rather than blending.
    fn fill_rect(&self, canvas: &mut Self::Canvas, rect: Rect, color: ColorSpec);

    /// Resample all of `src` into `dst_rect` of `dst`, clipped to `dst`.
    fn resample_copy(&self, dst: &mut Self::Canvas, src: &Self::Canvas, dst_rect: Rect);

    /// Load a font file.
    fn load_font(&self, path: &Path) -> Result<Self::Font, BackendError>;

    /// Measure `text` at `size` points.
    fn measure_text(&self, font: &Self::Font, size: f32, text: &str) -> TextBox;

    /// Draw `text` with its baseline starting at `origin`.
    fn draw_text(
        &self,
        canvas: &mut Self::Canvas,
        font: &Self::Font,
        size: f32,
        origin: (i32, i32),
        color: Rgb,
        text: &str,
    );
}

/// File decoding and encoding.
pub trait CodecBackend: RasterBackend {
    /// Decode a file into a canvas.
    fn decode(&self, path: &Path) -> Result<Decoded<Self::Canvas>, BackendError>;

    /// Encode a canvas into `format`.
    fn encode(
        &self,
        canvas: &Self::Canvas,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
