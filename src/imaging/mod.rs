//! Image jobs: resize, crop, fit and word-wrapped text.
//!
//! | Operation | Where |
//! |---|---|
//! | **Color tokens** | [`color`]: `transparent`, `#abc`, `a1b2c3` |
//! | **Canvas geometry** | [`geometry`]: canvas size, content rectangle, offset |
//! | **Text layout** | [`text`]: greedy wrap with next-word look-ahead |
//! | **Job queue** | [`queue`]: keyed, ordered, replayed when dirty |
//! | **Handle** | [`Image`]: owns the rasters and drives everything above |
//!
//! The module is split into:
//! - **Pure engines**: `color`, `geometry`, `text` (unit testable, no I/O)
//! - **Parameters**: data structures describing jobs
//! - **Backend**: [`RasterBackend`] and [`CodecBackend`] traits + [`RustBackend`]
//! - **Handle**: the lazy [`Image`] facade

pub mod backend;
pub mod color;
pub mod geometry;
pub mod handle;
mod params;
pub mod queue;
pub mod rust_backend;
pub mod text;

pub use backend::{BackendError, CodecBackend, Dimensions, RasterBackend, Rect, TextBox};
pub use color::{ColorSpec, Rgb};
pub use geometry::{Layout, compute_layout, derive_canvas_size};
pub use handle::{ErrorKind, Image, ImageError, Rendered, Source};
pub use params::{
    Align, BlockWidth, ImageFormat, Quality, ResizeMethod, ResizeSpec, TextJob, VerticalAlign,
};
pub use queue::{ChangeQueue, Job, JobKey};
pub use rust_backend::RustBackend;
pub use text::{Placement, TextLayout, layout_text};
