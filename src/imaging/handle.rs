//! The image handle.
//!
//! An [`Image`] owns a source raster, at most one working raster, and a
//! [`ChangeQueue`] of pending jobs. Requests such as [`Image::resize`] and
//! [`Image::write_text`] only enqueue. The queue is replayed the first time
//! pixels or sizes are needed after a change ([`Image::render`],
//! [`Image::save`], [`Image::width`], ...).
//!
//! Replay always starts from the untouched source: the previous working
//! raster is dropped, then each job runs in queue order. A resize builds a
//! new working raster from the source; text draws onto the working raster,
//! creating a plain copy of the source first when no resize ran.

use super::backend::{BackendError, CodecBackend, Rect};
use super::color::ColorSpec;
use super::geometry::compute_layout;
use super::params::{
    Align, ImageFormat, Quality, ResizeMethod, ResizeSpec, TextJob, VerticalAlign,
};
use super::queue::{ChangeQueue, Job, JobKey};
use super::rust_backend::RustBackend;
use super::text::layout_text;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Invalid image size: {0}")]
    InvalidSize(String),
    #[error("Destination path not defined")]
    MissingDestination,
    #[error("Output format not defined and cannot be inferred")]
    MissingFormat,
    #[error("Font file not found: {0}")]
    FontNotFound(PathBuf),
    #[error("Source image not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("No source image: set a source path or create a blank canvas")]
    SourceMissing,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad error class, for callers that only care who is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something impossible or incomplete.
    Configuration,
    /// A required input is absent.
    Resource,
    /// Decoding, encoding or the filesystem failed.
    Io,
}

impl ImageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSize(_)
            | Self::MissingDestination
            | Self::MissingFormat
            | Self::FontNotFound(_) => ErrorKind::Configuration,
            Self::SourceNotFound(_) | Self::SourceMissing => ErrorKind::Resource,
            Self::Backend(_) | Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Where the source raster comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Source {
    #[default]
    Unset,
    File(PathBuf),
    /// A canvas of this size filled with the handle background.
    Blank { width: u32, height: u32 },
}

/// A canvas with its size and the format it was decoded from.
#[derive(Debug)]
pub struct RasterImage<C> {
    pub canvas: C,
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

/// Encoded output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl Rendered {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

pub struct Image<B: CodecBackend = RustBackend> {
    backend: B,
    source: Source,
    source_image: Option<RasterImage<B::Canvas>>,
    working: Option<RasterImage<B::Canvas>>,
    queue: ChangeQueue,
    /// Accumulated resize request plus the alignment and background settings.
    resize: ResizeSpec,
    format: Option<ImageFormat>,
    quality: Quality,
    destination: Option<PathBuf>,
    font_dir: PathBuf,
    fonts: HashMap<String, B::Font>,
}

impl<B: CodecBackend> fmt::Debug for Image<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("source", &self.source)
            .field("resize", &self.resize)
            .field("jobs", &self.queue.len())
            .field("dirty", &self.queue.is_dirty())
            .field("format", &self.format)
            .field("quality", &self.quality)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl Image<RustBackend> {
    pub fn new() -> Self {
        Self::with_backend(RustBackend::new())
    }

    /// Handle reading its source from `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut image = Self::new();
        image.set_source_path(path);
        image
    }
}

impl Default for Image<RustBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CodecBackend> Image<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            source: Source::Unset,
            source_image: None,
            working: None,
            queue: ChangeQueue::new(),
            resize: ResizeSpec::default(),
            format: None,
            quality: Quality::default(),
            destination: None,
            font_dir: PathBuf::from("fonts"),
            fonts: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // =========================================================================
    // Source
    // =========================================================================

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Read the source from a file. Replaces a blank source.
    pub fn set_source_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.replace_source(Source::File(path.into()));
        self
    }

    /// Use a blank canvas filled with the background as the source.
    /// Replaces a file source.
    pub fn create_blank(&mut self, width: u32, height: u32) -> Result<&mut Self, ImageError> {
        if width < 1 || height < 1 {
            return Err(ImageError::InvalidSize(format!(
                "blank canvas {width}x{height} must be at least 1x1"
            )));
        }
        self.replace_source(Source::Blank { width, height });
        Ok(self)
    }

    fn replace_source(&mut self, source: Source) {
        self.source = source;
        self.source_image = None;
        self.working = None;
        self.queue.mark_dirty();
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn set_destination(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.destination = Some(path.into());
        self
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Directory that text job font names are resolved against.
    pub fn set_font_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.font_dir = dir.into();
        self.fonts.clear();
        self
    }

    pub fn set_format(&mut self, format: ImageFormat) -> &mut Self {
        self.format = Some(format);
        self
    }

    pub fn set_quality(&mut self, quality: u32) -> &mut Self {
        self.quality = Quality::new(quality);
        self
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn set_align(&mut self, align: Align, vertical_align: VerticalAlign) -> &mut Self {
        self.resize.align = align;
        self.resize.vertical_align = vertical_align;
        self.refresh_resize_job();
        self.queue.mark_dirty();
        self
    }

    /// Background for letterboxing, auto text stretches and blank sources.
    pub fn set_background(&mut self, background: ColorSpec) -> &mut Self {
        self.resize.background = background;
        if matches!(self.source, Source::Blank { .. }) {
            self.source_image = None;
        }
        self.refresh_resize_job();
        self.queue.mark_dirty();
        self
    }

    pub fn background(&self) -> ColorSpec {
        self.resize.background
    }

    /// Current resize settings, queued or not.
    pub fn resize_spec(&self) -> &ResizeSpec {
        &self.resize
    }

    /// Queued jobs in replay order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.queue.jobs()
    }

    /// Keep a queued resize in step with the handle settings.
    fn refresh_resize_job(&mut self) {
        if self.queue.get(&JobKey::Resize).is_some() {
            self.queue.enqueue(JobKey::Resize, Job::Resize(self.resize));
        }
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Queue a resize. Fields left as `None` keep their earlier value, so
    /// repeated calls fold into a single resize job.
    pub fn resize(
        &mut self,
        width: Option<u32>,
        height: Option<u32>,
        method: Option<ResizeMethod>,
    ) -> Result<&mut Self, ImageError> {
        if width == Some(0) || height == Some(0) {
            return Err(ImageError::InvalidSize(format!(
                "resize target {}x{} must be at least 1",
                width.map_or("_".to_string(), |w| w.to_string()),
                height.map_or("_".to_string(), |h| h.to_string()),
            )));
        }
        self.resize.merge(width, height, method);
        if !self.resize.has_target() {
            warn!("resize without width or height ignored");
            return Ok(self);
        }
        self.queue.enqueue(JobKey::Resize, Job::Resize(self.resize));
        Ok(self)
    }

    /// Queue a text job.
    pub fn write_text(&mut self, job: TextJob) -> &mut Self {
        let job = Job::WriteText(job);
        self.queue.enqueue(job.key(), job);
        self
    }

    // =========================================================================
    // Pixel access
    // =========================================================================

    /// Width of the current image, after pending jobs ran.
    pub fn width(&mut self) -> Result<u32, ImageError> {
        self.apply_changes()?;
        Ok(self.current()?.width)
    }

    /// Height of the current image, after pending jobs ran.
    pub fn height(&mut self) -> Result<u32, ImageError> {
        self.apply_changes()?;
        Ok(self.current()?.height)
    }

    pub fn source_width(&mut self) -> Result<u32, ImageError> {
        self.load_source()?;
        Ok(self.source_ref()?.width)
    }

    pub fn source_height(&mut self) -> Result<u32, ImageError> {
        self.load_source()?;
        Ok(self.source_ref()?.height)
    }

    /// Format of a decoded source; `None` for blank sources.
    pub fn source_format(&mut self) -> Result<Option<ImageFormat>, ImageError> {
        self.load_source()?;
        Ok(self.source_ref()?.format)
    }

    /// The current canvas, after pending jobs ran.
    pub fn image(&mut self) -> Result<&B::Canvas, ImageError> {
        self.apply_changes()?;
        Ok(&self.current()?.canvas)
    }

    /// Encode the current image.
    pub fn render(&mut self) -> Result<Rendered, ImageError> {
        self.apply_changes()?;
        let format = self.output_format()?;
        let image = self.current()?;
        let bytes = self.backend.encode(&image.canvas, format, self.quality)?;
        debug!(%format, bytes = bytes.len(), "rendered");
        Ok(Rendered { bytes, format })
    }

    /// Encode to the destination path. Returns what was written.
    pub fn save(&mut self) -> Result<Rendered, ImageError> {
        if self.destination.is_none() {
            return Err(ImageError::MissingDestination);
        }
        let rendered = self.render()?;
        let path = self.destination.as_deref().ok_or(ImageError::MissingDestination)?;
        std::fs::write(path, &rendered.bytes)?;
        info!(path = %path.display(), format = %rendered.format, bytes = rendered.bytes.len(), "saved image");
        Ok(rendered)
    }

    /// Set the destination and save.
    pub fn save_to(&mut self, path: impl Into<PathBuf>) -> Result<Rendered, ImageError> {
        self.set_destination(path);
        self.save()
    }

    /// Release both rasters and drop every queued job.
    ///
    /// Source, destination, format, quality, alignment and background stay
    /// set; the accumulated resize target is forgotten.
    pub fn clear(&mut self) -> &mut Self {
        self.source_image = None;
        self.working = None;
        self.queue.clear();
        self.resize = ResizeSpec {
            width: None,
            height: None,
            method: ResizeMethod::default(),
            ..self.resize
        };
        self
    }

    /// Explicit format, else the source's, else the destination extension.
    fn output_format(&self) -> Result<ImageFormat, ImageError> {
        self.format
            .or_else(|| self.source_image.as_ref().and_then(|s| s.format))
            .or_else(|| self.destination.as_deref().and_then(ImageFormat::from_path))
            .ok_or(ImageError::MissingFormat)
    }

    fn current(&self) -> Result<&RasterImage<B::Canvas>, ImageError> {
        match &self.working {
            Some(working) => Ok(working),
            None => self.source_ref(),
        }
    }

    fn source_ref(&self) -> Result<&RasterImage<B::Canvas>, ImageError> {
        self.source_image.as_ref().ok_or(ImageError::SourceMissing)
    }

    // =========================================================================
    // Replay
    // =========================================================================

    fn load_source(&mut self) -> Result<(), ImageError> {
        if self.source_image.is_some() {
            return Ok(());
        }
        let image = match &self.source {
            Source::Unset => return Err(ImageError::SourceMissing),
            Source::File(path) => {
                let decoded = self.backend.decode(path).map_err(|e| {
                    if e.is_not_found() {
                        ImageError::SourceNotFound(path.clone())
                    } else {
                        ImageError::Backend(e)
                    }
                })?;
                debug!(
                    path = %path.display(),
                    width = decoded.dimensions.width,
                    height = decoded.dimensions.height,
                    "decoded source"
                );
                RasterImage {
                    canvas: decoded.canvas,
                    width: decoded.dimensions.width,
                    height: decoded.dimensions.height,
                    format: Some(decoded.format),
                }
            }
            &Source::Blank { width, height } => {
                let mut canvas = self.backend.allocate_canvas(width, height)?;
                self.backend
                    .fill_rect(&mut canvas, Rect::sized(width, height), self.resize.background);
                RasterImage {
                    canvas,
                    width,
                    height,
                    format: None,
                }
            }
        };
        self.source_image = Some(image);
        Ok(())
    }

    /// Replay the queue if anything changed since the last replay.
    fn apply_changes(&mut self) -> Result<(), ImageError> {
        self.load_source()?;
        let Some(jobs) = self.queue.pending() else {
            return Ok(());
        };
        self.working = None;
        for job in &jobs {
            debug!(job = job.label(), "replaying job");
            match job {
                Job::Resize(spec) => self.apply_resize(spec)?,
                Job::WriteText(text) => self.apply_text(text)?,
            }
        }
        self.queue.mark_clean();
        Ok(())
    }

    fn apply_resize(&mut self, spec: &ResizeSpec) -> Result<(), ImageError> {
        let source = self.source_ref()?;
        let Some(layout) = compute_layout((source.width, source.height), spec) else {
            warn!("resize without width or height skipped");
            return Ok(());
        };
        debug!(
            canvas = ?(layout.canvas_width, layout.canvas_height),
            content = ?(layout.content_width, layout.content_height),
            offset = ?(layout.offset_x, layout.offset_y),
            method = ?spec.method,
            "resize layout"
        );
        let format = source.format;
        let canvas = resample_onto(
            &self.backend,
            &source.canvas,
            (layout.canvas_width, layout.canvas_height),
            Rect::new(
                layout.offset_x,
                layout.offset_y,
                layout.content_width,
                layout.content_height,
            ),
            spec.background,
        )?;
        self.working = Some(RasterImage {
            canvas,
            width: layout.canvas_width,
            height: layout.canvas_height,
            format,
        });
        Ok(())
    }

    fn apply_text(&mut self, job: &TextJob) -> Result<(), ImageError> {
        if !self.fonts.contains_key(&job.font) {
            let path = self.font_dir.join(&job.font);
            let font = self.backend.load_font(&path).map_err(|e| {
                if e.is_not_found() {
                    ImageError::FontNotFound(path.clone())
                } else {
                    ImageError::Backend(e)
                }
            })?;
            self.fonts.insert(job.font.clone(), font);
        }

        if self.working.is_none() {
            // Plain copy: transparent fill keeps the source's own alpha
            let source = self.source_ref()?;
            let size = (source.width, source.height);
            let canvas = resample_onto(
                &self.backend,
                &source.canvas,
                size,
                Rect::sized(size.0, size.1),
                ColorSpec::Alpha,
            )?;
            self.working = Some(RasterImage {
                canvas,
                width: size.0,
                height: size.1,
                format: source.format,
            });
        }

        let backend = &self.backend;
        let font = &self.fonts[&job.font];
        let Some(working) = self.working.as_mut() else {
            return Err(ImageError::SourceMissing);
        };
        let size = job.font_size as f32;
        let layout = layout_text(job, (working.width, working.height), |text| {
            backend.measure_text(font, size, text)
        });

        if let Some((width, height)) = layout.resize_to {
            debug!(from = ?(working.width, working.height), to = ?(width, height), "auto text resize");
            let canvas = resample_onto(
                backend,
                &working.canvas,
                (width, height),
                Rect::sized(width, height),
                self.resize.background,
            )?;
            working.canvas = canvas;
            working.width = width;
            working.height = height;
        }

        debug!(words = layout.placements.len(), lines = layout.line_count(), "text layout");
        for placement in &layout.placements {
            backend.draw_text(
                &mut working.canvas,
                font,
                size,
                placement.origin(),
                job.color,
                &placement.text,
            );
        }
        Ok(())
    }
}

/// New `canvas`-sized canvas, filled with `background`, with all of `src`
/// resampled into `content`.
fn resample_onto<B: CodecBackend>(
    backend: &B,
    src: &B::Canvas,
    canvas: (u32, u32),
    content: Rect,
    background: ColorSpec,
) -> Result<B::Canvas, BackendError> {
    let mut dst = backend.allocate_canvas(canvas.0, canvas.1)?;
    backend.fill_rect(&mut dst, Rect::sized(canvas.0, canvas.1), background);
    backend.resample_copy(&mut dst, src, content);
    Ok(dst)
}
