//! Pure calculation functions for canvas geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Arithmetic is done in `f64` and rounded at the same points as the
//! renderer this pipeline replaced, so outputs match pixel for pixel:
//! dimensions that grow are rounded up, offsets are rounded to nearest.

use super::params::{Align, ResizeMethod, ResizeSpec, VerticalAlign};

/// Where the resampled source lands on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Final canvas size.
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Size the source is resampled to.
    pub content_width: u32,
    pub content_height: u32,
    /// Top-left of the content rectangle; negative when cropping.
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Layout {
    /// Pixels of background visible left/right and above/below the content.
    ///
    /// Zero on an axis where the content covers the canvas.
    pub fn padding(&self) -> (u32, u32) {
        (
            self.canvas_width.saturating_sub(self.content_width),
            self.canvas_height.saturating_sub(self.content_height),
        )
    }
}

/// Scale `value` by `numerator / denominator` and round up, exactly.
fn scale_ceil(value: u32, numerator: u32, denominator: u32) -> u32 {
    (value as u64 * numerator as u64).div_ceil(denominator as u64) as u32
}

/// Fill in a missing target dimension from the source aspect ratio.
///
/// Returns `None` when neither dimension is set.
///
/// # Examples
/// ```
/// # use canvasjob::imaging::derive_canvas_size;
/// // Only a width: height follows the 4:3 source
/// assert_eq!(derive_canvas_size((800, 600), Some(400), None), Some((400, 300)));
///
/// // Only a height: width follows, rounded up
/// assert_eq!(derive_canvas_size((800, 600), None, Some(100)), Some((134, 100)));
/// ```
pub fn derive_canvas_size(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    match (width, height) {
        (Some(w), Some(h)) => Some((w, h)),
        (Some(w), None) => Some((w, scale_ceil(w, src_h, src_w))),
        (None, Some(h)) => Some((scale_ceil(h, src_w, src_h), h)),
        (None, None) => None,
    }
}

/// Size of the resampled source for a given canvas and policy.
///
/// When the canvas is larger than the source on both axes the source is
/// never upscaled; it is drawn at native size and padded.
pub fn content_size(source: (u32, u32), canvas: (u32, u32), method: ResizeMethod) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (canvas_w, canvas_h) = canvas;

    if canvas_w > src_w && canvas_h > src_h {
        return (src_w, src_h);
    }

    // Which axis binds when the aspect ratio is preserved, cross-multiplied
    let (sw, sh, cw, ch) = (src_w as u64, src_h as u64, canvas_w as u64, canvas_h as u64);
    let fits_width = sw * ch >= sh * cw;
    let fits_height = sh * cw >= sw * ch;

    let mut content = (canvas_w, canvas_h);
    match method {
        ResizeMethod::Fit => {
            if fits_width {
                content.1 = scale_ceil(canvas_w, src_h, src_w);
            } else if fits_height {
                content.0 = scale_ceil(canvas_h, src_w, src_h);
            }
        }
        ResizeMethod::Crop => {
            if fits_width {
                content.0 = scale_ceil(canvas_h, src_w, src_h);
            } else if fits_height {
                content.1 = scale_ceil(canvas_w, src_h, src_w);
            }
        }
        ResizeMethod::Scale => {}
    }
    content
}

/// Horizontal offset of content inside the canvas.
pub fn align_offset(align: Align, canvas: u32, content: u32) -> i32 {
    match align {
        Align::Left => 0,
        Align::Right => canvas as i32 - content as i32,
        Align::Center => (canvas as f64 / 2.0 - content as f64 / 2.0).round() as i32,
    }
}

/// Vertical offset of content inside the canvas.
pub fn vertical_align_offset(align: VerticalAlign, canvas: u32, content: u32) -> i32 {
    match align {
        VerticalAlign::Top => 0,
        VerticalAlign::Bottom => canvas as i32 - content as i32,
        VerticalAlign::Middle => (canvas as f64 / 2.0 - content as f64 / 2.0).round() as i32,
    }
}

/// Compute the full layout for resizing `source` according to `spec`.
///
/// Returns `None` when `spec` has no target dimension, in which case the
/// resize is a no-op.
///
/// # Examples
/// ```
/// # use canvasjob::imaging::{ResizeSpec, compute_layout};
/// // 800x600 into a 400x400 box: 400x300 content with 50px bands
/// let layout = compute_layout((800, 600), &ResizeSpec::new(Some(400), Some(400))).unwrap();
/// assert_eq!((layout.content_width, layout.content_height), (400, 300));
/// assert_eq!((layout.offset_x, layout.offset_y), (0, 50));
/// ```
pub fn compute_layout(source: (u32, u32), spec: &ResizeSpec) -> Option<Layout> {
    let (canvas_width, canvas_height) = derive_canvas_size(source, spec.width, spec.height)?;
    let (content_width, content_height) =
        content_size(source, (canvas_width, canvas_height), spec.method);

    Some(Layout {
        canvas_width,
        canvas_height,
        content_width,
        content_height,
        offset_x: align_offset(spec.align, canvas_width, content_width),
        offset_y: vertical_align_offset(spec.vertical_align, canvas_height, content_height),
    })
}
