//! Pure Rust backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF) | `image::ImageReader` with format sniffing |
//! | Resample | `image::imageops::resize` with `Lanczos3`, then `overlay` |
//! | Encode JPEG | `JpegEncoder::new_with_quality` |
//! | Encode PNG | `PngEncoder`, quality mod 10 mapped to a compression preset |
//! | Encode GIF | `GifEncoder` (single frame) |
//! | Fonts | `ab_glyph::FontVec`, sizes in points at 96 dpi |

use super::backend::{
    BackendError, CodecBackend, Decoded, Dimensions, RasterBackend, Rect, TextBox,
};
use super::color::{ColorSpec, Rgb};
use super::params::{ImageFormat, Quality};
use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, Rgba, RgbaImage};
use std::path::Path;

/// Backend on the `image` crate with `ab_glyph` text.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn codec_format(format: image::ImageFormat) -> Option<ImageFormat> {
    match format {
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::Gif => Some(ImageFormat::Gif),
        _ => None,
    }
}

fn decode_error(path: &Path, err: image::ImageError) -> BackendError {
    match err {
        image::ImageError::IoError(e) => BackendError::Io(e),
        other => BackendError::Decode {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

fn encode_error(format: ImageFormat) -> impl FnOnce(image::ImageError) -> BackendError {
    move |e| BackendError::Encode {
        format,
        message: e.to_string(),
    }
}

/// Clip `rect` to a `width`×`height` canvas. `None` when nothing is left.
fn clip(rect: Rect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x.max(0) as i64;
    let y0 = rect.y.max(0) as i64;
    let x1 = (rect.x as i64 + rect.width as i64).min(width as i64);
    let y1 = (rect.y as i64 + rect.height as i64).min(height as i64);
    (x1 > x0 && y1 > y0).then(|| (x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// PNG compression preset for a 0-9 level.
fn png_compression(level: u32) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Point size to pixel scale at 96 dpi.
fn px_scale(size: f32) -> PxScale {
    PxScale::from(size * 96.0 / 72.0)
}

/// Position glyphs along a baseline starting at `origin`.
///
/// Returns the glyphs and the total horizontal advance.
fn layout_glyphs(font: &FontVec, size: f32, origin: (f32, f32), text: &str) -> (Vec<Glyph>, f32) {
    let scaled = font.as_scaled(px_scale(size));
    let mut caret = origin.0;
    let mut previous = None;
    let mut glyphs = Vec::with_capacity(text.len());

    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(scaled.scale(), point(caret, origin.1)));
        caret += scaled.h_advance(id);
        previous = Some(id);
    }

    (glyphs, caret - origin.0)
}

impl RasterBackend for RustBackend {
    type Canvas = RgbaImage;
    type Font = FontVec;

    fn allocate_canvas(&self, width: u32, height: u32) -> Result<RgbaImage, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "cannot allocate a {width}x{height} canvas"
            )));
        }
        Ok(RgbaImage::new(width, height))
    }

    fn fill_rect(&self, canvas: &mut RgbaImage, rect: Rect, color: ColorSpec) {
        let Some((x0, y0, x1, y1)) = clip(rect, canvas.width(), canvas.height()) else {
            return;
        };
        let pixel = match color {
            ColorSpec::Alpha => Rgba([0, 0, 0, 0]),
            ColorSpec::Rgb(Rgb { r, g, b }) => Rgba([r, g, b, 255]),
        };
        for y in y0..y1 {
            for x in x0..x1 {
                canvas.put_pixel(x, y, pixel);
            }
        }
    }

    fn resample_copy(&self, dst: &mut RgbaImage, src: &RgbaImage, dst_rect: Rect) {
        if dst_rect.width == 0 || dst_rect.height == 0 {
            return;
        }
        let (x, y) = (dst_rect.x as i64, dst_rect.y as i64);
        if src.dimensions() == (dst_rect.width, dst_rect.height) {
            imageops::overlay(dst, src, x, y);
        } else {
            let resized = imageops::resize(src, dst_rect.width, dst_rect.height, FilterType::Lanczos3);
            imageops::overlay(dst, &resized, x, y);
        }
    }

    fn load_font(&self, path: &Path) -> Result<FontVec, BackendError> {
        let bytes = std::fs::read(path)?;
        FontVec::try_from_vec(bytes).map_err(|_| BackendError::InvalidFont(path.to_path_buf()))
    }

    fn measure_text(&self, font: &FontVec, size: f32, text: &str) -> TextBox {
        let (glyphs, advance) = layout_glyphs(font, size, (0.0, 0.0), text);

        // Ink extent; blank runs have none
        let mut top = f32::MAX;
        let mut bottom = f32::MIN;
        for glyph in glyphs {
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                top = top.min(bounds.min.y);
                bottom = bottom.max(bounds.max.y);
            }
        }
        let height = if bottom > top { bottom - top } else { 0.0 };

        TextBox {
            width: advance as f64,
            height: height as f64,
        }
    }

    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        font: &FontVec,
        size: f32,
        origin: (i32, i32),
        color: Rgb,
        text: &str,
    ) {
        let (glyphs, _) = layout_glyphs(font, size, (origin.0 as f32, origin.1 as f32), text);
        let (width, height) = canvas.dimensions();

        for glyph in glyphs {
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                    return;
                }
                let alpha = coverage.clamp(0.0, 1.0);
                if alpha <= 0.0 {
                    return;
                }
                let current = canvas.get_pixel(px as u32, py as u32);
                let inv = 1.0 - alpha;
                let blend = |src: u8, dst: u8| (src as f32 * alpha + dst as f32 * inv).round() as u8;
                let out = Rgba([
                    blend(color.r, current[0]),
                    blend(color.g, current[1]),
                    blend(color.b, current[2]),
                    (255.0 * alpha + current[3] as f32 * inv).min(255.0).round() as u8,
                ]);
                canvas.put_pixel(px as u32, py as u32, out);
            });
        }
    }
}

impl CodecBackend for RustBackend {
    fn decode(&self, path: &Path) -> Result<Decoded<RgbaImage>, BackendError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader
            .format()
            .and_then(codec_format)
            .ok_or_else(|| BackendError::UnsupportedFormat(path.display().to_string()))?;
        let canvas = reader.decode().map_err(|e| decode_error(path, e))?.into_rgba8();
        let (width, height) = canvas.dimensions();
        Ok(Decoded {
            canvas,
            dimensions: Dimensions { width, height },
            format,
        })
    }

    fn encode(
        &self,
        canvas: &RgbaImage,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let (width, height) = canvas.dimensions();
        let mut bytes = Vec::new();

        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgba8(canvas.clone()).into_rgb8();
                let level = quality.value().clamp(1, 100) as u8;
                JpegEncoder::new_with_quality(&mut bytes, level)
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(encode_error(format))?;
            }
            ImageFormat::Png => {
                let compression = png_compression(quality.png_level());
                PngEncoder::new_with_quality(&mut bytes, compression, PngFilter::Adaptive)
                    .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(encode_error(format))?;
            }
            ImageFormat::Gif => {
                let mut encoder = GifEncoder::new(&mut bytes);
                encoder
                    .encode(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(encode_error(format))?;
            }
        }

        Ok(bytes)
    }
}
