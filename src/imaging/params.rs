//! Parameter types for image jobs.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`handle`](super::handle) (which queues jobs) and
//! the engines in [`geometry`](super::geometry) and [`text`](super::text).
//! Every field has an explicit default, so callers only spell out what they
//! want to change.
//!
//! ## Types
//!
//! - [`Quality`]: Encoding quality (0-100, default 75). Clamped on construction.
//! - [`ImageFormat`]: JPEG, PNG or GIF.
//! - [`ResizeMethod`], [`Align`], [`VerticalAlign`]: placement policies.
//! - [`ResizeSpec`]: target size, policy, alignment and background for a resize.
//! - [`BlockWidth`]: fixed, canvas-wide, or auto-sized text box.
//! - [`TextJob`]: everything needed to lay out and draw one string.

use super::color::{ColorSpec, Rgb};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Quality setting for encoding (0-100).
///
/// JPEG uses it directly. PNG reduces it modulo 10 to a compression level.
/// GIF ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// PNG compression level, 0 (fastest) to 9 (smallest).
    pub fn png_level(self) -> u32 {
        self.0 % 10
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

/// Encoded image container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Gif,
}

impl ImageFormat {
    /// Guess the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// MIME type sent along with rendered bytes.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            other => Err(format!("unknown image format '{other}' (expected jpg, png or gif)")),
        }
    }
}

/// How the source is fitted onto a canvas of a different aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    /// Whole source visible, letterboxed with the background.
    #[default]
    Fit,
    /// Canvas fully covered, overflow clipped.
    Crop,
    /// Stretched to the canvas, aspect ratio ignored.
    Scale,
}

/// Horizontal placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

macro_rules! lowercase_from_str {
    ($ty:ty, $what:literal, { $($name:literal => $variant:path),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(format!(concat!("unknown ", $what, " '{}'"), other)),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $($variant => $name,)+
                })
            }
        }
    };
}

lowercase_from_str!(ResizeMethod, "resize method", {
    "fit" => ResizeMethod::Fit,
    "crop" => ResizeMethod::Crop,
    "scale" => ResizeMethod::Scale,
});

lowercase_from_str!(Align, "alignment", {
    "left" => Align::Left,
    "center" => Align::Center,
    "right" => Align::Right,
});

lowercase_from_str!(VerticalAlign, "vertical alignment", {
    "top" => VerticalAlign::Top,
    "middle" => VerticalAlign::Middle,
    "bottom" => VerticalAlign::Bottom,
});

/// Full specification for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub method: ResizeMethod,
    pub align: Align,
    pub vertical_align: VerticalAlign,
    pub background: ColorSpec,
}

impl ResizeSpec {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: ResizeMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_align(mut self, align: Align, vertical_align: VerticalAlign) -> Self {
        self.align = align;
        self.vertical_align = vertical_align;
        self
    }

    pub fn with_background(mut self, background: ColorSpec) -> Self {
        self.background = background;
        self
    }

    /// Whether a target dimension is set at all.
    pub fn has_target(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// Fold a later resize request into this one.
    ///
    /// Only the fields the later call sets are replaced, so
    /// `resize(100, _)` followed by `resize(_, 200)` asks for 100×200.
    pub fn merge(&mut self, width: Option<u32>, height: Option<u32>, method: Option<ResizeMethod>) {
        if width.is_some() {
            self.width = width;
        }
        if height.is_some() {
            self.height = height;
        }
        if let Some(method) = method {
            self.method = method;
        }
    }
}

/// Width of the box that text wraps inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockWidth {
    /// The current canvas width.
    #[default]
    Canvas,
    /// A fixed number of pixels.
    Fixed(u32),
    /// Grow to fit the text on one line; the canvas is resized to match.
    Auto,
}

impl Serialize for BlockWidth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Canvas => serializer.serialize_str("canvas"),
            Self::Fixed(px) => serializer.serialize_u32(*px),
            Self::Auto => serializer.serialize_str("auto"),
        }
    }
}

impl<'de> Deserialize<'de> for BlockWidth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BlockWidthVisitor;

        impl Visitor<'_> for BlockWidthVisitor {
            type Value = BlockWidth;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a pixel width, \"auto\" or \"canvas\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<BlockWidth, E> {
                match u32::try_from(v) {
                    Ok(0) => Ok(BlockWidth::Canvas),
                    Ok(px) => Ok(BlockWidth::Fixed(px)),
                    Err(_) => Err(E::custom(format!("block width {v} out of range"))),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<BlockWidth, E> {
                let v = u64::try_from(v).map_err(|_| E::custom("block width must not be negative"))?;
                self.visit_u64(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<BlockWidth, E> {
                match v.to_ascii_lowercase().as_str() {
                    "auto" => Ok(BlockWidth::Auto),
                    "canvas" | "" => Ok(BlockWidth::Canvas),
                    other => Err(E::custom(format!("unknown block width '{other}'"))),
                }
            }
        }

        deserializer.deserialize_any(BlockWidthVisitor)
    }
}

/// A single string to lay out and draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextJob {
    pub content: String,
    /// Font size in points.
    pub font_size: u32,
    /// Font file name, resolved against the handle's font directory.
    pub font: String,
    pub color: Rgb,
    /// Extra gap between lines. Defaults to 70% of the font size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    pub block_width: BlockWidth,
    pub position_x: i32,
    pub position_y: i32,
    pub align: Align,
    pub vertical_align: VerticalAlign,
}

impl Default for TextJob {
    fn default() -> Self {
        Self {
            content: String::new(),
            font_size: 12,
            font: "arial.ttf".to_string(),
            color: Rgb::BLACK,
            line_height: None,
            block_width: BlockWidth::Canvas,
            position_x: 0,
            position_y: 0,
            align: Align::Left,
            vertical_align: VerticalAlign::Top,
        }
    }
}

impl TextJob {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Line gap actually used for wrapping.
    pub fn effective_line_height(&self) -> f64 {
        self.line_height
            .filter(|lh| *lh != 0.0)
            .unwrap_or_else(|| (7.0 * (self.font_size as f64 / 10.0)).abs())
    }
}
