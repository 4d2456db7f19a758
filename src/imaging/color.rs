//! Color tokens for backgrounds and text.
//!
//! Colors arrive as loose strings from callers and config files, so parsing
//! is total: anything that isn't one of the alpha aliases or a well-formed
//! hex color becomes opaque white.
//!
//! | Token | Result |
//! |---|---|
//! | `transparent`, `alpha` (any case) | [`ColorSpec::Alpha`] |
//! | `#abc`, `abc` | `Rgb(0xaa, 0xbb, 0xcc)` |
//! | `#a1b2c3`, `a1b2c3` | `Rgb(0xa1, 0xb2, 0xc3)` |
//! | anything else, including `""` | `Rgb(0xff, 0xff, 0xff)` |

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// An opaque 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a token that must resolve to a solid color.
    ///
    /// The alpha aliases have no meaning for text, so they degrade to the
    /// same white fallback as any other unusable token.
    pub fn parse(token: &str) -> Self {
        match ColorSpec::parse(token) {
            ColorSpec::Rgb(rgb) => rgb,
            ColorSpec::Alpha => Self::WHITE,
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A background fill request: fully transparent, or a solid color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpec {
    #[default]
    Alpha,
    Rgb(Rgb),
}

impl ColorSpec {
    /// Parse a color token. Never fails; see the [module docs](self).
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.eq_ignore_ascii_case("transparent") || token.eq_ignore_ascii_case("alpha") {
            return Self::Alpha;
        }

        let hex = token.strip_prefix('#').unwrap_or(token);
        let expanded: String = if hex.len() == 3 {
            hex.chars().flat_map(|c| [c, c]).collect()
        } else {
            hex.to_string()
        };

        Self::Rgb(parse_hex6(&expanded).unwrap_or(Rgb::WHITE))
    }

    pub fn is_alpha(self) -> bool {
        matches!(self, Self::Alpha)
    }
}

/// Parse exactly six hex digits into an [`Rgb`].
fn parse_hex6(hex: &str) -> Option<Rgb> {
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}

impl FromStr for ColorSpec {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alpha => f.write_str("transparent"),
            Self::Rgb(rgb) => rgb.fmt(f),
        }
    }
}

impl Serialize for ColorSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ColorSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Self::parse(&token))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Self::parse(&token))
    }
}
