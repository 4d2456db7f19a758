//! Tool configuration.
//!
//! Handles loading, validating, and merging `canvasjob.toml`. Stock defaults
//! are overridden by the user file, and the resulting values become the
//! defaults for every recipe entry and step that doesn't set its own.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [image]
//! quality = 75              # JPEG quality; PNG uses quality % 10 as compression level
//! background = "transparent" # Letterbox and blank canvas fill
//! method = "fit"            # fit, crop or scale
//! align = "center"          # left, center or right
//! vertical_align = "middle" # top, middle or bottom
//!
//! [text]
//! font_dir = "fonts"        # Where font files are looked up
//! font = "arial.ttf"
//! font_size = 12            # Points
//! color = "#000000"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [text]
//! font = "DejaVuSans.ttf"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Align, ColorSpec, ResizeMethod, Rgb, TextJob, VerticalAlign};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "canvasjob.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `canvasjob.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasConfig {
    /// Output and resize defaults.
    pub image: ImageConfig,
    /// Text job defaults.
    pub text: TextConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl CanvasConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.quality > 100 {
            return Err(ConfigError::Validation("image.quality must be 0-100".into()));
        }
        if self.text.font_size == 0 {
            return Err(ConfigError::Validation(
                "text.font_size must be at least 1".into(),
            ));
        }
        if self.text.font.trim().is_empty() {
            return Err(ConfigError::Validation("text.font must not be empty".into()));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Output and resize defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    /// Encoding quality (0-100).
    pub quality: u32,
    pub background: ColorSpec,
    pub method: ResizeMethod,
    pub align: Align,
    pub vertical_align: VerticalAlign,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            quality: 75,
            background: ColorSpec::Alpha,
            method: ResizeMethod::Fit,
            align: Align::Center,
            vertical_align: VerticalAlign::Middle,
        }
    }
}

/// Text job defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    /// Directory font names are resolved against, relative to the recipe.
    pub font_dir: PathBuf,
    pub font: String,
    /// Size in points.
    pub font_size: u32,
    pub color: Rgb,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            font_dir: PathBuf::from("fonts"),
            font: "arial.ttf".to_string(),
            font_size: 12,
            color: Rgb::BLACK,
        }
    }
}

impl TextConfig {
    /// A text job carrying these defaults and no content.
    pub fn job_defaults(&self) -> TextJob {
        TextJob {
            font: self.font.clone(),
            font_size: self.font_size,
            color: self.color,
            ..TextJob::default()
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(CanvasConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CanvasConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CanvasConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<CanvasConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `canvasjob.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# canvasjob configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Recipe entries and steps override these per image.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output and resize defaults
# ---------------------------------------------------------------------------
[image]
# Encoding quality (0 = worst, 100 = best). JPEG uses it directly; PNG uses
# quality % 10 as its compression level; GIF ignores it.
quality = 75

# Fill for letterbox bands and blank canvases: "transparent", "#rgb" or "#rrggbb".
background = "transparent"

# How a source is fitted onto a canvas of a different shape:
#   fit   - whole source visible, padded with the background
#   crop  - canvas fully covered, overflow clipped
#   scale - stretched, aspect ratio ignored
method = "fit"

# Placement of the source on the canvas.
align = "center"          # left, center, right
vertical_align = "middle" # top, middle, bottom

# ---------------------------------------------------------------------------
# Text defaults
# ---------------------------------------------------------------------------
[text]
# Directory font files are loaded from, relative to the recipe file.
font_dir = "fonts"

# Font file name inside font_dir.
font = "arial.ttf"

# Size in points.
font_size = 12

color = "#000000"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn default_config_values() {
        let config = CanvasConfig::default();
        assert_eq!(config.image.quality, 75);
        assert_eq!(config.image.background, ColorSpec::Alpha);
        assert_eq!(config.image.method, ResizeMethod::Fit);
        assert_eq!(config.text.font, "arial.ttf");
        assert_eq!(config.text.font_size, 12);
        assert_eq!(config.text.color, Rgb::BLACK);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn stock_toml_matches_defaults() {
        let parsed: CanvasConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, CanvasConfig::default());
    }

    #[test]
    fn text_job_defaults_follow_config() {
        let text = TextConfig {
            font: "Inter.ttf".into(),
            font_size: 20,
            color: Rgb::new(1, 2, 3),
            ..TextConfig::default()
        };
        let job = text.job_defaults();
        assert_eq!(job.font, "Inter.ttf");
        assert_eq!(job.font_size, 20);
        assert_eq!(job.color, Rgb::new(1, 2, 3));
        assert!(job.content.is_empty());
    }

    // =========================================================================
    // Loading and merging
    // =========================================================================

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, CanvasConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r##"
[image]
quality = 90
background = "#fff"

[text]
font = "DejaVuSans.ttf"
"##,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.image.quality, 90);
        assert_eq!(config.image.background, ColorSpec::Rgb(Rgb::WHITE));
        assert_eq!(config.image.method, ResizeMethod::Fit);
        assert_eq!(config.text.font, "DejaVuSans.ttf");
        assert_eq!(config.text.font_size, 12);
    }

    #[test]
    fn unknown_keys_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "[image]\nqualty = 90\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn invalid_toml_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "[image\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn merge_toml_nested_tables() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n[b]\nz = 3").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 20\nw = 4").unwrap();
        let merged = merge_toml(base, overlay);

        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(20));
        assert_eq!(merged["a"]["w"].as_integer(), Some(4));
        assert_eq!(merged["b"]["z"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_scalar_replaces_table() {
        let base: toml::Value = toml::from_str("[a]\nx = 1").unwrap();
        let overlay: toml::Value = toml::from_str("a = 5").unwrap();
        assert_eq!(merge_toml(base, overlay)["a"].as_integer(), Some(5));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn quality_over_100_rejected() {
        let mut config = CanvasConfig::default();
        config.image.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_font_size_rejected() {
        let mut config = CanvasConfig::default();
        config.text.font_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_processes_rejected() {
        let mut config = CanvasConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 100),
        };
        assert_eq!(effective_threads(&config), cores);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_processes: Some(1)
            }),
            1
        );
    }
}
