//! Batch recipes.
//!
//! A recipe is a TOML file listing images to produce. Each `[[image]]` entry
//! names a source (a file, or a blank canvas), an output path, optional
//! output settings, and an ordered list of steps:
//!
//! ```toml
//! [[image]]
//! source = "photos/beach.jpg"
//! output = "out/beach-square.png"
//! background = "#000"
//!
//! [[image.step]]
//! resize = { width = 400, height = 400, method = "fit" }
//!
//! [[image.step]]
//! text = { content = "Summer 2024", font_size = 18, color = "#fff", vertical_align = "bottom" }
//!
//! [[image]]
//! blank = [1, 1]
//! output = "out/label.png"
//!
//! [[image.step]]
//! text = { content = "Grows to fit", block_width = "auto" }
//! ```
//!
//! Relative paths resolve against the recipe's directory. Anything an entry
//! or step leaves out comes from [`CanvasConfig`](crate::config::CanvasConfig):
//! text steps are merged over the configured text defaults with
//! [`merge_toml`](crate::config::merge_toml), so unknown keys are still
//! rejected.

use crate::config::{CanvasConfig, merge_toml};
use crate::imaging::{
    Align, ColorSpec, ImageFormat, Quality, ResizeMethod, Source, TextJob, VerticalAlign,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Image {entry}: {message}")]
    Invalid { entry: usize, message: String },
}

/// A resolved recipe: every default filled in, every path absolute or
/// relative to the working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub entries: Vec<Entry>,
}

/// One output image.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// 1-based position in the recipe.
    pub index: usize,
    pub source: Source,
    pub output: PathBuf,
    pub format: Option<ImageFormat>,
    pub quality: Quality,
    pub background: ColorSpec,
    pub align: Align,
    pub vertical_align: VerticalAlign,
    pub font_dir: PathBuf,
    pub steps: Vec<Step>,
}

/// One queued job on an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        method: Option<ResizeMethod>,
    },
    Text(TextJob),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipe {
    #[serde(default)]
    image: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    source: Option<PathBuf>,
    blank: Option<[u32; 2]>,
    output: PathBuf,
    format: Option<ImageFormat>,
    quality: Option<u32>,
    background: Option<ColorSpec>,
    align: Option<Align>,
    vertical_align: Option<VerticalAlign>,
    font_dir: Option<PathBuf>,
    #[serde(default)]
    step: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawStep {
    Resize(RawResize),
    Text(toml::Value),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResize {
    width: Option<u32>,
    height: Option<u32>,
    method: Option<ResizeMethod>,
}

/// Read and resolve a recipe file.
pub fn load_recipe(path: &Path, config: &CanvasConfig) -> Result<Recipe, RecipeError> {
    let content = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or(Path::new(""));
    parse_recipe(&content, base_dir, config)
}

/// Resolve recipe text, with relative paths anchored at `base_dir`.
pub fn parse_recipe(
    content: &str,
    base_dir: &Path,
    config: &CanvasConfig,
) -> Result<Recipe, RecipeError> {
    let raw: RawRecipe = toml::from_str(content)?;
    let text_defaults = toml::Value::try_from(config.text.job_defaults())?;

    let entries = raw
        .image
        .into_iter()
        .enumerate()
        .map(|(i, entry)| resolve_entry(i + 1, entry, base_dir, config, &text_defaults))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Recipe { entries })
}

fn resolve_entry(
    index: usize,
    raw: RawEntry,
    base_dir: &Path,
    config: &CanvasConfig,
    text_defaults: &toml::Value,
) -> Result<Entry, RecipeError> {
    let invalid = |message: String| RecipeError::Invalid {
        entry: index,
        message,
    };

    let source = match (raw.source, raw.blank) {
        (Some(path), None) => Source::File(base_dir.join(path)),
        (None, Some([width, height])) => {
            if width == 0 || height == 0 {
                return Err(invalid(format!(
                    "blank canvas {width}x{height} must be at least 1x1"
                )));
            }
            Source::Blank { width, height }
        }
        (Some(_), Some(_)) => {
            return Err(invalid("set either source or blank, not both".into()));
        }
        (None, None) => return Err(invalid("missing source or blank".into())),
    };

    let quality = raw.quality.unwrap_or(config.image.quality);
    if quality > 100 {
        return Err(invalid(format!("quality {quality} must be 0-100")));
    }

    let mut steps = Vec::with_capacity(raw.step.len());
    let mut seen_resize = false;
    for (n, step) in raw.step.into_iter().enumerate() {
        let step = match step {
            RawStep::Resize(RawResize {
                width,
                height,
                method,
            }) => {
                if width == Some(0) || height == Some(0) {
                    return Err(invalid(format!("step {}: resize to zero", n + 1)));
                }
                // Later resizes inherit the method of earlier ones
                let method = match (method, seen_resize) {
                    (Some(m), _) => Some(m),
                    (None, false) => Some(config.image.method),
                    (None, true) => None,
                };
                seen_resize = true;
                Step::Resize {
                    width,
                    height,
                    method,
                }
            }
            RawStep::Text(value) => {
                let job: TextJob = merge_toml(text_defaults.clone(), value).try_into()?;
                Step::Text(job)
            }
        };
        steps.push(step);
    }

    Ok(Entry {
        index,
        source,
        output: base_dir.join(raw.output),
        format: raw.format,
        quality: Quality::new(quality),
        background: raw.background.unwrap_or(config.image.background),
        align: raw.align.unwrap_or(config.image.align),
        vertical_align: raw.vertical_align.unwrap_or(config.image.vertical_align),
        font_dir: base_dir.join(raw.font_dir.unwrap_or_else(|| config.text.font_dir.clone())),
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{BlockWidth, Rgb};
    use tempfile::TempDir;

    fn parse(content: &str) -> Result<Recipe, RecipeError> {
        parse_recipe(content, Path::new("/work"), &CanvasConfig::default())
    }

    // =========================================================================
    // Entries
    // =========================================================================

    #[test]
    fn file_entry_with_defaults() {
        let recipe = parse(
            r#"
[[image]]
source = "in/a.jpg"
output = "out/a.png"
"#,
        )
        .unwrap();

        let entry = &recipe.entries[0];
        assert_eq!(entry.index, 1);
        assert_eq!(entry.source, Source::File(PathBuf::from("/work/in/a.jpg")));
        assert_eq!(entry.output, PathBuf::from("/work/out/a.png"));
        assert_eq!(entry.format, None);
        assert_eq!(entry.quality.value(), 75);
        assert_eq!(entry.background, ColorSpec::Alpha);
        assert_eq!(entry.align, Align::Center);
        assert_eq!(entry.font_dir, PathBuf::from("/work/fonts"));
        assert!(entry.steps.is_empty());
    }

    #[test]
    fn blank_entry_with_overrides() {
        let recipe = parse(
            r##"
[[image]]
blank = [300, 100]
output = "banner.gif"
format = "gif"
quality = 40
background = "#036"
align = "left"
vertical_align = "bottom"
font_dir = "/usr/share/fonts"
"##,
        )
        .unwrap();

        let entry = &recipe.entries[0];
        assert_eq!(
            entry.source,
            Source::Blank {
                width: 300,
                height: 100
            }
        );
        assert_eq!(entry.format, Some(ImageFormat::Gif));
        assert_eq!(entry.quality.value(), 40);
        assert_eq!(entry.background, ColorSpec::Rgb(Rgb::new(0, 0x33, 0x66)));
        assert_eq!(entry.align, Align::Left);
        assert_eq!(entry.vertical_align, VerticalAlign::Bottom);
        // Absolute paths are kept
        assert_eq!(entry.font_dir, PathBuf::from("/usr/share/fonts"));
    }

    #[test]
    fn entries_are_numbered_in_order() {
        let recipe = parse(
            r#"
[[image]]
source = "a.jpg"
output = "a.png"

[[image]]
source = "b.jpg"
output = "b.png"
"#,
        )
        .unwrap();
        let indexes: Vec<usize> = recipe.entries.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![1, 2]);
    }

    #[test]
    fn empty_recipe_is_valid() {
        assert!(parse("").unwrap().entries.is_empty());
    }

    #[test]
    fn source_and_blank_are_exclusive() {
        let err = parse(
            r#"
[[image]]
source = "a.jpg"
blank = [1, 1]
output = "a.png"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, RecipeError::Invalid { entry: 1, .. }));
    }

    #[test]
    fn missing_source_rejected() {
        let err = parse("[[image]]\noutput = \"a.png\"\n").unwrap_err();
        assert!(matches!(err, RecipeError::Invalid { entry: 1, .. }));
    }

    #[test]
    fn zero_blank_rejected() {
        let err = parse("[[image]]\nblank = [0, 10]\noutput = \"a.png\"\n").unwrap_err();
        assert!(err.to_string().contains("at least 1x1"));
    }

    #[test]
    fn quality_over_100_rejected() {
        let err = parse("[[image]]\nsource = \"a.jpg\"\noutput = \"a.png\"\nquality = 101\n")
            .unwrap_err();
        assert!(matches!(err, RecipeError::Invalid { .. }));
    }

    #[test]
    fn unknown_entry_key_rejected() {
        let result = parse("[[image]]\nsource = \"a.jpg\"\noutput = \"a.png\"\nsize = 3\n");
        assert!(matches!(result, Err(RecipeError::Toml(_))));
    }

    // =========================================================================
    // Steps
    // =========================================================================

    #[test]
    fn steps_keep_their_order() {
        let recipe = parse(
            r##"
[[image]]
source = "a.jpg"
output = "a.png"

[[image.step]]
text = { content = "first" }

[[image.step]]
resize = { width = 400 }

[[image.step]]
text = { content = "second", font_size = 30, color = "#fff", block_width = "auto" }
"##,
        )
        .unwrap();

        let steps = &recipe.entries[0].steps;
        assert_eq!(steps.len(), 3);
        assert!(matches!(&steps[0], Step::Text(job) if job.content == "first"));
        assert_eq!(
            steps[1],
            Step::Resize {
                width: Some(400),
                height: None,
                method: Some(ResizeMethod::Fit),
            }
        );
        match &steps[2] {
            Step::Text(job) => {
                assert_eq!(job.font_size, 30);
                assert_eq!(job.color, Rgb::WHITE);
                assert_eq!(job.block_width, BlockWidth::Auto);
                assert_eq!(job.font, "arial.ttf");
            }
            other => panic!("expected text step, got {other:?}"),
        }
    }

    #[test]
    fn later_resizes_inherit_method() {
        let recipe = parse(
            r#"
[[image]]
source = "a.jpg"
output = "a.png"

[[image.step]]
resize = { width = 100, method = "crop" }

[[image.step]]
resize = { height = 200 }
"#,
        )
        .unwrap();
        let steps = &recipe.entries[0].steps;
        assert!(matches!(
            steps[0],
            Step::Resize {
                method: Some(ResizeMethod::Crop),
                ..
            }
        ));
        assert!(matches!(steps[1], Step::Resize { method: None, .. }));
    }

    #[test]
    fn text_steps_use_config_defaults() {
        let mut config = CanvasConfig::default();
        config.text.font = "Inter.ttf".into();
        config.text.font_size = 16;

        let recipe = parse_recipe(
            r#"
[[image]]
blank = [10, 10]
output = "a.png"

[[image.step]]
text = { content = "hi", font_size = 9 }
"#,
            Path::new(""),
            &config,
        )
        .unwrap();

        match &recipe.entries[0].steps[0] {
            Step::Text(job) => {
                assert_eq!(job.font, "Inter.ttf");
                assert_eq!(job.font_size, 9);
            }
            other => panic!("expected text step, got {other:?}"),
        }
    }

    #[test]
    fn unknown_text_key_rejected() {
        let result = parse(
            r#"
[[image]]
source = "a.jpg"
output = "a.png"

[[image.step]]
text = { content = "hi", size = 9 }
"#,
        );
        assert!(matches!(result, Err(RecipeError::Toml(_))));
    }

    #[test]
    fn zero_resize_rejected() {
        let result = parse(
            r#"
[[image]]
source = "a.jpg"
output = "a.png"

[[image.step]]
resize = { width = 0 }
"#,
        );
        assert!(matches!(result, Err(RecipeError::Invalid { entry: 1, .. })));
    }

    #[test]
    fn load_recipe_resolves_against_file_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("recipe.toml");
        fs::write(&path, "[[image]]\nsource = \"a.jpg\"\noutput = \"out/a.png\"\n").unwrap();

        let recipe = load_recipe(&path, &CanvasConfig::default()).unwrap();
        assert_eq!(recipe.entries[0].output, tmp.path().join("out/a.png"));
    }
}
