//! Batch processing of recipes.
//!
//! Each recipe entry gets its own [`Image`] handle: the source is set, the
//! entry's settings applied, its steps queued in order, and the result saved
//! to the entry's output path. Nothing is shared between entries, so they
//! run in parallel.
//!
//! ## Parallel Processing
//!
//! Entries are processed in parallel using [rayon](https://docs.rs/rayon).
//! The pool size comes from `processing.max_processes`, see
//! [`effective_threads`](crate::config::effective_threads).
//!
//! ## Progress
//!
//! When a sender is supplied, a [`ProcessEvent`] is sent as each entry
//! finishes. Entries finish in any order; the returned [`ProcessReport`]
//! lists them in recipe order.
//!
//! A failing entry does not stop the others. Its error is recorded in the
//! report and the caller decides what to do with it.

use crate::imaging::{CodecBackend, Image, ImageError, ImageFormat, RustBackend, Source};
use crate::recipe::{Entry, Recipe, Step};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{failed} of {total} images failed")]
    EntriesFailed { failed: usize, total: usize },
}

/// Progress events emitted while processing.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// Processing is about to start.
    Started { total: usize },
    /// An entry was written.
    ImageWritten(ProcessedImage),
    /// An entry failed.
    ImageFailed {
        index: usize,
        output: String,
        error: String,
    },
}

/// One written output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedImage {
    pub index: usize,
    pub source: String,
    pub output: String,
    pub format: ImageFormat,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    /// Labels of the steps that ran, in order.
    pub steps: Vec<String>,
}

/// One failed entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub index: usize,
    pub output: String,
    pub error: String,
}

/// Everything a run produced, in recipe order.
#[derive(Debug, Default, Serialize)]
pub struct ProcessReport {
    pub images: Vec<ProcessedImage>,
    pub failures: Vec<Failure>,
}

impl ProcessReport {
    pub fn total(&self) -> usize {
        self.images.len() + self.failures.len()
    }

    /// `Err` when any entry failed.
    pub fn ensure_success(&self) -> Result<(), ProcessError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(ProcessError::EntriesFailed {
                failed: self.failures.len(),
                total: self.total(),
            })
        }
    }

    /// Pretty JSON summary, written by `run --report`.
    pub fn to_json(&self) -> Result<String, ProcessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Human-readable source label.
pub fn describe_source(source: &Source) -> String {
    match source {
        Source::Unset => "(none)".to_string(),
        Source::File(path) => path.display().to_string(),
        Source::Blank { width, height } => format!("blank {width}x{height}"),
    }
}

/// Step label used in events and plans.
pub fn step_label(step: &Step) -> &'static str {
    match step {
        Step::Resize { .. } => "resize",
        Step::Text(_) => "text",
    }
}

pub fn process(recipe: &Recipe, progress: Option<Sender<ProcessEvent>>) -> ProcessReport {
    process_with_backend(recipe, RustBackend::new, progress)
}

/// Process a recipe with backends from `make_backend`, one per entry
/// (allows testing with mock).
pub fn process_with_backend<B, F>(
    recipe: &Recipe,
    make_backend: F,
    progress: Option<Sender<ProcessEvent>>,
) -> ProcessReport
where
    B: CodecBackend,
    F: Fn() -> B + Sync,
{
    if let Some(tx) = &progress {
        tx.send(ProcessEvent::Started {
            total: recipe.entries.len(),
        })
        .ok();
    }

    let results: Vec<Result<ProcessedImage, Failure>> = recipe
        .entries
        .par_iter()
        .map(|entry| {
            let result = run_entry(entry, make_backend()).map_err(|e| {
                warn!(index = entry.index, error = %e, "image failed");
                Failure {
                    index: entry.index,
                    output: entry.output.display().to_string(),
                    error: e.to_string(),
                }
            });
            if let Some(tx) = &progress {
                let event = match &result {
                    Ok(image) => ProcessEvent::ImageWritten(image.clone()),
                    Err(failure) => ProcessEvent::ImageFailed {
                        index: failure.index,
                        output: failure.output.clone(),
                        error: failure.error.clone(),
                    },
                };
                tx.send(event).ok();
            }
            result
        })
        .collect();

    let mut report = ProcessReport::default();
    for result in results {
        match result {
            Ok(image) => report.images.push(image),
            Err(failure) => report.failures.push(failure),
        }
    }
    report
}

/// Build a handle for one entry, queue its steps and save it.
pub fn run_entry<B: CodecBackend>(entry: &Entry, backend: B) -> Result<ProcessedImage, ImageError> {
    let mut image = Image::with_backend(backend);
    match &entry.source {
        Source::Unset => return Err(ImageError::SourceMissing),
        Source::File(path) => {
            image.set_source_path(path.clone());
        }
        &Source::Blank { width, height } => {
            image.create_blank(width, height)?;
        }
    }

    image
        .set_background(entry.background)
        .set_align(entry.align, entry.vertical_align)
        .set_quality(entry.quality.value())
        .set_font_dir(entry.font_dir.clone())
        .set_destination(entry.output.clone());
    // The output extension wins over the source format
    if let Some(format) = entry.format.or_else(|| ImageFormat::from_path(&entry.output)) {
        image.set_format(format);
    }

    for step in &entry.steps {
        match step {
            Step::Resize {
                width,
                height,
                method,
            } => {
                image.resize(*width, *height, *method)?;
            }
            Step::Text(job) => {
                image.write_text(job.clone());
            }
        }
    }
    debug!(index = entry.index, jobs = image.jobs().count(), "queued steps");

    if let Some(parent) = entry.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = image.save()?;

    Ok(ProcessedImage {
        index: entry.index,
        source: describe_source(&entry.source),
        output: entry.output.display().to_string(),
        format: rendered.format,
        content_type: rendered.content_type().to_string(),
        width: image.width()?,
        height: image.height()?,
        bytes: rendered.bytes.len(),
        steps: entry.steps.iter().map(|s| step_label(s).to_string()).collect(),
    })
}

/// Output paths claimed by more than one entry.
pub fn duplicate_outputs(recipe: &Recipe) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    let mut duplicates = Vec::new();
    for entry in &recipe.entries {
        if !seen.insert(&entry.output) && !duplicates.contains(&entry.output) {
            duplicates.push(entry.output.clone());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{Align, ColorSpec, Quality, TextJob, VerticalAlign};
    use crate::recipe::parse_recipe;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn entry(index: usize, source: Source, output: PathBuf, steps: Vec<Step>) -> Entry {
        Entry {
            index,
            source,
            output,
            format: None,
            quality: Quality::default(),
            background: ColorSpec::Alpha,
            align: Align::Center,
            vertical_align: VerticalAlign::Middle,
            font_dir: PathBuf::from("fonts"),
            steps,
        }
    }

    fn mock_photo() -> MockBackend {
        MockBackend::with_source(800, 600, ImageFormat::Jpeg)
    }

    // =========================================================================
    // Single entries
    // =========================================================================

    #[test]
    fn run_entry_resizes_and_saves() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("nested/dir/photo.jpg");
        let e = entry(
            1,
            Source::File("/in/photo.jpg".into()),
            out.clone(),
            vec![Step::Resize {
                width: Some(400),
                height: None,
                method: None,
            }],
        );

        let image = run_entry(&e, mock_photo()).unwrap();
        assert_eq!((image.width, image.height), (400, 300));
        assert_eq!(image.format, ImageFormat::Jpeg);
        assert_eq!(image.content_type, "image/jpeg");
        assert_eq!(image.steps, vec!["resize"]);
        assert_eq!(std::fs::read(&out).unwrap(), b"jpg:400x300");
    }

    #[test]
    fn run_entry_blank_needs_format() {
        let tmp = TempDir::new().unwrap();
        // No extension to infer from
        let e = entry(
            1,
            Source::Blank {
                width: 10,
                height: 10,
            },
            tmp.path().join("label"),
            vec![Step::Text(TextJob::new("hi"))],
        );
        let err = run_entry(&e, MockBackend::new()).unwrap_err();
        assert!(matches!(err, ImageError::MissingFormat));

        let e = Entry {
            format: Some(ImageFormat::Png),
            ..e
        };
        let image = run_entry(&e, MockBackend::new()).unwrap();
        assert_eq!(image.source, "blank 10x10");
        assert_eq!(image.content_type, "image/png");
    }

    #[test]
    fn run_entry_missing_source() {
        let tmp = TempDir::new().unwrap();
        let e = entry(1, Source::File("/nope.jpg".into()), tmp.path().join("a.png"), vec![]);
        let err = run_entry(&e, MockBackend::new()).unwrap_err();
        assert!(matches!(err, ImageError::SourceNotFound(_)));
    }

    // =========================================================================
    // Batches
    // =========================================================================

    #[test]
    fn process_reports_in_recipe_order() {
        let tmp = TempDir::new().unwrap();
        let recipe = parse_recipe(
            r#"
[[image]]
source = "a.jpg"
output = "out/a.png"

[[image.step]]
resize = { width = 200 }

[[image]]
source = "b.jpg"
output = "out/b.gif"

[[image]]
source = "c.jpg"
output = "out/c.jpg"

[[image.step]]
resize = { width = 100, height = 100, method = "crop" }
"#,
            tmp.path(),
            &CanvasConfig::default(),
        )
        .unwrap();

        let (tx, rx) = mpsc::channel();
        let report = process_with_backend(&recipe, mock_photo, Some(tx));

        assert!(report.failures.is_empty());
        let sizes: Vec<(usize, u32, u32)> = report
            .images
            .iter()
            .map(|i| (i.index, i.width, i.height))
            .collect();
        assert_eq!(sizes, vec![(1, 200, 150), (2, 800, 600), (3, 100, 100)]);
        assert!(report.ensure_success().is_ok());

        let events: Vec<ProcessEvent> = rx.iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ProcessEvent::Started { total: 3 }));
        assert_eq!(std::fs::read(tmp.path().join("out/b.gif")).unwrap(), b"gif:800x600");
        assert_eq!(report.images[0].format, ImageFormat::Png);
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let tmp = TempDir::new().unwrap();
        let recipe = Recipe {
            entries: vec![
                entry(
                    1,
                    Source::Blank {
                        width: 5,
                        height: 5,
                    },
                    tmp.path().join("ok.png"),
                    vec![],
                ),
                entry(2, Source::File("/missing.jpg".into()), tmp.path().join("bad.png"), vec![]),
            ],
        };

        let report = process_with_backend(&recipe, MockBackend::new, None);
        assert_eq!(report.images.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 2);
        assert!(report.failures[0].error.contains("/missing.jpg"));
        assert!(matches!(
            report.ensure_success(),
            Err(ProcessError::EntriesFailed {
                failed: 1,
                total: 2
            })
        ));
    }

    #[test]
    fn report_serializes_to_json() {
        let report = ProcessReport {
            images: vec![ProcessedImage {
                index: 1,
                source: "a.jpg".into(),
                output: "a.png".into(),
                format: ImageFormat::Png,
                content_type: "image/png".into(),
                width: 4,
                height: 3,
                bytes: 99,
                steps: vec!["resize".into()],
            }],
            failures: vec![],
        };
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["images"][0]["format"], "png");
        assert_eq!(json["images"][0]["width"], 4);
        assert_eq!(json["failures"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn duplicate_outputs_detected() {
        let recipe = Recipe {
            entries: vec![
                entry(1, Source::File("a.jpg".into()), "x.png".into(), vec![]),
                entry(2, Source::File("b.jpg".into()), "y.png".into(), vec![]),
                entry(3, Source::File("c.jpg".into()), "x.png".into(), vec![]),
                entry(4, Source::File("d.jpg".into()), "x.png".into(), vec![]),
            ],
        };
        assert_eq!(duplicate_outputs(&recipe), vec![PathBuf::from("x.png")]);
        assert!(duplicate_outputs(&Recipe { entries: vec![] }).is_empty());
    }
}
