//! CLI output formatting for every command.
//!
//! # Entity Display Contract
//!
//! Every recipe entry is shown the same way in every command:
//!
//! 1. **Header line**: positional index + output file name
//! 2. **Context lines**: indented `Source:`, one line per step, result or error
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! 001 thumb.jpg
//!     Source: photos/dawn.jpg
//!     resize 200x? fit
//!     text "Dawn" 14pt arial.ttf
//!
//! 1 image, 2 steps
//! ```
//!
//! ## Run
//!
//! ```text
//! Processing 1 image
//! 001 thumb.jpg
//!     Source: photos/dawn.jpg
//!     resize, text
//!     200x150 jpg, 8312 bytes
//! ```
//!
//! ## Layout
//!
//! ```text
//! Canvas:  400x400
//! Content: 400x300
//! Offset:  0,50
//! Padding: 0 horizontal, 100 vertical
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::{BlockWidth, Layout, TextJob};
use crate::process::{ProcessEvent, ProcessReport, describe_source};
use crate::recipe::{Recipe, Step};
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Header line: index + output file name.
fn entry_header(index: usize, output: &str) -> String {
    let name = Path::new(output)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| output.to_string());
    format!("{} {}", format_index(index), name)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Shorten long text to `max` characters, with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    }
}

fn format_dimension(value: Option<u32>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

fn format_text_step(job: &TextJob) -> String {
    let mut line = format!(
        "text \"{}\" {}pt {}",
        truncate(&job.content, 30),
        job.font_size,
        job.font
    );
    match job.block_width {
        BlockWidth::Canvas => {}
        BlockWidth::Fixed(w) => line.push_str(&format!(" width {w}")),
        BlockWidth::Auto => line.push_str(" width auto"),
    }
    if job.position_x != 0 || job.position_y != 0 {
        line.push_str(&format!(" at {},{}", job.position_x, job.position_y));
    }
    line
}

/// One line describing a recipe step.
pub fn format_step(step: &Step) -> String {
    match step {
        Step::Resize {
            width,
            height,
            method,
        } => {
            let mut line = format!(
                "resize {}x{}",
                format_dimension(*width),
                format_dimension(*height)
            );
            if let Some(method) = method {
                line.push_str(&format!(" {method}"));
            }
            line
        }
        Step::Text(job) => format_text_step(job),
    }
}

// ============================================================================
// check
// ============================================================================

/// Format the plan for a recipe without running it.
pub fn format_plan(recipe: &Recipe) -> Vec<String> {
    let mut lines = Vec::new();
    let mut step_count = 0;

    for entry in &recipe.entries {
        lines.push(entry_header(entry.index, &entry.output.display().to_string()));
        lines.push(format!("{}Source: {}", indent(1), describe_source(&entry.source)));
        if let Some(format) = entry.format {
            lines.push(format!("{}Format: {}", indent(1), format));
        }
        if entry.steps.is_empty() {
            lines.push(format!("{}(no steps, copied as is)", indent(1)));
        }
        for step in &entry.steps {
            lines.push(format!("{}{}", indent(1), format_step(step)));
        }
        step_count += entry.steps.len();
    }

    if !recipe.entries.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{}, {}",
        plural(recipe.entries.len(), "image"),
        plural(step_count, "step")
    ));
    lines
}

pub fn print_plan(recipe: &Recipe) {
    for line in format_plan(recipe) {
        println!("{}", line);
    }
}

// ============================================================================
// run
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total } => {
            vec![format!("Processing {}", plural(*total, "image"))]
        }
        ProcessEvent::ImageWritten(image) => {
            let mut lines = vec![
                entry_header(image.index, &image.output),
                format!("{}Source: {}", indent(1), image.source),
            ];
            if !image.steps.is_empty() {
                lines.push(format!("{}{}", indent(1), image.steps.join(", ")));
            }
            lines.push(format!(
                "{}{}x{} {}, {} bytes",
                indent(1),
                image.width,
                image.height,
                image.format,
                image.bytes
            ));
            lines
        }
        ProcessEvent::ImageFailed {
            index,
            output,
            error,
        } => vec![
            entry_header(*index, output),
            format!("{}Error: {}", indent(1), error),
        ],
    }
}

/// Closing summary after a run.
pub fn format_summary(report: &ProcessReport) -> Vec<String> {
    let bytes: usize = report.images.iter().map(|i| i.bytes).sum();
    let mut lines = vec![format!(
        "Wrote {} ({} bytes)",
        plural(report.images.len(), "image"),
        bytes
    )];
    if !report.failures.is_empty() {
        lines.push(format!("Failed: {}", plural(report.failures.len(), "image")));
        for failure in &report.failures {
            lines.push(format!(
                "{}{} {}",
                indent(1),
                format_index(failure.index),
                failure.error
            ));
        }
    }
    lines
}

pub fn print_summary(report: &ProcessReport) {
    for line in format_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// layout
// ============================================================================

/// Format a computed resize layout.
pub fn format_layout(layout: &Layout) -> Vec<String> {
    let (pad_x, pad_y) = layout.padding();
    vec![
        format!("Canvas:  {}x{}", layout.canvas_width, layout.canvas_height),
        format!("Content: {}x{}", layout.content_width, layout.content_height),
        format!("Offset:  {},{}", layout.offset_x, layout.offset_y),
        format!("Padding: {} horizontal, {} vertical", pad_x, pad_y),
    ]
}

pub fn print_layout(layout: &Layout) {
    for line in format_layout(layout) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;
    use crate::imaging::ImageFormat;
    use crate::process::{Failure, ProcessedImage};
    use crate::recipe::parse_recipe;

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads_to_three() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn entry_header_uses_file_name() {
        assert_eq!(entry_header(3, "out/thumbs/a.jpg"), "003 a.jpg");
        assert_eq!(entry_header(1, ""), "001 ");
    }

    #[test]
    fn truncate_long_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("two\nlines", 20), "two lines");
        assert_eq!(truncate("a quick brown fox", 8), "a quick...");
    }

    #[test]
    fn step_lines() {
        let resize = Step::Resize {
            width: Some(200),
            height: None,
            method: Some(crate::imaging::ResizeMethod::Crop),
        };
        assert_eq!(format_step(&resize), "resize 200x? crop");

        let inherit = Step::Resize {
            width: None,
            height: Some(50),
            method: None,
        };
        assert_eq!(format_step(&inherit), "resize ?x50");

        let mut job = TextJob::new("Hello");
        job.block_width = BlockWidth::Fixed(120);
        job.position_x = 10;
        assert_eq!(
            format_step(&Step::Text(job)),
            "text \"Hello\" 12pt arial.ttf width 120 at 10,0"
        );
    }

    // =========================================================================
    // check
    // =========================================================================

    #[test]
    fn plan_lists_entries_and_steps() {
        let recipe = parse_recipe(
            r#"
[[image]]
source = "photos/dawn.jpg"
output = "thumb.jpg"

[[image.step]]
resize = { width = 200 }

[[image.step]]
text = { content = "Dawn", font_size = 14 }

[[image]]
blank = [10, 20]
output = "empty.png"
"#,
            Path::new(""),
            &CanvasConfig::default(),
        )
        .unwrap();

        let lines = format_plan(&recipe);
        assert_eq!(
            lines,
            vec![
                "001 thumb.jpg",
                "    Source: photos/dawn.jpg",
                "    resize 200x? fit",
                "    text \"Dawn\" 14pt arial.ttf",
                "002 empty.png",
                "    Source: blank 10x20",
                "    (no steps, copied as is)",
                "",
                "2 images, 2 steps",
            ]
        );
    }

    #[test]
    fn plan_for_empty_recipe() {
        let lines = format_plan(&Recipe { entries: vec![] });
        assert_eq!(lines, vec!["0 images, 0 steps"]);
    }

    // =========================================================================
    // run
    // =========================================================================

    fn written() -> ProcessedImage {
        ProcessedImage {
            index: 1,
            source: "photos/dawn.jpg".into(),
            output: "out/thumb.jpg".into(),
            format: ImageFormat::Jpeg,
            content_type: "image/jpeg".into(),
            width: 200,
            height: 150,
            bytes: 8312,
            steps: vec!["resize".into(), "text".into()],
        }
    }

    #[test]
    fn format_started() {
        let lines = format_process_event(&ProcessEvent::Started { total: 1 });
        assert_eq!(lines, vec!["Processing 1 image"]);
    }

    #[test]
    fn format_written_image() {
        let lines = format_process_event(&ProcessEvent::ImageWritten(written()));
        assert_eq!(
            lines,
            vec![
                "001 thumb.jpg",
                "    Source: photos/dawn.jpg",
                "    resize, text",
                "    200x150 jpg, 8312 bytes",
            ]
        );
    }

    #[test]
    fn format_failed_image() {
        let event = ProcessEvent::ImageFailed {
            index: 12,
            output: "out/bad.png".into(),
            error: "Source image not found: a.jpg".into(),
        };
        assert_eq!(
            format_process_event(&event),
            vec!["012 bad.png", "    Error: Source image not found: a.jpg"]
        );
    }

    #[test]
    fn summary_counts_bytes_and_failures() {
        let report = ProcessReport {
            images: vec![written(), ProcessedImage { bytes: 100, ..written() }],
            failures: vec![Failure {
                index: 3,
                output: "c.png".into(),
                error: "boom".into(),
            }],
        };
        assert_eq!(
            format_summary(&report),
            vec!["Wrote 2 images (8412 bytes)", "Failed: 1 image", "    003 boom"]
        );
    }

    // =========================================================================
    // layout
    // =========================================================================

    #[test]
    fn layout_lines() {
        let layout = Layout {
            canvas_width: 400,
            canvas_height: 400,
            content_width: 400,
            content_height: 300,
            offset_x: 0,
            offset_y: 50,
        };
        assert_eq!(
            format_layout(&layout),
            vec![
                "Canvas:  400x400",
                "Content: 400x300",
                "Offset:  0,50",
                "Padding: 0 horizontal, 100 vertical",
            ]
        );
    }
}
