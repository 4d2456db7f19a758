//! Greedy word-wrap layout for text jobs.
//!
//! Layout is pure: words are measured through a caller-supplied function, and
//! the result is a list of `(word, x, y)` placements plus, for
//! [`BlockWidth::Auto`], the canvas size the text wants. The handle applies
//! that resize (a stretch, [`ResizeMethod::Scale`](super::ResizeMethod)) and
//! then draws the placements.
//!
//! ## Wrapping
//!
//! Content is trimmed and split on single spaces; runs of spaces produce
//! empty words, which are kept so spacing survives. Words are placed left to
//! right. After placing a word the cursor advances by its width (plus a space
//! if another word follows), and the line breaks when the *next* word would
//! cross the box edge. The break advances the baseline by the next word's
//! height plus the line gap.
//!
//! ## Box height
//!
//! With a fixed or canvas-wide box, the box is as tall as the canvas. In
//! auto mode it takes the height of the last measured word, which is what
//! existing layouts were produced with.

use super::backend::TextBox;
use super::params::{Align, BlockWidth, TextJob, VerticalAlign};

/// A measured word.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub width: f64,
    pub height: f64,
}

/// Where one word is drawn. `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

impl Placement {
    /// Integer pen position, truncated toward zero.
    pub fn origin(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

/// Words of one text job with their measurements and bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub words: Vec<Word>,
    pub space_width: f64,
    pub box_width: f64,
    pub box_height: f64,
    auto: bool,
}

impl TextBlock {
    /// Split and measure the job's content.
    ///
    /// Returns `None` when the content is empty after trimming.
    pub fn measure(
        job: &TextJob,
        canvas: (u32, u32),
        mut measure: impl FnMut(&str) -> TextBox,
    ) -> Option<Self> {
        let content = job.content.trim();
        if content.is_empty() {
            return None;
        }

        let space_width = measure(" ").width.abs();
        let auto = job.block_width == BlockWidth::Auto;
        let mut box_width = match job.block_width {
            BlockWidth::Auto => 0.0,
            BlockWidth::Fixed(px) => px as f64,
            BlockWidth::Canvas => canvas.0 as f64,
        };
        let mut box_height = canvas.1 as f64;

        let pieces: Vec<&str> = content.split(' ').collect();
        let mut words = Vec::with_capacity(pieces.len());
        for (i, piece) in pieces.iter().enumerate() {
            let TextBox { width, height } = measure(piece);
            let (width, height) = (width.abs(), height.abs());
            if auto {
                box_width += width;
                if i + 1 < pieces.len() {
                    box_width += space_width;
                }
                box_height = height;
            }
            words.push(Word {
                text: piece.to_string(),
                width,
                height,
            });
        }

        Some(Self {
            words,
            space_width,
            box_width,
            box_height,
            auto,
        })
    }

    /// Canvas size requested by an auto-width block, or `None` otherwise.
    ///
    /// The width leaves one space of slack. The line gap is added to the
    /// height only when the text is taller than the current canvas.
    pub fn auto_canvas(&self, job: &TextJob, canvas_height: u32) -> Option<(u32, u32)> {
        if !self.auto {
            return None;
        }
        let width = self.box_width + self.space_width;
        let mut height = self.box_height;
        if height > canvas_height as f64 {
            height += job.effective_line_height();
        }
        Some((
            (width.ceil() as u32).max(1),
            (height.ceil() as u32).max(1),
        ))
    }

    /// Starting baseline position for the first word.
    pub fn anchor(&self, job: &TextJob, canvas: (u32, u32)) -> (f64, f64) {
        let (canvas_w, canvas_h) = (canvas.0 as f64, canvas.1 as f64);
        let (pos_x, pos_y) = (job.position_x as f64, job.position_y as f64);
        let font_size = job.font_size as f64;

        let x = match job.align {
            Align::Left => pos_x + self.space_width,
            Align::Right => canvas_w - self.box_width - pos_x - self.space_width,
            Align::Center => canvas_w / 2.0 - self.box_width / 2.0 - pos_x,
        };
        let y = match job.vertical_align {
            VerticalAlign::Top => pos_y + font_size,
            VerticalAlign::Bottom => canvas_h - self.box_height,
            VerticalAlign::Middle => canvas_h / 2.0 - self.box_height / 2.0 + font_size,
        };
        (x, y)
    }

    /// Greedy wrap into placements on a canvas of the given size.
    pub fn place(&self, job: &TextJob, canvas: (u32, u32)) -> Vec<Placement> {
        let (anchor_x, mut y) = self.anchor(job, canvas);
        let line_height = job.effective_line_height();
        let mut relative_x = 0.0;
        let mut placements = Vec::with_capacity(self.words.len());

        for (i, word) in self.words.iter().enumerate() {
            placements.push(Placement {
                text: word.text.clone(),
                x: anchor_x + relative_x,
                y,
            });

            let next = self.words.get(i + 1);
            relative_x += word.width;
            if next.is_some() {
                relative_x += self.space_width;
            }

            let (next_width, next_height) = next.map_or((0.0, 0.0), |w| (w.width, w.height));
            if relative_x + next_width > self.box_width {
                relative_x = 0.0;
                y += next_height + line_height;
            }
        }

        placements
    }
}

/// Result of laying out one text job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextLayout {
    /// Canvas size to stretch to before drawing (auto width only).
    pub resize_to: Option<(u32, u32)>,
    pub placements: Vec<Placement>,
}

impl TextLayout {
    /// Number of distinct baselines.
    pub fn line_count(&self) -> usize {
        let mut lines = 0;
        let mut last_y = None;
        for p in &self.placements {
            if last_y != Some(p.y) {
                lines += 1;
                last_y = Some(p.y);
            }
        }
        lines
    }
}

/// Lay out `job` on a canvas of size `canvas`.
///
/// Placements are computed against the auto-resized canvas when the job asks
/// for one.
pub fn layout_text(
    job: &TextJob,
    canvas: (u32, u32),
    measure: impl FnMut(&str) -> TextBox,
) -> TextLayout {
    let Some(block) = TextBlock::measure(job, canvas, measure) else {
        return TextLayout::default();
    };
    let resize_to = block.auto_canvas(job, canvas.1);
    let placements = block.place(job, resize_to.unwrap_or(canvas));
    TextLayout {
        resize_to,
        placements,
    }
}
