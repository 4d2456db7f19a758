//! # canvasjob
//!
//! Queued resize, crop, fit and word-wrapped text jobs for raster images.
//!
//! An [`imaging::Image`] handle collects jobs without touching pixels. The
//! jobs run the first time a result is needed (dimensions, the canvas, an
//! encoded buffer or a saved file), always replaying from the source so the
//! outcome depends only on the queue, never on how often it was read.
//!
//! ```text
//! source ──► [resize] ──► [text] ──► [text] ──► encode ──► destination
//!            └──────────── change queue ─────┘
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry and text engines, the change queue, backends and the [`imaging::Image`] handle |
//! | [`recipe`] | `recipe.toml` parsing: one entry per output image, steps in order |
//! | [`process`] | Runs recipe entries in parallel and reports what was written |
//! | [`config`] | `canvasjob.toml` defaults, merged over stock values and validated |
//! | [`output`] | CLI output formatting for `check`, `run` and `layout` |
//!
//! # Design Decisions
//!
//! ## Replay From Source
//!
//! Every replay starts from the decoded source and applies the whole queue
//! in order. Reading the width twice, or saving twice, yields the same
//! pixels. Jobs are keyed: a second resize replaces the first in place,
//! and identical text jobs collapse into one.
//!
//! ## Pure-Rust Imaging
//!
//! [`imaging::RustBackend`] decodes and encodes with the `image` crate
//! (Lanczos3 resampling) and rasterizes TrueType fonts with `ab_glyph`. No
//! system libraries are needed. The pixel work sits behind the
//! [`imaging::RasterBackend`] and [`imaging::CodecBackend`] traits, so the
//! handle's logic is tested against a recording mock.
//!
//! ## Layered Config
//!
//! ```text
//! stock defaults ← canvasjob.toml ← recipe entry ← recipe step
//! ```
//!
//! Each layer only names what it changes. Unknown keys are errors at every
//! layer.

pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod recipe;
