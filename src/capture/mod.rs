//! In-memory image captures and their comparison.
//!
//! This module provides:
//! - Owned bitmaps with copy-producing transforms (`ImageCapture`)
//! - Normalized cross-correlation template matching (`matching`)
//! - Screen-bound captures that keep absolute coordinates (`Screenshot`)
//! - Reference images loaded from disk (`SavedImage`)
//! - Frame sequences (`VideoCapture`)

pub mod bitmap;
pub mod matching;
pub mod saved;
pub mod screenshot;
pub mod video;

pub use bitmap::{ImageCapture, Interpolation, SimilarityOptions};
pub use matching::{match_template, MatchMap, TemplateMatcher};
pub use saved::SavedImage;
pub use screenshot::{OccurrenceSearch, Screenshot};
pub use video::VideoCapture;
