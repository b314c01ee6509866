//! Error types for visual verification.
//!
//! Every variant carries the values a test report needs to explain the
//! failure without re-running the check.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VisualError>;

#[derive(Error, Debug)]
pub enum VisualError {
    #[error("{channel} value must be between {min} and {max} borders included. Got: {value}")]
    ColorOutOfRange {
        channel: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid CSS hex color {0:?}, expected #rrggbb")]
    InvalidCssColor(String),

    #[error(
        "Region x={x0}..{x1} y={y0}..{y1} does not fit into {width}x{height} image"
    )]
    OutOfBounds {
        x0: i64,
        x1: i64,
        y0: i64,
        y1: i64,
        width: u32,
        height: u32,
    },

    #[error(
        "Aspect ratio is wrong: current {actual:.4}, expected {expected:.4}, tolerated error {tolerance}"
    )]
    AspectRatioMismatch {
        actual: f64,
        expected: f64,
        tolerance: f64,
    },

    #[error("Image {width}x{height} has no pixels")]
    EmptyImage { width: u32, height: u32 },

    #[error("A colors sequence must be at least one pixel long")]
    EmptyStripe,

    #[error("Stripe is only background {background}, nothing is left to dissolve it into")]
    BackgroundOnlyStripe { background: String },

    #[error("Chunk {left} and chunk {right} are not adjacent")]
    NonAdjacentChunks { left: String, right: String },

    #[error("Chunk {left} can't be concatenated with overlapping chunk {right}")]
    OverlappingChunks { left: String, right: String },

    #[error("Text not found: {0}")]
    TextNotFound(String),

    #[error("No line matches the datetime format: {0}")]
    WrongFormat(String),

    #[error("Text box {index} was not recognized within {timeout:?}")]
    RecognitionTimeout { index: usize, timeout: Duration },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model error: {0:#}")]
    Model(anyhow::Error),
}
