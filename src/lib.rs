//! Visual verification toolkit for GUI end-to-end tests.
//!
//! Turns raw screen pixels into assertions a test can make:
//! - Image comparison and multi-scale template search (`capture`)
//! - Perceptual color comparison in CIELAB space (`color`)
//! - Text detection and OCR with layout-aware queries (`ocr`)
//! - Colored range extraction from timeline pixel rows (`timeline`)

pub mod capture;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod ocr;
pub mod paths;
pub mod timeline;

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

pub use capture::{
    ImageCapture, OccurrenceSearch, SavedImage, Screenshot, SimilarityOptions, VideoCapture,
};
pub use color::{Color, HsvColorInterval};
pub use config::{get_config, init_config, VisualConfig};
pub use error::{Result, VisualError};
pub use geometry::{ImagePiecePercentage, ScreenPoint, ScreenRectangle};
pub use ocr::{ImageDigitsRecognition, ImageTextRecognition, TextDetector};
pub use timeline::{make_stripe, Chunk, Stripe, TimelineMarkers};

/// Logs a message to both stderr and the log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    eprint!("{}", line);
    let logs_dir = paths::get_logs_dir();
    if std::fs::create_dir_all(&logs_dir).is_err() {
        return;
    }
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join("visual_verify.log"))
    {
        let _ = file.write_all(line.as_bytes());
    }
}
