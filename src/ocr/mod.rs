//! Text detection and recognition on screen captures.
//!
//! A `TextDetector` proposes text regions with a pre-trained model, an
//! `OcrEngine` reads each region, and `ImageTextRecognition` /
//! `ImageDigitsRecognition` answer queries over the recognized lines.

pub mod contours;
pub mod detector;
pub mod engine;
pub mod recognition;
pub mod setup;
pub mod text;

pub use detector::{
    get_scale_factor, nearest_multiplication, DetectorInput, DetectorSettings, ProbabilityMap,
    TextDetector, TextProbabilityModel,
};
pub use engine::{OcrEngine, OcrMode, TesseractCli};
pub use recognition::{
    recognize_boxes, DetectedTextBox, ImageDigitsRecognition, ImageTextRecognition,
    RecognitionSettings,
};
pub use setup::find_tesseract;
pub use text::{clean_line, parse_datetime, remove_punctuation};
