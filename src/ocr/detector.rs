//! Text region proposal.
//!
//! The capture is resized so both sides are multiples of 32, normalized
//! and handed to a text probability model. Pixels the model scores above
//! the probability threshold form regions, and each region's bounding box
//! is mapped back onto the original capture.

use anyhow::anyhow;
use std::sync::Arc;

use super::contours::region_rectangles;
use super::recognition::DetectedTextBox;
use crate::capture::{ImageCapture, Interpolation, Screenshot};
use crate::config::VisualConfig;
use crate::error::{Result, VisualError};
use crate::geometry::{round_half_even, ScreenRectangle};

/// Detection models only accept sides that are multiples of this.
pub const SIDE_MULTIPLE: u32 = 32;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];
const PIXEL_SCALE: f32 = 1.0 / 255.0;

/// Normalized image handed to the model: three planes (B, G, R) of
/// `width * height` values each.
#[derive(Clone, Debug)]
pub struct DetectorInput {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl DetectorInput {
    /// Plane `channel` (0 = blue), row-major.
    pub fn plane(&self, channel: usize) -> &[f32] {
        let len = (self.width * self.height) as usize;
        &self.data[channel * len..(channel + 1) * len]
    }
}

/// Per-pixel text probability, row-major.
#[derive(Clone, Debug)]
pub struct ProbabilityMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl ProbabilityMap {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> anyhow::Result<Self> {
        if values.len() != (width * height) as usize {
            return Err(anyhow!(
                "probability map of {}x{} needs {} values, got {}",
                width,
                height,
                width * height,
                values.len()
            ));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mask of pixels scoring strictly above `threshold`.
    pub fn threshold(&self, threshold: f32) -> Vec<bool> {
        self.values.iter().map(|&p| p > threshold).collect()
    }
}

/// Pre-trained text detection network.
///
/// Implementations wrap whatever runtime hosts the model; the detector only
/// needs a probability map the size of its input.
pub trait TextProbabilityModel: Send + Sync {
    fn predict(&self, input: &DetectorInput) -> anyhow::Result<ProbabilityMap>;
}

/// Ratio that brings a size into `[lower, upper]`.
///
/// With `width` the smaller side is checked against `lower` and the larger
/// one against `upper`; without it `height` is checked against both. The
/// lower limit wins when both apply.
pub fn get_scale_factor(lower: f64, upper: f64, height: f64, width: Option<f64>) -> f64 {
    let limits: [(f64, fn(f64, f64) -> f64); 2] = [(lower, f64::min), (upper, f64::max)];
    let mut ratio = 1.0;
    for (limit, extreme) in limits {
        let size = match width {
            Some(width) => extreme(height, width),
            None => height,
        };
        ratio = limit / extreme(size, limit);
        if ratio != 1.0 {
            break;
        }
    }
    ratio
}

/// `number * ratio` rounded to the nearest multiple of `multiplicand`
/// (ties to even), never below `multiplicand`.
pub fn nearest_multiplication(number: f64, ratio: f64, multiplicand: u32) -> u32 {
    let m = multiplicand as f64;
    let nearest = round_half_even(number * ratio / m) * m;
    nearest.max(m) as u32
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSettings {
    /// Smaller side of the model input is scaled up to at least this
    pub min_side: u32,
    /// Larger side of the model input is scaled down to at most this
    pub max_side: u32,
    pub probability_threshold: f32,
    /// Regions narrower or lower than this (model input pixels) are noise
    pub min_box_side: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self::from_config(&VisualConfig::default())
    }
}

impl DetectorSettings {
    pub fn from_config(config: &VisualConfig) -> Self {
        Self {
            min_side: config.detector_min_side,
            max_side: config.detector_max_side,
            probability_threshold: config.probability_threshold,
            min_box_side: config.min_box_side,
        }
    }
}

pub struct TextDetector {
    model: Arc<dyn TextProbabilityModel>,
    settings: DetectorSettings,
}

impl TextDetector {
    pub fn new(model: Arc<dyn TextProbabilityModel>, settings: DetectorSettings) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Model input size for a capture of `width` x `height`.
    pub fn input_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let ratio = get_scale_factor(
            self.settings.min_side as f64,
            self.settings.max_side as f64,
            height as f64,
            Some(width as f64),
        );
        (
            nearest_multiplication(width as f64, ratio, SIDE_MULTIPLE),
            nearest_multiplication(height as f64, ratio, SIDE_MULTIPLE),
        )
    }

    /// Text regions of `image` in its own pixel coordinates, reading order.
    ///
    /// Regions that shrink below one pixel when mapped back to the capture
    /// are dropped.
    pub fn detect_rectangles(&self, image: &ImageCapture) -> Result<Vec<ScreenRectangle>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(VisualError::EmptyImage { width, height });
        }
        let (input_width, input_height) = self.input_dimensions(width, height);
        let resized = if (input_width, input_height) == (width, height) {
            image.clone()
        } else {
            image.resize(input_width, input_height, Interpolation::Linear)
        };

        let input = DetectorInput {
            width: input_width,
            height: input_height,
            data: resized.normalized_planes(MEAN, STD, PIXEL_SCALE),
        };
        let map = self.model.predict(&input).map_err(VisualError::Model)?;
        if (map.width(), map.height()) != (input_width, input_height) {
            return Err(VisualError::Model(anyhow!(
                "model returned a {}x{} map for a {}x{} input",
                map.width(),
                map.height(),
                input_width,
                input_height
            )));
        }

        let mask = map.threshold(self.settings.probability_threshold);
        let x_ratio = width as f64 / input_width as f64;
        let y_ratio = height as f64 / input_height as f64;
        Ok(region_rectangles(&mask, input_width, input_height)
            .into_iter()
            .filter(|r| r.width.min(r.height) >= self.settings.min_box_side)
            .map(|r| r.axis_scaling(x_ratio, y_ratio, width, height))
            .filter(|r| r.width > 0 && r.height > 0)
            .collect())
    }

    /// Detects text boxes bound to `screenshot`.
    pub fn detect(&self, screenshot: &Arc<Screenshot>) -> Result<Vec<DetectedTextBox>> {
        let boxes: Vec<DetectedTextBox> = self
            .detect_rectangles(screenshot.image())?
            .into_iter()
            .map(|rect| DetectedTextBox::new(rect, Arc::clone(screenshot)))
            .collect();
        crate::log(&format!("Detected {} text boxes", boxes.len()));
        Ok(boxes)
    }
}
