use super::bitmap::{ImageCapture, SimilarityOptions};
use crate::color::HsvColorInterval;
use crate::error::Result;
use crate::geometry::ImagePiecePercentage;

/// Consecutive frames must correlate above this to count as the same picture.
const SAME_FRAME_CORRELATION: f64 = 0.98;

/// A clip recorded as a sequence of screen captures.
#[derive(Clone, Debug, Default)]
pub struct VideoCapture {
    frames: Vec<ImageCapture>,
}

impl VideoCapture {
    pub fn new(frames: Vec<ImageCapture>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[ImageCapture] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get_grayscale(&self) -> VideoCapture {
        Self::new(self.frames.iter().map(ImageCapture::get_grayscale).collect())
    }

    pub fn crop_percentage(&self, crop_area: &ImagePiecePercentage) -> Result<VideoCapture> {
        let frames = self
            .frames
            .iter()
            .map(|frame| frame.crop_percentage(crop_area))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(frames))
    }

    /// True if any frame differs from the one before it.
    ///
    /// Different frames mean the video was playing while captured. The
    /// opposite does not hold for generated stationary videos.
    pub fn has_different_frames(&self) -> Result<bool> {
        let options = SimilarityOptions::default().with_correlation(SAME_FRAME_CORRELATION);
        let gray = self.get_grayscale();
        for pair in gray.frames.windows(2) {
            if !pair[1].is_similar_to(&pair[0], &options)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True if any pixel of any frame has the red motion mask color.
    ///
    /// Reliable only on grayscale video where the picture cannot mimic the mask.
    pub fn has_motion_mask(&self) -> bool {
        self.has_color_hsv(&HsvColorInterval::RED_MOTION_MASK)
    }

    pub fn has_color_hsv(&self, interval: &HsvColorInterval) -> bool {
        self.frames.iter().any(|frame| frame.has_color_hsv(interval))
    }
}
