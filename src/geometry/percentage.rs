use serde::{Deserialize, Serialize};

use super::rect::ScreenRectangle;

/// A piece of an image in relative coordinates (0.0 to 1.0).
/// Used for describing regions that work for images of any size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImagePiecePercentage {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub offset_x: f64,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub offset_y: f64,
    /// Width as fraction of image width
    pub width: f64,
    /// Height as fraction of image height
    pub height: f64,
}

impl ImagePiecePercentage {
    pub const fn new(offset_x: f64, offset_y: f64, width: f64, height: f64) -> Self {
        Self {
            offset_x,
            offset_y,
            width,
            height,
        }
    }

    /// Converts to absolute pixel coordinates, clamped to image bounds.
    pub fn to_rectangle(&self, image_width: u32, image_height: u32) -> ScreenRectangle {
        let w = image_width as f64;
        let h = image_height as f64;
        let x_min = ((w * self.offset_x) as i64).max(0);
        let y_min = ((h * self.offset_y) as i64).max(0);
        let x_max = (image_width as i64).min(x_min + (w * self.width) as i64);
        let y_max = (image_height as i64).min(y_min + (h * self.height) as i64);
        ScreenRectangle::new(
            x_min as i32,
            y_min as i32,
            (x_max - x_min).max(0) as u32,
            (y_max - y_min).max(0) as u32,
        )
    }
}
