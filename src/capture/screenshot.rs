//! Screen-bound captures.
//!
//! A `Screenshot` keeps the whole decoded frame next to the region it was
//! cut to, so every derived region still knows its absolute position on
//! the virtual screen. Rectangles found in a screenshot can be clicked.

use std::ops::Deref;
use std::sync::Arc;

use super::bitmap::ImageCapture;
use super::matching::TemplateMatcher;
use crate::config::VisualConfig;
use crate::error::Result;
use crate::geometry::ScreenRectangle;

/// Parameters of the multi-scale template search.
#[derive(Clone, Debug, PartialEq)]
pub struct OccurrenceSearch {
    pub min_scale: f64,
    pub max_scale: f64,
    pub scale_steps: usize,
    /// Correlation a location must reach to count as an occurrence
    pub threshold: f64,
}

impl Default for OccurrenceSearch {
    fn default() -> Self {
        Self::from_config(&VisualConfig::default())
    }
}

impl OccurrenceSearch {
    pub fn from_config(config: &VisualConfig) -> Self {
        Self {
            min_scale: config.occurrence_min_scale,
            max_scale: config.occurrence_max_scale,
            scale_steps: config.occurrence_scale_steps,
            threshold: config.occurrence_threshold,
        }
    }

    /// Evenly spaced scales from `max_scale` down to `min_scale`.
    pub fn scales(&self) -> Vec<f64> {
        match self.scale_steps {
            0 => Vec::new(),
            1 => vec![self.min_scale],
            steps => {
                let step = (self.max_scale - self.min_scale) / (steps - 1) as f64;
                (0..steps)
                    .rev()
                    .map(|i| {
                        if i == steps - 1 {
                            self.max_scale
                        } else {
                            self.min_scale + step * i as f64
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Region of a captured screen frame.
#[derive(Clone, Debug)]
pub struct Screenshot {
    frame: Arc<ImageCapture>,
    image: ImageCapture,
    bounds: ScreenRectangle,
}

impl Screenshot {
    /// Decodes a full screen frame and cuts it to `bounds`.
    pub fn from_encoded(buffer: &[u8], bounds: ScreenRectangle) -> Result<Self> {
        Self::from_capture(ImageCapture::decode(buffer)?, bounds)
    }

    /// Binds an already decoded screen frame to `bounds`.
    pub fn from_capture(frame: ImageCapture, bounds: ScreenRectangle) -> Result<Self> {
        Self::from_frame(Arc::new(frame), bounds)
    }

    fn from_frame(frame: Arc<ImageCapture>, bounds: ScreenRectangle) -> Result<Self> {
        let image = frame.crop_rectangle(&bounds)?;
        Ok(Self {
            frame,
            image,
            bounds,
        })
    }

    /// Absolute screen rectangle of this capture.
    pub fn bounds(&self) -> ScreenRectangle {
        self.bounds
    }

    pub fn image(&self) -> &ImageCapture {
        &self.image
    }

    /// Absolute screen rectangle of a region given in image-local pixels.
    pub fn region_bounds(&self, x: i32, y: i32, width: u32, height: u32) -> ScreenRectangle {
        ScreenRectangle::new(self.bounds.x + x, self.bounds.y + y, width, height)
    }

    /// Cuts columns `x0..x1` and rows `y0..y1` (image-local), keeping the
    /// screen binding of the result.
    pub fn crop(&self, x0: i64, x1: i64, y0: i64, y1: i64) -> Result<Screenshot> {
        // Validates against this capture before translating to screen space
        self.image.crop(x0, x1, y0, y1)?;
        let bounds = ScreenRectangle::new(
            self.bounds.x + x0 as i32,
            self.bounds.y + y0 as i32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        );
        Self::from_frame(Arc::clone(&self.frame), bounds)
    }

    /// Finds every place `needle` appears at, trying the search scales from
    /// largest to smallest.
    ///
    /// A location is dropped when its top-left corner falls inside an
    /// already accepted rectangle, so larger matches suppress smaller
    /// duplicates. Returns absolute screen rectangles.
    pub fn find_image_occurrences(
        &self,
        needle: &ImageCapture,
        search: &OccurrenceSearch,
    ) -> Result<Vec<ScreenRectangle>> {
        let haystack = TemplateMatcher::new(self.image.get_grayscale());
        let (haystack_width, haystack_height) = haystack.image().dimensions();
        let needle = needle.get_grayscale();
        let mut results: Vec<ScreenRectangle> = Vec::new();

        for scale in search.scales() {
            let scaled = needle.scale(scale);
            let (width, height) = scaled.dimensions();
            if width == 0 || height == 0 || width > haystack_width || height > haystack_height {
                continue;
            }
            let map = haystack.match_template(&scaled)?;
            if map.max_value() <= search.threshold {
                continue;
            }
            for (x, y) in map.locations_at_least(search.threshold) {
                let found = self.region_bounds(x as i32, y as i32, width, height);
                if results.iter().all(|r| !r.contains_point(found.top_left())) {
                    results.push(found);
                }
            }
        }

        crate::log(&format!("Found {} image occurrences total", results.len()));
        Ok(results)
    }
}

impl Deref for Screenshot {
    type Target = ImageCapture;

    fn deref(&self) -> &ImageCapture {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn noise_patch(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(73856093) ^ y.wrapping_mul(19349663)).wrapping_mul(2654435761) >> 24;
            Luma([v as u8])
        })
    }

    fn screen_with_patch(at: (u32, u32)) -> (RgbImage, GrayImage) {
        let patch = noise_patch(24, 16);
        let mut screen = RgbImage::from_pixel(200, 120, Rgb([128, 128, 128]));
        for (x, y, p) in patch.enumerate_pixels() {
            let v = p[0];
            screen.put_pixel(at.0 + x, at.1 + y, Rgb([v, v, v]));
        }
        (screen, patch)
    }

    #[test]
    fn test_scales_are_descending() {
        let search = OccurrenceSearch {
            min_scale: 0.2,
            max_scale: 1.0,
            scale_steps: 5,
            threshold: 0.9,
        };
        let scales = search.scales();
        assert_eq!(scales.len(), 5);
        assert_eq!(scales[0], 1.0);
        assert!((scales[2] - 0.6).abs() < 1e-9);
        assert!((scales[4] - 0.2).abs() < 1e-9);

        let single = OccurrenceSearch {
            scale_steps: 1,
            ..search
        };
        assert_eq!(single.scales(), vec![0.2]);
    }

    #[test]
    fn test_from_encoded_cuts_to_bounds() {
        let (screen, _) = screen_with_patch((130, 70));
        let mut png = Vec::new();
        screen
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let bounds = ScreenRectangle::new(100, 50, 80, 60);
        let shot = Screenshot::from_encoded(&png, bounds).unwrap();
        assert_eq!(shot.dimensions(), (80, 60));
        assert_eq!(shot.bounds(), bounds);
        assert_eq!(shot.pixel_rgb(0, 0), [128, 128, 128]);

        let outside = ScreenRectangle::new(150, 50, 80, 60);
        assert!(Screenshot::from_encoded(&png, outside).is_err());
    }

    #[test]
    fn test_crop_composes_screen_bounds() {
        let (screen, _) = screen_with_patch((130, 70));
        let shot = Screenshot::from_capture(screen.into(), ScreenRectangle::new(100, 50, 80, 60)).unwrap();

        let region = shot.crop(30, 54, 20, 36).unwrap();
        assert_eq!(region.bounds(), ScreenRectangle::new(130, 70, 24, 16));
        assert_eq!(region.dimensions(), (24, 16));

        let nested = region.crop(4, 10, 2, 8).unwrap();
        assert_eq!(nested.bounds(), ScreenRectangle::new(134, 72, 6, 6));

        assert_eq!(shot.region_bounds(5, 6, 7, 8), ScreenRectangle::new(105, 56, 7, 8));
        assert!(shot.crop(70, 90, 0, 10).is_err());
    }

    #[test]
    fn test_find_single_occurrence_across_scales() {
        let (screen, patch) = screen_with_patch((130, 70));
        let shot = Screenshot::from_capture(screen.into(), ScreenRectangle::new(100, 50, 80, 60)).unwrap();
        let search = OccurrenceSearch {
            min_scale: 0.5,
            max_scale: 1.0,
            scale_steps: 3,
            threshold: 0.9,
        };

        let found = shot.find_image_occurrences(&patch.into(), &search).unwrap();
        assert_eq!(found, vec![ScreenRectangle::new(130, 70, 24, 16)]);
    }

    #[test]
    fn test_full_search_on_vga_frame() {
        let screen: GrayImage = ImageBuffer::from_fn(640, 480, |x, y| {
            let v = (x.wrapping_mul(40503) ^ y.wrapping_mul(9973)).wrapping_mul(2654435761) >> 24;
            Luma([v as u8])
        });
        let needle: ImageCapture = image::imageops::crop_imm(&screen, 300, 200, 64, 64)
            .to_image()
            .into();
        let shot = Screenshot::from_capture(screen.into(), ScreenRectangle::new(0, 0, 640, 480)).unwrap();

        let started = Instant::now();
        let found = shot
            .find_image_occurrences(&needle, &OccurrenceSearch::default())
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(found, vec![ScreenRectangle::new(300, 200, 64, 64)]);
        assert!(elapsed < Duration::from_secs(120), "search took {:?}", elapsed);
    }

    #[test]
    fn test_needle_larger_than_haystack_finds_nothing() {
        let (screen, _) = screen_with_patch((130, 70));
        let shot = Screenshot::from_capture(screen.into(), ScreenRectangle::new(0, 0, 20, 20)).unwrap();
        let needle: ImageCapture = noise_patch(30, 30).into();
        let search = OccurrenceSearch {
            min_scale: 0.9,
            max_scale: 1.0,
            scale_steps: 2,
            threshold: 0.9,
        };
        assert!(shot.find_image_occurrences(&needle, &search).unwrap().is_empty());
    }
}
