use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, RgbImage};
use std::collections::HashMap;
use std::path::Path;

use super::matching::match_template;
use crate::color::{Color, HsvColorInterval};
use crate::config::VisualConfig;
use crate::error::{Result, VisualError};
use crate::geometry::{ImagePiecePercentage, ScreenRectangle};

/// Images whose smaller side is below this are upscaled before OCR.
const MIN_OCR_DIMENSION: u32 = 50;

/// Resampling used when resizing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Linear,
    Cubic,
}

impl Interpolation {
    fn filter(self) -> FilterType {
        match self {
            Interpolation::Linear => FilterType::Triangle,
            Interpolation::Cubic => FilterType::CatmullRom,
        }
    }
}

/// Parameters of `ImageCapture::is_similar_to`.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityOptions {
    /// Correlation the images must strictly exceed
    pub correlation: f64,
    /// Pixels cut from every side of both images before comparing
    pub crop_border_pixels: Option<u32>,
    /// Fail with `AspectRatioMismatch` before comparing pixels
    pub check_aspect_ratio: bool,
    /// Aspect ratio difference that is still accepted (exclusive)
    pub aspect_ratio_error: f64,
    /// Compare color channels instead of grayscale
    pub colors: bool,
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        Self::from_config(&VisualConfig::default())
    }
}

impl SimilarityOptions {
    pub fn from_config(config: &VisualConfig) -> Self {
        Self {
            correlation: config.similarity_correlation,
            crop_border_pixels: None,
            check_aspect_ratio: true,
            aspect_ratio_error: config.aspect_ratio_error,
            colors: false,
        }
    }

    pub fn with_correlation(mut self, correlation: f64) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn with_crop_border(mut self, pixels: u32) -> Self {
        self.crop_border_pixels = Some(pixels);
        self
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    pub fn without_aspect_ratio_check(mut self) -> Self {
        self.check_aspect_ratio = false;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Bitmap {
    Gray(GrayImage),
    Rgb(RgbImage),
}

/// An owned bitmap, either single-channel or RGB.
///
/// Every transform returns a new capture; the original is never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageCapture {
    bitmap: Bitmap,
}

impl From<GrayImage> for ImageCapture {
    fn from(image: GrayImage) -> Self {
        Self {
            bitmap: Bitmap::Gray(image),
        }
    }
}

impl From<RgbImage> for ImageCapture {
    fn from(image: RgbImage) -> Self {
        Self {
            bitmap: Bitmap::Rgb(image),
        }
    }
}

impl From<DynamicImage> for ImageCapture {
    /// Grayscale inputs stay single-channel, everything else becomes RGB.
    /// Alpha is dropped.
    fn from(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => gray.into(),
            DynamicImage::ImageRgb8(rgb) => rgb.into(),
            DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLumaA16(_) => image.to_luma8().into(),
            other => other.to_rgb8().into(),
        }
    }
}

impl ImageCapture {
    /// Decodes an encoded image (PNG, JPEG, ...).
    pub fn decode(buffer: &[u8]) -> Result<Self> {
        Ok(image::load_from_memory(buffer)?.into())
    }

    pub fn width(&self) -> u32 {
        match &self.bitmap {
            Bitmap::Gray(img) => img.width(),
            Bitmap::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match &self.bitmap {
            Bitmap::Gray(img) => img.height(),
            Bitmap::Rgb(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }

    pub fn is_grayscale(&self) -> bool {
        matches!(self.bitmap, Bitmap::Gray(_))
    }

    pub fn channels(&self) -> usize {
        match self.bitmap {
            Bitmap::Gray(_) => 1,
            Bitmap::Rgb(_) => 3,
        }
    }

    /// Raw interleaved samples, row-major.
    pub fn as_raw(&self) -> &[u8] {
        match &self.bitmap {
            Bitmap::Gray(img) => img.as_raw(),
            Bitmap::Rgb(img) => img.as_raw(),
        }
    }

    /// RGB triple at a pixel; grayscale pixels repeat their value.
    pub fn pixel_rgb(&self, x: u32, y: u32) -> [u8; 3] {
        match &self.bitmap {
            Bitmap::Gray(img) => {
                let v = img.get_pixel(x, y)[0];
                [v, v, v]
            }
            Bitmap::Rgb(img) => img.get_pixel(x, y).0,
        }
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        match &self.bitmap {
            Bitmap::Gray(img) => DynamicImage::ImageLuma8(img.clone()),
            Bitmap::Rgb(img) => DynamicImage::ImageRgb8(img.clone()),
        }
    }

    /// Single-channel buffer using the ITU-R BT.601 luma weights.
    pub fn to_gray_image(&self) -> GrayImage {
        match &self.bitmap {
            Bitmap::Gray(img) => img.clone(),
            Bitmap::Rgb(img) => {
                let (width, height) = img.dimensions();
                let mut output = ImageBuffer::new(width, height);
                for (x, y, pixel) in img.enumerate_pixels() {
                    let luma = 0.299 * pixel[0] as f32
                        + 0.587 * pixel[1] as f32
                        + 0.114 * pixel[2] as f32;
                    output.put_pixel(x, y, Luma([luma.round().min(255.0) as u8]));
                }
                output
            }
        }
    }

    pub fn get_grayscale(&self) -> ImageCapture {
        self.to_gray_image().into()
    }

    pub fn save_to_disk(&self, path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        self.to_dynamic().save(path)?;
        Ok(())
    }

    /// Resizes to exact dimensions (each at least 1 pixel).
    pub fn resize(&self, width: u32, height: u32, interpolation: Interpolation) -> ImageCapture {
        let width = width.max(1);
        let height = height.max(1);
        let filter = interpolation.filter();
        match &self.bitmap {
            Bitmap::Gray(img) => imageops::resize(img, width, height, filter).into(),
            Bitmap::Rgb(img) => imageops::resize(img, width, height, filter).into(),
        }
    }

    /// Scales both sides by `factor`; an identity factor returns an exact copy.
    pub fn scale(&self, factor: f64) -> ImageCapture {
        self.scale_with(factor, Interpolation::Linear)
    }

    pub fn scale_with(&self, factor: f64, interpolation: Interpolation) -> ImageCapture {
        if (factor - 1.0).abs() <= 1e-9 {
            return self.clone();
        }
        self.resize(
            (self.width() as f64 * factor) as u32,
            (self.height() as f64 * factor) as u32,
            interpolation,
        )
    }

    /// Crops columns `x0..x1` and rows `y0..y1`.
    ///
    /// A region that does not fit into the image is rejected rather than
    /// truncated, so misconfigured regions surface in the test report.
    pub fn crop(&self, x0: i64, x1: i64, y0: i64, y1: i64) -> Result<ImageCapture> {
        let (width, height) = self.dimensions();
        if x0 < 0 || y0 < 0 || x1 < x0 || y1 < y0 || x1 > width as i64 || y1 > height as i64 {
            return Err(VisualError::OutOfBounds {
                x0,
                x1,
                y0,
                y1,
                width,
                height,
            });
        }
        let (x, y, w, h) = (x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);
        Ok(match &self.bitmap {
            Bitmap::Gray(img) => imageops::crop_imm(img, x, y, w, h).to_image().into(),
            Bitmap::Rgb(img) => imageops::crop_imm(img, x, y, w, h).to_image().into(),
        })
    }

    pub fn crop_rectangle(&self, rect: &ScreenRectangle) -> Result<ImageCapture> {
        let top_left = rect.top_left();
        let bottom_right = rect.bottom_right();
        self.crop(
            top_left.x as i64,
            bottom_right.x as i64,
            top_left.y as i64,
            bottom_right.y as i64,
        )
    }

    /// Cuts `pixels` from every side.
    pub fn crop_border(&self, pixels: u32) -> Result<ImageCapture> {
        let p = pixels as i64;
        self.crop(p, self.width() as i64 - p, p, self.height() as i64 - p)
    }

    pub fn make_rectangle(&self, crop_area: &ImagePiecePercentage) -> ScreenRectangle {
        crop_area.to_rectangle(self.width(), self.height())
    }

    pub fn crop_percentage(&self, crop_area: &ImagePiecePercentage) -> Result<ImageCapture> {
        self.crop_rectangle(&self.make_rectangle(crop_area))
    }

    /// Highest normalized cross-correlation between this capture and `expected`,
    /// after the preparation steps of `is_similar_to`.
    ///
    /// `expected` is always resized to this capture, never the reverse.
    pub fn correlation_with(
        &self,
        expected: &ImageCapture,
        options: &SimilarityOptions,
    ) -> Result<f64> {
        if options.check_aspect_ratio {
            let delta = (self.aspect_ratio() - expected.aspect_ratio()).abs();
            if !(delta < options.aspect_ratio_error) {
                return Err(VisualError::AspectRatioMismatch {
                    actual: self.aspect_ratio(),
                    expected: expected.aspect_ratio(),
                    tolerance: options.aspect_ratio_error,
                });
            }
        }

        let mut expected = expected.resize(self.width(), self.height(), Interpolation::Linear);
        let mut current = self.clone();

        if !options.colors || expected.is_grayscale() || current.is_grayscale() {
            expected = expected.get_grayscale();
            current = current.get_grayscale();
        }

        // One of the images may have been cut from a bigger frame and differ on the border
        if let Some(pixels) = options.crop_border_pixels {
            expected = expected.crop_border(pixels)?;
            current = current.crop_border(pixels)?;
        }

        let map = match_template(&expected, &current)?;
        Ok(map.max_value())
    }

    pub fn is_similar_to(&self, expected: &ImageCapture, options: &SimilarityOptions) -> Result<bool> {
        let correlation = self.correlation_with(expected, options)?;
        let result = correlation > options.correlation;
        if !result {
            crate::log(&format!(
                "Pictures correlation: {:.4} (required > {})",
                correlation, options.correlation
            ));
        }
        Ok(result)
    }

    /// Colors of one pixel row, left to right.
    pub fn get_row_colors(&self, row: u32) -> Result<Vec<Color>> {
        if row >= self.height() {
            return Err(VisualError::OutOfBounds {
                x0: 0,
                x1: self.width() as i64,
                y0: row as i64,
                y1: row as i64 + 1,
                width: self.width(),
                height: self.height(),
            });
        }
        Ok((0..self.width())
            .map(|x| {
                let [r, g, b] = self.pixel_rgb(x, row);
                Color::from_rgb8(r, g, b)
            })
            .collect())
    }

    /// The `count` most frequent colors as `#rrggbb` with their pixel counts.
    pub fn most_common_colors(&self, count: usize) -> Vec<(String, usize)> {
        let mut counter: HashMap<[u8; 3], usize> = HashMap::new();
        for y in 0..self.height() {
            for x in 0..self.width() {
                *counter.entry(self.pixel_rgb(x, y)).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<([u8; 3], usize)> = counter.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(count)
            .map(|([r, g, b], n)| (format!("#{:02x}{:02x}{:02x}", r, g, b), n))
            .collect()
    }

    /// True if any pixel is perceptually equal to `color`.
    pub fn has_color_rgb(&self, color: &Color) -> bool {
        let mut seen: HashMap<[u8; 3], bool> = HashMap::new();
        for y in 0..self.height() {
            for x in 0..self.width() {
                let rgb = self.pixel_rgb(x, y);
                let matches = *seen
                    .entry(rgb)
                    .or_insert_with(|| Color::from_rgb8(rgb[0], rgb[1], rgb[2]) == *color);
                if matches {
                    return true;
                }
            }
        }
        false
    }

    /// True if any pixel falls into the HSV interval.
    pub fn has_color_hsv(&self, interval: &HsvColorInterval) -> bool {
        (0..self.height()).any(|y| {
            (0..self.width()).any(|x| {
                let [r, g, b] = self.pixel_rgb(x, y);
                interval.contains(r, g, b)
            })
        })
    }

    /// Rotates clockwise by `degrees` about the center, growing the canvas
    /// so the rotated content fits. Uncovered pixels are black.
    pub fn rotate(&self, degrees: f64) -> ImageCapture {
        let (width, height) = self.dimensions();
        let cx = (width / 2) as f64;
        let cy = (height / 2) as f64;

        // Rotation matrix for -degrees about the center
        let (sin, cos) = (-degrees).to_radians().sin_cos();
        let new_width = (height as f64 * sin.abs() + width as f64 * cos.abs()) as u32;
        let new_height = (height as f64 * cos.abs() + width as f64 * sin.abs()) as u32;
        let matrix = [
            cos,
            sin,
            (1.0 - cos) * cx - sin * cy + new_width as f64 / 2.0 - cx,
            -sin,
            cos,
            sin * cx + (1.0 - cos) * cy + new_height as f64 / 2.0 - cy,
        ];

        match &self.bitmap {
            Bitmap::Gray(img) => warp_affine(img, &matrix, new_width, new_height).into(),
            Bitmap::Rgb(img) => warp_affine(img, &matrix, new_width, new_height).into(),
        }
    }

    /// Scale that brings the smaller side to at least 50 pixels, else `desired`.
    pub fn calculate_scale(&self, desired: f64) -> f64 {
        let min_dimension = self.width().min(self.height());
        if min_dimension > 0 && min_dimension < MIN_OCR_DIMENSION {
            MIN_OCR_DIMENSION as f64 / min_dimension as f64
        } else {
            desired
        }
    }

    /// Grayscale copy scaled by `calculate_scale(desired)`, with the scale used.
    pub fn scale_grayscale(&self, desired: f64) -> (ImageCapture, f64) {
        let scale = self.calculate_scale(desired);
        let scaled = self
            .get_grayscale()
            .scale_with(scale, Interpolation::Cubic);
        (scaled, scale)
    }

    /// `(pixel * scale - mean) / std` per channel, transposed to planar CHW.
    ///
    /// Planes are emitted in B, G, R order, the order the detection models
    /// were trained on. Grayscale captures repeat their single channel.
    pub fn normalized_planes(&self, mean: [f32; 3], std: [f32; 3], scale: f32) -> Vec<f32> {
        let (width, height) = self.dimensions();
        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; plane * 3];
        for y in 0..height {
            for x in 0..width {
                let [r, g, b] = self.pixel_rgb(x, y);
                let offset = (y * width + x) as usize;
                for (c, value) in [b, g, r].into_iter().enumerate() {
                    data[c * plane + offset] = (value as f32 * scale - mean[c]) / std[c];
                }
            }
        }
        data
    }
}

/// Inverse-maps every destination pixel through a 2x3 affine matrix and
/// samples the source bilinearly; samples outside the source count as 0.
fn warp_affine<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    matrix: &[f64; 6],
    new_width: u32,
    new_height: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    let (width, height) = src.dimensions();
    let raw = src.as_raw();
    let fetch = |x: i64, y: i64, c: usize| -> f64 {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            0.0
        } else {
            raw[(y as usize * width as usize + x as usize) * channels + c] as f64
        }
    };

    let mut output: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(new_width, new_height);
    let out: &mut [u8] = &mut output;
    for dy in 0..new_height {
        for dx in 0..new_width {
            // The rotation part is orthonormal, so its inverse is its transpose
            let tx = dx as f64 - matrix[2];
            let ty = dy as f64 - matrix[5];
            let sx = matrix[0] * tx + matrix[3] * ty;
            let sy = matrix[1] * tx + matrix[4] * ty;

            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = sx - x0;
            let fy = sy - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);

            let base = (dy as usize * new_width as usize + dx as usize) * channels;
            for c in 0..channels {
                let top = fetch(x0, y0, c) * (1.0 - fx) + fetch(x0 + 1, y0, c) * fx;
                let bottom = fetch(x0, y0 + 1, c) * (1.0 - fx) + fetch(x0 + 1, y0 + 1, c) * fx;
                let value = top * (1.0 - fy) + bottom * fy;
                out[base + c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    output
}
