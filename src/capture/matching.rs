//! Normalized cross-correlation template matching.
//!
//! Scores every placement of a template inside an image with the
//! mean-subtracted correlation coefficient (OpenCV's `TM_CCOEFF_NORMED`):
//! 1.0 for a perfect match, 0.0 for no linear relation, -1.0 for an
//! inverted match. Color images sum the per-channel terms.
//!
//! Large searches compute the numerator of every placement at once as a
//! cross-correlation in the frequency domain.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::cell::OnceCell;
use std::sync::Arc;

use super::bitmap::ImageCapture;
use crate::error::{Result, VisualError};

/// Below this a sum of squared deviations is treated as a flat region.
/// Any non-flat 8-bit region scores well above it.
const FLAT_VARIANCE: f64 = 0.5;

/// Correlation score per template placement, row-major.
#[derive(Clone, Debug)]
pub struct MatchMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl MatchMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn value_at(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    pub fn max_value(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max) as f64
    }

    /// Placement with the highest score; the first one wins ties.
    pub fn max_location(&self) -> (u32, u32) {
        let mut best = 0;
        for (i, &v) in self.values.iter().enumerate() {
            if v > self.values[best] {
                best = i;
            }
        }
        (best as u32 % self.width, best as u32 / self.width)
    }

    /// Every placement scoring at least `threshold`, row by row.
    pub fn locations_at_least(&self, threshold: f64) -> Vec<(u32, u32)> {
        self.values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v as f64 >= threshold)
            .map(|(i, _)| (i as u32 % self.width, i as u32 / self.width))
            .collect()
    }
}

/// Per-channel summed-area tables of values and squared values.
struct IntegralImage {
    stride: usize,
    channels: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl IntegralImage {
    fn new(image: &ImageCapture) -> Self {
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);
        let channels = image.channels();
        let raw = image.as_raw();
        let stride = width + 1;
        let mut sum = vec![0.0; stride * (height + 1) * channels];
        let mut sum_sq = vec![0.0; stride * (height + 1) * channels];

        for c in 0..channels {
            let base = c * stride * (height + 1);
            for y in 0..height {
                let mut row_sum = 0.0;
                let mut row_sum_sq = 0.0;
                for x in 0..width {
                    let v = raw[(y * width + x) * channels + c] as f64;
                    row_sum += v;
                    row_sum_sq += v * v;
                    let idx = base + (y + 1) * stride + x + 1;
                    sum[idx] = sum[idx - stride] + row_sum;
                    sum_sq[idx] = sum_sq[idx - stride] + row_sum_sq;
                }
            }
        }

        Self {
            stride,
            channels,
            sum,
            sum_sq,
        }
    }

    fn plane_len(&self) -> usize {
        self.sum.len() / self.channels
    }

    /// Sum and squared sum of channel `c` over `w`x`h` pixels at (`x`, `y`).
    fn window(&self, c: usize, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let base = c * self.plane_len();
        let a = base + y * self.stride + x;
        let b = base + y * self.stride + x + w;
        let d = base + (y + h) * self.stride + x;
        let e = base + (y + h) * self.stride + x + w;
        (
            self.sum[e] - self.sum[b] - self.sum[d] + self.sum[a],
            self.sum_sq[e] - self.sum_sq[b] - self.sum_sq[d] + self.sum_sq[a],
        )
    }
}

/// An image prepared for scoring many templates against it.
///
/// Window statistics come from summed-area tables. The correlation
/// numerator is summed directly for few placements and through the
/// image's spectrum otherwise; the spectrum is computed once and reused
/// for every template.
pub struct TemplateMatcher {
    image: ImageCapture,
    integral: IntegralImage,
    spectrum: OnceCell<ImageSpectrum>,
}

struct ImageSpectrum {
    fft: Fft2d,
    channels: Vec<Vec<Complex<f64>>>,
}

impl TemplateMatcher {
    pub fn new(image: ImageCapture) -> Self {
        let integral = IntegralImage::new(&image);
        Self {
            image,
            integral,
            spectrum: OnceCell::new(),
        }
    }

    pub fn image(&self) -> &ImageCapture {
        &self.image
    }

    /// Slides `template` over the image and scores every placement.
    ///
    /// The template must fit inside the image. Captures with different
    /// channel counts are compared in grayscale.
    pub fn match_template(&self, template: &ImageCapture) -> Result<MatchMap> {
        let (iw, ih) = self.image.dimensions();
        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 || tw > iw || th > ih {
            return Err(VisualError::OutOfBounds {
                x0: 0,
                x1: tw as i64,
                y0: 0,
                y1: th as i64,
                width: iw,
                height: ih,
            });
        }
        if self.image.channels() != template.channels() {
            return TemplateMatcher::new(self.image.get_grayscale())
                .match_template(&template.get_grayscale());
        }

        let channels = self.image.channels();
        let (iw, ih, tw, th) = (iw as usize, ih as usize, tw as usize, th as usize);
        let n = (tw * th) as f64;
        let template_raw = template.as_raw();

        // Mean-subtracted template; with zero-mean weights the numerator is a plain dot product
        let mut means = vec![0.0; channels];
        for (i, &v) in template_raw.iter().enumerate() {
            means[i % channels] += v as f64;
        }
        for mean in means.iter_mut() {
            *mean /= n;
        }
        let centered: Vec<f64> = template_raw
            .iter()
            .enumerate()
            .map(|(i, &v)| v as f64 - means[i % channels])
            .collect();
        let template_var: f64 = centered.iter().map(|v| v * v).sum();

        let out_w = iw - tw + 1;
        let out_h = ih - th + 1;
        let numerators = if prefers_direct_sum(iw, ih, tw, th, channels) {
            self.direct_numerators(&centered, tw, th)
        } else {
            self.spectral_numerators(&centered, tw, th)
        };

        let mut values = Vec::with_capacity(out_w * out_h);
        for y in 0..out_h {
            for x in 0..out_w {
                let mut window_var = 0.0;
                let mut mean_gap: f64 = 0.0;
                for (c, mean) in means.iter().enumerate() {
                    let (s, s2) = self.integral.window(c, x, y, tw, th);
                    window_var += (s2 - s * s / n).max(0.0);
                    mean_gap = mean_gap.max((s / n - mean).abs());
                }

                if template_var < FLAT_VARIANCE || window_var < FLAT_VARIANCE {
                    // Flat regions have no defined correlation; only two flat regions of the same level match
                    let flat_match = template_var < FLAT_VARIANCE
                        && window_var < FLAT_VARIANCE
                        && mean_gap < 0.5;
                    values.push(if flat_match { 1.0 } else { 0.0 });
                    continue;
                }

                let score = numerators[y * out_w + x] / (template_var * window_var).sqrt();
                values.push(score.clamp(-1.0, 1.0) as f32);
            }
        }

        Ok(MatchMap {
            width: out_w as u32,
            height: out_h as u32,
            values,
        })
    }

    /// Template dot products summed placement by placement.
    fn direct_numerators(&self, centered: &[f64], tw: usize, th: usize) -> Vec<f64> {
        let (iw, ih) = self.image.dimensions();
        let (iw, ih) = (iw as usize, ih as usize);
        let channels = self.image.channels();
        let raw = self.image.as_raw();
        let row_len = tw * channels;
        let (out_w, out_h) = (iw - tw + 1, ih - th + 1);

        let mut numerators = Vec::with_capacity(out_w * out_h);
        for y in 0..out_h {
            for x in 0..out_w {
                let mut numerator = 0.0;
                for ty in 0..th {
                    let image_row = ((y + ty) * iw + x) * channels;
                    let template_row = ty * row_len;
                    numerator += centered[template_row..template_row + row_len]
                        .iter()
                        .zip(&raw[image_row..image_row + row_len])
                        .map(|(t, &v)| t * v as f64)
                        .sum::<f64>();
                }
                numerators.push(numerator);
            }
        }
        numerators
    }

    /// Template dot products for every placement at once, as a circular
    /// cross-correlation of image size. Valid placements never wrap.
    fn spectral_numerators(&self, centered: &[f64], tw: usize, th: usize) -> Vec<f64> {
        let spectrum = self.spectrum.get_or_init(|| ImageSpectrum::new(&self.image));
        let fft = &spectrum.fft;
        let (iw, ih) = (fft.width, fft.height);
        let channels = spectrum.channels.len();

        let mut product = vec![Complex::new(0.0, 0.0); iw * ih];
        for (c, image_spectrum) in spectrum.channels.iter().enumerate() {
            let mut plane = vec![Complex::new(0.0, 0.0); iw * ih];
            for ty in 0..th {
                for tx in 0..tw {
                    plane[ty * iw + tx] = Complex::new(centered[(ty * tw + tx) * channels + c], 0.0);
                }
            }
            let template_spectrum = fft.forward(plane);
            for ((p, i), t) in product.iter_mut().zip(image_spectrum).zip(&template_spectrum) {
                *p += *i * t.conj();
            }
        }

        let correlation = fft.inverse(product);
        let (out_w, out_h) = (iw - tw + 1, ih - th + 1);
        let mut numerators = Vec::with_capacity(out_w * out_h);
        for y in 0..out_h {
            numerators.extend_from_slice(&correlation[y * iw..y * iw + out_w]);
        }
        numerators
    }
}

impl ImageSpectrum {
    fn new(image: &ImageCapture) -> Self {
        let (width, height) = image.dimensions();
        let fft = Fft2d::new(width as usize, height as usize);
        let channels = image.channels();
        let raw = image.as_raw();
        let spectra = (0..channels)
            .map(|c| {
                let plane = raw
                    .iter()
                    .skip(c)
                    .step_by(channels)
                    .map(|&v| Complex::new(v as f64, 0.0))
                    .collect();
                fft.forward(plane)
            })
            .collect();
        Self {
            fft,
            channels: spectra,
        }
    }
}

/// Rough operation counts of the two numerator strategies.
fn prefers_direct_sum(iw: usize, ih: usize, tw: usize, th: usize, channels: usize) -> bool {
    let placements = (iw - tw + 1) * (ih - th + 1);
    let direct = placements * tw * th * channels;
    let pixels = iw * ih;
    let log2 = (usize::BITS - pixels.leading_zeros()) as usize;
    let spectral = 6 * (channels + 1) * pixels * log2;
    direct <= spectral
}

/// Two-dimensional FFT of a `width` x `height` row-major plane.
///
/// Spectra stay in transposed (column-major) layout; they are only
/// multiplied pointwise and transformed back.
struct Fft2d {
    width: usize,
    height: usize,
    row_forward: Arc<dyn Fft<f64>>,
    column_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    column_inverse: Arc<dyn Fft<f64>>,
}

impl Fft2d {
    fn new(width: usize, height: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            width,
            height,
            row_forward: planner.plan_fft_forward(width),
            column_forward: planner.plan_fft_forward(height),
            row_inverse: planner.plan_fft_inverse(width),
            column_inverse: planner.plan_fft_inverse(height),
        }
    }

    fn forward(&self, mut plane: Vec<Complex<f64>>) -> Vec<Complex<f64>> {
        self.row_forward.process(&mut plane);
        let mut columns = transpose(&plane, self.height, self.width);
        self.column_forward.process(&mut columns);
        columns
    }

    /// Real part of the normalized inverse transform, row-major.
    fn inverse(&self, mut columns: Vec<Complex<f64>>) -> Vec<f64> {
        self.column_inverse.process(&mut columns);
        let mut plane = transpose(&columns, self.width, self.height);
        self.row_inverse.process(&mut plane);
        let norm = (self.width * self.height) as f64;
        plane.iter().map(|c| c.re / norm).collect()
    }
}

/// `rows` x `cols` row-major into `cols` x `rows` row-major.
fn transpose(src: &[Complex<f64>], rows: usize, cols: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); src.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = src[r * cols + c];
        }
    }
    out
}

/// Scores every placement of `template` inside `image`.
///
/// See `TemplateMatcher::match_template`; use a `TemplateMatcher` directly
/// to score several templates against the same image.
pub fn match_template(image: &ImageCapture, template: &ImageCapture) -> Result<MatchMap> {
    TemplateMatcher::new(image.clone()).match_template(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

    fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(73856093) ^ y.wrapping_mul(19349663) ^ seed)
                .wrapping_mul(2654435761)
                >> 24;
            Luma([v as u8])
        })
    }

    #[test]
    fn test_identical_images_score_one() {
        let img: ImageCapture = noise(20, 15, 1).into();
        let map = match_template(&img, &img).unwrap();
        assert_eq!((map.width(), map.height()), (1, 1));
        assert!((map.max_value() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_finds_embedded_patch() {
        let haystack = noise(40, 30, 7);
        let needle: ImageCapture = image::imageops::crop_imm(&haystack, 12, 9, 10, 8)
            .to_image()
            .into();
        let haystack: ImageCapture = haystack.into();

        let map = match_template(&haystack, &needle).unwrap();
        assert_eq!((map.width(), map.height()), (31, 23));
        assert_eq!(map.max_location(), (12, 9));
        assert!(map.value_at(12, 9) > 0.999);
        assert_eq!(map.locations_at_least(0.999), vec![(12, 9)]);
    }

    #[test]
    fn test_inverted_scores_minus_one() {
        let img = noise(16, 16, 3);
        let inverted: GrayImage = ImageBuffer::from_fn(16, 16, |x, y| Luma([255 - img.get_pixel(x, y)[0]]));
        let map = match_template(&img.into(), &inverted.into()).unwrap();
        assert!((map.max_value() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_brightness_offset_is_ignored() {
        let img = noise(16, 16, 5);
        let darker: GrayImage = ImageBuffer::from_fn(16, 16, |x, y| Luma([img.get_pixel(x, y)[0] / 2]));
        let map = match_template(&img.into(), &darker.into()).unwrap();
        assert!(map.max_value() > 0.99);
    }

    #[test]
    fn test_flat_regions() {
        let grey: RgbImage = ImageBuffer::from_pixel(8, 8, Rgb([90, 90, 90]));
        let same: ImageCapture = grey.clone().into();
        let other: ImageCapture = RgbImage::from_pixel(8, 8, Rgb([10, 200, 10])).into();
        assert_eq!(match_template(&same, &grey.into()).unwrap().max_value(), 1.0);
        assert_eq!(match_template(&same, &other).unwrap().max_value(), 0.0);
    }

    #[test]
    fn test_spectral_numerators_match_direct_sums() {
        let base = noise(48, 36, 11);
        let haystack: RgbImage = ImageBuffer::from_fn(48, 36, |x, y| {
            let p = base.get_pixel(x, y)[0];
            Rgb([p, p.wrapping_mul(7), 255 - p])
        });
        let template: RgbImage = image::imageops::crop_imm(&haystack, 5, 3, 9, 7).to_image();
        let template: ImageCapture = template.into();
        let matcher = TemplateMatcher::new(haystack.into());

        let raw = template.as_raw();
        let mut means = [0.0; 3];
        for (i, &v) in raw.iter().enumerate() {
            means[i % 3] += v as f64 / 63.0;
        }
        let centered: Vec<f64> = raw
            .iter()
            .enumerate()
            .map(|(i, &v)| v as f64 - means[i % 3])
            .collect();

        let direct = matcher.direct_numerators(&centered, 9, 7);
        let spectral = matcher.spectral_numerators(&centered, 9, 7);
        assert_eq!(direct.len(), 40 * 30);
        assert_eq!(spectral.len(), direct.len());
        for (d, s) in direct.iter().zip(&spectral) {
            assert!((d - s).abs() < 1e-6, "{} != {}", d, s);
        }
    }

    #[test]
    fn test_large_search_uses_spectrum() {
        assert!(!prefers_direct_sum(200, 150, 16, 16, 1));
        assert!(prefers_direct_sum(20, 15, 20, 15, 3));

        let haystack = noise(200, 150, 21);
        let needle: ImageCapture = image::imageops::crop_imm(&haystack, 131, 77, 16, 16)
            .to_image()
            .into();
        let matcher = TemplateMatcher::new(haystack.into());
        let map = matcher.match_template(&needle).unwrap();
        assert_eq!((map.width(), map.height()), (185, 135));
        assert_eq!(map.max_location(), (131, 77));
        assert!(map.max_value() > 0.999);
        assert_eq!(map.locations_at_least(0.9), vec![(131, 77)]);
    }

    #[test]
    fn test_matcher_mixed_channels_use_grayscale() {
        let gray = noise(30, 20, 2);
        let color: RgbImage = ImageBuffer::from_fn(30, 20, |x, y| {
            let v = gray.get_pixel(x, y)[0];
            Rgb([v, v, v])
        });
        let needle: ImageCapture = image::imageops::crop_imm(&gray, 4, 6, 8, 5).to_image().into();
        let matcher = TemplateMatcher::new(color.into());
        let map = matcher.match_template(&needle).unwrap();
        assert_eq!(map.max_location(), (4, 6));
    }

    #[test]
    fn test_template_larger_than_image() {
        let small: ImageCapture = noise(5, 5, 0).into();
        let big: ImageCapture = noise(6, 5, 0).into();
        assert!(matches!(
            match_template(&small, &big),
            Err(VisualError::OutOfBounds { .. })
        ));
    }
}
