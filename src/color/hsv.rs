/// An inclusive HSV range where a target color is expected.
///
/// Useful when the color is transparent and blended with whatever is
/// underneath, so no fixed RGB value matches it. Example: motion mask
/// squares drawn as `#c80000` at alpha 51.
///
/// Channels use the 8-bit OpenCV scale: hue 0..=180, saturation and
/// value 0..=255.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HsvColorInterval {
    pub hsv_min: [u8; 3],
    pub hsv_max: [u8; 3],
}

impl HsvColorInterval {
    pub const fn new(hsv_min: [u8; 3], hsv_max: [u8; 3]) -> Self {
        Self { hsv_min, hsv_max }
    }

    /// Red motion mask overlay.
    pub const RED_MOTION_MASK: HsvColorInterval =
        HsvColorInterval::new([0, 100, 20], [15, 255, 255]);

    pub fn contains_hsv(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.hsv_min[i] <= hsv[i] && hsv[i] <= self.hsv_max[i])
    }

    pub fn contains(&self, red: u8, green: u8, blue: u8) -> bool {
        self.contains_hsv(rgb_to_hsv(red, green, blue))
    }
}

/// Converts an RGB triple to 8-bit HSV (hue halved to fit 0..=180).
pub fn rgb_to_hsv(red: u8, green: u8, blue: u8) -> [u8; 3] {
    let r = red as f32;
    let g = green as f32;
    let b = blue as f32;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };

    let saturation = if max == 0.0 { 0.0 } else { 255.0 * delta / max };

    [
        ((hue / 2.0).round() as u32).min(180) as u8,
        saturation.round() as u8,
        max as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
    }

    #[test]
    fn test_motion_mask_over_grey_video() {
        let mask = HsvColorInterval::RED_MOTION_MASK;
        // #c80000 at alpha 51 over a dark grey frame
        let blended = (0.2f32 * 200.0 + 0.8 * 64.0).round() as u8;
        let grey = (0.8f32 * 64.0).round() as u8;
        assert!(mask.contains(blended, grey, grey));
        assert!(!mask.contains(128, 128, 128));
        assert!(!mask.contains(0, 0, 255));
    }
}
