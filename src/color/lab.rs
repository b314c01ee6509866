use std::fmt;

use crate::error::{Result, VisualError};

/// Distance up to which two colors are indistinguishable (just-noticeable difference).
pub const EQUALITY_DISTANCE: f64 = 2.0;
/// Distance up to which two colors are the same hue under different lighting or alpha.
pub const SHADE_DISTANCE: f64 = 10.0;
/// Distance up to which two colors are loosely alike.
pub const CLOSENESS_DISTANCE: f64 = 49.0;

/// D65 reference white, 2 degree observer.
const D65_WHITE: [f64; 3] = [95.047, 100.0, 108.883];

/// A color stored as its CIELAB coordinates.
///
/// Equality is "Lab distance <= 2.0". It is symmetric but NOT transitive:
/// three colors can each be equal to their neighbour while the outer two
/// differ by more than 2.0. Never use it to partition a palette into
/// disjoint classes.
#[derive(Clone, Copy)]
pub struct Color {
    l_star: f64,
    a_star: f64,
    b_star: f64,
    rgb: Option<[u8; 3]>,
}

impl Color {
    /// Creates a color from CIELAB coordinates.
    ///
    /// L* must be within 0..=100, a* and b* within -128..=127.
    pub fn lab(l_star: f64, a_star: f64, b_star: f64) -> Result<Self> {
        check_range("Luminance", l_star, 0.0, 100.0)?;
        check_range("Red-Green axis", a_star, -128.0, 127.0)?;
        check_range("Blue-Yellow axis", b_star, -128.0, 127.0)?;
        Ok(Self {
            l_star,
            a_star,
            b_star,
            rgb: None,
        })
    }

    /// Creates a color from 8-bit sRGB channels.
    ///
    /// Channels are taken as `i32` so out-of-range values coming from
    /// arithmetic are reported instead of silently wrapping.
    pub fn rgb(red: i32, green: i32, blue: i32) -> Result<Self> {
        check_range("Red", red as f64, 0.0, 255.0)?;
        check_range("Green", green as f64, 0.0, 255.0)?;
        check_range("Blue", blue as f64, 0.0, 255.0)?;
        Ok(Self::from_rgb8(red as u8, green as u8, blue as u8))
    }

    /// Creates a color from channels already known to be in range.
    pub fn from_rgb8(red: u8, green: u8, blue: u8) -> Self {
        let [x, y, z] = rgb_to_xyz(red, green, blue);
        let [l_star, a_star, b_star] = xyz_to_cielab(x, y, z);
        Self {
            l_star,
            a_star,
            b_star,
            rgb: Some([red, green, blue]),
        }
    }

    /// Parses a CSS hex color such as `#4caf50`.
    pub fn from_css_hex(value: &str) -> Result<Self> {
        let digits = value
            .strip_prefix('#')
            .ok_or_else(|| VisualError::InvalidCssColor(value.to_string()))?;
        if digits.is_empty() || digits.len() > 6 {
            return Err(VisualError::InvalidCssColor(value.to_string()));
        }
        let packed = u32::from_str_radix(digits, 16)
            .map_err(|_| VisualError::InvalidCssColor(value.to_string()))?;
        let red = ((packed & 0xFF_00_00) >> 16) as u8;
        let green = ((packed & 0x00_FF_00) >> 8) as u8;
        let blue = (packed & 0x00_00_FF) as u8;
        Ok(Self::from_rgb8(red, green, blue))
    }

    pub fn l_star(&self) -> f64 {
        self.l_star
    }

    pub fn a_star(&self) -> f64 {
        self.a_star
    }

    pub fn b_star(&self) -> f64 {
        self.b_star
    }

    /// The sRGB channels this color was built from, if any.
    pub fn rgb_channels(&self) -> Option<[u8; 3]> {
        self.rgb
    }

    /// Euclidean distance in CIELAB space.
    pub fn distance(&self, other: &Color) -> f64 {
        let dl = self.l_star - other.l_star;
        let da = self.a_star - other.a_star;
        let db = self.b_star - other.b_star;
        (dl * dl + da * da + db * db).sqrt()
    }

    /// Same hue family, possibly under different lighting or transparency.
    pub fn is_shade_of(&self, other: &Color) -> bool {
        self.distance(other) <= SHADE_DISTANCE
    }

    pub fn is_close_to(&self, other: &Color) -> bool {
        self.distance(other) <= CLOSENESS_DISTANCE
    }
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        self.distance(other) <= EQUALITY_DISTANCE
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rgb {
            Some([r, g, b]) => write!(f, "RGBColor({:03}, {:03}, {:03})", r, g, b),
            None => write!(
                f,
                "CIELABColor({:.3}, {:.3}, {:.3})",
                self.l_star, self.a_star, self.b_star
            ),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rgb {
            Some([r, g, b]) => write!(f, "#{:02x}{:02x}{:02x}", r, g, b),
            None => fmt::Debug::fmt(self, f),
        }
    }
}

fn check_range(channel: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(VisualError::ColorOutOfRange {
            channel,
            value,
            min,
            max,
        })
    }
}

/// Gamma-decodes one sRGB channel, scaled to 0..=100.
fn linearize_channel(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    let linear = if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    };
    linear * 100.0
}

fn rgb_to_xyz(red: u8, green: u8, blue: u8) -> [f64; 3] {
    let r = linearize_channel(red);
    let g = linearize_channel(green);
    let b = linearize_channel(blue);
    [
        r * 0.4124 + g * 0.3576 + b * 0.1805,
        r * 0.2126 + g * 0.7152 + b * 0.0722,
        r * 0.0193 + g * 0.1192 + b * 0.9505,
    ]
}

fn lab_nonlinearity(t: f64) -> f64 {
    if t > 0.008856 {
        t.powf(1.0 / 3.0)
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn xyz_to_cielab(x: f64, y: f64, z: f64) -> [f64; 3] {
    let fx = lab_nonlinearity(x / D65_WHITE[0]);
    let fy = lab_nonlinearity(y / D65_WHITE[1]);
    let fz = lab_nonlinearity(z / D65_WHITE[2]);
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}
