use std::fmt;

use super::point::ScreenPoint;
use super::round_half_even;

/// An integer pixel rectangle, top-left origin.
///
/// `bottom_right` is exclusive: a rectangle at (0, 0) of width 10 covers
/// columns 0..10.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScreenRectangle {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRectangle {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from two corners, `bottom_right` exclusive.
    pub fn from_corners(top_left: ScreenPoint, bottom_right: ScreenPoint) -> Self {
        Self::new(
            top_left.x,
            top_left.y,
            (bottom_right.x - top_left.x).max(0) as u32,
            (bottom_right.y - top_left.y).max(0) as u32,
        )
    }

    fn right_edge(&self) -> i32 {
        self.x + self.width as i32
    }

    fn bottom_edge(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn top_left(&self) -> ScreenPoint {
        ScreenPoint::new(self.x, self.y)
    }

    pub fn top_right(&self) -> ScreenPoint {
        ScreenPoint::new(self.right_edge(), self.y)
    }

    pub fn bottom_left(&self) -> ScreenPoint {
        ScreenPoint::new(self.x, self.bottom_edge())
    }

    pub fn bottom_right(&self) -> ScreenPoint {
        ScreenPoint::new(self.right_edge(), self.bottom_edge())
    }

    pub fn top_center(&self) -> ScreenPoint {
        ScreenPoint::new(self.x + self.width as i32 / 2, self.y)
    }

    pub fn bottom_center(&self) -> ScreenPoint {
        ScreenPoint::new(self.x + self.width as i32 / 2, self.bottom_edge())
    }

    pub fn middle_left(&self) -> ScreenPoint {
        ScreenPoint::new(self.x, self.y + self.height as i32 / 2)
    }

    pub fn middle_right(&self) -> ScreenPoint {
        ScreenPoint::new(self.right_edge(), self.y + self.height as i32 / 2)
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    pub fn contains_point(&self, point: ScreenPoint) -> bool {
        self.x <= point.x
            && point.x < self.right_edge()
            && self.y <= point.y
            && point.y < self.bottom_edge()
    }

    pub fn intersects(&self, other: &ScreenRectangle) -> bool {
        self.x < other.right_edge()
            && other.x < self.right_edge()
            && self.y < other.bottom_edge()
            && other.y < self.bottom_edge()
    }

    /// Moves the rectangle into another coordinate system by scaling each axis.
    ///
    /// Sizes are scaled first and the origin is then clamped against the
    /// scaled size, so boxes touching the image edge stay inside it.
    pub fn axis_scaling(&self, x_ratio: f64, y_ratio: f64, max_width: u32, max_height: u32) -> Self {
        let width = (self.width as f64 * x_ratio) as i64;
        let height = (self.height as f64 * y_ratio) as i64;
        let x = ((self.x as f64 * x_ratio) as i64).min(max_width as i64 - width).max(0);
        let y = ((self.y as f64 * y_ratio) as i64).min(max_height as i64 - height).max(0);
        Self::new(x as i32, y as i32, width.max(0) as u32, height.max(0) as u32)
    }

    /// Expands every side by `round(height * factor / 2)`, clipped to `[0, max]`.
    pub fn add_borders(&self, factor: f64, max_width: u32, max_height: u32) -> Self {
        let border = round_half_even(self.height as f64 * factor / 2.0) as i32;
        let x0 = (self.x - border).max(0);
        let y0 = (self.y - border).max(0);
        let x1 = (self.right_edge() + border).min(max_width as i32);
        let y1 = (self.bottom_edge() + border).min(max_height as i32);
        Self::from_corners(ScreenPoint::new(x0, y0), ScreenPoint::new(x1, y1))
    }

    /// Shifts the rectangle by an offset.
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

impl fmt::Display for ScreenRectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
