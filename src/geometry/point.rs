use std::fmt;

/// An integer pixel coordinate, top-left origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn up(self, offset: i32) -> Self {
        Self::new(self.x, self.y - offset)
    }

    pub fn down(self, offset: i32) -> Self {
        Self::new(self.x, self.y + offset)
    }

    pub fn left(self, offset: i32) -> Self {
        Self::new(self.x - offset, self.y)
    }

    pub fn right(self, offset: i32) -> Self {
        Self::new(self.x + offset, self.y)
    }

    /// Clamps the point into the box spanned by the origin and `bound`.
    pub fn clip(self, bound: ScreenPoint) -> Self {
        Self::new(self.x.clamp(0, bound.x.max(0)), self.y.clamp(0, bound.y.max(0)))
    }

    /// Euclidean distance.
    pub fn distance_to(self, other: ScreenPoint) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }

    /// Chessboard (Chebyshev) distance.
    pub fn chessboard_distance_to(self, other: ScreenPoint) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Rotates the point about `around` and scales its offset from it.
    ///
    /// Positive degrees rotate counter-clockwise in the mathematical sense;
    /// callers pass negative degrees for a clockwise screen rotation.
    pub fn transform(self, around: ScreenPoint, rotate_degrees: f64, scale: f64) -> Self {
        let (sin, cos) = rotate_degrees.to_radians().sin_cos();
        // (dx + i*dy) * scale * (cos + i*sin)
        let dx = (self.x - around.x) as f64;
        let dy = (self.y - around.y) as f64;
        let re = (dx * cos - dy * sin) * scale;
        let im = (dx * sin + dy * cos) * scale;
        Self::new(
            around.x + re.round() as i32,
            around.y + im.round() as i32,
        )
    }
}

impl fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let p = ScreenPoint::new(10, 20);
        assert_eq!(p.right(5).down(5), ScreenPoint::new(15, 25));
        assert_eq!(p.left(15).up(25), ScreenPoint::new(-5, -5));
    }

    #[test]
    fn test_clip() {
        let bound = ScreenPoint::new(100, 50);
        assert_eq!(ScreenPoint::new(-3, 70).clip(bound), ScreenPoint::new(0, 50));
        assert_eq!(ScreenPoint::new(30, 20).clip(bound), ScreenPoint::new(30, 20));
    }

    #[test]
    fn test_distances() {
        let a = ScreenPoint::new(0, 0);
        let b = ScreenPoint::new(3, 4);
        assert!((a.distance_to(b) - 5.0).abs() < 1e-9);
        assert_eq!(a.chessboard_distance_to(b), 4);
    }

    #[test]
    fn test_transform_rotation_sign() {
        let pivot = ScreenPoint::new(10, 10);
        let p = ScreenPoint::new(20, 10);
        // +90 maps the x axis onto the y axis
        assert_eq!(p.transform(pivot, 90.0, 1.0), ScreenPoint::new(10, 20));
        assert_eq!(p.transform(pivot, -90.0, 1.0), ScreenPoint::new(10, 0));
        assert_eq!(p.transform(pivot, 0.0, 2.0), ScreenPoint::new(30, 10));
    }
}
