//! Screen geometry: points, rectangles and resolution-independent regions.
//!
//! All types are immutable values; operations return new instances.

pub mod percentage;
pub mod point;
pub mod rect;

pub use percentage::ImagePiecePercentage;
pub use point::ScreenPoint;
pub use rect::ScreenRectangle;

/// Rounds half to even, matching the rounding used by the tuned thresholds.
pub(crate) fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}
