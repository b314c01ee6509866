//! Perceptual color comparison.
//!
//! Colors are compared in CIELAB space where Euclidean distance approximates
//! the difference a human would notice. Overlays that are alpha-blended onto
//! arbitrary backgrounds are matched by HSV interval instead.

pub mod hsv;
pub mod lab;

pub use hsv::{rgb_to_hsv, HsvColorInterval};
pub use lab::Color;
