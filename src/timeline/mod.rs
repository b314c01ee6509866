//! Timeline widget analysis.

pub mod markers;
pub mod stripe;

pub use markers::TimelineMarkers;
pub use stripe::{make_stripe, Chunk, ColoredChunk, Stripe, StripeBuilder};
