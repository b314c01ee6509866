//! Colored range markers on a captured timeline widget.
//!
//! Archive, motion and analytics ranges are painted as colored bars near
//! the bottom edge of the timeline. A hover tooltip may cover part of a bar;
//! its colors are dissolved into the neighboring ranges before measuring.

use super::stripe::{make_stripe, Chunk, Stripe};
use crate::capture::ImageCapture;
use crate::color::Color;
use crate::error::{Result, VisualError};

/// Relative height of the sampled pixel row.
pub const MARKER_ROW_RATIO: f64 = 0.97;

/// Colors used by the timeline. Each kind lists the colors of different
/// client versions, tried in order.
#[derive(Clone, Debug)]
pub struct TimelineMarkers {
    pub tooltip: Vec<Color>,
    pub archive: Vec<Color>,
    pub motion: Vec<Color>,
    pub analytics: Vec<Color>,
}

impl Default for TimelineMarkers {
    fn default() -> Self {
        Self {
            tooltip: vec![Color::from_rgb8(225, 231, 234), Color::from_rgb8(229, 233, 235)],
            archive: vec![Color::from_rgb8(76, 175, 80), Color::from_rgb8(58, 145, 30)],
            motion: vec![Color::from_rgb8(229, 57, 53), Color::from_rgb8(170, 30, 30)],
            // 6.0, then 6.1 and later
            analytics: vec![Color::from_rgb8(255, 193, 7), Color::from_rgb8(255, 202, 40)],
        }
    }
}

impl TimelineMarkers {
    /// Marker row of `timeline` with tooltip colors dissolved.
    ///
    /// A row hidden entirely under the tooltip is returned as is; it shows
    /// no markers.
    pub fn marker_stripe(&self, timeline: &ImageCapture) -> Result<Stripe> {
        let row = (timeline.height() as f64 * MARKER_ROW_RATIO) as u32;
        let mut stripe = make_stripe(&timeline.get_row_colors(row)?)?;
        for tooltip in &self.tooltip {
            stripe = match stripe.dissolve(tooltip) {
                Ok(dissolved) => dissolved,
                Err(VisualError::BackgroundOnlyStripe { .. }) => return Ok(stripe),
                Err(e) => return Err(e),
            };
        }
        Ok(stripe)
    }

    /// Ranges painted in `color`, in pixels from the left edge.
    pub fn find_chunks_by_color(&self, timeline: &ImageCapture, color: &Color) -> Result<Vec<Chunk>> {
        let chunks = self.marker_stripe(timeline)?.get_chunks(color);
        crate::log(&format!(
            "Timeline chunks of {:?}: {}",
            color,
            chunks.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
        ));
        Ok(chunks)
    }

    pub fn archive_chunks(&self, timeline: &ImageCapture) -> Result<Vec<Chunk>> {
        self.first_present(timeline, &self.archive)
    }

    pub fn motion_chunks(&self, timeline: &ImageCapture) -> Result<Vec<Chunk>> {
        self.first_present(timeline, &self.motion)
    }

    pub fn analytics_chunks(&self, timeline: &ImageCapture) -> Result<Vec<Chunk>> {
        self.first_present(timeline, &self.analytics)
    }

    /// Chunks of the first color in `colors` that is present at all.
    fn first_present(&self, timeline: &ImageCapture, colors: &[Color]) -> Result<Vec<Chunk>> {
        let stripe = self.marker_stripe(timeline)?;
        Ok(colors
            .iter()
            .map(|color| stripe.get_chunks(color))
            .find(|chunks| !chunks.is_empty())
            .unwrap_or_default())
    }
}
