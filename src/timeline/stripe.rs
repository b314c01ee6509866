//! Run-length segmentation of one pixel row into colored chunks.

use std::fmt;

use crate::color::Color;
use crate::error::{Result, VisualError};

/// Closed pixel interval `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Pixels covered, both ends included.
    pub fn pixel_count(&self) -> usize {
        self.end - self.start + 1
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// A run of pixels that compare equal to `color`.
///
/// The color is the one of the run's first pixel, so later pixels only need
/// to be equal to it, not to each other.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColoredChunk {
    left: usize,
    right: usize,
    color: Color,
}

impl ColoredChunk {
    fn new(left: usize, right: usize, color: Color) -> Self {
        Self { left, right, color }
    }

    pub fn start(&self) -> usize {
        self.left
    }

    pub fn end(&self) -> usize {
        self.right
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn as_closed(&self) -> Chunk {
        Chunk::new(self.left, self.right)
    }

    fn extend(&mut self) {
        self.right += 1;
    }

    fn right_neighbor(&self, color: Color) -> Self {
        Self::new(self.right + 1, self.right + 1, color)
    }

    /// Absorbs an adjacent chunk on either side, keeping this chunk's color.
    fn concatenate(&mut self, other: &ColoredChunk) -> Result<()> {
        if self.right + 1 == other.left {
            self.right = other.right;
        } else if other.right + 1 == self.left {
            self.left = other.left;
        } else if self.left > other.right + 1 || other.left > self.right + 1 {
            return Err(VisualError::NonAdjacentChunks {
                left: self.to_string(),
                right: other.to_string(),
            });
        } else {
            return Err(VisualError::OverlappingChunks {
                left: self.to_string(),
                right: other.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ColoredChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}, {}]", self.color, self.left, self.right)
    }
}

/// Accumulates pixel colors left to right into chunks.
#[derive(Debug, Default)]
pub struct StripeBuilder {
    chunks: Vec<ColoredChunk>,
}

impl StripeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the current chunk if `color` equals its color, otherwise
    /// starts a new chunk at the next pixel.
    pub fn push(&mut self, color: Color) {
        if let Some(last) = self.chunks.last_mut() {
            if last.color == color {
                last.extend();
                return;
            }
        }
        let next = match self.chunks.last() {
            Some(last) => last.right_neighbor(color),
            None => ColoredChunk::new(0, 0, color),
        };
        self.chunks.push(next);
    }

    pub fn build(self) -> Result<Stripe> {
        Stripe::from_chunks(self.chunks)
    }
}

/// Non-empty sequence of adjacent colored chunks covering a pixel row.
#[derive(Clone, Debug, PartialEq)]
pub struct Stripe {
    chunks: Vec<ColoredChunk>,
}

impl Stripe {
    fn from_chunks(chunks: Vec<ColoredChunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(VisualError::EmptyStripe);
        }
        Ok(Self { chunks })
    }

    pub fn chunks(&self) -> &[ColoredChunk] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Pixels covered by the stripe.
    pub fn width(&self) -> usize {
        match (self.chunks.first(), self.chunks.last()) {
            (Some(first), Some(last)) => last.right - first.left + 1,
            _ => 0,
        }
    }

    /// Merges every `background` chunk into its neighbor, then coalesces
    /// same-colored chunks the removal made adjacent.
    ///
    /// Background chunks fold into the chunk on their left; background at
    /// the very start folds into the first remaining chunk. A stripe that
    /// is background only fails with `BackgroundOnlyStripe`.
    pub fn dissolve(&self, background: &Color) -> Result<Stripe> {
        let mut result: Vec<ColoredChunk> = Vec::with_capacity(self.chunks.len());
        let mut leading = Vec::new();
        for chunk in &self.chunks {
            let is_background = chunk.color == *background;
            if let Some(last) = result.last_mut() {
                if is_background || chunk.color == last.color {
                    last.concatenate(chunk)?;
                    continue;
                }
            } else if is_background {
                leading.push(*chunk);
                continue;
            }
            result.push(*chunk);
        }

        let Some(first) = result.first_mut() else {
            return Err(VisualError::BackgroundOnlyStripe {
                background: format!("{:?}", background),
            });
        };
        for chunk in leading.iter().rev() {
            first.concatenate(chunk)?;
        }
        Stripe::from_chunks(result)
    }

    /// Intervals of the chunks equal to `color`, left to right.
    pub fn get_chunks(&self, color: &Color) -> Vec<Chunk> {
        self.chunks
            .iter()
            .filter(|chunk| chunk.color == *color)
            .map(ColoredChunk::as_closed)
            .collect()
    }
}

/// Run-length encodes a row of pixel colors.
pub fn make_stripe(colors: &[Color]) -> Result<Stripe> {
    let mut builder = StripeBuilder::new();
    for &color in colors {
        builder.push(color);
    }
    builder.build()
}
