//! Region extraction from a binary text mask.

use crate::geometry::ScreenRectangle;

/// Bounding rectangles of the region borders of `mask`, outer and inner.
///
/// `mask` is row-major, `width * height` long. Set pixels form 8-connected
/// regions; every region yields its bounding rectangle. Unset pixels
/// enclosed by a region form 4-connected holes; every hole yields the
/// rectangle of the border around it, one pixel wider on each side than
/// the hole. Rectangles are returned in the raster order of their border's
/// first pixel, which is reading order for text lines.
pub fn region_rectangles(mask: &[bool], width: u32, height: u32) -> Vec<ScreenRectangle> {
    let (w, h) = (width as usize, height as usize);
    if mask.len() < w * h {
        return Vec::new();
    }
    let mut visited = vec![false; w * h];
    let mut borders: Vec<(usize, ScreenRectangle)> = Vec::new();

    for start in 0..w * h {
        if visited[start] {
            continue;
        }
        let component = flood(mask, &mut visited, start, w, h);
        if mask[start] {
            borders.push((start, component.bounds(0)));
        } else if !component.touches_edge {
            // First border pixel sits right above the first hole pixel
            borders.push((start - w, component.bounds(1)));
        }
    }

    borders.sort_by_key(|border| border.0);
    borders.into_iter().map(|(_, rect)| rect).collect()
}

struct Component {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
    touches_edge: bool,
}

impl Component {
    fn bounds(&self, margin: usize) -> ScreenRectangle {
        ScreenRectangle::new(
            (self.x0 - margin) as i32,
            (self.y0 - margin) as i32,
            (self.x1 - self.x0 + 1 + 2 * margin) as u32,
            (self.y1 - self.y0 + 1 + 2 * margin) as u32,
        )
    }
}

/// Marks the component of `start`: 8-connected for set pixels, 4-connected
/// for unset ones.
fn flood(mask: &[bool], visited: &mut [bool], start: usize, w: usize, h: usize) -> Component {
    let value = mask[start];
    let (sx, sy) = (start % w, start / w);
    let mut component = Component {
        x0: sx,
        y0: sy,
        x1: sx,
        y1: sy,
        touches_edge: false,
    };
    visited[start] = true;
    let mut stack = vec![start];

    while let Some(idx) = stack.pop() {
        let (x, y) = (idx % w, idx / w);
        component.x0 = component.x0.min(x);
        component.x1 = component.x1.max(x);
        component.y0 = component.y0.min(y);
        component.y1 = component.y1.max(y);
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            component.touches_edge = true;
        }

        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                if !value && nx != x && ny != y {
                    continue;
                }
                let n = ny * w + nx;
                if mask[n] == value && !visited[n] {
                    visited[n] = true;
                    stack.push(n);
                }
            }
        }
    }
    component
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> (Vec<bool>, u32, u32) {
        let width = rows[0].len() as u32;
        let mask = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        (mask, width, rows.len() as u32)
    }

    #[test]
    fn test_regions_in_reading_order() {
        let (mask, w, h) = mask_from(&[
            "........",
            ".##..###",
            ".##.....",
            "........",
            "###.....",
        ]);
        let rects = region_rectangles(&mask, w, h);
        assert_eq!(
            rects,
            vec![
                ScreenRectangle::new(1, 1, 2, 2),
                ScreenRectangle::new(5, 1, 3, 1),
                ScreenRectangle::new(0, 4, 3, 1),
            ]
        );
    }

    #[test]
    fn test_diagonal_pixels_connect() {
        let (mask, w, h) = mask_from(&["#...", ".#..", "..#."]);
        assert_eq!(region_rectangles(&mask, w, h), vec![ScreenRectangle::new(0, 0, 3, 3)]);
    }

    #[test]
    fn test_ring_yields_outer_and_hole_borders() {
        let (mask, w, h) = mask_from(&["#####", "#...#", "#.#.#", "#...#", "#####"]);
        // Outer border, the hole's border, then the island in the hole
        assert_eq!(
            region_rectangles(&mask, w, h),
            vec![
                ScreenRectangle::new(0, 0, 5, 5),
                ScreenRectangle::new(0, 0, 5, 5),
                ScreenRectangle::new(2, 2, 1, 1),
            ]
        );
    }

    #[test]
    fn test_hole_border_is_one_pixel_around_hole() {
        let (mask, w, h) = mask_from(&[
            "..........",
            ".########.",
            ".#......#.",
            ".#..##..#.",
            ".########.",
            "..........",
        ]);
        let rects = region_rectangles(&mask, w, h);
        // Hole spans x 2..=7, y 2..=3 around the bump
        assert_eq!(
            rects,
            vec![ScreenRectangle::new(1, 1, 8, 4), ScreenRectangle::new(1, 1, 8, 4)]
        );
    }

    #[test]
    fn test_open_background_is_not_a_hole() {
        // Gap in the ring connects the inside to the image edge
        let (mask, w, h) = mask_from(&["###.#", "#...#", "#####"]);
        assert_eq!(region_rectangles(&mask, w, h), vec![ScreenRectangle::new(0, 0, 5, 3)]);
    }

    #[test]
    fn test_diagonal_gap_does_not_open_hole() {
        // Unset pixels touching only diagonally stay separate
        let (mask, w, h) = mask_from(&["....", ".##.", ".#.#", "..#.", "...."]);
        let rects = region_rectangles(&mask, w, h);
        assert_eq!(
            rects,
            vec![ScreenRectangle::new(1, 1, 3, 3), ScreenRectangle::new(1, 1, 3, 3)]
        );
    }

    #[test]
    fn test_empty_mask() {
        let (mask, w, h) = mask_from(&["....", "...."]);
        assert!(region_rectangles(&mask, w, h).is_empty());
        assert!(region_rectangles(&[], 0, 0).is_empty());
    }
}
