// THEORY:
// The `slot` module holds the "dumb" geometry of the system. A `Rect` is four
// integers in some pixel space; it does not know whether that space is the
// display canvas or the source video. A `Slot` pins a rectangle in source
// coordinates to a 1-based identifier derived purely from sequence order.
//
// Degenerate rectangles (`x1 >= x2` or `y1 >= y2`) are representable on purpose:
// drawing and loading never reject them, and the detector treats their empty
// region as permanently vacant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height of an image surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle given by its top-left and bottom-right corners.
/// The persisted column names double as the serde field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn is_degenerate(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    /// Clips the rectangle to `[0, width) x [0, height)` and returns the
    /// half-open pixel ranges, or `None` when nothing remains.
    pub fn clip_to(&self, size: FrameSize) -> Option<(std::ops::Range<u32>, std::ops::Range<u32>)> {
        let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
        let xs = clamp(self.x1, size.width)..clamp(self.x2, size.width);
        let ys = clamp(self.y1, size.height)..clamp(self.y2, size.height);
        if xs.is_empty() || ys.is_empty() {
            None
        } else {
            Some((xs, ys))
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})-({},{})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// 1-based slot identifier, stable as long as the slot sequence is not edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One parking space, in source-video pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub id: SlotId,
    pub rect: Rect,
}

impl Slot {
    /// Numbers the rectangles `1..=n` in the order given.
    pub fn sequence<I>(rects: I) -> Vec<Slot>
    where
        I: IntoIterator<Item = Rect>,
    {
        rects
            .into_iter()
            .enumerate()
            .map(|(i, rect)| Slot {
                id: SlotId(i as u32 + 1),
                rect,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_assigns_one_based_ids_in_order() {
        let slots = Slot::sequence(vec![Rect::new(0, 0, 10, 10), Rect::new(5, 5, 20, 20)]);
        assert_eq!(slots[0].id, SlotId(1));
        assert_eq!(slots[1].id, SlotId(2));
        assert_eq!(slots[1].rect, Rect::new(5, 5, 20, 20));
    }

    #[test]
    fn degenerate_rects() {
        assert!(Rect::new(10, 0, 10, 5).is_degenerate());
        assert!(Rect::new(0, 8, 5, 3).is_degenerate());
        assert!(!Rect::new(0, 0, 1, 1).is_degenerate());
    }

    #[test]
    fn clip_keeps_inside_part_and_drops_outside() {
        let size = FrameSize::new(100, 50);
        assert_eq!(Rect::new(-10, -5, 20, 10).clip_to(size), Some((0..20, 0..10)));
        assert_eq!(Rect::new(90, 40, 200, 200).clip_to(size), Some((90..100, 40..50)));
        assert_eq!(Rect::new(150, 0, 200, 10).clip_to(size), None);
        assert_eq!(Rect::new(10, 10, 10, 20).clip_to(size), None);
    }
}
