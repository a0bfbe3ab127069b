// Draws slot outlines onto a copy of the raw frame: red for occupied, green for vacant.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as ImageRect;

use crate::core_modules::occupancy::OccupancySnapshot;
use crate::core_modules::slot::Slot;

pub const OCCUPIED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const VACANT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const OUTLINE_THICKNESS: i32 = 2;

pub fn render_overlay(frame: &RgbImage, slots: &[Slot], snapshot: &OccupancySnapshot) -> RgbImage {
    let mut out = frame.clone();
    for slot in slots {
        let color = if snapshot.is_occupied(slot.id) {
            OCCUPIED_COLOR
        } else {
            VACANT_COLOR
        };
        draw_outline(&mut out, slot, color);
    }
    out
}

/// Draws `OUTLINE_THICKNESS` nested hollow rectangles, each one pixel inside the
/// last, so the outline never reaches past the slot's own edges.
fn draw_outline(image: &mut RgbImage, slot: &Slot, color: Rgb<u8>) {
    let r = slot.rect;
    let (left, right) = (r.x1.min(r.x2), r.x1.max(r.x2));
    let (top, bottom) = (r.y1.min(r.y2), r.y1.max(r.y2));

    for offset in 0..OUTLINE_THICKNESS {
        let width = right - left - 2 * offset + 1;
        let height = bottom - top - 2 * offset + 1;
        if width <= 0 || height <= 0 {
            break;
        }
        let ring = ImageRect::at(left + offset, top + offset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, ring, color);
    }
}
