// THEORY:
// The `OccupancyDetector` turns raw frames into per-slot verdicts. It owns the
// background model for the lifetime of one run and orchestrates three stages:
//
// 1.  **Segmentation**: the background model yields a binary foreground mask.
// 2.  **Cleanup**: opening removes speckle noise first, then closing merges the
//     surviving blobs. The order matters; closing first would grow the noise.
// 3.  **Classification**: each slot's motion ratio (foreground pixels over
//     region area) is compared against the threshold with a strict `>`.
//
// Slots whose region is empty after clipping (degenerate or fully off-frame)
// are skipped. They are never occupied but still count toward the total, so
// `occupied + vacant == total` always holds.

use std::fmt;

use image::{GrayImage, RgbImage};

use crate::config::DetectorConfig;
use crate::core_modules::background_model::BackgroundModel;
use crate::core_modules::morphology;
use crate::core_modules::slot::{FrameSize, Slot, SlotId};

/// Per-frame occupancy classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancySnapshot {
    /// 1-based index of the frame within the run.
    pub frame_index: u64,
    pub occupied_ids: Vec<SlotId>,
    /// Slots whose region was empty this frame.
    pub skipped_ids: Vec<SlotId>,
    pub total: usize,
}

impl OccupancySnapshot {
    pub fn occupied(&self) -> usize {
        self.occupied_ids.len()
    }

    pub fn vacant(&self) -> usize {
        self.total - self.occupied()
    }

    pub fn is_occupied(&self, id: SlotId) -> bool {
        self.occupied_ids.contains(&id)
    }
}

impl fmt::Display for OccupancySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Occupied: {} | Vacant: {}", self.occupied(), self.vacant())
    }
}

/// Output of one detector step.
pub struct Detection {
    pub mask: GrayImage,
    pub snapshot: OccupancySnapshot,
}

/// Fraction of foreground pixels in the clipped slot region, or `None` if the region is empty.
pub fn motion_ratio(mask: &GrayImage, slot: &Slot) -> Option<f64> {
    let (xs, ys) = slot
        .rect
        .clip_to(FrameSize::new(mask.width(), mask.height()))?;
    let area = xs.len() * ys.len();

    let mut nonzero = 0usize;
    for y in ys {
        for x in xs.clone() {
            if mask.get_pixel(x, y)[0] != 0 {
                nonzero += 1;
            }
        }
    }
    Some(nonzero as f64 / area as f64)
}

/// Classifies every slot against an already cleaned mask.
pub fn classify(mask: &GrayImage, slots: &[Slot], threshold: f64, frame_index: u64) -> OccupancySnapshot {
    let mut occupied_ids = Vec::new();
    let mut skipped_ids = Vec::new();

    for slot in slots {
        match motion_ratio(mask, slot) {
            Some(ratio) if ratio > threshold => occupied_ids.push(slot.id),
            Some(_) => {}
            None => skipped_ids.push(slot.id),
        }
    }

    OccupancySnapshot {
        frame_index,
        occupied_ids,
        skipped_ids,
        total: slots.len(),
    }
}

/// Stateful detector for one run over one video.
pub struct OccupancyDetector {
    config: DetectorConfig,
    slots: Vec<Slot>,
    background: BackgroundModel,
    frame_index: u64,
}

impl OccupancyDetector {
    pub fn new(config: DetectorConfig, slots: Vec<Slot>) -> Self {
        Self {
            background: BackgroundModel::new(config.background.clone()),
            config,
            slots,
            frame_index: 0,
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn process(&mut self, frame: &RgbImage) -> Detection {
        self.frame_index += 1;

        let raw = self.background.apply(frame);
        let morph = &self.config.morphology;
        let opened = morphology::open(&raw, morph.kernel_size, morph.open_iterations);
        let mask = morphology::close(&opened, morph.kernel_size, morph.close_iterations);

        let snapshot = classify(
            &mask,
            &self.slots,
            self.config.motion_ratio_threshold,
            self.frame_index,
        );
        Detection { mask, snapshot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::slot::Rect;
    use image::{Luma, Rgb};

    /// Mask with the first `lit` pixels (row-major) of the `w x h` top-left region set.
    fn mask_with_lit(width: u32, height: u32, w: u32, lit: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for i in 0..lit {
            mask.put_pixel(i % w, i / w, Luma([255]));
        }
        mask
    }

    #[test]
    fn exactly_ten_percent_is_vacant() {
        let slots = Slot::sequence([Rect::new(0, 0, 10, 10)]);
        let mask = mask_with_lit(20, 20, 10, 10);
        assert_eq!(motion_ratio(&mask, &slots[0]), Some(0.1));
        let snap = classify(&mask, &slots, 0.10, 1);
        assert_eq!(snap.occupied(), 0);
        assert_eq!(snap.vacant(), 1);
    }

    #[test]
    fn just_above_ten_percent_is_occupied() {
        let slots = Slot::sequence([Rect::new(0, 0, 100, 100)]);
        let mask = mask_with_lit(100, 100, 100, 1001);
        let snap = classify(&mask, &slots, 0.10, 1);
        assert_eq!(snap.occupied_ids, vec![SlotId(1)]);
    }

    #[test]
    fn degenerate_and_offscreen_slots_are_skipped_but_counted() {
        let slots = Slot::sequence([
            Rect::new(0, 0, 10, 10),
            Rect::new(5, 5, 5, 9),
            Rect::new(500, 500, 600, 600),
            Rect::new(8, 8, 2, 2),
        ]);
        let mask = GrayImage::from_pixel(20, 20, Luma([255]));
        let snap = classify(&mask, &slots, 0.10, 3);
        assert_eq!(snap.occupied_ids, vec![SlotId(1)]);
        assert_eq!(snap.skipped_ids, vec![SlotId(2), SlotId(3), SlotId(4)]);
        assert_eq!(snap.total, 4);
        assert_eq!(snap.occupied() + snap.vacant(), snap.total);
        assert_eq!(snap.vacant(), 3);
    }

    #[test]
    fn partially_visible_slot_uses_clipped_area() {
        let slots = Slot::sequence([Rect::new(-10, 0, 10, 10)]);
        let mask = mask_with_lit(10, 10, 10, 50);
        assert_eq!(motion_ratio(&mask, &slots[0]), Some(0.5));
    }

    #[test]
    fn status_line_format() {
        let snap = OccupancySnapshot {
            frame_index: 7,
            occupied_ids: vec![SlotId(2)],
            skipped_ids: vec![],
            total: 3,
        };
        assert_eq!(snap.to_string(), "Occupied: 1 | Vacant: 2");
        assert!(snap.is_occupied(SlotId(2)));
    }

    /// 50 frames: an empty scene for frames 1-20, then a 50x50 flickering blob
    /// inside slot 1 for frames 21-50.
    fn synthetic_frame(index: u64) -> RgbImage {
        let mut frame = RgbImage::from_pixel(200, 150, Rgb([20, 20, 20]));
        if index > 20 {
            let value = 40 + ((index * 37) % 200) as u8;
            for y in 25..75 {
                for x in 25..75 {
                    frame.put_pixel(x, y, Rgb([value, value, value]));
                }
            }
        }
        frame
    }

    #[test]
    fn end_to_end_blob_marks_slot_occupied() {
        let slots = Slot::sequence([Rect::new(0, 0, 100, 100), Rect::new(120, 20, 190, 140)]);
        let mut detector = OccupancyDetector::new(DetectorConfig::default(), slots);

        let mut snapshots = Vec::new();
        for index in 1..=50 {
            snapshots.push(detector.process(&synthetic_frame(index)).snapshot);
        }

        let frame10 = &snapshots[9];
        assert_eq!(frame10.frame_index, 10);
        assert!(!frame10.is_occupied(SlotId(1)));
        assert_eq!(frame10.vacant(), 2);

        let frame25 = &snapshots[24];
        assert_eq!(frame25.frame_index, 25);
        assert_eq!(frame25.occupied_ids, vec![SlotId(1)]);
        assert_eq!(frame25.to_string(), "Occupied: 1 | Vacant: 1");
    }

    #[test]
    fn end_to_end_blob_ratio_is_a_quarter() {
        let slots = Slot::sequence([Rect::new(0, 0, 100, 100)]);
        let mut detector = OccupancyDetector::new(DetectorConfig::default(), slots.clone());
        let mut mask = GrayImage::new(1, 1);
        for index in 1..=25 {
            mask = detector.process(&synthetic_frame(index)).mask;
        }
        assert_eq!(motion_ratio(&mask, &slots[0]), Some(0.25));
    }
}
