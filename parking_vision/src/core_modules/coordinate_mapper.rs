// THEORY:
// Slots are drawn on a fixed-size display canvas but detected on the source
// video at its native resolution. The `CoordinateMapper` is the single bridge
// between the two spaces: an independent scale per axis, truncated toward zero.
//
// The transform is lossy. Going canvas -> source -> canvas loses at most one
// unit per coordinate; going source -> canvas -> source can lose up to
// `ceil(source / canvas)` units, because several source pixels collapse onto one
// canvas pixel.

use crate::core_modules::slot::{FrameSize, Rect};
use crate::error::{ParkingError, Result};

/// Bidirectional per-axis scaling between canvas and source coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    canvas: FrameSize,
    source: FrameSize,
}

impl CoordinateMapper {
    /// Fails with `InvalidVideo` when either surface has a zero dimension.
    pub fn new(canvas: FrameSize, source: FrameSize) -> Result<Self> {
        if source.is_empty() {
            return Err(ParkingError::invalid_video(format!(
                "source frame has zero size ({source})"
            )));
        }
        if canvas.is_empty() {
            return Err(ParkingError::invalid_video(format!(
                "canvas has zero size ({canvas})"
            )));
        }
        Ok(Self { canvas, source })
    }

    pub fn canvas(&self) -> FrameSize {
        self.canvas
    }

    pub fn source(&self) -> FrameSize {
        self.source
    }

    /// Maps a rectangle drawn on the canvas into source-video pixels.
    pub fn to_source(&self, rect: Rect) -> Rect {
        let sx = self.source.width as f64 / self.canvas.width as f64;
        let sy = self.source.height as f64 / self.canvas.height as f64;
        scale(rect, sx, sy)
    }

    /// Maps a persisted source-space rectangle onto the canvas for display.
    pub fn to_canvas(&self, rect: Rect) -> Rect {
        let sx = self.canvas.width as f64 / self.source.width as f64;
        let sy = self.canvas.height as f64 / self.source.height as f64;
        scale(rect, sx, sy)
    }
}

fn scale(rect: Rect, sx: f64, sy: f64) -> Rect {
    Rect {
        x1: (rect.x1 as f64 * sx) as i32,
        y1: (rect.y1 as f64 * sy) as i32,
        x2: (rect.x2 as f64 * sx) as i32,
        y2: (rect.y2 as f64 * sy) as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hd_mapper() -> CoordinateMapper {
        CoordinateMapper::new(FrameSize::new(1000, 600), FrameSize::new(1920, 1080)).unwrap()
    }

    fn max_error(a: Rect, b: Rect) -> i32 {
        [a.x1 - b.x1, a.y1 - b.y1, a.x2 - b.x2, a.y2 - b.y2]
            .iter()
            .map(|d| d.abs())
            .max()
            .unwrap()
    }

    #[test]
    fn zero_sized_source_is_invalid_video() {
        let err = CoordinateMapper::new(FrameSize::new(1000, 600), FrameSize::new(0, 1080)).unwrap_err();
        assert!(matches!(err, ParkingError::InvalidVideo(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn full_frame_maps_exactly() {
        let mapper = hd_mapper();
        assert_eq!(mapper.to_canvas(Rect::new(0, 0, 1920, 1080)), Rect::new(0, 0, 1000, 600));
        assert_eq!(mapper.to_source(Rect::new(0, 0, 1000, 600)), Rect::new(0, 0, 1920, 1080));
    }

    #[test]
    fn truncates_toward_zero() {
        let mapper = hd_mapper();
        let canvas = mapper.to_canvas(Rect::new(0, 0, 100, 100));
        assert_eq!(canvas, Rect::new(0, 0, 52, 55));
        assert_eq!(mapper.to_source(canvas), Rect::new(0, 0, 99, 99));
    }

    #[test]
    fn corner_rects_survive_round_trip_within_one_unit() {
        let mapper = hd_mapper();
        let corners = [
            Rect::new(0, 0, 100, 100),
            Rect::new(0, 980, 100, 1080),
            Rect::new(1824, 0, 1920, 100),
            Rect::new(1824, 980, 1920, 1080),
            Rect::new(960, 540, 1200, 720),
        ];
        for rect in corners {
            let back = mapper.to_source(mapper.to_canvas(rect));
            assert!(max_error(rect, back) <= 1, "{rect} came back as {back}");
        }
    }

    #[test]
    fn source_first_round_trip_is_bounded_by_scale() {
        let mapper = hd_mapper();
        for x in 0..=1920 {
            let rect = Rect::new(x, 0, 1920, 1080);
            let back = mapper.to_source(mapper.to_canvas(rect));
            assert!(rect.x1 - back.x1 >= 0 && rect.x1 - back.x1 <= 2, "x={x} -> {}", back.x1);
        }
        for y in 0..=1080 {
            let rect = Rect::new(0, y, 1920, 1080);
            let back = mapper.to_source(mapper.to_canvas(rect));
            assert!(rect.y1 - back.y1 >= 0 && rect.y1 - back.y1 <= 2, "y={y} -> {}", back.y1);
        }
    }

    #[test]
    fn canvas_first_round_trip_loses_at_most_one_unit() {
        let mapper = hd_mapper();
        for x in 0..=1000 {
            for y in [0, 299, 600] {
                let rect = Rect::new(x, y, 1000, 600);
                let back = mapper.to_canvas(mapper.to_source(rect));
                assert!(max_error(rect, back) <= 1, "{rect} came back as {back}");
            }
        }
    }
}
