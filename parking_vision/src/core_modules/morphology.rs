// Square-kernel morphology on foreground masks. A `k×k` square is the set of
// pixels within chessboard distance `k / 2`, so erosion and dilation go through
// imageproc's distance-transform operators with `Norm::LInf`. Pixels outside the
// image never participate.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology;

/// Chessboard radius of a square kernel. Kernels of size 0 or 1 leave the mask unchanged.
fn radius(kernel_size: u32) -> u8 {
    (kernel_size / 2).min(u8::MAX as u32) as u8
}

pub fn erode(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    morphology::erode(mask, Norm::LInf, radius(kernel_size))
}

pub fn dilate(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    morphology::dilate(mask, Norm::LInf, radius(kernel_size))
}

/// Erodes then dilates `iterations` times each. Removes specks smaller than the kernel.
pub fn open(mask: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = erode(&out, kernel_size);
    }
    for _ in 0..iterations {
        out = dilate(&out, kernel_size);
    }
    out
}

/// Dilates then erodes `iterations` times each. Fills gaps smaller than the kernel.
pub fn close(mask: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = dilate(&out, kernel_size);
    }
    for _ in 0..iterations {
        out = erode(&out, kernel_size);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn with_square(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    fn count(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p[0] != 0).count()
    }

    #[test]
    fn opening_removes_specks_smaller_than_kernel() {
        let mut mask = with_square(40, 40, 20, 20, 10);
        mask.put_pixel(2, 2, Luma([255]));
        mask.put_pixel(3, 2, Luma([255]));
        let opened = open(&mask, 7, 1);
        assert_eq!(opened.get_pixel(2, 2)[0], 0);
        assert_eq!(count(&opened), 100);
    }

    #[test]
    fn closing_fills_small_gaps() {
        let mut mask = with_square(40, 40, 10, 10, 20);
        mask.put_pixel(20, 20, Luma([0]));
        mask.put_pixel(21, 20, Luma([0]));
        let closed = close(&mask, 7, 2);
        assert_eq!(closed.get_pixel(20, 20)[0], 255);
        assert_eq!(count(&closed), 400);
    }

    #[test]
    fn border_does_not_erode_full_mask() {
        let mask = GrayImage::from_pixel(10, 10, Luma([255]));
        assert_eq!(count(&erode(&mask, 7)), 100);
        assert_eq!(count(&dilate(&GrayImage::new(10, 10), 7)), 0);
    }

    #[test]
    fn dilation_grows_by_half_kernel() {
        let mask = with_square(20, 20, 10, 10, 1);
        let grown = dilate(&mask, 7);
        assert_eq!(count(&grown), 49);
        assert_eq!(grown.get_pixel(7, 7)[0], 255);
        assert_eq!(grown.get_pixel(6, 6)[0], 0);
    }

    #[test]
    fn erosion_shrinks_by_half_kernel_each_side() {
        let mask = with_square(40, 40, 10, 10, 20);
        let eroded = erode(&mask, 7);
        assert_eq!(count(&eroded), 14 * 14);
        assert_eq!(eroded.get_pixel(13, 13)[0], 255);
        assert_eq!(eroded.get_pixel(12, 13)[0], 0);
    }

    #[test]
    fn unit_kernel_is_identity() {
        let mut mask = with_square(12, 12, 3, 3, 4);
        mask.put_pixel(0, 11, Luma([255]));
        assert_eq!(erode(&mask, 1), mask);
        assert_eq!(close(&mask, 1, 2), mask);
    }
}
