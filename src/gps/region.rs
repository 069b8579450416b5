use image::{imageops, RgbImage};

use crate::frame::Frame;

/// Share of frame height, measured from the bottom, that holds the overlay.
pub const DEFAULT_REGION_FRACTION: f64 = 0.20;

/// Crop the strip most likely to carry the burned-in GPS overlay.
///
/// The overlay is assumed to sit at a fixed position at the bottom of the frame,
/// so this returns the bottom `fraction` of the rows at full width. The start row
/// is `floor(height * (1 - fraction))`.
pub fn text_region(frame: &Frame, fraction: f64) -> RgbImage {
    let height = frame.height();
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        DEFAULT_REGION_FRACTION
    };
    // Small epsilon so 0.8 * 100 lands on row 80, not 79.
    let start = ((height as f64) * (1.0 - fraction) + 1e-9).floor() as u32;
    let start = start.min(height);
    imageops::crop_imm(&frame.image, 0, start, frame.width(), height - start).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn striped_frame(width: u32, height: u32) -> Frame {
        let image = RgbImage::from_fn(width, height, |_, y| Rgb([y as u8, 0, 0]));
        Frame::new(0, image)
    }

    #[test]
    fn crops_bottom_fifth_full_width() {
        let frame = striped_frame(64, 100);
        let region = text_region(&frame, DEFAULT_REGION_FRACTION);
        assert_eq!(region.dimensions(), (64, 20));
        assert_eq!(region.get_pixel(0, 0)[0], 80);
        assert_eq!(region.get_pixel(63, 19)[0], 99);
    }

    #[test]
    fn start_row_truncates() {
        // 0.8 * 7 = 5.6 -> rows 5 and 6
        let frame = striped_frame(4, 7);
        let region = text_region(&frame, DEFAULT_REGION_FRACTION);
        assert_eq!(region.height(), 2);
        assert_eq!(region.get_pixel(0, 0)[0], 5);
    }

    #[test]
    fn empty_frame_gives_empty_region() {
        let frame = Frame::new(0, RgbImage::new(0, 0));
        assert_eq!(text_region(&frame, DEFAULT_REGION_FRACTION).dimensions(), (0, 0));
    }
}
