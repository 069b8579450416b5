//! Decoded video frames.
//!
//! A `Frame` is owned by the pipeline driver for exactly one iteration: it is read
//! from the source, borrowed by the detector and the text-region locator, mutated
//! by the annotator, written to the sink, then dropped.

use image::RgbImage;

/// A single decoded RGB frame and its position in the source stream.
pub struct Frame {
    /// Zero-based sequence position within the video.
    pub index: u64,
    /// Packed RGB8 pixels.
    pub image: RgbImage,
}

// Explicitly NOT implementing Clone: frames move through the pipeline, they are
// not duplicated.

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw RGB bytes, row-major, no padding.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never dump pixel data into logs.
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn frame_reports_dimensions() {
        let frame = Frame::new(3, RgbImage::from_pixel(64, 48, Rgb([1, 2, 3])));
        assert_eq!(frame.index, 3);
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.pixels().len(), 64 * 48 * 3);
    }

    #[test]
    fn debug_output_omits_pixels() {
        let frame = Frame::new(0, RgbImage::new(4, 4));
        let rendered = format!("{:?}", frame);
        assert_eq!(rendered, "Frame { index: 0, width: 4, height: 4 }");
    }
}
