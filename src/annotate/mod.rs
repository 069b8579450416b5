//! Frame annotation.
//!
//! Each detection gets a green 2-pixel rectangle at its box and a white
//! `Pothole:<confidence>` label whose baseline sits 10 pixels above the box's
//! top-left corner. Drawing is clipped to the frame; a frame with no detections
//! is left untouched.

mod font;

use image::{Rgb, RgbImage};

use crate::detect::Detection;
use crate::frame::Frame;

use font::GLYPH_HEIGHT;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const BOX_THICKNESS: u32 = 2;
/// Gap between the label baseline and the top edge of the box.
pub const LABEL_OFFSET: i64 = 10;
pub const LABEL_SCALE: u32 = 2;

/// Draw every detection onto `frame` in place.
pub fn annotate_frame(frame: &mut Frame, detections: &[Detection]) {
    for detection in detections {
        draw_box(&mut frame.image, detection, BOX_COLOR, BOX_THICKNESS);
        let b = detection.bounding_box;
        let baseline = b.y1 as i64 - LABEL_OFFSET;
        let top = baseline - (GLYPH_HEIGHT * LABEL_SCALE) as i64;
        draw_text(
            &mut frame.image,
            &detection.label(),
            b.x1 as i64,
            top,
            LABEL_SCALE,
            LABEL_COLOR,
        );
    }
}

fn put_clipped(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    image.put_pixel(x as u32, y as u32, color);
}

/// Hollow rectangle, growing inward from the box edges.
fn draw_box(image: &mut RgbImage, detection: &Detection, color: Rgb<u8>, thickness: u32) {
    let b = detection.bounding_box;
    let (x1, y1, x2, y2) = (b.x1 as i64, b.y1 as i64, b.x2 as i64, b.y2 as i64);
    for t in 0..thickness as i64 {
        for x in x1..=x2 {
            put_clipped(image, x, y1 + t, color);
            put_clipped(image, x, y2 - t, color);
        }
        for y in y1..=y2 {
            put_clipped(image, x1 + t, y, color);
            put_clipped(image, x2 - t, y, color);
        }
    }
}

fn draw_text(image: &mut RgbImage, text: &str, left: i64, top: i64, scale: u32, color: Rgb<u8>) {
    let scale = scale.max(1) as i64;
    let advance = (font::GLYPH_WIDTH + font::GLYPH_SPACING) as i64 * scale;
    for (i, c) in text.chars().enumerate() {
        let origin_x = left + i as i64 * advance;
        for (row, bits) in font::glyph(c).iter().enumerate() {
            for col in 0..font::GLYPH_WIDTH as i64 {
                if bits & (1 << (font::GLYPH_WIDTH as i64 - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        put_clipped(
                            image,
                            origin_x + col * scale + dx,
                            top + row as i64 * scale + dy,
                            color,
                        );
                    }
                }
            }
        }
    }
}
