//! OCR preprocessing for the GPS overlay strip.
//!
//! Steps:
//! 1. Grayscale with BT.601 weights (0.299 R + 0.587 G + 0.114 B)
//! 2. 3x3 Gaussian blur (binomial 1-2-1 kernel, reflect-101 borders) to suppress
//!    compression noise
//! 3. Otsu binarization; pixels strictly above the level become 255, the rest 0.
//!    When the strip has a single intensity Otsu has nothing to separate and the
//!    fixed base threshold is used instead.

use image::{GrayImage, Luma, RgbImage};

/// Fallback threshold when Otsu cannot pick a level.
pub const DEFAULT_BASE_THRESHOLD: u8 = 150;

/// Full preprocessing chain: RGB strip in, binary image out.
pub fn binarize_for_ocr(region: &RgbImage, base_threshold: u8) -> GrayImage {
    let gray = to_gray_bt601(region);
    let blurred = gaussian_blur_3x3(&gray);
    let level = otsu_level(&blurred).unwrap_or(base_threshold);
    threshold(&blurred, level)
}

/// BT.601 luma in 14-bit fixed point, rounded to nearest.
pub fn to_gray_bt601(image: &RgbImage) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = (r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14;
        Luma([luma as u8])
    })
}

/// Reflect-101 index: -1 -> 1, len -> len - 2.
fn reflect_101(i: i64, len: u32) -> u32 {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    let idx = if i < 0 {
        -i
    } else if i >= len {
        2 * len - i - 2
    } else {
        i
    };
    idx as u32
}

/// Separable 3x3 Gaussian blur with kernel `[1, 2, 1] / 4` in each direction.
pub fn gaussian_blur_3x3(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    // Horizontal pass keeps the unnormalized sum (max 4 * 255).
    let mut horizontal = vec![0u16; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let left = image.get_pixel(reflect_101(x as i64 - 1, width), y)[0] as u16;
            let mid = image.get_pixel(x, y)[0] as u16;
            let right = image.get_pixel(reflect_101(x as i64 + 1, width), y)[0] as u16;
            horizontal[(y * width + x) as usize] = left + 2 * mid + right;
        }
    }

    let at = |x: u32, y: u32| horizontal[(y * width + x) as usize] as u32;
    GrayImage::from_fn(width, height, |x, y| {
        let up = at(x, reflect_101(y as i64 - 1, height));
        let mid = at(x, y);
        let down = at(x, reflect_101(y as i64 + 1, height));
        let sum = up + 2 * mid + down;
        Luma([((sum + 8) / 16) as u8])
    })
}

/// Otsu's between-class variance maximizer.
///
/// Returns `None` for empty images and for images where every pixel has the
/// same value.
pub fn otsu_level(image: &GrayImage) -> Option<u8> {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return None;
    }
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut weight_bg = 0u64;
    let mut sum_bg = 0f64;
    let mut best: Option<(u8, f64)> = None;

    for (level, &count) in histogram.iter().enumerate() {
        weight_bg += count;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        sum_bg += level as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let between = weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg).powi(2);
        if best.map_or(true, |(_, v)| between > v) {
            best = Some((level as u8, between));
        }
    }

    best.map(|(level, _)| level)
}

/// Binary threshold: `> level` becomes 255, everything else 0.
pub fn threshold(image: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn grayscale_uses_bt601_weights() {
        let img = RgbImage::from_fn(4, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            2 => Rgb([0, 0, 255]),
            _ => Rgb([255, 255, 255]),
        });
        let gray = to_gray_bt601(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 29);
        assert_eq!(gray.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn blur_leaves_flat_image_unchanged() {
        let flat = GrayImage::from_pixel(9, 5, Luma([77]));
        assert_eq!(gaussian_blur_3x3(&flat), flat);
    }

    #[test]
    fn blur_spreads_a_single_bright_pixel() {
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(2, 2, Luma([160]));
        let out = gaussian_blur_3x3(&img);
        assert_eq!(out.get_pixel(2, 2)[0], 40); // 160 * 4 / 16
        assert_eq!(out.get_pixel(1, 2)[0], 20); // 160 * 2 / 16
        assert_eq!(out.get_pixel(1, 1)[0], 10); // 160 * 1 / 16
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn blur_handles_single_pixel_rows() {
        let img = GrayImage::from_pixel(1, 3, Luma([200]));
        assert_eq!(gaussian_blur_3x3(&img), img);
    }

    #[test]
    fn otsu_separates_bimodal_histogram() {
        let img = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([20]) } else { Luma([220]) });
        let level = otsu_level(&img).unwrap();
        assert!((20..220).contains(&level));
        let bin = threshold(&img, level);
        assert_eq!(bin.get_pixel(0, 0)[0], 0);
        assert_eq!(bin.get_pixel(9, 0)[0], 255);
    }

    #[test]
    fn otsu_has_no_level_for_flat_image() {
        assert_eq!(otsu_level(&GrayImage::from_pixel(4, 4, Luma([90]))), None);
        assert_eq!(otsu_level(&GrayImage::new(0, 0)), None);
    }

    #[test]
    fn flat_strip_falls_back_to_base_threshold() {
        let bright = RgbImage::from_pixel(8, 4, Rgb([200, 200, 200]));
        let dark = RgbImage::from_pixel(8, 4, Rgb([100, 100, 100]));
        assert!(binarize_for_ocr(&bright, DEFAULT_BASE_THRESHOLD)
            .pixels()
            .all(|p| p[0] == 255));
        assert!(binarize_for_ocr(&dark, DEFAULT_BASE_THRESHOLD)
            .pixels()
            .all(|p| p[0] == 0));
    }

    #[test]
    fn binary_output_only_has_two_values() {
        let strip = RgbImage::from_fn(32, 8, |x, y| Rgb([(x * 8) as u8, (y * 30) as u8, 90]));
        let bin = binarize_for_ocr(&strip, DEFAULT_BASE_THRESHOLD);
        assert_eq!(bin.dimensions(), (32, 8));
        assert!(bin.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }
}
