//! Crop extraction and enhancement before text recognition
//!
//! Extracts the detected plate region from the frame, then applies the
//! filter chain the recognizer expects: grayscale with a contrast and
//! brightness boost, a second contrast pass, and a fractional upscale when
//! the crop is too small for reliable recognition.

use tracing::debug;

use crate::capture::VideoFrame;
use crate::config::OcrSettings;
use crate::vision::geometry::BBox;

/// A cropped plate region in RGBA layout
#[derive(Debug, Clone)]
pub struct PlateCrop {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Copy the display-space box out of the frame, clamped to frame bounds.
/// Returns `None` when the clamped region has no pixels.
pub fn crop_region(frame: &VideoFrame, bbox: &BBox) -> Option<PlateCrop> {
    if !frame.is_ready() || !bbox.is_valid() {
        return None;
    }

    let x = (bbox.x.max(0.0) as u32).min(frame.width.saturating_sub(1));
    let y = (bbox.y.max(0.0) as u32).min(frame.height.saturating_sub(1));
    let width = (bbox.w as u32).min(frame.width - x);
    let height = (bbox.h as u32).min(frame.height - y);

    if width == 0 || height == 0 {
        return None;
    }

    let src_stride = (frame.width * 4) as usize;
    let dst_stride = (width * 4) as usize;
    let mut data = vec![0u8; dst_stride * height as usize];

    for row in 0..height as usize {
        let src_start = (y as usize + row) * src_stride + x as usize * 4;
        let dst_start = row * dst_stride;
        data[dst_start..dst_start + dst_stride]
            .copy_from_slice(&frame.data[src_start..src_start + dst_stride]);
    }

    Some(PlateCrop {
        data,
        width,
        height,
    })
}

/// Apply the recognition filter chain in place, upscaling afterwards if
/// either dimension is below the configured minimum.
pub fn enhance_for_ocr(crop: &mut PlateCrop, settings: &OcrSettings) {
    apply_grayscale(&mut crop.data);
    apply_contrast(&mut crop.data, settings.contrast_boost);
    apply_brightness(&mut crop.data, settings.brightness_boost);
    // Second contrast pass sharpens the character edges further
    apply_contrast(&mut crop.data, settings.final_contrast);

    if crop.width < settings.min_crop_width || crop.height < settings.min_crop_height {
        let factor = settings.upscale_factor.max(1.0);
        let new_width = ((crop.width as f32 * factor) as u32).max(1);
        let new_height = ((crop.height as f32 * factor) as u32).max(1);
        debug!(
            "Upscaling small crop {}x{} -> {}x{}",
            crop.width, crop.height, new_width, new_height
        );
        crop.data = upscale_bilinear(&crop.data, crop.width, crop.height, new_width, new_height);
        crop.width = new_width;
        crop.height = new_height;
    }
}

/// Convert RGBA to grayscale in place (keeping RGBA layout)
fn apply_grayscale(data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(4) {
        // Standard luminance weights
        let gray =
            (0.299 * chunk[0] as f32 + 0.587 * chunk[1] as f32 + 0.114 * chunk[2] as f32) as u8;
        chunk[0] = gray;
        chunk[1] = gray;
        chunk[2] = gray;
        // Alpha unchanged
    }
}

/// Contrast around the midpoint; factor > 1.0 increases contrast
fn apply_contrast(data: &mut [u8], factor: f32) {
    for chunk in data.chunks_exact_mut(4) {
        for i in 0..3 {
            let val = chunk[i] as f32;
            chunk[i] = ((val - 128.0) * factor + 128.0).clamp(0.0, 255.0) as u8;
        }
    }
}

/// Add a flat brightness delta to the color channels
fn apply_brightness(data: &mut [u8], delta: f32) {
    for chunk in data.chunks_exact_mut(4) {
        for i in 0..3 {
            chunk[i] = (chunk[i] as f32 + delta).clamp(0.0, 255.0) as u8;
        }
    }
}

/// Bilinear upscale of an RGBA buffer to an arbitrary target size
fn upscale_bilinear(
    data: &[u8],
    width: u32,
    height: u32,
    new_width: u32,
    new_height: u32,
) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let nw = new_width as usize;
    let nh = new_height as usize;
    let scale_x = width as f32 / new_width as f32;
    let scale_y = height as f32 / new_height as f32;

    let mut result = vec![0u8; nw * nh * 4];

    for ny in 0..nh {
        for nx in 0..nw {
            let src_x = (nx as f32 * scale_x).min(w as f32 - 1.0);
            let src_y = (ny as f32 * scale_y).min(h as f32 - 1.0);

            let x0 = src_x.floor() as usize;
            let y0 = src_y.floor() as usize;
            let x1 = (x0 + 1).min(w - 1);
            let y1 = (y0 + 1).min(h - 1);

            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            let dst_idx = (ny * nw + nx) * 4;
            for c in 0..4 {
                let p00 = data[(y0 * w + x0) * 4 + c] as f32;
                let p10 = data[(y0 * w + x1) * 4 + c] as f32;
                let p01 = data[(y1 * w + x0) * 4 + c] as f32;
                let p11 = data[(y1 * w + x1) * 4 + c] as f32;

                let top = p00 * (1.0 - fx) + p10 * fx;
                let bottom = p01 * (1.0 - fx) + p11 * fx;
                result[dst_idx + c] = (top * (1.0 - fy) + bottom * fy).clamp(0.0, 255.0) as u8;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_gradient(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 0, 255]);
            }
        }
        VideoFrame::new(data, width, height)
    }

    #[test]
    fn test_crop_region_extracts_expected_pixels() {
        let frame = frame_with_gradient(100, 50);
        let crop = crop_region(&frame, &BBox::new(10.0, 20.0, 30.0, 15.0)).unwrap();

        assert_eq!(crop.width, 30);
        assert_eq!(crop.height, 15);
        // Top-left pixel of the crop comes from frame position (10, 20)
        assert_eq!(crop.data[0], 10);
        assert_eq!(crop.data[1], 20);
    }

    #[test]
    fn test_crop_region_clamps_to_frame() {
        let frame = frame_with_gradient(100, 50);
        let crop = crop_region(&frame, &BBox::new(90.0, 40.0, 50.0, 50.0)).unwrap();
        assert_eq!(crop.width, 10);
        assert_eq!(crop.height, 10);
    }

    #[test]
    fn test_crop_region_degenerate_box() {
        let frame = frame_with_gradient(100, 50);
        assert!(crop_region(&frame, &BBox::new(10.0, 10.0, 0.0, 5.0)).is_none());
        assert!(crop_region(&frame, &BBox::new(f32::NAN, 10.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn test_contrast_midpoint_fixed() {
        let mut data = vec![100, 128, 200, 255];
        apply_contrast(&mut data, 2.0);
        assert_eq!(data[0], 72); // (100-128)*2+128
        assert_eq!(data[1], 128);
        assert_eq!(data[2], 255); // clamped
        assert_eq!(data[3], 255); // alpha untouched
    }

    #[test]
    fn test_grayscale_red_pixel() {
        let mut data = vec![255, 0, 0, 255];
        apply_grayscale(&mut data);
        // 0.299 * 255 = 76
        assert_eq!(&data[..3], &[76, 76, 76]);
    }

    #[test]
    fn test_brightness_clamps() {
        let mut data = vec![250, 10, 128, 255];
        apply_brightness(&mut data, 16.0);
        assert_eq!(data[0], 255);
        assert_eq!(data[1], 26);
        assert_eq!(data[2], 144);
        assert_eq!(data[3], 255);
    }

    #[test]
    fn test_small_crop_is_upscaled() {
        let mut crop = PlateCrop {
            data: vec![128u8; 100 * 40 * 4],
            width: 100,
            height: 40,
        };
        enhance_for_ocr(&mut crop, &OcrSettings::default());

        // 1.8x on both axes
        assert_eq!(crop.width, 180);
        assert_eq!(crop.height, 72);
        assert_eq!(crop.data.len(), 180 * 72 * 4);
    }

    #[test]
    fn test_large_crop_keeps_its_size() {
        let mut crop = PlateCrop {
            data: vec![128u8; 200 * 80 * 4],
            width: 200,
            height: 80,
        };
        enhance_for_ocr(&mut crop, &OcrSettings::default());
        assert_eq!((crop.width, crop.height), (200, 80));
    }

    #[test]
    fn test_upscale_bilinear_dimensions() {
        let data = vec![255u8; 2 * 2 * 4];
        let out = upscale_bilinear(&data, 2, 2, 3, 4);
        assert_eq!(out.len(), 3 * 4 * 4);
        // Solid input stays solid
        assert!(out.iter().all(|&v| v == 255));
    }
}
