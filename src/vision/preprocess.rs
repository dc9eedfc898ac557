//! Frame normalization for the detection model
//!
//! Converts an RGBA frame into the detector's fixed-size square input: a
//! `[1, 3, S, S]` planar RGB tensor with each channel scaled to [0, 1].

use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbaImage};
use ndarray::Array4;

use crate::capture::VideoFrame;

/// Resize the frame to `input_size` x `input_size` and lay it out as a
/// channel-planar NCHW tensor (all R, then all G, then all B).
pub fn frame_to_tensor(frame: &VideoFrame, input_size: u32) -> Result<Array4<f32>> {
    let img = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .context("frame buffer does not match its dimensions")?;
    let resized = image::imageops::resize(&img, input_size, input_size, FilterType::Triangle);

    let s = input_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, s, s));
    let raw = resized.as_raw();

    for idx in 0..s * s {
        let px = idx * 4;
        tensor[[0, 0, idx / s, idx % s]] = raw[px] as f32 / 255.0;
        tensor[[0, 1, idx / s, idx % s]] = raw[px + 1] as f32 / 255.0;
        tensor[[0, 2, idx / s, idx % s]] = raw[px + 2] as f32 / 255.0;
    }

    Ok(tensor)
}

/// Independent horizontal/vertical factors converting model-input-space
/// coordinates back to display space.
pub fn scale_factors(frame_width: u32, frame_height: u32, input_size: u32) -> (f32, f32) {
    (
        frame_width as f32 / input_size as f32,
        frame_height as f32 / input_size as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        VideoFrame::new(data, width, height)
    }

    #[test]
    fn test_tensor_shape_and_range() {
        let frame = solid_frame(8, 6, [255, 128, 0, 255]);
        let tensor = frame_to_tensor(&frame, 4).unwrap();

        assert_eq!(tensor.dim(), (1, 3, 4, 4));
        for v in tensor.iter() {
            assert!((0.0..=1.0).contains(v));
        }
    }

    #[test]
    fn test_planar_channel_layout() {
        let frame = solid_frame(4, 4, [255, 0, 0, 255]);
        let tensor = frame_to_tensor(&frame, 4).unwrap();

        // Red plane saturated, green and blue planes empty
        assert!((tensor[[0, 0, 2, 2]] - 1.0).abs() < 0.01);
        assert!(tensor[[0, 1, 2, 2]].abs() < 0.01);
        assert!(tensor[[0, 2, 2, 2]].abs() < 0.01);
    }

    #[test]
    fn test_mismatched_buffer_is_an_error() {
        let frame = VideoFrame::new(vec![0u8; 7], 4, 4);
        assert!(frame_to_tensor(&frame, 4).is_err());
    }

    #[test]
    fn test_scale_factors() {
        let (sx, sy) = scale_factors(1280, 960, 640);
        assert!((sx - 2.0).abs() < f32::EPSILON);
        assert!((sy - 1.5).abs() < f32::EPSILON);
    }
}
