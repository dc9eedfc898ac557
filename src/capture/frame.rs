//! Frame data structures for captured video content

use std::time::Instant;

/// A single frame from a video source
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when the frame was produced
    pub timestamp: Instant,
}

impl VideoFrame {
    /// Create a new frame
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the frame carries drawable pixels
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() >= (self.width * self.height * 4) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_readiness() {
        let frame = VideoFrame::new(vec![0u8; 2 * 2 * 4], 2, 2);
        assert!(frame.is_ready());
        assert_eq!(frame.dimensions(), (2, 2));

        let empty = VideoFrame::new(Vec::new(), 0, 0);
        assert!(!empty.is_ready());

        let short = VideoFrame::new(vec![0u8; 3], 2, 2);
        assert!(!short.is_ready());
    }
}
