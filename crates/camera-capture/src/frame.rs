//! Video frame types

use image::RgbImage;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Timestamp since stream start (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Uniform gray frame
    pub fn blank(width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        let len = (width as usize) * (height as usize) * 3;
        Self::new(vec![128; len], width, height, timestamp_ns, sequence)
    }

    /// Borrow the frame as an `image` buffer (copies the pixels)
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frame_is_uniform_gray() {
        let image = VideoFrame::blank(4, 2, 0, 0).to_rgb_image().unwrap();
        assert_eq!(image.dimensions(), (4, 2));
        assert!(image.pixels().all(|p| p.0 == [128, 128, 128]));
    }

    #[test]
    fn truncated_frame_has_no_image() {
        let frame = VideoFrame::new(vec![0; 5], 4, 2, 0, 0);
        assert!(frame.to_rgb_image().is_none());
    }
}
