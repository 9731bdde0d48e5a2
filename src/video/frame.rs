//! Frame data structures for decoded video content

use image::RgbImage;

/// A decoded video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Packed RGB24 pixel data, row-major
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Zero-based position in decode order
    pub index: u64,
}

impl VideoFrame {
    /// Create a new frame
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Self {
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// Wrap an image as frame `index`
    pub fn from_image(image: RgbImage, index: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Byte length a well-formed RGB24 buffer of this size has
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Copy into an image, `None` if the buffer does not match the dimensions
    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Convert into an image without copying, `None` on a size mismatch
    pub fn into_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data)
    }
}
