//! Vision/OCR Layer
//!
//! Text detection and recognition on decoded frames. Callers only see the
//! [`OcrCapability`] trait; [`PaddleOcr`] runs PaddleOCR models through
//! ONNX Runtime.

pub mod models;
pub mod ocr;
pub mod preprocess;

pub use models::ModelManager;
pub use ocr::PaddleOcr;

use image::RgbImage;
use thiserror::Error;

/// A point in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Quadrilateral around a text region, clockwise from the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Axis-aligned quad from a rectangle
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    /// Corner by index (0 = top-left, then clockwise)
    pub fn corner(&self, index: usize) -> Point {
        self.0[index % 4]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Enclosing box as (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.0.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }
}

/// One recognized text region
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Region outline
    pub quad: Quad,
    /// Recognized text
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

/// Channel layout an OCR backend expects for three-channel input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Swap the red and blue channels in place. Applying it twice is a no-op.
pub fn swap_red_blue(image: &mut RgbImage) {
    for pixel in image.pixels_mut() {
        pixel.0.swap(0, 2);
    }
}

/// OCR-specific errors
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR inference failed: {0}")]
    Inference(String),

    #[error("failed to decode OCR output: {0}")]
    Decode(String),

    #[error("invalid image dimensions: {0}x{1}")]
    InvalidImage(u32, u32),
}

impl From<ort::Error> for OcrError {
    fn from(e: ort::Error) -> Self {
        OcrError::Inference(e.to_string())
    }
}

/// Text detection + recognition service.
///
/// Implementations are constructed once and shared read-only across every
/// frame of every video, so `read_text` takes `&self`.
pub trait OcrCapability: Send + Sync {
    /// Channel order `read_text` expects its input in
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }

    /// Detect and recognize all text regions in the image
    fn read_text(&self, image: &RgbImage) -> Result<Vec<Detection>, OcrError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_quad_from_rect_corners() {
        let quad = Quad::from_rect(10.0, 20.0, 30.0, 5.0);

        assert_eq!(quad.corner(0), Point::new(10.0, 20.0));
        assert_eq!(quad.corner(2), Point::new(40.0, 25.0));
        assert_eq!(quad.bounds(), (10.0, 20.0, 40.0, 25.0));
    }

    #[test]
    fn test_quad_bounds_of_rotated_box() {
        let quad = Quad([
            Point::new(5.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 5.0),
        ]);

        assert_eq!(quad.bounds(), (0.0, 0.0, 10.0, 10.0));
        assert!(quad.is_finite());
    }

    #[test]
    fn test_non_finite_quad() {
        let mut quad = Quad::from_rect(0.0, 0.0, 1.0, 1.0);
        quad.0[3].y = f32::NAN;
        assert!(!quad.is_finite());
    }

    #[test]
    fn test_swap_red_blue_is_involution() {
        let mut image = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        let original = image.clone();

        swap_red_blue(&mut image);
        assert_eq!(image.get_pixel(1, 1), &Rgb([30, 20, 10]));

        swap_red_blue(&mut image);
        assert_eq!(image, original);
    }
}
