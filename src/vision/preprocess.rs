//! Image preprocessing for OCR models
//!
//! Resizing, normalization and tensor layout for the PaddleOCR detection and
//! recognition models.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array3, Array4};

/// Detection model normalization (ImageNet statistics)
pub const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Recognition model normalization, maps [0, 1] to [-1, 1]
pub const REC_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
pub const REC_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Detection input and the factors that map the model's output back to the source image
#[derive(Debug)]
pub struct DetectionInput {
    /// NCHW tensor, spatial dims padded to multiples of 32
    pub tensor: Array4<f32>,
    /// resized_width / source_width
    pub scale_x: f32,
    /// resized_height / source_height
    pub scale_y: f32,
}

/// Convert an 8-bit image to an HWC float array in [0, 1]
pub fn to_f32_hwc(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
        image.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
    })
}

/// Normalize image with mean and std
pub fn normalize(image: &mut Array3<f32>, mean: &[f32; 3], std: &[f32; 3]) {
    for ((_, _, c), value) in image.indexed_iter_mut() {
        *value = (*value - mean[c]) / std[c];
    }
}

/// Convert HWC image to NCHW tensor (batch size 1)
pub fn hwc_to_nchw(image: &Array3<f32>) -> Array4<f32> {
    let (h, w, c) = image.dim();
    Array4::from_shape_fn((1, c, h, w), |(_, ch, y, x)| image[[y, x, ch]])
}

/// Size the detection model sees: longest side capped at `max_side_len`,
/// both sides rounded to multiples of 32 (minimum 32).
pub fn detection_size(width: u32, height: u32, max_side_len: u32) -> (u32, u32) {
    let longest = width.max(height).max(1);
    let ratio = if longest > max_side_len {
        max_side_len as f32 / longest as f32
    } else {
        1.0
    };

    let round32 = |v: f32| (((v / 32.0).round() as u32) * 32).max(32);
    (round32(width as f32 * ratio), round32(height as f32 * ratio))
}

/// Full preprocessing pipeline for detection
pub fn preprocess_for_detection(image: &RgbImage, max_side_len: u32) -> DetectionInput {
    let (src_w, src_h) = image.dimensions();
    let (det_w, det_h) = detection_size(src_w, src_h, max_side_len);

    let resized = imageops::resize(image, det_w, det_h, FilterType::Triangle);
    let mut hwc = to_f32_hwc(&resized);
    normalize(&mut hwc, &DET_MEAN, &DET_STD);

    DetectionInput {
        tensor: hwc_to_nchw(&hwc),
        scale_x: det_w as f32 / src_w as f32,
        scale_y: det_h as f32 / src_h as f32,
    }
}

/// Full preprocessing pipeline for recognition: fixed height, proportional
/// width capped at `max_width`.
pub fn preprocess_for_recognition(crop: &RgbImage, target_height: u32, max_width: u32) -> Array4<f32> {
    let (w, h) = crop.dimensions();
    let aspect = w.max(1) as f32 / h.max(1) as f32;
    let new_w = ((target_height as f32 * aspect).ceil() as u32).clamp(1, max_width);

    let resized = imageops::resize(crop, new_w, target_height, FilterType::Triangle);
    let mut hwc = to_f32_hwc(&resized);
    normalize(&mut hwc, &REC_MEAN, &REC_STD);
    hwc_to_nchw(&hwc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_to_f32_hwc() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 255, 128]));

        let hwc = to_f32_hwc(&image);

        assert_eq!(hwc.dim(), (1, 2, 3));
        assert!((hwc[[0, 0, 0]] - 1.0).abs() < 0.01);
        assert!(hwc[[0, 0, 1]].abs() < 0.01);
        assert!((hwc[[0, 1, 1]] - 1.0).abs() < 0.01);
        assert!((hwc[[0, 1, 2]] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_hwc_to_nchw() {
        let hwc = Array3::<f32>::from_shape_fn((10, 20, 3), |(h, w, c)| (h * 100 + w * 10 + c) as f32);

        let nchw = hwc_to_nchw(&hwc);

        assert_eq!(nchw.dim(), (1, 3, 10, 20));
        assert_eq!(nchw[[0, 1, 5, 10]], hwc[[5, 10, 1]]);
        assert_eq!(nchw[[0, 2, 9, 19]], hwc[[9, 19, 2]]);
    }

    #[test]
    fn test_normalize() {
        let mut image = Array3::<f32>::from_elem((2, 2, 3), 0.5);

        normalize(&mut image, &DET_MEAN, &DET_STD);

        assert!((image[[0, 0, 0]] - (0.5 - 0.485) / 0.229).abs() < 0.01);
        assert!((image[[1, 1, 2]] - (0.5 - 0.406) / 0.225).abs() < 0.01);
    }

    #[test]
    fn test_detection_size_rounds_to_32() {
        assert_eq!(detection_size(640, 480, 960), (640, 480));
        assert_eq!(detection_size(1920, 1080, 960), (960, 544));
        assert_eq!(detection_size(10, 10, 960), (32, 32));
    }

    #[test]
    fn test_detection_scale_factors() {
        let image = RgbImage::new(100, 50);
        let input = preprocess_for_detection(&image, 960);

        assert_eq!(input.tensor.dim(), (1, 3, 64, 96));
        assert!((input.scale_x - 0.96).abs() < 0.001);
        assert!((input.scale_y - 1.28).abs() < 0.001);
    }

    #[test]
    fn test_recognition_keeps_aspect_ratio() {
        let crop = RgbImage::new(100, 20);
        let tensor = preprocess_for_recognition(&crop, 48, 1280);
        assert_eq!(tensor.dim(), (1, 3, 48, 240));

        let wide = RgbImage::new(2000, 10);
        let tensor = preprocess_for_recognition(&wide, 48, 320);
        assert_eq!(tensor.dim(), (1, 3, 48, 320));
    }
}
