//! Frame Annotation
//!
//! Runs OCR on one frame, draws a box and a text label per detection and
//! collects the recognized strings.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::video::VideoFrame;
use crate::vision::{swap_red_blue, ChannelOrder, Detection, OcrCapability, OcrError};

/// Fonts tried when no font is configured
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Annotation errors
#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("malformed detection #{index}: non-finite coordinates")]
    MalformedDetection { index: usize },

    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height} RGB")]
    Conversion {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// How boxes and labels are drawn
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationStyle {
    pub color: Rgb<u8>,
    pub thickness: u32,
    pub label_height: f32,
    /// Upward gap between the box's top edge and the label baseline
    pub label_offset: i32,
    /// Detections below this confidence are ignored
    pub min_confidence: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: Rgb([0, 255, 0]),
            thickness: 2,
            label_height: 22.0,
            label_offset: 10,
            min_confidence: 0.0,
        }
    }
}

impl From<&AppConfig> for AnnotationStyle {
    fn from(config: &AppConfig) -> Self {
        Self {
            color: Rgb(config.annotation.color),
            thickness: config.annotation.thickness.max(1),
            label_height: config.annotation.label_height,
            label_offset: config.annotation.label_offset,
            min_confidence: config.ocr.min_confidence,
        }
    }
}

/// A frame after annotation
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub frame: VideoFrame,
    /// Detected strings joined with newlines, empty without detections
    pub text: String,
    pub detections: Vec<Detection>,
}

/// Load the label font from `configured`, falling back to common system fonts.
///
/// Returns `None` (labels are skipped) when nothing loads.
pub fn load_label_font(configured: Option<&Path>) -> Option<FontArc> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONT_PATHS.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        match FontArc::try_from_vec(bytes) {
            Ok(font) => {
                debug!("Using label font {:?}", path);
                return Some(font);
            }
            Err(e) => warn!("Ignoring unreadable font {:?}: {}", path, e),
        }
    }

    warn!("No label font found; text labels will not be drawn");
    None
}

/// Annotates frames with a shared OCR capability
pub struct FrameAnnotator {
    ocr: Arc<dyn OcrCapability>,
    style: AnnotationStyle,
    font: Option<FontArc>,
}

impl FrameAnnotator {
    pub fn new(ocr: Arc<dyn OcrCapability>, style: AnnotationStyle) -> Self {
        Self {
            ocr,
            style,
            font: None,
        }
    }

    pub fn with_font(mut self, font: Option<FontArc>) -> Self {
        self.font = font;
        self
    }

    /// OCR one RGB frame and draw its detections
    pub fn annotate(&self, frame: VideoFrame) -> Result<AnnotatedFrame, AnnotateError> {
        let index = frame.index;
        let (width, height) = frame.dimensions();
        let expected = frame.expected_len();
        let actual = frame.data.len();
        let conversion = AnnotateError::Conversion {
            width,
            height,
            expected,
            actual,
        };
        if expected == 0 || expected != actual {
            return Err(conversion);
        }
        let mut image = frame.into_image().ok_or(conversion)?;

        let swap = self.ocr.channel_order() == ChannelOrder::Bgr;
        if swap {
            swap_red_blue(&mut image);
        }
        let result = self.ocr.read_text(&image);
        if swap {
            swap_red_blue(&mut image);
        }

        let detections: Vec<Detection> = result?
            .into_iter()
            .filter(|d| d.confidence >= self.style.min_confidence)
            .collect();

        if let Some(bad) = detections.iter().position(|d| !d.quad.is_finite()) {
            return Err(AnnotateError::MalformedDetection { index: bad });
        }

        for detection in &detections {
            self.draw_detection(&mut image, detection);
        }

        let text = detections
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(AnnotatedFrame {
            frame: VideoFrame::from_image(image, index),
            text,
            detections,
        })
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
        let (frame_width, frame_height) = image.dimensions();
        let thickness = self.style.thickness.clamp(1, frame_width.max(frame_height));

        // Nothing beyond one stroke outside the frame is visible
        let pad = thickness as f32;
        let clamp = |v: f32, limit: u32| v.clamp(-pad, limit as f32 + pad).round() as i32;

        // Opposite corners of the quad define the rectangle
        let (a, c) = (detection.quad.corner(0), detection.quad.corner(2));
        let left = clamp(a.x.min(c.x), frame_width);
        let top = clamp(a.y.min(c.y), frame_height);
        let right = clamp(a.x.max(c.x), frame_width);
        let bottom = clamp(a.y.max(c.y), frame_height);

        for grow in 0..thickness as i32 {
            let width = (right - left + 1 + 2 * grow) as u32;
            let height = (bottom - top + 1 + 2 * grow) as u32;
            let rect = Rect::at(left - grow, top - grow).of_size(width.max(1), height.max(1));
            draw_hollow_rect_mut(image, rect, self.style.color);
        }

        if let Some(font) = &self.font {
            let label_height = self.style.label_height.round() as i32;
            let label_top = top
                .saturating_sub(self.style.label_offset)
                .saturating_sub(label_height);
            if label_top <= -label_height || label_top >= frame_height as i32 {
                return;
            }
            draw_text_mut(
                image,
                self.style.color,
                left,
                label_top,
                PxScale::from(self.style.label_height),
                font,
                &detection.text,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{detection, MarkerOcr, ScriptedOcr};
    use crate::vision::{Point, Quad};

    fn black_frame(width: u32, height: u32) -> VideoFrame {
        VideoFrame::from_image(RgbImage::new(width, height), 0)
    }

    fn annotator(ocr: impl OcrCapability + 'static) -> FrameAnnotator {
        FrameAnnotator::new(Arc::new(ocr), AnnotationStyle::default())
    }

    #[test]
    fn test_known_word_is_found_and_boxed() {
        let marker = Rgb([255, 255, 255]);
        let mut image = RgbImage::new(200, 100);
        for x in 60..120 {
            for y in 40..55 {
                image.put_pixel(x, y, marker);
            }
        }
        let ocr = MarkerOcr {
            marker,
            word: "HELLO".to_string(),
        };

        let result = annotator(ocr)
            .annotate(VideoFrame::from_image(image, 3))
            .unwrap();

        assert_eq!(result.text, "HELLO");
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.frame.index, 3);

        let out = result.frame.into_image().unwrap();
        let green = Rgb([0, 255, 0]);
        // Box edges surround the word
        assert_eq!(*out.get_pixel(60, 40), green);
        assert_eq!(*out.get_pixel(119, 54), green);
        assert_eq!(*out.get_pixel(90, 39), green);
        assert_eq!(*out.get_pixel(90, 55), green);
        // Inside stays untouched
        assert_eq!(*out.get_pixel(90, 47), marker);
    }

    #[test]
    fn test_no_detections_leaves_frame_unchanged() {
        let frame = VideoFrame::from_image(RgbImage::from_pixel(16, 16, Rgb([9, 8, 7])), 0);
        let original = frame.clone();

        let result = annotator(ScriptedOcr::new(ChannelOrder::Rgb))
            .annotate(frame)
            .unwrap();

        assert!(result.text.is_empty());
        assert!(result.detections.is_empty());
        assert_eq!(result.frame, original);
    }

    #[test]
    fn test_text_joined_in_detection_order() {
        let ocr = ScriptedOcr::new(ChannelOrder::Rgb).then(Ok(vec![
            detection(1.0, 1.0, 5.0, 5.0, "first", 0.9),
            detection(20.0, 1.0, 5.0, 5.0, "second", 0.8),
        ]));

        let result = annotator(ocr).annotate(black_frame(32, 32)).unwrap();
        assert_eq!(result.text, "first\nsecond");
    }

    #[test]
    fn test_min_confidence_filters_detections() {
        let ocr = ScriptedOcr::new(ChannelOrder::Rgb).then(Ok(vec![
            detection(1.0, 1.0, 5.0, 5.0, "keep", 0.9),
            detection(20.0, 1.0, 5.0, 5.0, "drop", 0.2),
        ]));
        let style = AnnotationStyle {
            min_confidence: 0.5,
            ..AnnotationStyle::default()
        };

        let result = FrameAnnotator::new(Arc::new(ocr), style)
            .annotate(black_frame(32, 32))
            .unwrap();
        assert_eq!(result.text, "keep");
        assert_eq!(result.detections.len(), 1);
    }

    #[test]
    fn test_bgr_engine_sees_swapped_channels() {
        let ocr = Arc::new(ScriptedOcr::new(ChannelOrder::Bgr));
        let frame = VideoFrame::from_image(RgbImage::from_pixel(4, 4, Rgb([200, 100, 50])), 0);

        let result = FrameAnnotator::new(ocr.clone(), AnnotationStyle::default())
            .annotate(frame.clone())
            .unwrap();

        assert_eq!(*ocr.seen.lock()[0].get_pixel(0, 0), Rgb([50, 100, 200]));
        assert_eq!(result.frame, frame, "output is back in RGB order");
    }

    #[test]
    fn test_reversed_corners_are_normalized() {
        // Third corner above and left of the first
        let quad = Quad::from_rect(10.0, 10.0, 10.0, 10.0);
        let reversed = Quad([quad.0[2], quad.0[3], quad.0[0], quad.0[1]]);
        let ocr = ScriptedOcr::new(ChannelOrder::Rgb).then(Ok(vec![Detection {
            quad: reversed,
            text: "x".to_string(),
            confidence: 1.0,
        }]));

        let result = annotator(ocr).annotate(black_frame(32, 32)).unwrap();
        let out = result.frame.into_image().unwrap();
        assert_eq!(*out.get_pixel(10, 10), Rgb([0, 255, 0]));
        assert_eq!(*out.get_pixel(20, 20), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_ocr_failure_is_an_error() {
        let ocr = ScriptedOcr::new(ChannelOrder::Rgb)
            .then(Err(OcrError::Inference("session crashed".to_string())));

        let err = annotator(ocr).annotate(black_frame(8, 8)).unwrap_err();
        assert!(matches!(err, AnnotateError::Ocr(_)));
    }

    #[test]
    fn test_non_finite_detection_is_malformed() {
        let mut bad = detection(1.0, 1.0, 2.0, 2.0, "nan", 0.9);
        bad.quad.0[2].x = f32::NAN;
        let ocr = ScriptedOcr::new(ChannelOrder::Rgb)
            .then(Ok(vec![detection(0.0, 0.0, 2.0, 2.0, "ok", 0.9), bad]));

        let err = annotator(ocr).annotate(black_frame(8, 8)).unwrap_err();
        assert!(matches!(err, AnnotateError::MalformedDetection { index: 1 }));
    }

    #[test]
    fn test_detection_far_outside_frame_is_clipped() {
        let wide = Detection {
            quad: Quad::from_rect(-3e9, 4.0, 6e9, 4.0),
            text: "wide".to_string(),
            confidence: 0.9,
        };
        let corner = Detection {
            quad: Quad([
                Point::new(-f32::MAX, -f32::MAX),
                Point::new(8.0, -f32::MAX),
                Point::new(8.0, 8.0),
                Point::new(-f32::MAX, 8.0),
            ]),
            text: "corner".to_string(),
            confidence: 0.9,
        };
        let ocr = ScriptedOcr::new(ChannelOrder::Rgb).then(Ok(vec![wide, corner]));
        let style = AnnotationStyle {
            thickness: 1000,
            ..AnnotationStyle::default()
        };

        let result = FrameAnnotator::new(Arc::new(ocr), style)
            .with_font(load_label_font(None))
            .annotate(black_frame(16, 16))
            .unwrap();

        assert_eq!(result.text, "wide\ncorner");
        let out = result.frame.into_image().unwrap();
        let green = Rgb([0, 255, 0]);
        // Horizontal edges of the wide box cross the whole frame
        assert_eq!(*out.get_pixel(0, 4), green);
        assert_eq!(*out.get_pixel(15, 8), green);
        // Right edge of the corner box
        assert_eq!(*out.get_pixel(8, 0), green);
    }

    #[test]
    fn test_short_buffer_is_conversion_error() {
        let frame = VideoFrame::new(vec![0; 5], 4, 4, 0);

        let err = annotator(ScriptedOcr::new(ChannelOrder::Rgb))
            .annotate(frame)
            .unwrap_err();
        assert!(matches!(
            err,
            AnnotateError::Conversion {
                expected: 48,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_configured_font_falls_back() {
        let fallback = load_label_font(None).is_some();

        let missing = load_label_font(Some(Path::new("/nonexistent/font.ttf")));
        assert_eq!(missing.is_some(), fallback);

        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("broken.ttf");
        std::fs::write(&garbage, b"not a font").unwrap();
        assert_eq!(load_label_font(Some(&garbage)).is_some(), fallback);
    }
}
