//! OCR (Optical Character Recognition) module
//!
//! Uses PaddleOCR models via ONNX Runtime: a DBNet detector finds text
//! regions, a CRNN recognizer reads each region, and a greedy CTC decoder turns
//! the recognizer output into text.

use anyhow::{Context, Result};
use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use ndarray::{ArrayView2, Axis, Ix3, Ix4};
use ort::{inputs, value::TensorRef};
use parking_lot::Mutex;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use super::models::{ModelManager, ModelType, OnnxSession};
use super::preprocess::{preprocess_for_detection, preprocess_for_recognition};
use super::{ChannelOrder, Detection, OcrCapability, OcrError, Quad};
use crate::config::OcrSettings;

/// Detection and recognition parameters
#[derive(Debug, Clone)]
pub struct PaddleOcrConfig {
    /// Probability above which a detection-map pixel counts as text
    pub det_threshold: f32,
    /// Minimum mean probability inside a candidate box
    pub box_threshold: f32,
    /// Box expansion factor
    pub unclip_ratio: f32,
    /// Upper bound on contours examined per frame
    pub max_candidates: usize,
    /// Longest image side fed to the detector
    pub max_side_len: u32,
    /// Dilate the binary map before contour extraction
    pub use_dilation: bool,
    /// Recognizer input height
    pub rec_height: u32,
    /// Recognizer input width cap
    pub rec_max_width: u32,
}

impl Default for PaddleOcrConfig {
    fn default() -> Self {
        Self {
            det_threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            max_candidates: 1000,
            max_side_len: 960,
            use_dilation: false,
            rec_height: 48,
            rec_max_width: 1280,
        }
    }
}

impl From<&OcrSettings> for PaddleOcrConfig {
    fn from(settings: &OcrSettings) -> Self {
        Self {
            det_threshold: settings.detection_threshold,
            box_threshold: settings.box_threshold,
            unclip_ratio: settings.unclip_ratio,
            max_side_len: settings.max_side_len,
            ..Self::default()
        }
    }
}

/// OCR engine using PaddleOCR via ONNX Runtime.
///
/// Sessions sit behind mutexes so one engine can be shared by reference.
pub struct PaddleOcr {
    detector: Mutex<OnnxSession>,
    recognizer: Mutex<OnnxSession>,
    /// CTC vocabulary, index 0 is the blank token
    characters: Vec<String>,
    config: PaddleOcrConfig,
}

impl PaddleOcr {
    /// Fetch any missing models and load the engine
    pub fn from_settings(settings: &OcrSettings) -> Result<Self> {
        let manager = match &settings.models_dir {
            Some(dir) => ModelManager::with_dir(dir.clone(), settings.language)?,
            None => ModelManager::new(settings.language)?,
        };
        manager.ensure_all_models()?;

        Self::new(
            &manager.model_path(ModelType::Detection),
            &manager.model_path(ModelType::Recognition),
            &manager.model_path(ModelType::Dictionary),
            settings,
        )
    }

    /// Load the engine from explicit model paths
    pub fn new(
        detection_model: &Path,
        recognition_model: &Path,
        dictionary: &Path,
        settings: &OcrSettings,
    ) -> Result<Self> {
        info!("Initializing PaddleOCR backend");

        let detector = OnnxSession::new(detection_model, settings.use_gpu, settings.intra_threads)?;
        let recognizer = OnnxSession::new(recognition_model, settings.use_gpu, settings.intra_threads)?;

        let content = std::fs::read_to_string(dictionary)
            .with_context(|| format!("Failed to read character dictionary {:?}", dictionary))?;
        let characters = parse_character_dict(&content);

        info!("PaddleOCR initialized ({} symbols)", characters.len());

        Ok(Self {
            detector: Mutex::new(detector),
            recognizer: Mutex::new(recognizer),
            characters,
            config: PaddleOcrConfig::from(settings),
        })
    }

    /// Detection stage: text boxes with their detector scores
    fn detect(&self, image: &RgbImage) -> Result<Vec<(Quad, f32)>, OcrError> {
        let input = preprocess_for_detection(image, self.config.max_side_len);

        let prob_map = {
            let mut detector = self.detector.lock();
            let tensor = TensorRef::from_array_view(&input.tensor)?;
            let outputs = detector.session_mut().run(inputs![tensor])?;
            outputs[0]
                .try_extract_array::<f32>()?
                .into_owned()
                .into_dimensionality::<Ix4>()
                .map_err(|e| OcrError::Decode(format!("detection output shape: {e}")))?
        };

        // [1, 1, H, W] -> [H, W]
        let pred = prob_map.index_axis(Axis(0), 0);
        let pred = pred.index_axis(Axis(0), 0);

        Ok(db_postprocess(
            pred,
            input.scale_x,
            input.scale_y,
            image.dimensions(),
            &self.config,
        ))
    }

    /// Recognition stage for a single region
    fn recognize(&self, image: &RgbImage, quad: &Quad) -> Result<(String, f32), OcrError> {
        let (min_x, min_y, max_x, max_y) = quad.bounds();
        let x = min_x.max(0.0) as u32;
        let y = min_y.max(0.0) as u32;
        let w = ((max_x - min_x).ceil() as u32).max(1);
        let h = ((max_y - min_y).ceil() as u32).max(1);

        let crop = imageops::crop_imm(image, x, y, w, h).to_image();
        let tensor = preprocess_for_recognition(&crop, self.config.rec_height, self.config.rec_max_width);

        let logits = {
            let mut recognizer = self.recognizer.lock();
            let tensor = TensorRef::from_array_view(&tensor)?;
            let outputs = recognizer.session_mut().run(inputs![tensor])?;
            outputs[0]
                .try_extract_array::<f32>()?
                .into_owned()
                .into_dimensionality::<Ix3>()
                .map_err(|e| OcrError::Decode(format!("recognition output shape: {e}")))?
        };

        // [1, T, C] -> [T, C]
        Ok(ctc_decode(logits.index_axis(Axis(0), 0), &self.characters))
    }
}

impl OcrCapability for PaddleOcr {
    /// PaddleOCR models are trained on OpenCV-loaded (BGR) images
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Bgr
    }

    fn read_text(&self, image: &RgbImage) -> Result<Vec<Detection>, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(width, height));
        }

        let start = Instant::now();
        let boxes = self.detect(image)?;

        let mut detections = Vec::with_capacity(boxes.len());
        for (quad, _score) in boxes {
            let (text, confidence) = self.recognize(image, &quad)?;
            if text.trim().is_empty() {
                continue;
            }
            detections.push(Detection {
                quad,
                text,
                confidence,
            });
        }

        debug!(
            "OCR complete in {:?}: {} text regions",
            start.elapsed(),
            detections.len()
        );
        Ok(detections)
    }
}

/// Build the CTC vocabulary: blank first, one symbol per line, space last
pub fn parse_character_dict(content: &str) -> Vec<String> {
    let mut characters = vec![String::new()];
    characters.extend(
        content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string),
    );
    characters.push(" ".to_string());
    characters
}

/// Turn the detector probability map into text boxes in source-image coordinates.
///
/// Threshold, optional dilation, outer contours, box scoring, then a fixed
/// offset expansion ("unclip") of each axis-aligned box. Boxes come back in
/// reading order.
pub fn db_postprocess(
    pred: ArrayView2<f32>,
    scale_x: f32,
    scale_y: f32,
    source_size: (u32, u32),
    config: &PaddleOcrConfig,
) -> Vec<(Quad, f32)> {
    let (map_h, map_w) = pred.dim();
    if map_h == 0 || map_w == 0 {
        return Vec::new();
    }
    let (src_w, src_h) = source_size;

    let mut mask = GrayImage::from_fn(map_w as u32, map_h as u32, |x, y| {
        if pred[[y as usize, x as usize]] > config.det_threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    if config.use_dilation {
        mask = dilate(&mask, Norm::LInf, 1);
    }

    let mut boxes = Vec::new();
    let outer = find_contours::<u32>(&mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && !c.points.is_empty())
        .take(config.max_candidates);

    for contour in outer {
        let (min_x, min_y, max_x, max_y) = contour.points.iter().fold(
            (u32::MAX, u32::MAX, 0u32, 0u32),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        );

        let box_w = (max_x - min_x) as f32;
        let box_h = (max_y - min_y) as f32;
        if box_w.min(box_h) < 3.0 {
            continue;
        }

        let score = mean_score(&pred, min_x as usize, min_y as usize, max_x as usize, max_y as usize);
        if score < config.box_threshold {
            continue;
        }

        let d = unclip_distance(box_w, box_h, config.unclip_ratio);
        let (ex0, ey0, ex1, ey1) = (
            min_x as f32 - d,
            min_y as f32 - d,
            max_x as f32 + d,
            max_y as f32 + d,
        );
        if (ex1 - ex0).min(ey1 - ey0) < 5.0 {
            continue;
        }

        // Back to source coordinates
        let max_src_x = src_w.saturating_sub(1) as f32;
        let max_src_y = src_h.saturating_sub(1) as f32;
        let x0 = (ex0 / scale_x).clamp(0.0, max_src_x);
        let y0 = (ey0 / scale_y).clamp(0.0, max_src_y);
        let x1 = (ex1 / scale_x).clamp(0.0, max_src_x);
        let y1 = (ey1 / scale_y).clamp(0.0, max_src_y);
        if x1 - x0 <= 3.0 || y1 - y0 <= 3.0 {
            continue;
        }

        boxes.push((Quad::from_rect(x0, y0, x1 - x0, y1 - y0), score));
    }

    sort_reading_order(&mut boxes);
    boxes
}

/// Mean probability inside an inclusive pixel rectangle
fn mean_score(pred: &ArrayView2<f32>, x0: usize, y0: usize, x1: usize, y1: usize) -> f32 {
    let (h, w) = pred.dim();
    let (x1, y1) = (x1.min(w - 1), y1.min(h - 1));
    let region = pred.slice(ndarray::s![y0..=y1, x0..=x1]);
    region.mean().unwrap_or(0.0)
}

/// Offset distance that grows a box by `ratio` times its area/perimeter
fn unclip_distance(width: f32, height: f32, ratio: f32) -> f32 {
    let perimeter = 2.0 * (width + height);
    if perimeter <= 0.0 {
        return 0.0;
    }
    width * height * ratio / perimeter
}

/// Top-to-bottom, then left-to-right for boxes within 10px vertically
fn sort_reading_order(boxes: &mut [(Quad, f32)]) {
    boxes.sort_by(|a, b| {
        let (pa, pb) = (a.0.corner(0), b.0.corner(0));
        pa.y.total_cmp(&pb.y).then(pa.x.total_cmp(&pb.x))
    });

    for i in 1..boxes.len() {
        let mut j = i;
        while j > 0 {
            let (prev, cur) = (boxes[j - 1].0.corner(0), boxes[j].0.corner(0));
            if (cur.y - prev.y).abs() < 10.0 && cur.x < prev.x {
                boxes.swap(j - 1, j);
                j -= 1;
            } else {
                break;
            }
        }
    }
}

/// Greedy CTC decode: argmax per step, collapse repeats, drop blanks.
/// Returns the text and the mean probability of the kept symbols.
pub fn ctc_decode(preds: ArrayView2<f32>, characters: &[String]) -> (String, f32) {
    let mut text = String::new();
    let mut confidences = Vec::new();
    let mut previous = None;

    for row in preds.rows() {
        let Some((index, &prob)) = row
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        let repeated = previous == Some(index);
        previous = Some(index);
        if index == 0 || repeated {
            continue;
        }

        if let Some(symbol) = characters.get(index) {
            text.push_str(symbol);
            confidences.push(prob);
        }
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    (text, confidence)
}
