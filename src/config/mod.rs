//! Application Configuration
//!
//! OCR, annotation and video output settings stored in TOML format.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// OCR engine settings
    pub ocr: OcrSettings,
    /// Box and label drawing settings
    pub annotation: AnnotationSettings,
    /// Output video settings
    pub video: VideoSettings,
    /// Dashboard preferences
    pub dashboard: DashboardSettings,
}

impl AppConfig {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ocr.detection_threshold) {
            bail!("ocr.detection_threshold must be within 0.0..=1.0");
        }
        if !(0.0..=1.0).contains(&self.ocr.box_threshold) {
            bail!("ocr.box_threshold must be within 0.0..=1.0");
        }
        if !(0.0..=1.0).contains(&self.ocr.min_confidence) {
            bail!("ocr.min_confidence must be within 0.0..=1.0");
        }
        if self.ocr.unclip_ratio <= 0.0 {
            bail!("ocr.unclip_ratio must be positive");
        }
        if self.ocr.max_side_len < 32 {
            bail!("ocr.max_side_len must be at least 32");
        }
        if self.annotation.thickness == 0 {
            bail!("annotation.thickness must be at least 1");
        }
        if self.annotation.label_height <= 0.0 {
            bail!("annotation.label_height must be positive");
        }
        crate::video::FourCc::parse(&self.video.fourcc)?;
        Ok(())
    }
}

/// Recognition language. The recognition model and dictionary are chosen per language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrLanguage {
    #[default]
    #[serde(rename = "en")]
    English,
}

/// OCR engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Fixed recognition language
    pub language: OcrLanguage,
    /// Probability above which a detection-map pixel counts as text
    pub detection_threshold: f32,
    /// Minimum mean probability for a candidate box to be kept
    pub box_threshold: f32,
    /// Box expansion factor applied after detection
    pub unclip_ratio: f32,
    /// Detections below this recognition confidence are dropped
    pub min_confidence: f32,
    /// Try a GPU execution provider
    pub use_gpu: bool,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
    /// Longest image side fed to the detection model
    pub max_side_len: u32,
    /// Override for the model cache directory
    pub models_dir: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: OcrLanguage::English,
            detection_threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            min_confidence: 0.0,
            use_gpu: false,
            intra_threads: 4,
            max_side_len: 960,
            models_dir: None,
        }
    }
}

/// Box and label drawing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSettings {
    /// Box and label color as RGB
    pub color: [u8; 3],
    /// Rectangle line thickness in pixels
    pub thickness: u32,
    /// Label glyph height in pixels
    pub label_height: f32,
    /// Gap between the label baseline and the top of the box
    pub label_offset: i32,
    /// TrueType/OpenType font for labels (system fonts are searched when unset)
    pub font_path: Option<PathBuf>,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            color: [0, 255, 0],
            thickness: 2,
            label_height: 22.0,
            label_offset: 10,
            font_path: None,
        }
    }
}

/// Output video settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Four-character codec identifier written into the output container
    pub fourcc: String,
    /// Target bitrate of the annotated output
    pub bitrate_kbps: u32,
    /// Where annotated videos are written (system temp dir when unset)
    pub output_dir: Option<PathBuf>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            fourcc: "XVID".to_string(),
            bitrate_kbps: 4000,
            output_dir: None,
        }
    }
}

impl VideoSettings {
    /// Resolved output directory
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Persistable dashboard view selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardViewSetting {
    #[default]
    Process,
    Settings,
}

/// Dashboard preferences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// View shown on startup
    pub last_view: DashboardViewSetting,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
