//! vidocr - Video text detection
//!
//! Runs OCR on every frame of an uploaded video, draws the detected text
//! regions onto a copy of the video and collects the recognized text.

mod annotate;
mod config;
mod dashboard;
mod storage;
mod video;
mod vision;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::annotate::load_label_font;
use crate::config::AppConfig;
use crate::video::{default_backend, PipelineOutput, VideoPipeline};
use crate::vision::{ModelManager, OcrCapability, PaddleOcr};

/// vidocr - detect and annotate text in videos
#[derive(Parser, Debug)]
#[command(name = "vidocr", version)]
#[command(about = "Runs OCR on every video frame and writes an annotated copy")]
struct Args {
    /// Process this video without opening the dashboard
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for the annotated output (overrides the config file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the headless result as JSON
    #[arg(long, requires = "input")]
    json: bool,

    /// Configuration file (default: platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Download the OCR models and exit
    #[arg(long)]
    download_models: bool,

    /// Ignore detections below this confidence (0.0 - 1.0)
    #[arg(long)]
    min_confidence: Option<f32>,
}

/// Headless result document
#[derive(Serialize)]
struct JsonReport<'a> {
    output_path: &'a Path,
    width: u32,
    height: u32,
    fps: f64,
    frames: u64,
    text: String,
    frame_text: &'a [String],
}

impl<'a> JsonReport<'a> {
    fn new(output: &'a PipelineOutput) -> Self {
        Self {
            output_path: &output.output_path,
            width: output.input.width,
            height: output.input.height,
            fps: output.input.frame_rate.as_f64(),
            frames: output.frames_written,
            text: output.report.text(),
            frame_text: output.report.frames(),
        }
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()) {
        error!("{:#}", e);
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => storage::default_config_path().ok(),
    };
    let mut config = load_or_default_config(config_path.as_deref(), args.config.is_some())?;

    if let Some(dir) = &args.output_dir {
        config.video.output_dir = Some(dir.clone());
    }
    if let Some(min_confidence) = args.min_confidence {
        config.ocr.min_confidence = min_confidence;
    }
    config.validate().context("Invalid settings")?;

    if args.download_models {
        let manager = match &config.ocr.models_dir {
            Some(dir) => ModelManager::with_dir(dir.clone(), config.ocr.language)?,
            None => ModelManager::new(config.ocr.language)?,
        };
        if manager.are_models_ready() {
            info!("Models already present");
        }
        manager.ensure_all_models()?;
        println!("Models ready in {}", manager.models_dir().display());
        return Ok(());
    }

    info!("vidocr starting...");

    let ocr: Arc<dyn OcrCapability> =
        Arc::new(PaddleOcr::from_settings(&config.ocr).context("Failed to initialize OCR")?);
    let backend = default_backend();
    let font = load_label_font(config.annotation.font_path.as_deref());

    match &args.input {
        Some(input) => run_headless(input, ocr, backend, font, &config, args.json),
        None => {
            info!("Running in dashboard mode");
            dashboard::run_dashboard(ocr, backend, font, config, config_path)
                .map_err(|e| anyhow::anyhow!("Dashboard error: {}", e))
        }
    }
}

/// Load configuration from file, or defaults when there is none.
///
/// An explicitly requested file must load; the default file falls back to
/// defaults with a warning.
fn load_or_default_config(path: Option<&Path>, explicit: bool) -> Result<AppConfig> {
    let Some(path) = path else {
        info!("Using default configuration");
        return Ok(AppConfig::default());
    };

    if !path.exists() {
        if explicit {
            anyhow::bail!("Config file {:?} not found", path);
        }
        info!("Using default configuration");
        return Ok(AppConfig::default());
    }

    match config::load_config(path) {
        Ok(config) => {
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        }
        Err(e) if !explicit => {
            warn!("Ignoring invalid config {:?}: {:#}", path, e);
            Ok(AppConfig::default())
        }
        Err(e) => Err(e.context(format!("Failed to load config {:?}", path))),
    }
}

/// Stage, process and print one video
fn run_headless(
    input: &Path,
    ocr: Arc<dyn OcrCapability>,
    backend: Arc<dyn video::VideoBackend>,
    font: Option<ab_glyph::FontArc>,
    config: &AppConfig,
    json: bool,
) -> Result<()> {
    let upload = storage::stage_upload_file(input)
        .with_context(|| format!("Error opening video file. {}", input.display()))?;

    let pipeline = VideoPipeline::from_config(ocr, backend, config, font)?;
    let output = pipeline.process_with_progress(upload.path(), |progress| {
        if progress.frames_done % 100 == 0 {
            info!("{} frames processed", progress.frames_done);
        }
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&JsonReport::new(&output))?);
    } else {
        println!("Annotated video: {}", output.output_path.display());
        println!(
            "{} frames, {}x{} at {}",
            output.frames_written, output.input.width, output.input.height, output.input.frame_rate
        );
        println!();
        println!("{}", output.report.text());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_headless() {
        let args = Args::try_parse_from([
            "vidocr",
            "--input",
            "clip.mp4",
            "--json",
            "--min-confidence",
            "0.5",
        ])
        .unwrap();

        assert_eq!(args.input.as_deref(), Some(Path::new("clip.mp4")));
        assert!(args.json);
        assert_eq!(args.min_confidence, Some(0.5));
    }

    #[test]
    fn test_json_requires_input() {
        assert!(Args::try_parse_from(["vidocr", "--json"]).is_err());
    }

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = load_or_default_config(Some(&path), false).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(load_or_default_config(Some(&path), true).is_err());
    }

    #[test]
    fn test_invalid_default_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ocr]\nbox_threshold = 7.0\n").unwrap();

        assert_eq!(load_or_default_config(Some(&path), false).unwrap(), AppConfig::default());
        assert!(load_or_default_config(Some(&path), true).is_err());
    }

    #[test]
    fn test_json_report_shape() {
        let mut report = video::TextReport::new();
        report.push("HELLO".to_string());
        report.push(String::new());
        let output = PipelineOutput {
            output_path: PathBuf::from("/tmp/vidocr-x.avi"),
            report,
            input: video::VideoProperties {
                width: 640,
                height: 480,
                frame_rate: video::FrameRate::new(30, 1),
                frame_count: Some(2),
            },
            frames_written: 2,
            previews: Default::default(),
        };

        let value = serde_json::to_value(JsonReport::new(&output)).unwrap();
        assert_eq!(value["frames"], 2);
        assert_eq!(value["text"], "HELLO\n");
        assert_eq!(value["frame_text"][0], "HELLO");
        assert_eq!(value["fps"], 30.0);
    }
}
