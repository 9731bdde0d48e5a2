//! Video processing pipeline
//!
//! Decodes every frame of one input, annotates it and re-encodes it into a
//! fresh output file with the input's geometry and frame rate.

use ab_glyph::FontArc;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    FourCc, FrameSink, FrameSource, OutputOptions, TextReport, VideoBackend, VideoError,
    VideoFrame, VideoProperties,
};
use crate::annotate::{AnnotateError, AnnotationStyle, FrameAnnotator};
use crate::config::AppConfig;
use crate::vision::OcrCapability;

/// Pipeline errors. Displayed messages are shown to the user verbatim.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Error opening video file. {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("Error processing video: frame {index}: {source}")]
    Frame {
        index: u64,
        #[source]
        source: AnnotateError,
    },

    #[error("Error processing video: {0}")]
    Decode(String),

    #[error("Error processing video: {0}")]
    Encode(String),

    #[error("Error processing video: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    fn decode(e: VideoError) -> Self {
        match e {
            VideoError::Io(io) => PipelineError::Io(io),
            other => PipelineError::Decode(other.to_string()),
        }
    }

    fn encode(e: VideoError) -> Self {
        match e {
            VideoError::Io(io) => PipelineError::Io(io),
            other => PipelineError::Encode(other.to_string()),
        }
    }
}

/// Progress after each written frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub frames_done: u64,
    /// Container's frame count, if it reports one
    pub frames_total: Option<u64>,
}

impl Progress {
    /// Completed fraction, when the total is known
    pub fn fraction(&self) -> Option<f32> {
        match self.frames_total {
            Some(total) if total > 0 => Some((self.frames_done as f32 / total as f32).min(1.0)),
            _ => None,
        }
    }
}

/// Representative frames for display
#[derive(Debug, Clone, Default)]
pub struct Previews {
    /// First decoded frame
    pub original: Option<RgbImage>,
    /// First annotated frame that has detections
    pub annotated: Option<RgbImage>,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub output_path: PathBuf,
    pub report: TextReport,
    /// Input (and therefore output) properties
    pub input: VideoProperties,
    pub frames_written: u64,
    pub previews: Previews,
}

/// Frame loop over one video
pub struct VideoPipeline {
    annotator: FrameAnnotator,
    backend: Arc<dyn VideoBackend>,
    options: OutputOptions,
    output_dir: PathBuf,
}

impl VideoPipeline {
    pub fn new(
        annotator: FrameAnnotator,
        backend: Arc<dyn VideoBackend>,
        options: OutputOptions,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            annotator,
            backend,
            options,
            output_dir,
        }
    }

    /// Pipeline for the current settings. `font` is loaded once by the caller.
    pub fn from_config(
        ocr: Arc<dyn OcrCapability>,
        backend: Arc<dyn VideoBackend>,
        config: &AppConfig,
        font: Option<FontArc>,
    ) -> Result<Self, VideoError> {
        let options = OutputOptions {
            fourcc: FourCc::parse(&config.video.fourcc)?,
            bitrate_kbps: config.video.bitrate_kbps,
        };
        let annotator = FrameAnnotator::new(ocr, AnnotationStyle::from(config)).with_font(font);
        Ok(Self::new(annotator, backend, options, config.video.output_dir()))
    }

    /// First decoded frame of `input`, without annotating anything.
    ///
    /// `None` when the input cannot be opened or holds no frames.
    pub fn first_frame(&self, input: &Path) -> Option<RgbImage> {
        let mut source = match self.backend.open_input(input) {
            Ok(source) => source,
            Err(e) => {
                debug!("No first frame for {:?}: {}", input, e);
                return None;
            }
        };
        match source.next_frame() {
            Ok(frame) => frame.and_then(VideoFrame::into_image),
            Err(e) => {
                debug!("No first frame for {:?}: {}", input, e);
                None
            }
        }
    }

    /// Process without progress reporting
    pub fn process(&self, input: &Path) -> Result<PipelineOutput, PipelineError> {
        self.process_with_progress(input, |_| {})
    }

    /// Process `input`, calling `on_progress` after every written frame
    pub fn process_with_progress(
        &self,
        input: &Path,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<PipelineOutput, PipelineError> {
        let start = Instant::now();

        let source = self
            .backend
            .open_input(input)
            .map_err(|e| PipelineError::Open {
                path: input.to_path_buf(),
                reason: e.to_string(),
            })?;
        let properties = *source.properties();
        info!(
            "Opened {:?}: {}x{} at {}, {} frames",
            input,
            properties.width,
            properties.height,
            properties.frame_rate,
            properties
                .frame_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        std::fs::create_dir_all(&self.output_dir)?;
        let output_path = self.output_dir.join(format!("vidocr-{}.avi", Uuid::new_v4()));

        let sink = self
            .backend
            .create_output(&output_path, &properties, &self.options)
            .map_err(PipelineError::encode);
        let sink = match sink {
            Ok(sink) => sink,
            Err(e) => {
                remove_partial_output(&output_path);
                return Err(e);
            }
        };

        match self.run_frames(source, sink, &mut on_progress) {
            Ok((report, frames_written, previews)) => {
                info!(
                    "Wrote {} frames to {:?} in {:?} ({} with text)",
                    frames_written,
                    output_path,
                    start.elapsed(),
                    report.frames_with_text()
                );
                Ok(PipelineOutput {
                    output_path,
                    report,
                    input: properties,
                    frames_written,
                    previews,
                })
            }
            Err(e) => {
                warn!("Processing {:?} failed: {}", input, e);
                remove_partial_output(&output_path);
                Err(e)
            }
        }
    }

    /// Decode-annotate-encode until the source is exhausted.
    /// Source and sink are dropped (files closed) before this returns.
    fn run_frames(
        &self,
        mut source: Box<dyn FrameSource>,
        mut sink: Box<dyn FrameSink>,
        on_progress: &mut dyn FnMut(Progress),
    ) -> Result<(TextReport, u64, Previews), PipelineError> {
        let frames_total = source.properties().frame_count;
        let mut report = TextReport::new();
        let mut previews = Previews::default();
        let mut frames_done = 0u64;

        while let Some(frame) = source.next_frame().map_err(PipelineError::decode)? {
            let frame_start = Instant::now();
            let index = frame.index;

            if previews.original.is_none() {
                previews.original = frame.to_image();
            }

            let annotated = self
                .annotator
                .annotate(frame)
                .map_err(|source| PipelineError::Frame { index, source })?;

            if previews.annotated.is_none() && !annotated.detections.is_empty() {
                previews.annotated = annotated.frame.to_image();
            }

            sink.write_frame(&annotated.frame)
                .map_err(PipelineError::encode)?;
            report.push(annotated.text);
            frames_done += 1;

            debug!(
                "Frame {}: {} detections in {:?}",
                index,
                annotated.detections.len(),
                frame_start.elapsed()
            );
            on_progress(Progress {
                frames_done,
                frames_total,
            });
        }

        let frames_written = sink.finish().map_err(PipelineError::encode)?;
        Ok((report, frames_written, previews))
    }
}

fn remove_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {:?}: {}", path, e),
    }
}
