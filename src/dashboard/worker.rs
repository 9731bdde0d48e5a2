//! Background processing job
//!
//! Runs one pipeline on a worker thread and reports back over a channel so the
//! UI thread never blocks on decoding or OCR.

use crossbeam_channel::{unbounded, Receiver};
use image::RgbImage;
use std::thread::JoinHandle;
use tracing::{error, info};

use crate::storage::StagedUpload;
use crate::video::{PipelineOutput, Progress, VideoPipeline};

/// Messages from the worker to the UI
#[derive(Debug)]
pub enum JobEvent {
    /// First frame of the upload, sent before any annotation
    Original(RgbImage),
    Progress(Progress),
    Finished(Result<PipelineOutput, String>),
}

/// A running pipeline job
pub struct ProcessingJob {
    events: Receiver<JobEvent>,
    handle: Option<JoinHandle<()>>,
}

impl ProcessingJob {
    /// Start processing `upload`. The staged copy is deleted when the job ends.
    pub fn spawn(pipeline: VideoPipeline, upload: StagedUpload, ctx: egui::Context) -> Self {
        let (tx, events) = unbounded();

        let handle = std::thread::spawn(move || {
            info!("Processing job started for '{}'", upload.original_name());

            if let Some(image) = pipeline.first_frame(upload.path()) {
                let _ = tx.send(JobEvent::Original(image));
                ctx.request_repaint();
            }

            let progress_tx = tx.clone();
            let progress_ctx = ctx.clone();
            let result = pipeline
                .process_with_progress(upload.path(), move |progress| {
                    let _ = progress_tx.send(JobEvent::Progress(progress));
                    progress_ctx.request_repaint();
                })
                .map_err(|e| {
                    error!("Processing '{}' failed: {}", upload.original_name(), e);
                    e.to_string()
                });

            drop(upload);
            let _ = tx.send(JobEvent::Finished(result));
            ctx.request_repaint();
        });

        Self {
            events,
            handle: Some(handle),
        }
    }

    /// Events received since the last poll
    pub fn poll(&mut self) -> Vec<JobEvent> {
        let events: Vec<JobEvent> = self.events.try_iter().collect();

        // A worker that died without reporting is surfaced as a failure
        let finished = events.iter().any(|e| matches!(e, JobEvent::Finished(_)));
        let dead = self.handle.as_ref().is_some_and(|h| h.is_finished());
        if dead && !finished && self.events.is_empty() {
            if let Some(handle) = self.handle.take() {
                if handle.join().is_err() {
                    let mut events = events;
                    events.push(JobEvent::Finished(Err(
                        "Error processing video: worker thread panicked".to_string(),
                    )));
                    return events;
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{AnnotationStyle, FrameAnnotator};
    use crate::storage::stage_upload_bytes;
    use crate::testing::{shaded_frames, MemoryBackend, ScriptedOcr};
    use crate::video::OutputOptions;
    use crate::vision::{ChannelOrder, OcrError};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn run_to_completion(mut job: ProcessingJob) -> Vec<JobEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            events.extend(job.poll());
            if events.iter().any(|e| matches!(e, JobEvent::Finished(_))) {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        events
    }

    fn memory_pipeline(ocr: ScriptedOcr, frames: u64, output_dir: &std::path::Path) -> VideoPipeline {
        let annotator = FrameAnnotator::new(Arc::new(ocr), AnnotationStyle::default());
        VideoPipeline::new(
            annotator,
            Arc::new(MemoryBackend::new(shaded_frames(frames, 8, 8))),
            OutputOptions::default(),
            output_dir.to_path_buf(),
        )
    }

    #[test]
    fn test_job_reports_progress_then_result() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = memory_pipeline(ScriptedOcr::new(ChannelOrder::Rgb), 2, dir.path());
        let upload = stage_upload_bytes("clip.mp4", b"bytes").unwrap();
        let staged = upload.path().to_path_buf();

        let events = run_to_completion(ProcessingJob::spawn(
            pipeline,
            upload,
            egui::Context::default(),
        ));

        assert!(matches!(events.first(), Some(JobEvent::Original(_))));
        let progress = events
            .iter()
            .filter(|e| matches!(e, JobEvent::Progress(_)))
            .count();
        assert_eq!(progress, 2);
        match events.last() {
            Some(JobEvent::Finished(Ok(output))) => assert_eq!(output.frames_written, 2),
            other => panic!("unexpected final event: {:?}", other),
        }
        assert!(!staged.exists(), "staged upload removed after the job");
    }

    #[test]
    fn test_failed_job_still_delivers_original_frame() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = ScriptedOcr::new(ChannelOrder::Rgb).then(Err(OcrError::Inference("boom".to_string())));
        let pipeline = memory_pipeline(ocr, 3, dir.path());
        let upload = stage_upload_bytes("clip.mp4", b"bytes").unwrap();

        let events = run_to_completion(ProcessingJob::spawn(
            pipeline,
            upload,
            egui::Context::default(),
        ));

        match events.first() {
            Some(JobEvent::Original(image)) => assert_eq!(image.dimensions(), (8, 8)),
            other => panic!("expected the original frame first, got {:?}", other),
        }
        match events.last() {
            Some(JobEvent::Finished(Err(message))) => {
                assert!(message.starts_with("Error processing video: "))
            }
            other => panic!("unexpected final event: {:?}", other),
        }
    }
}
