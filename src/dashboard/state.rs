//! Dashboard view state management

use std::path::PathBuf;

use crate::config::DashboardViewSetting;
use crate::video::{PipelineOutput, Progress};

/// Current view in the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardView {
    #[default]
    Process,
    Settings,
}

impl DashboardView {
    pub const ALL: [DashboardView; 2] = [DashboardView::Process, DashboardView::Settings];

    /// Get the display name for this view
    pub fn name(&self) -> &'static str {
        match self {
            DashboardView::Process => "Process",
            DashboardView::Settings => "Settings",
        }
    }

    /// Get the icon character for this view
    pub fn icon(&self) -> &'static str {
        match self {
            DashboardView::Process => "P",
            DashboardView::Settings => "S",
        }
    }

    /// Convert to persistable setting
    pub fn to_setting(&self) -> DashboardViewSetting {
        match self {
            DashboardView::Process => DashboardViewSetting::Process,
            DashboardView::Settings => DashboardViewSetting::Settings,
        }
    }

    /// Convert from persistable setting
    pub fn from_setting(setting: DashboardViewSetting) -> Self {
        match setting {
            DashboardViewSetting::Process => DashboardView::Process,
            DashboardViewSetting::Settings => DashboardView::Settings,
        }
    }
}

/// Overall dashboard state
#[derive(Default)]
pub struct DashboardState {
    /// Current active view
    pub current_view: DashboardView,
    /// Process view state
    pub process: ProcessViewState,
    /// Settings view state
    pub settings: SettingsViewState,
}

/// Where the current upload is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadPhase {
    #[default]
    Idle,
    Uploaded,
    Processing,
    Displayed,
    Errored,
}

impl UploadPhase {
    pub fn label(&self) -> &'static str {
        match self {
            UploadPhase::Idle => "Waiting for upload",
            UploadPhase::Uploaded => "Uploaded",
            UploadPhase::Processing => "Processing",
            UploadPhase::Displayed => "Done",
            UploadPhase::Errored => "Failed",
        }
    }
}

/// File the user supplied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub name: String,
    pub size_bytes: u64,
}

/// Per-upload lifecycle: `Idle -> Uploaded -> Processing -> Displayed | Errored`.
///
/// A new upload from `Displayed` or `Errored` starts a fresh cycle. There is
/// no transition back into `Processing` for the same upload.
#[derive(Debug, Default)]
pub struct UploadSession {
    phase: UploadPhase,
    file: Option<UploadInfo>,
    progress: Option<Progress>,
    output: Option<PipelineOutput>,
    error: Option<String>,
}

impl UploadSession {
    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn file(&self) -> Option<&UploadInfo> {
        self.file.as_ref()
    }

    pub fn progress(&self) -> Option<Progress> {
        self.progress
    }

    pub fn output(&self) -> Option<&PipelineOutput> {
        self.output.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// One-line description of the job, `None` before any upload
    pub fn summary(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        let detail = match self.phase {
            UploadPhase::Idle | UploadPhase::Uploaded => "queued".to_string(),
            UploadPhase::Processing => match self.progress {
                Some(Progress {
                    frames_done,
                    frames_total: Some(total),
                }) => format!("{} / {} frames", frames_done, total),
                Some(progress) => format!("{} frames", progress.frames_done),
                None => "opening".to_string(),
            },
            UploadPhase::Displayed => match &self.output {
                Some(output) => format!(
                    "{} frames, {} with text",
                    output.frames_written,
                    output.report.frames_with_text()
                ),
                None => "done".to_string(),
            },
            UploadPhase::Errored => "see Process view".to_string(),
        };
        Some(format!("{}: {}", file.name, detail))
    }

    /// New uploads are refused while a job runs
    pub fn accepts_upload(&self) -> bool {
        self.phase != UploadPhase::Processing
    }

    /// `Idle | Displayed | Errored -> Uploaded`
    pub fn upload(&mut self, file: UploadInfo) -> bool {
        if !self.accepts_upload() {
            return false;
        }
        *self = Self {
            phase: UploadPhase::Uploaded,
            file: Some(file),
            ..Self::default()
        };
        true
    }

    /// `Uploaded -> Processing`
    pub fn start_processing(&mut self) -> bool {
        if self.phase != UploadPhase::Uploaded {
            return false;
        }
        self.phase = UploadPhase::Processing;
        true
    }

    pub fn report_progress(&mut self, progress: Progress) {
        if self.phase == UploadPhase::Processing {
            self.progress = Some(progress);
        }
    }

    /// `Processing -> Displayed` on success, `Processing -> Errored` otherwise
    pub fn finish(&mut self, result: Result<PipelineOutput, String>) -> bool {
        if self.phase != UploadPhase::Processing {
            return false;
        }
        match result {
            Ok(output) => {
                self.phase = UploadPhase::Displayed;
                self.output = Some(output);
            }
            Err(message) => {
                self.phase = UploadPhase::Errored;
                self.error = Some(message);
            }
        }
        true
    }
}

/// Process view state
#[derive(Default)]
pub struct ProcessViewState {
    /// Current upload
    pub session: UploadSession,
    /// Path typed by the user
    pub path_input: String,
    /// Rejected file message (unsupported type, unreadable file)
    pub rejection: Option<String>,
    /// Staged file path shown under the file info
    pub staged_path: Option<PathBuf>,
    /// First original frame
    pub original_texture: Option<egui::TextureHandle>,
    /// First annotated frame with detections
    pub annotated_texture: Option<egui::TextureHandle>,
}

impl ProcessViewState {
    /// Drop textures belonging to the previous upload
    pub fn clear_previews(&mut self) {
        self.original_texture = None;
        self.annotated_texture = None;
    }
}

/// Settings view state
#[derive(Debug, Default)]
pub struct SettingsViewState {
    /// Currently expanded section
    pub expanded_section: Option<SettingsSection>,
    /// Unsaved changes flag
    pub has_unsaved_changes: bool,
    /// Result of the last save, shown under the buttons
    pub status: Option<Result<String, String>>,
}

/// Settings sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSection {
    Ocr,
    Annotation,
    Output,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{FrameRate, TextReport, VideoProperties};

    fn info() -> UploadInfo {
        UploadInfo {
            name: "clip.mp4".to_string(),
            size_bytes: 1024,
        }
    }

    fn output() -> PipelineOutput {
        PipelineOutput {
            output_path: PathBuf::from("/tmp/vidocr-test.avi"),
            report: TextReport::new(),
            input: VideoProperties {
                width: 8,
                height: 8,
                frame_rate: FrameRate::new(25, 1),
                frame_count: Some(0),
            },
            frames_written: 0,
            previews: Default::default(),
        }
    }

    #[test]
    fn test_view_setting_roundtrip() {
        for view in DashboardView::ALL {
            assert_eq!(DashboardView::from_setting(view.to_setting()), view);
        }
    }

    #[test]
    fn test_successful_cycle() {
        let mut session = UploadSession::default();
        assert_eq!(session.phase(), UploadPhase::Idle);

        assert!(session.upload(info()));
        assert_eq!(session.phase(), UploadPhase::Uploaded);
        assert!(session.start_processing());
        assert!(!session.accepts_upload());

        session.report_progress(Progress {
            frames_done: 1,
            frames_total: Some(2),
        });
        assert_eq!(session.progress().map(|p| p.frames_done), Some(1));

        assert!(session.finish(Ok(output())));
        assert_eq!(session.phase(), UploadPhase::Displayed);
        assert!(session.output().is_some());
        assert!(session.error().is_none());
    }

    #[test]
    fn test_failed_cycle_keeps_file_info() {
        let mut session = UploadSession::default();
        session.upload(info());
        session.start_processing();

        assert!(session.finish(Err("Error opening video file.".to_string())));
        assert_eq!(session.phase(), UploadPhase::Errored);
        assert_eq!(session.error(), Some("Error opening video file."));
        assert!(session.output().is_none());
        assert_eq!(session.file(), Some(&info()));
    }

    #[test]
    fn test_no_retry_transitions() {
        let mut session = UploadSession::default();
        assert!(!session.start_processing(), "nothing uploaded");

        session.upload(info());
        session.start_processing();
        assert!(!session.upload(info()), "busy");
        session.finish(Err("boom".to_string()));

        assert!(!session.start_processing(), "errored upload cannot be reprocessed");
        assert!(!session.finish(Ok(output())));
        assert_eq!(session.phase(), UploadPhase::Errored);
    }

    #[test]
    fn test_new_upload_starts_fresh_cycle() {
        let mut session = UploadSession::default();
        session.upload(info());
        session.start_processing();
        session.finish(Err("boom".to_string()));

        assert!(session.upload(UploadInfo {
            name: "other.avi".to_string(),
            size_bytes: 1,
        }));
        assert_eq!(session.phase(), UploadPhase::Uploaded);
        assert!(session.error().is_none());
        assert!(session.progress().is_none());
    }

    #[test]
    fn test_progress_ignored_outside_processing() {
        let mut session = UploadSession::default();
        session.upload(info());
        session.report_progress(Progress {
            frames_done: 5,
            frames_total: None,
        });
        assert!(session.progress().is_none());
    }

    #[test]
    fn test_summary_follows_the_cycle() {
        let mut session = UploadSession::default();
        assert_eq!(session.summary(), None);

        session.upload(info());
        assert_eq!(session.summary().as_deref(), Some("clip.mp4: queued"));

        session.start_processing();
        assert_eq!(session.summary().as_deref(), Some("clip.mp4: opening"));
        session.report_progress(Progress {
            frames_done: 12,
            frames_total: Some(40),
        });
        assert_eq!(session.summary().as_deref(), Some("clip.mp4: 12 / 40 frames"));
        session.report_progress(Progress {
            frames_done: 13,
            frames_total: None,
        });
        assert_eq!(session.summary().as_deref(), Some("clip.mp4: 13 frames"));

        let mut done = output();
        done.frames_written = 2;
        done.report.push("EXIT".to_string());
        done.report.push(String::new());
        session.finish(Ok(done));
        assert_eq!(
            session.summary().as_deref(),
            Some("clip.mp4: 2 frames, 1 with text")
        );
    }

    #[test]
    fn test_phase_labels_are_distinct() {
        let phases = [
            UploadPhase::Idle,
            UploadPhase::Uploaded,
            UploadPhase::Processing,
            UploadPhase::Displayed,
            UploadPhase::Errored,
        ];
        let labels: std::collections::HashSet<_> = phases.iter().map(|p| p.label()).collect();
        assert_eq!(labels.len(), phases.len());
    }
}
