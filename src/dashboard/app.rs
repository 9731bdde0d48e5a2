//! Dashboard application entry point

use ab_glyph::FontArc;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{self, AppConfig};
use crate::dashboard::components::render_sidebar;
use crate::dashboard::state::{DashboardState, DashboardView, UploadInfo};
use crate::dashboard::theme;
use crate::dashboard::views::{
    render_process_view, render_settings_view, SettingsAction, UploadRequest,
};
use crate::dashboard::worker::{JobEvent, ProcessingJob};
use crate::storage::{self, StagedUpload};
use crate::video::{VideoBackend, VideoPipeline};
use crate::vision::OcrCapability;

/// The main dashboard application
pub struct DashboardApp {
    /// Shared OCR engine
    ocr: Arc<dyn OcrCapability>,
    /// Container access
    backend: Arc<dyn VideoBackend>,
    /// Label font, loaded once
    font: Option<FontArc>,
    /// Live configuration (edited by the settings view)
    config: AppConfig,
    /// Where the settings view saves to
    config_path: Option<PathBuf>,
    /// Dashboard-specific state
    dashboard_state: DashboardState,
    /// Whether theme has been applied
    theme_applied: bool,
    /// Job for the current upload
    job: Option<ProcessingJob>,
}

impl DashboardApp {
    /// Create a new dashboard application
    pub fn new(
        ocr: Arc<dyn OcrCapability>,
        backend: Arc<dyn VideoBackend>,
        font: Option<FontArc>,
        config: AppConfig,
        config_path: Option<PathBuf>,
    ) -> Self {
        let dashboard_state = DashboardState {
            current_view: DashboardView::from_setting(config.dashboard.last_view),
            ..Default::default()
        };
        Self {
            ocr,
            backend,
            font,
            config,
            config_path,
            dashboard_state,
            theme_applied: false,
            job: None,
        }
    }

    /// Create eframe options for the dashboard window
    pub fn options() -> eframe::NativeOptions {
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1100.0, 760.0])
                .with_min_inner_size([800.0, 500.0])
                .with_drag_and_drop(true)
                .with_title("vidocr"),
            ..Default::default()
        }
    }

    /// Stage an upload and start processing it
    fn handle_upload(&mut self, ctx: &egui::Context, request: UploadRequest) {
        let process = &mut self.dashboard_state.process;
        if !process.session.accepts_upload() {
            warn!("Ignoring upload while a video is being processed");
            return;
        }

        let name = match &request {
            UploadRequest::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            UploadRequest::Bytes { name, .. } => name.clone(),
        };
        if !storage::is_supported_video(&name) {
            process.rejection = Some(format!(
                "Unsupported file '{}': expected one of {}",
                name,
                storage::SUPPORTED_VIDEO_EXTENSIONS.join(", ")
            ));
            return;
        }

        let staged = match &request {
            UploadRequest::Path(path) => storage::stage_upload_file(path),
            UploadRequest::Bytes { name, bytes } => storage::stage_upload_bytes(name, bytes),
        };
        let upload = match staged {
            Ok(upload) => upload,
            Err(e) => {
                process.rejection = Some(format!("Could not read '{}': {}", name, e));
                return;
            }
        };

        process.rejection = None;
        process.clear_previews();
        process.staged_path = Some(upload.path().to_path_buf());
        process.session.upload(UploadInfo {
            name: upload.original_name().to_string(),
            size_bytes: upload.size_bytes(),
        });
        info!("Uploaded '{}' ({} bytes)", upload.original_name(), upload.size_bytes());

        self.start_job(ctx, upload);
    }

    /// `Uploaded -> Processing`
    fn start_job(&mut self, ctx: &egui::Context, upload: StagedUpload) {
        let session = &mut self.dashboard_state.process.session;
        if !session.start_processing() {
            return;
        }

        match VideoPipeline::from_config(
            Arc::clone(&self.ocr),
            Arc::clone(&self.backend),
            &self.config,
            self.font.clone(),
        ) {
            Ok(pipeline) => {
                self.job = Some(ProcessingJob::spawn(pipeline, upload, ctx.clone()));
            }
            Err(e) => {
                session.finish(Err(format!("Error processing video: {}", e)));
            }
        }
    }

    /// Apply events from the running job
    fn poll_job(&mut self, ctx: &egui::Context) {
        let Some(job) = self.job.as_mut() else {
            return;
        };

        for event in job.poll() {
            let process = &mut self.dashboard_state.process;
            match event {
                JobEvent::Original(image) => {
                    process.original_texture = Some(load_preview(ctx, "original_preview", &image));
                }
                JobEvent::Progress(progress) => process.session.report_progress(progress),
                JobEvent::Finished(result) => {
                    if let Ok(output) = &result {
                        if process.original_texture.is_none() {
                            process.original_texture = output
                                .previews
                                .original
                                .as_ref()
                                .map(|image| load_preview(ctx, "original_preview", image));
                        }
                        process.annotated_texture = output
                            .previews
                            .annotated
                            .as_ref()
                            .map(|image| load_preview(ctx, "annotated_preview", image));
                    }
                    process.session.finish(result);
                    process.staged_path = None;
                    self.job = None;
                    break;
                }
            }
        }
    }

    /// Files dropped onto the window
    fn take_dropped_file(ctx: &egui::Context) -> Option<UploadRequest> {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let file = dropped.into_iter().next()?;
        match (file.path, file.bytes) {
            (Some(path), _) => Some(UploadRequest::Path(path)),
            (None, Some(bytes)) => Some(UploadRequest::Bytes {
                name: file.name,
                bytes,
            }),
            (None, None) => None,
        }
    }

    fn apply_settings_action(&mut self, action: SettingsAction) {
        match action {
            SettingsAction::Reset => {
                self.config = AppConfig {
                    dashboard: self.config.dashboard.clone(),
                    ..AppConfig::default()
                };
                let settings = &mut self.dashboard_state.settings;
                settings.has_unsaved_changes = true;
                settings.status = None;
            }
            SettingsAction::Save => {
                let status = match self.config.validate() {
                    Ok(()) => self
                        .save_config()
                        .map(|path| format!("Saved to {}", path.display())),
                    Err(e) => Err(format!("Not saved: {}", e)),
                };
                let settings = &mut self.dashboard_state.settings;
                settings.has_unsaved_changes = status.is_err();
                settings.status = Some(status);
            }
        }
    }

    fn save_config(&self) -> Result<PathBuf, String> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => storage::default_config_path().map_err(|e| e.to_string())?,
        };
        config::save_config(&self.config, &path).map_err(|e| {
            error!("Failed to save config: {}", e);
            e.to_string()
        })?;
        info!("Saved configuration to {:?}", path);
        Ok(path)
    }
}

fn load_preview(ctx: &egui::Context, name: &str, image: &image::RgbImage) -> egui::TextureHandle {
    let size = [image.width() as usize, image.height() as usize];
    let color_image = egui::ColorImage::from_rgb(size, image.as_raw());
    ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR)
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply theme once
        if !self.theme_applied {
            theme::apply_theme(ctx);
            self.theme_applied = true;
        }

        self.poll_job(ctx);

        if let Some(request) = Self::take_dropped_file(ctx) {
            self.dashboard_state.current_view = DashboardView::Process;
            self.handle_upload(ctx, request);
        }

        // Sidebar panel
        let previous_view = self.dashboard_state.current_view;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .default_width(180.0)
            .show(ctx, |ui| {
                render_sidebar(
                    ui,
                    &mut self.dashboard_state.current_view,
                    &self.dashboard_state.process.session,
                );
            });
        if self.dashboard_state.current_view != previous_view {
            self.config.dashboard.last_view = self.dashboard_state.current_view.to_setting();
        }

        // Main content panel
        let mut upload = None;
        let mut settings_action = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none().inner_margin(24.0).show(ui, |ui| {
                match self.dashboard_state.current_view {
                    DashboardView::Process => {
                        upload = render_process_view(ui, &mut self.dashboard_state.process);
                    }
                    DashboardView::Settings => {
                        settings_action = render_settings_view(
                            ui,
                            &mut self.dashboard_state.settings,
                            &mut self.config,
                        );
                    }
                }
            });
        });

        if let Some(request) = upload {
            self.handle_upload(ctx, request);
        }
        if let Some(action) = settings_action {
            self.apply_settings_action(action);
        }
    }
}

/// Run the dashboard application
pub fn run_dashboard(
    ocr: Arc<dyn OcrCapability>,
    backend: Arc<dyn VideoBackend>,
    font: Option<FontArc>,
    config: AppConfig,
    config_path: Option<PathBuf>,
) -> Result<(), eframe::Error> {
    let app = DashboardApp::new(ocr, backend, font, config, config_path);
    eframe::run_native(
        "vidocr",
        DashboardApp::options(),
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
}
