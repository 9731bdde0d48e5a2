//! Process view - upload a video and inspect the annotated result

use egui::RichText;
use std::path::PathBuf;

use crate::dashboard::components::status_dot;
use crate::dashboard::state::{ProcessViewState, UploadPhase};
use crate::dashboard::theme::{phase_color, ThemeColors};
use crate::storage::SUPPORTED_VIDEO_EXTENSIONS;

const PREVIEW_SIZE: egui::Vec2 = egui::vec2(420.0, 236.0);

/// Upload the user asked for
#[derive(Debug, Clone, PartialEq)]
pub enum UploadRequest {
    Path(PathBuf),
    Bytes { name: String, bytes: std::sync::Arc<[u8]> },
}

/// Render the process view. Returns an upload when the user pressed *Process*.
pub fn render_process_view(ui: &mut egui::Ui, view_state: &mut ProcessViewState) -> Option<UploadRequest> {
    let mut request = None;

    ui.heading(RichText::new("Process Video").size(24.0).strong());
    ui.add_space(8.0);
    ui.label(
        RichText::new("Run text detection on every frame and get an annotated copy")
            .size(14.0)
            .color(ThemeColors::TEXT_SECONDARY),
    );
    ui.add_space(16.0);

    let phase = view_state.session.phase();
    let can_upload = view_state.session.accepts_upload();

    egui::Frame::none()
        .fill(ThemeColors::BG_MEDIUM)
        .rounding(egui::Rounding::same(8.0))
        .inner_margin(16.0)
        .show(ui, |ui| {
            ui.label(
                RichText::new(format!(
                    "Drop a video onto this window or enter its path ({})",
                    SUPPORTED_VIDEO_EXTENSIONS.join(", ")
                ))
                .size(13.0)
                .color(ThemeColors::TEXT_SECONDARY),
            );
            ui.add_space(8.0);

            ui.horizontal(|ui| {
                let edit = egui::TextEdit::singleline(&mut view_state.path_input)
                    .hint_text("/path/to/video.mp4")
                    .desired_width(ui.available_width() - 120.0);
                let response = ui.add_enabled(can_upload, edit);
                let submitted =
                    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                let button = egui::Button::new("Process").min_size(egui::vec2(100.0, 28.0));
                let clicked = ui
                    .add_enabled(can_upload && !view_state.path_input.trim().is_empty(), button)
                    .clicked();

                if (clicked || submitted) && !view_state.path_input.trim().is_empty() {
                    request = Some(UploadRequest::Path(PathBuf::from(view_state.path_input.trim())));
                }
            });

            if let Some(rejection) = &view_state.rejection {
                ui.add_space(6.0);
                ui.label(RichText::new(rejection).color(ThemeColors::ACCENT_ERROR));
            }
        });

    ui.add_space(16.0);

    // Status strip
    ui.horizontal(|ui| {
        status_dot(ui, phase_color(phase));
        ui.label(RichText::new(phase.label()).strong());

        if let Some(output) = view_state.session.output() {
            ui.separator();
            ui.label(format!("{} frames", output.frames_written));
            ui.separator();
            ui.label(format!("{} with text", output.report.frames_with_text()));
        }
    });

    if phase == UploadPhase::Processing {
        ui.add_space(12.0);
        ui.horizontal(|ui| {
            ui.spinner();
            let progress = view_state.session.progress();
            let done = progress.map(|p| p.frames_done).unwrap_or(0);
            match progress.and_then(|p| p.fraction()) {
                Some(fraction) => {
                    ui.add(
                        egui::ProgressBar::new(fraction)
                            .text(format!("{} frames", done))
                            .desired_width(320.0),
                    );
                }
                None => {
                    ui.label(format!("{} frames processed", done));
                }
            }
        });
    }

    ui.add_space(16.0);

    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.horizontal_top(|ui| {
            render_original_panel(ui, view_state);
            ui.add_space(16.0);
            render_annotated_panel(ui, view_state);
        });

        ui.add_space(16.0);
        render_text_panel(ui, view_state);
    });

    request
}

fn panel(ui: &mut egui::Ui, title: &str, add_contents: impl FnOnce(&mut egui::Ui)) {
    egui::Frame::none()
        .fill(ThemeColors::BG_MEDIUM)
        .rounding(egui::Rounding::same(8.0))
        .inner_margin(16.0)
        .show(ui, |ui| {
            ui.set_min_width(PREVIEW_SIZE.x);
            ui.label(RichText::new(title).size(16.0).strong());
            ui.add_space(8.0);
            add_contents(ui);
        });
}

fn preview(ui: &mut egui::Ui, texture: Option<&egui::TextureHandle>, placeholder: &str) {
    egui::Frame::none()
        .fill(ThemeColors::BG_DARK)
        .rounding(egui::Rounding::same(6.0))
        .show(ui, |ui| {
            ui.set_min_size(PREVIEW_SIZE);
            match texture {
                Some(texture) => {
                    let size = texture.size_vec2();
                    let scale = (PREVIEW_SIZE.x / size.x).min(PREVIEW_SIZE.y / size.y);
                    ui.centered_and_justified(|ui| {
                        ui.image((texture.id(), size * scale));
                    });
                }
                None => {
                    ui.centered_and_justified(|ui| {
                        ui.label(RichText::new(placeholder).size(11.0).color(ThemeColors::TEXT_MUTED));
                    });
                }
            }
        });
}

fn render_original_panel(ui: &mut egui::Ui, view_state: &ProcessViewState) {
    panel(ui, "Original", |ui| {
        match view_state.session.file() {
            Some(file) => {
                ui.label(format!("{} ({:.1} MB)", file.name, file.size_bytes as f64 / 1_048_576.0));
                if let Some(staged) = &view_state.staged_path {
                    ui.label(
                        RichText::new(format!("Staged at {}", staged.display()))
                            .size(11.0)
                            .color(ThemeColors::TEXT_MUTED),
                    );
                }
                if let Some(output) = view_state.session.output() {
                    ui.label(
                        RichText::new(format!(
                            "{}x{} at {}",
                            output.input.width, output.input.height, output.input.frame_rate
                        ))
                        .size(12.0)
                        .color(ThemeColors::TEXT_SECONDARY),
                    );
                }
            }
            None => {
                ui.label(RichText::new("No file").color(ThemeColors::TEXT_MUTED));
            }
        }
        ui.add_space(8.0);
        preview(ui, view_state.original_texture.as_ref(), "No frame decoded");
    });
}

fn render_annotated_panel(ui: &mut egui::Ui, view_state: &ProcessViewState) {
    panel(ui, "Annotated", |ui| {
        if let Some(error) = view_state.session.error() {
            ui.label(RichText::new(error).color(ThemeColors::ACCENT_ERROR));
            return;
        }

        match view_state.session.output() {
            Some(output) => {
                let path = output.output_path.display().to_string();
                ui.horizontal(|ui| {
                    ui.label(RichText::new(&path).size(12.0).color(ThemeColors::TEXT_SECONDARY));
                    if ui.small_button("Copy path").clicked() {
                        ui.ctx().copy_text(path.clone());
                    }
                });
                ui.add_space(8.0);
                preview(ui, view_state.annotated_texture.as_ref(), "No text was detected");
            }
            None => {
                ui.label(RichText::new("No output yet").color(ThemeColors::TEXT_MUTED));
                ui.add_space(8.0);
                preview(ui, None, "");
            }
        }
    });
}

fn render_text_panel(ui: &mut egui::Ui, view_state: &ProcessViewState) {
    if view_state.session.error().is_some() {
        return;
    }

    panel(ui, "Detected Text", |ui| {
        let text = view_state
            .session
            .output()
            .map(|o| o.report.text())
            .unwrap_or_default();

        egui::ScrollArea::vertical()
            .id_salt("detected_text")
            .max_height(240.0)
            .show(ui, |ui| {
                ui.add(
                    egui::TextEdit::multiline(&mut text.as_str())
                        .font(egui::TextStyle::Monospace)
                        .desired_width(f32::INFINITY)
                        .desired_rows(10),
                );
            });
    });
}
