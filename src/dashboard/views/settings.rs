//! Settings view - OCR, annotation and output configuration

use egui::RichText;
use std::cell::Cell;

use crate::config::AppConfig;
use crate::dashboard::state::{SettingsSection, SettingsViewState};
use crate::dashboard::theme::ThemeColors;

/// What the user asked the app to do with the config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    Save,
    Reset,
}

/// Collapsible settings card; returns true when the header was clicked
fn section(
    ui: &mut egui::Ui,
    title: &str,
    expanded: bool,
    add_contents: impl FnOnce(&mut egui::Ui),
) -> bool {
    let mut toggled = false;
    egui::Frame::none()
        .fill(ThemeColors::BG_MEDIUM)
        .rounding(egui::Rounding::same(8.0))
        .inner_margin(16.0)
        .show(ui, |ui| {
            let header_response = ui
                .horizontal(|ui| {
                    let arrow = if expanded { "v" } else { ">" };
                    ui.label(RichText::new(arrow).size(12.0).color(ThemeColors::TEXT_MUTED));
                    ui.add_space(8.0);
                    ui.heading(RichText::new(title).size(16.0));
                })
                .response;

            toggled = header_response.interact(egui::Sense::click()).clicked();

            if expanded {
                ui.add_space(16.0);
                ui.separator();
                ui.add_space(12.0);
                add_contents(ui);
            }
        });
    ui.add_space(16.0);
    toggled
}

fn toggle_section(view_state: &mut SettingsViewState, section: SettingsSection) {
    view_state.expanded_section = if view_state.expanded_section == Some(section) {
        None
    } else {
        Some(section)
    };
}

/// Render the settings view. Edits `config` in place.
pub fn render_settings_view(
    ui: &mut egui::Ui,
    view_state: &mut SettingsViewState,
    config: &mut AppConfig,
) -> Option<SettingsAction> {
    ui.heading(RichText::new("Settings").size(24.0).strong());
    ui.add_space(8.0);
    ui.label(
        RichText::new("Detection thresholds and how results are drawn")
            .size(14.0)
            .color(ThemeColors::TEXT_SECONDARY),
    );
    ui.add_space(24.0);

    let changed = Cell::new(false);
    let mut action = None;

    egui::ScrollArea::vertical().show(ui, |ui| {
        let expanded = view_state.expanded_section == Some(SettingsSection::Ocr);
        if section(ui, "OCR", expanded, |ui| {
            let ocr = &mut config.ocr;
            ui.horizontal(|ui| {
                ui.label("Detection threshold:");
                ui.add_space(8.0);
                if ui.add(egui::Slider::new(&mut ocr.detection_threshold, 0.05..=0.95)).changed() {
                    changed.set(true);
                }
            });
            ui.horizontal(|ui| {
                ui.label("Box threshold:");
                ui.add_space(8.0);
                if ui.add(egui::Slider::new(&mut ocr.box_threshold, 0.05..=0.95)).changed() {
                    changed.set(true);
                }
            });
            ui.horizontal(|ui| {
                ui.label("Unclip ratio:");
                ui.add_space(8.0);
                if ui.add(egui::Slider::new(&mut ocr.unclip_ratio, 1.0..=3.0)).changed() {
                    changed.set(true);
                }
            });
            ui.horizontal(|ui| {
                ui.label("Minimum confidence:");
                ui.add_space(8.0);
                if ui.add(egui::Slider::new(&mut ocr.min_confidence, 0.0..=1.0)).changed() {
                    changed.set(true);
                }
            });
            ui.label(
                RichText::new("Detector thresholds apply after a restart")
                    .size(11.0)
                    .color(ThemeColors::TEXT_MUTED),
            );
        }) {
            toggle_section(view_state, SettingsSection::Ocr);
        }

        let expanded = view_state.expanded_section == Some(SettingsSection::Annotation);
        if section(ui, "Annotation", expanded, |ui| {
            let annotation = &mut config.annotation;
            ui.horizontal(|ui| {
                ui.label("Box color:");
                ui.add_space(8.0);
                if ui.color_edit_button_srgb(&mut annotation.color).changed() {
                    changed.set(true);
                }
            });
            ui.horizontal(|ui| {
                ui.label("Line thickness:");
                ui.add_space(8.0);
                if ui
                    .add(egui::Slider::new(&mut annotation.thickness, 1..=10).suffix(" px"))
                    .changed()
                {
                    changed.set(true);
                }
            });
            ui.horizontal(|ui| {
                ui.label("Label size:");
                ui.add_space(8.0);
                if ui
                    .add(egui::Slider::new(&mut annotation.label_height, 8.0..=64.0).suffix(" px"))
                    .changed()
                {
                    changed.set(true);
                }
            });
            ui.horizontal(|ui| {
                ui.label("Label offset:");
                ui.add_space(8.0);
                if ui
                    .add(egui::Slider::new(&mut annotation.label_offset, 0..=50).suffix(" px"))
                    .changed()
                {
                    changed.set(true);
                }
            });
        }) {
            toggle_section(view_state, SettingsSection::Annotation);
        }

        let expanded = view_state.expanded_section == Some(SettingsSection::Output);
        if section(ui, "Output", expanded, |ui| {
            let video = &mut config.video;
            ui.horizontal(|ui| {
                ui.label("Codec fourcc:");
                ui.add_space(8.0);
                let edit = egui::TextEdit::singleline(&mut video.fourcc)
                    .char_limit(4)
                    .desired_width(60.0);
                if ui.add(edit).changed() {
                    changed.set(true);
                }
            });
            ui.horizontal(|ui| {
                ui.label("Bitrate:");
                ui.add_space(8.0);
                if ui
                    .add(egui::Slider::new(&mut video.bitrate_kbps, 500..=20_000).suffix(" kbps"))
                    .changed()
                {
                    changed.set(true);
                }
            });

            let mut dir = video
                .output_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            ui.horizontal(|ui| {
                ui.label("Output directory:");
                ui.add_space(8.0);
                let edit = egui::TextEdit::singleline(&mut dir)
                    .hint_text(std::env::temp_dir().display().to_string());
                if ui.add(edit).changed() {
                    video.output_dir = if dir.trim().is_empty() {
                        None
                    } else {
                        Some(dir.trim().into())
                    };
                    changed.set(true);
                }
            });
        }) {
            toggle_section(view_state, SettingsSection::Output);
        }

        ui.add_space(8.0);

        ui.horizontal(|ui| {
            let save = egui::Button::new("Save").min_size(egui::vec2(120.0, 36.0));
            if ui.add_enabled(view_state.has_unsaved_changes, save).clicked() {
                action = Some(SettingsAction::Save);
            }

            ui.add_space(8.0);

            if ui
                .add(egui::Button::new("Reset to Defaults").min_size(egui::vec2(120.0, 36.0)))
                .clicked()
            {
                action = Some(SettingsAction::Reset);
            }

            ui.add_space(16.0);

            match &view_state.status {
                Some(Ok(message)) => {
                    ui.label(RichText::new(message).size(12.0).color(ThemeColors::ACCENT_SUCCESS));
                }
                Some(Err(message)) => {
                    ui.label(RichText::new(message).size(12.0).color(ThemeColors::ACCENT_ERROR));
                }
                None if view_state.has_unsaved_changes => {
                    ui.label(
                        RichText::new("Unsaved changes")
                            .size(12.0)
                            .color(ThemeColors::ACCENT_WARNING),
                    );
                }
                None => {}
            }
        });
    });

    if changed.get() {
        view_state.has_unsaved_changes = true;
        view_state.status = None;
    }

    action
}
