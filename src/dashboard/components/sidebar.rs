//! Sidebar: view navigation and the state of the current job

use egui::{RichText, Sense, Vec2};

use crate::dashboard::components::status_dot;
use crate::dashboard::state::{DashboardView, UploadPhase, UploadSession};
use crate::dashboard::theme::{phase_color, ThemeColors};

/// Render the sidebar. Switching views never interrupts a running job.
pub fn render_sidebar(ui: &mut egui::Ui, current_view: &mut DashboardView, session: &UploadSession) {
    ui.add_space(16.0);
    ui.label(
        RichText::new("vidocr")
            .size(22.0)
            .color(ThemeColors::ACCENT_PRIMARY)
            .strong(),
    );
    ui.label(
        RichText::new("Video text detection")
            .size(11.0)
            .color(ThemeColors::TEXT_MUTED),
    );
    ui.add_space(16.0);
    ui.separator();
    ui.add_space(8.0);

    for view in DashboardView::ALL {
        if nav_entry(ui, view, *current_view == view) {
            *current_view = view;
        }
    }

    ui.add_space(16.0);
    ui.separator();
    render_job(ui, session);

    ui.with_layout(egui::Layout::bottom_up(egui::Align::LEFT), |ui| {
        ui.add_space(12.0);
        ui.label(
            RichText::new(concat!("v", env!("CARGO_PKG_VERSION")))
                .size(10.0)
                .color(ThemeColors::TEXT_MUTED),
        );
    });
}

fn nav_entry(ui: &mut egui::Ui, view: DashboardView, selected: bool) -> bool {
    let (rect, response) =
        ui.allocate_exact_size(Vec2::new(ui.available_width(), 34.0), Sense::click());

    if ui.is_rect_visible(rect) {
        let painter = ui.painter();
        if selected {
            painter.rect_filled(rect, 6.0, ThemeColors::ACCENT_PRIMARY.gamma_multiply(0.2));
        } else if response.hovered() {
            painter.rect_filled(rect, 6.0, ThemeColors::BG_HOVER);
        }

        let color = if selected {
            ThemeColors::ACCENT_PRIMARY
        } else {
            ThemeColors::TEXT_SECONDARY
        };
        painter.text(
            rect.left_center() + Vec2::new(12.0, 0.0),
            egui::Align2::LEFT_CENTER,
            format!("{}   {}", view.icon(), view.name()),
            egui::FontId::proportional(14.0),
            color,
        );
    }

    response.clicked()
}

/// Phase, file and frame counts of the current upload
fn render_job(ui: &mut egui::Ui, session: &UploadSession) {
    ui.add_space(8.0);
    ui.label(RichText::new("Current job").size(11.0).color(ThemeColors::TEXT_MUTED));
    ui.add_space(4.0);

    let phase = session.phase();
    ui.horizontal(|ui| {
        status_dot(ui, phase_color(phase));
        ui.label(RichText::new(phase.label()).size(13.0).color(ThemeColors::TEXT_PRIMARY));
    });

    if let Some(summary) = session.summary() {
        ui.label(
            RichText::new(summary)
                .size(11.0)
                .color(ThemeColors::TEXT_SECONDARY),
        );
    }

    if phase == UploadPhase::Processing {
        if let Some(fraction) = session.progress().and_then(|p| p.fraction()) {
            ui.add(egui::ProgressBar::new(fraction).desired_height(6.0));
        }
    }
}
