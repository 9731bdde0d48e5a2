//! Reusable UI components for the dashboard

pub mod sidebar;

pub use sidebar::render_sidebar;

use egui::Color32;

/// Filled circle sized like a glyph, used to show an upload phase
pub fn status_dot(ui: &mut egui::Ui, color: Color32) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
    ui.painter().circle_filled(rect.center(), 4.0, color);
}
