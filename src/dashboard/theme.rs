//! Dashboard theme
//!
//! Dark palette shared by the process and settings views, plus the colour
//! each upload phase is shown in.

use egui::{Color32, FontFamily, FontId, Rounding, Stroke, TextStyle, Visuals};

use crate::dashboard::state::UploadPhase;

/// Dark color palette
pub struct ThemeColors;

impl ThemeColors {
    // Surfaces, darkest first
    pub const BG_DARK: Color32 = Color32::from_rgb(18, 18, 24);
    pub const BG_MEDIUM: Color32 = Color32::from_rgb(28, 28, 36);
    pub const BG_LIGHT: Color32 = Color32::from_rgb(38, 38, 48);
    pub const BG_HOVER: Color32 = Color32::from_rgb(48, 48, 60);

    pub const ACCENT_PRIMARY: Color32 = Color32::from_rgb(88, 166, 255);
    pub const ACCENT_SUCCESS: Color32 = Color32::from_rgb(46, 204, 113);
    pub const ACCENT_WARNING: Color32 = Color32::from_rgb(255, 193, 7);
    pub const ACCENT_ERROR: Color32 = Color32::from_rgb(231, 76, 60);

    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(240, 240, 245);
    pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(160, 160, 175);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(100, 100, 115);

    pub const BORDER: Color32 = Color32::from_rgb(50, 50, 65);
}

/// Indicator colour for an upload phase
pub fn phase_color(phase: UploadPhase) -> Color32 {
    match phase {
        UploadPhase::Idle => ThemeColors::TEXT_MUTED,
        UploadPhase::Uploaded => ThemeColors::ACCENT_WARNING,
        UploadPhase::Processing => ThemeColors::ACCENT_PRIMARY,
        UploadPhase::Displayed => ThemeColors::ACCENT_SUCCESS,
        UploadPhase::Errored => ThemeColors::ACCENT_ERROR,
    }
}

/// Apply the dashboard theme to egui
pub fn apply_theme(ctx: &egui::Context) {
    let mut visuals = Visuals::dark();
    visuals.panel_fill = ThemeColors::BG_DARK;
    visuals.window_fill = ThemeColors::BG_MEDIUM;
    // Text areas and preview backgrounds
    visuals.extreme_bg_color = ThemeColors::BG_DARK;
    visuals.faint_bg_color = ThemeColors::BG_LIGHT;
    visuals.window_stroke = Stroke::new(1.0, ThemeColors::BORDER);
    visuals.window_rounding = Rounding::same(8.0);
    visuals.hyperlink_color = ThemeColors::ACCENT_PRIMARY;

    // Progress bars fill with the selection colour
    visuals.selection.bg_fill = ThemeColors::ACCENT_PRIMARY.gamma_multiply(0.6);
    visuals.selection.stroke = Stroke::new(1.0, ThemeColors::ACCENT_PRIMARY);

    let widgets = &mut visuals.widgets;
    for (state, fill) in [
        (&mut widgets.noninteractive, ThemeColors::BG_MEDIUM),
        (&mut widgets.inactive, ThemeColors::BG_LIGHT),
        (&mut widgets.hovered, ThemeColors::BG_HOVER),
        (&mut widgets.active, ThemeColors::ACCENT_PRIMARY),
        (&mut widgets.open, ThemeColors::BG_HOVER),
    ] {
        state.bg_fill = fill;
        state.weak_bg_fill = fill;
        state.fg_stroke = Stroke::new(1.0, ThemeColors::TEXT_PRIMARY);
        state.rounding = Rounding::same(6.0);
    }
    widgets.noninteractive.fg_stroke = Stroke::new(1.0, ThemeColors::TEXT_SECONDARY);

    ctx.style_mut(|style| {
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        style.spacing.button_padding = egui::vec2(12.0, 6.0);
        style.text_styles = [
            (TextStyle::Small, FontId::new(12.0, FontFamily::Proportional)),
            (TextStyle::Body, FontId::new(15.0, FontFamily::Proportional)),
            (TextStyle::Button, FontId::new(15.0, FontFamily::Proportional)),
            (TextStyle::Heading, FontId::new(22.0, FontFamily::Proportional)),
            // Detected text is shown monospaced
            (TextStyle::Monospace, FontId::new(14.0, FontFamily::Monospace)),
        ]
        .into();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_and_success_are_told_apart() {
        assert_ne!(
            phase_color(UploadPhase::Displayed),
            phase_color(UploadPhase::Errored)
        );
        assert_ne!(
            phase_color(UploadPhase::Processing),
            phase_color(UploadPhase::Idle)
        );
    }
}
