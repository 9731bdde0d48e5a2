//! Dashboard views

pub mod process;
pub mod settings;

pub use process::{render_process_view, UploadRequest};
pub use settings::{render_settings_view, SettingsAction};
