//! Dashboard UI Module
//!
//! Desktop window for uploading a video, watching it being processed and
//! reviewing the annotated result, plus a settings view.

pub mod app;
pub mod components;
pub mod state;
pub mod theme;
pub mod views;
pub mod worker;

pub use app::run_dashboard;
