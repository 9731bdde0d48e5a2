//! Storage Layer
//!
//! Platform directories for config and model files, and staging of uploaded
//! videos into temporary files.

use anyhow::Result;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// Container extensions accepted for upload
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "vidocr", "vidocr")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Default location of `config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

/// Lowercased extension of a file name, if any
pub fn video_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Whether a file name carries one of the accepted video extensions
pub fn is_supported_video(name: &str) -> bool {
    video_extension(name)
        .map(|ext| SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// An uploaded video copied to a temporary file.
///
/// The copy is deleted when this value is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    path: TempPath,
    original_name: String,
    size_bytes: u64,
}

impl StagedUpload {
    /// Path of the temporary copy
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as supplied by the user
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Size of the staged copy
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Copy `reader` into a fresh temp file named after `name`'s extension
fn stage_upload(name: &str, reader: &mut impl Read) -> std::io::Result<StagedUpload> {
    let suffix = video_extension(name)
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".mp4".to_string());

    let file = tempfile::Builder::new()
        .prefix("vidocr-upload-")
        .suffix(&suffix)
        .tempfile()?;
    let mut writer = BufWriter::new(file);
    let size_bytes = std::io::copy(reader, &mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;

    let path = file.into_temp_path();
    debug!("Staged upload '{}' ({} bytes) at {:?}", name, size_bytes, &*path);

    Ok(StagedUpload {
        path,
        original_name: name.to_string(),
        size_bytes,
    })
}

/// Stage an uploaded byte stream
pub fn stage_upload_bytes(name: &str, bytes: &[u8]) -> std::io::Result<StagedUpload> {
    let mut reader = bytes;
    stage_upload(name, &mut reader)
}

/// Stage a file that already exists on disk, streaming it into the copy
pub fn stage_upload_file(source: &Path) -> std::io::Result<StagedUpload> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.mp4".to_string());
    let mut reader = BufReader::new(File::open(source)?);
    stage_upload(&name, &mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_video("clip.mp4"));
        assert!(is_supported_video("CLIP.AVI"));
        assert!(is_supported_video("dir/with.dots/movie.mkv"));
        assert!(!is_supported_video("notes.txt"));
        assert!(!is_supported_video("no_extension"));
    }

    #[test]
    fn test_stage_bytes_keeps_extension_and_content() {
        let staged = stage_upload_bytes("holiday.avi", b"not really a video").unwrap();

        assert_eq!(staged.original_name(), "holiday.avi");
        assert_eq!(staged.size_bytes(), 18);
        assert_eq!(staged.path().extension().unwrap(), "avi");
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"not really a video");
    }

    #[test]
    fn test_staged_copy_removed_on_drop() {
        let staged = stage_upload_bytes("a.mp4", b"data").unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_stage_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("input.mov");
        std::fs::write(&source, b"frames").unwrap();

        let staged = stage_upload_file(&source).unwrap();
        assert_eq!(staged.original_name(), "input.mov");
        assert_ne!(staged.path(), source.as_path());
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"frames");
    }

    #[test]
    fn test_stage_large_file_streams_whole_content() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("long.mp4");
        let content: Vec<u8> = (0..3 * 1024 * 1024 + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source, &content).unwrap();

        let staged = stage_upload_file(&source).unwrap();
        assert_eq!(staged.size_bytes(), content.len() as u64);
        assert_eq!(std::fs::read(staged.path()).unwrap(), content);
    }

    #[test]
    fn test_stage_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = stage_upload_file(&dir.path().join("gone.mp4")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
