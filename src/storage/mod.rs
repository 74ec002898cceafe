//! External storage
//!
//! Locates the storage root, scans it for model files and holds the
//! build-time configuration.

use std::path::PathBuf;
use thiserror::Error;

pub mod models;
pub mod settings;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access data directory: {0}")]
    DataDirError(String),
    #[error("Failed to read directory: {0}")]
    ReadError(#[from] std::io::Error),
}

/// Get the application data directory
///
/// Returns the platform-specific application data directory:
/// - Windows: `C:\Users\{user}\AppData\Roaming\llama-console\data`
/// - macOS: `/Users/{user}/Library/Application Support/org.llama-console.llama-console`
/// - Linux: `/home/{user}/.local/share/llama-console`
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    directories::ProjectDirs::from("org", "llama-console", "llama-console")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| StorageError::DataDirError("Could not determine data directory".to_string()))
}

/// Storage root used when nothing overrides it
pub fn default_storage_root() -> PathBuf {
    match get_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!("{}, falling back to ./sdcard", e);
            PathBuf::from("./sdcard")
        }
    }
}
