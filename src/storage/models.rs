//! Model directory scanning
//!
//! Lists candidate model files on external storage.

use crate::storage::StorageError;
use std::fs;
use std::path::{Path, PathBuf};

/// A model file found on storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Full path to the model file
    pub path: PathBuf,
    /// Filename of the model
    pub filename: String,
    /// File size in bytes
    pub size_bytes: u64,
}

impl ModelInfo {
    /// Create a ModelInfo from a file path
    fn from_path(path: PathBuf) -> Result<Self, std::io::Error> {
        let metadata = fs::metadata(&path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            path,
            filename,
            size_bytes: metadata.len(),
        })
    }

    /// Get a human-readable size string
    pub fn size_string(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// Human-readable byte count
pub fn format_size(size_bytes: u64) -> String {
    let bytes = size_bytes as f64;

    if bytes < 1024.0 {
        format!("{} B", size_bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Whether `name` ends with `.ext` for one of `extensions`, ignoring case.
pub fn has_model_extension(name: &str, extensions: &[String]) -> bool {
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| {
        let suffix = format!(".{}", ext.to_lowercase());
        lower.len() > suffix.len() && lower.ends_with(&suffix)
    })
}

/// Scan a directory for model files
///
/// Returns every regular file whose name carries one of `extensions`,
/// sorted by filename. A missing directory is not an error.
pub fn scan_models_directory(
    directory: &Path,
    extensions: &[String],
) -> Result<Vec<ModelInfo>, StorageError> {
    if !directory.exists() {
        tracing::warn!("Models directory does not exist: {}", directory.display());
        return Ok(vec![]);
    }

    if !directory.is_dir() {
        tracing::warn!("Models path is not a directory: {}", directory.display());
        return Ok(vec![]);
    }

    let mut models = vec![];

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        if !has_model_extension(&name.to_string_lossy(), extensions) {
            continue;
        }

        match ModelInfo::from_path(path.clone()) {
            Ok(model_info) => {
                tracing::debug!("Found model: {}", model_info.filename);
                models.push(model_info);
            }
            Err(e) => {
                tracing::warn!("Failed to read model file {:?}: {}", path, e);
            }
        }
    }

    models.sort_by(|a, b| a.filename.cmp(&b.filename));

    tracing::info!("Found {} model(s) in {}", models.len(), directory.display());

    Ok(models)
}
