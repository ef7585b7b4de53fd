//! Persistent storage
//!
//! Settings on disk and the local cache of downloaded models.

pub mod huggingface;
pub mod settings;

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable that overrides the data directory
pub const HOME_ENV: &str = "LLAMA_ONESHOT_HOME";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not determine a data directory for this platform")]
    NoDataDir,
}

/// Directory holding `settings.json` and the `models/` cache
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    ProjectDirs::from("", "", "llama-oneshot")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StorageError::NoDataDir)
}
