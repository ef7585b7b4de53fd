//! Settings storage
//!
//! Runtime settings for model loading. Sampling parameters are fixed in
//! [`GenerationParams`](crate::types::GenerationParams) and not stored here.

use crate::storage::{get_data_dir, StorageError};
use crate::types::params::MAX_NEW_TOKENS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Model used when nothing else is configured
pub const DEFAULT_MODEL: &str = "TheBloke/Llama-2-7B-Chat-GGUF/llama-2-7b-chat.Q8_0.gguf";

const MIN_CONTEXT_SIZE: u32 = 512;
const MAX_CONTEXT_SIZE: u32 = 131072;

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Local GGUF path or HuggingFace reference
    #[serde(default = "default_model")]
    pub model: String,
    /// Directory where downloaded models (.gguf) are stored
    #[serde(default = "default_models_directory")]
    pub models_directory: PathBuf,
    /// Context window size
    #[serde(default = "default_context_size")]
    pub context_size: u32,
    /// Number of GPU layers to offload (0 = CPU only)
    #[serde(default = "default_gpu_layers")]
    pub gpu_layers: u32,
    /// Generation threads; llama.cpp picks when unset
    #[serde(default)]
    pub threads: Option<i32>,
    /// Sampling seed; random per run when unset
    #[serde(default)]
    pub seed: Option<u32>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_models_directory() -> PathBuf {
    get_data_dir()
        .ok()
        .map(|d| d.join("models"))
        .unwrap_or_else(|| PathBuf::from("./models"))
}

fn default_context_size() -> u32 {
    4096 // Llama-2 training context
}

fn default_gpu_layers() -> u32 {
    99 // Offload all layers to GPU by default
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: default_model(),
            models_directory: default_models_directory(),
            context_size: default_context_size(),
            gpu_layers: default_gpu_layers(),
            threads: None,
            seed: None,
        }
    }
}

impl Settings {
    /// Validate settings values
    ///
    /// Keeps the context within llama.cpp's usable range and large enough
    /// to hold a full-length generation plus a short prompt.
    pub fn validate(&mut self) {
        if self.model.trim().is_empty() {
            self.model = default_model();
        }

        let floor = MIN_CONTEXT_SIZE.max(MAX_NEW_TOKENS + 64);
        let clamped = self.context_size.clamp(floor, MAX_CONTEXT_SIZE);
        if clamped != self.context_size {
            tracing::warn!(
                "Context size {} out of range, using {}",
                self.context_size,
                clamped
            );
            self.context_size = clamped;
        }

        if matches!(self.threads, Some(t) if t <= 0) {
            self.threads = None;
        }
    }
}

/// Get the settings file path
pub fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file doesn't exist or is corrupted
pub fn load_settings() -> Settings {
    match get_settings_path().and_then(|path| load_settings_from(&path)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            Settings::default()
        }
    }
}

/// Load and validate settings from a specific file
pub fn load_settings_from(path: &Path) -> Result<Settings, StorageError> {
    if !path.exists() {
        tracing::debug!("Settings file not found, using defaults");
        return Ok(Settings::default());
    }

    let json = fs::read_to_string(path)?;
    let mut settings: Settings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Save settings to disk
pub fn save_settings(settings: &Settings, path: &Path) -> Result<(), StorageError> {
    // Ensure the parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to {}", path.display());
    Ok(())
}
