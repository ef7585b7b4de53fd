//! LLM inference
//!
//! The generation capability trait, prompt-echo cleanup, and the llama.cpp
//! backed engine that implements it.

pub mod engine;
pub mod generator;
pub mod model;

// Re-export main types for convenience
pub use engine::{EngineConfig, EngineError, LlamaEngine};
pub use generator::{generate_and_clean, strip_prompt, GenerationError, TextGenerator};
pub use model::{validate_gguf, GgufMetadata, ModelError, GGUF_MAGIC};

use crate::storage::huggingface::resolve_model;
use crate::storage::settings::Settings;

/// Resolve the configured model and load it into a [`LlamaEngine`].
///
/// Any failure here, including a failed download, is a generation failure.
pub fn load_engine(settings: &Settings, backend_logs: bool) -> Result<LlamaEngine, GenerationError> {
    let model_path = resolve_model(&settings.model, &settings.models_directory)?;
    let config = EngineConfig::from_settings(settings, model_path).with_backend_logs(backend_logs);
    Ok(LlamaEngine::load(config)?)
}
