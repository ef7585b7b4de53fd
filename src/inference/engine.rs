//! llama.cpp generation engine
//!
//! Owns the llama backend and the loaded model. A fresh context is created
//! for each generation call since the context borrows the model.

use std::num::NonZeroU32;
use std::path::PathBuf;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::{BatchAddError, LlamaBatch};
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::{
    send_logs_to_tracing, DecodeError, LlamaCppError, LlamaContextLoadError, LlamaModelLoadError,
    LogOptions, StringToTokenError, TokenToStringError,
};
use thiserror::Error;

use crate::inference::generator::TextGenerator;
use crate::inference::model::{validate_gguf, ModelError};
use crate::storage::settings::Settings;
use crate::types::GenerationParams;

/// Seed value llama.cpp interprets as "pick a random seed"
const LLAMA_DEFAULT_SEED: u32 = 0xFFFF_FFFF;

/// Errors raised while loading a model or generating with it
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to initialize llama backend: {0}")]
    Backend(#[from] LlamaCppError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("failed to load model: {0}")]
    Load(#[from] LlamaModelLoadError),
    #[error("failed to create context: {0}")]
    Context(#[from] LlamaContextLoadError),
    #[error("failed to tokenize prompt: {0}")]
    Tokenize(#[from] StringToTokenError),
    #[error(
        "prompt is {prompt_tokens} tokens, which with {max_new_tokens} new tokens exceeds the context size of {context_size}"
    )]
    ContextOverflow {
        prompt_tokens: usize,
        max_new_tokens: u32,
        context_size: u32,
    },
    #[error("failed to fill batch: {0}")]
    Batch(#[from] BatchAddError),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to detokenize output: {0}")]
    Detokenize(#[from] TokenToStringError),
}

/// Everything needed to load a model and size its context
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    /// Context window in tokens (prompt plus generated text)
    pub context_size: u32,
    /// Number of layers offloaded to the GPU (0 = CPU only)
    pub gpu_layers: u32,
    pub threads: Option<i32>,
    pub seed: Option<u32>,
    /// Forward llama.cpp's own log lines to tracing
    pub backend_logs: bool,
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings, model_path: PathBuf) -> Self {
        Self {
            model_path,
            context_size: settings.context_size,
            gpu_layers: settings.gpu_layers,
            threads: settings.threads,
            seed: settings.seed,
            backend_logs: false,
        }
    }

    pub fn with_backend_logs(mut self, enabled: bool) -> Self {
        self.backend_logs = enabled;
        self
    }
}

/// A loaded llama.cpp model ready to generate
pub struct LlamaEngine {
    // Field order matters: the model must drop before the backend.
    model: LlamaModel,
    backend: LlamaBackend,
    config: EngineConfig,
}

impl LlamaEngine {
    /// Initialize the backend and load the model described by `config`.
    pub fn load(config: EngineConfig) -> Result<Self, EngineError> {
        let metadata = validate_gguf(&config.model_path)?;
        send_logs_to_tracing(LogOptions::default().with_logs_enabled(config.backend_logs));

        tracing::info!(
            "Loading model: {} (GGUF v{}, {} tensors)",
            config.model_path.display(),
            metadata.version,
            metadata.tensor_count
        );

        let backend = LlamaBackend::init()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(config.gpu_layers);
        let model = LlamaModel::load_from_file(&backend, &config.model_path, &model_params)?;

        tracing::info!(
            "Model loaded successfully ({} layers offloaded, context {})",
            config.gpu_layers,
            config.context_size
        );

        Ok(Self {
            model,
            backend,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn context_params(&self) -> LlamaContextParams {
        let mut params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.config.context_size))
            .with_n_batch(self.config.context_size);
        if let Some(threads) = self.config.threads {
            params = params.with_n_threads(threads).with_n_threads_batch(threads);
        }
        params
    }

    fn sampler(&self, params: &GenerationParams) -> LlamaSampler {
        if !params.do_sample {
            return LlamaSampler::greedy();
        }

        // Same order as the transformers logits warpers: temperature, top-k, top-p.
        LlamaSampler::chain_simple([
            LlamaSampler::temp(params.temperature),
            LlamaSampler::top_k(params.top_k),
            LlamaSampler::top_p(params.top_p, 1),
            LlamaSampler::dist(self.config.seed.unwrap_or(LLAMA_DEFAULT_SEED)),
        ])
    }

    #[allow(deprecated)]
    fn piece(&self, token: llama_cpp_2::token::LlamaToken) -> Result<Vec<u8>, EngineError> {
        // Plaintext renders control tokens as nothing, like skip_special_tokens.
        Ok(self.model.token_to_bytes(token, Special::Plaintext)?)
    }
}

impl TextGenerator for LlamaEngine {
    type Error = EngineError;

    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String, EngineError> {
        // The template starts with a literal `<s>`, which tokenizes to BOS.
        let tokens = self.model.str_to_token(prompt, AddBos::Never)?;

        let context_size = self.config.context_size;
        if tokens.len() + params.max_new_tokens as usize > context_size as usize {
            return Err(EngineError::ContextOverflow {
                prompt_tokens: tokens.len(),
                max_new_tokens: params.max_new_tokens,
                context_size,
            });
        }

        let mut ctx = self.model.new_context(&self.backend, self.context_params())?;
        tracing::info!("Generating response ({} prompt tokens)...", tokens.len());

        let mut batch = LlamaBatch::new(context_size as usize, 1);
        let last_index = tokens.len() as i32 - 1;
        for (pos, token) in (0_i32..).zip(tokens.iter().copied()) {
            // Logits are only needed for the last prompt token.
            batch.add(token, pos, &[0], pos == last_index)?;
        }
        ctx.decode(&mut batch)?;

        let mut sampler = self.sampler(params);
        let mut n_cur = batch.n_tokens();
        let mut output = Vec::new();
        let mut generated = 0u32;

        while generated < params.max_new_tokens {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            if self.model.is_eog_token(token) {
                break;
            }

            output.extend(self.piece(token)?);
            generated += 1;

            batch.clear();
            batch.add(token, n_cur, &[0], true)?;
            n_cur += 1;
            ctx.decode(&mut batch)?;
        }

        tracing::debug!(generated, "generation finished");
        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}
