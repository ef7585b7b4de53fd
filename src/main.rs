use std::io;
use std::process::ExitCode;

use clap::Parser;
use llama_oneshot::inference::load_engine;
use llama_oneshot::shell;
use llama_oneshot::storage::settings::{load_settings, Settings};
use tracing_subscriber::EnvFilter;

/// Generate one chat completion with a local Llama-2 model
#[derive(Parser, Debug)]
#[command(
    name = "llama-oneshot",
    version,
    override_usage = r#"llama-oneshot [OPTIONS] '{"system_prompt": "...", "query": "..."}'"#
)]
struct Cli {
    /// JSON request: {"system_prompt": "...", "query": "..."}
    request: Option<String>,

    /// Local GGUF file or HuggingFace reference (<user>/<repo>/<file>)
    #[arg(long)]
    model: Option<String>,

    /// Number of layers to offload to the GPU (0 = CPU only)
    #[arg(long)]
    gpu_layers: Option<u32>,

    /// Context window size in tokens
    #[arg(long)]
    ctx_size: Option<u32>,

    /// Sampling seed (random when omitted)
    #[arg(long)]
    seed: Option<u32>,

    /// Number of threads used for generation
    #[arg(long)]
    threads: Option<i32>,

    /// Log progress and llama.cpp output to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line flags take precedence over the settings file
    fn apply(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(gpu_layers) = self.gpu_layers {
            settings.gpu_layers = gpu_layers;
        }
        if let Some(ctx_size) = self.ctx_size {
            settings.context_size = ctx_size;
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        if self.threads.is_some() {
            settings.threads = self.threads;
        }
        settings.validate();
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "llama_oneshot=info,llama_cpp_2=info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // stdout carries the completion only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = load_settings();
    cli.apply(&mut settings);
    tracing::debug!(?settings, "effective settings");

    let status = shell::run(
        cli.request.as_deref(),
        || load_engine(&settings, cli.verbose),
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    );
    ExitCode::from(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_optional() {
        let cli = Cli::try_parse_from(["llama-oneshot"]).unwrap();
        assert!(cli.request.is_none());
    }

    #[test]
    fn test_json_request_positional() {
        let cli = Cli::try_parse_from(["llama-oneshot", r#"{"query":"hi"}"#]).unwrap();
        assert_eq!(cli.request.as_deref(), Some(r#"{"query":"hi"}"#));
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "llama-oneshot",
            "--model",
            "/models/chat.gguf",
            "--gpu-layers",
            "0",
            "--ctx-size",
            "2048",
            "--seed",
            "3",
            "{}",
        ])
        .unwrap();

        let mut settings = Settings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.model, "/models/chat.gguf");
        assert_eq!(settings.gpu_layers, 0);
        assert_eq!(settings.context_size, 2048);
        assert_eq!(settings.seed, Some(3));
        assert!(settings.threads.is_none());
    }

    #[test]
    fn test_unset_flags_keep_settings() {
        let cli = Cli::try_parse_from(["llama-oneshot", "{}"]).unwrap();
        let mut settings = Settings::default();
        settings.seed = Some(11);
        cli.apply(&mut settings);
        assert_eq!(settings.seed, Some(11));
        assert_eq!(settings.gpu_layers, 99);
    }
}
