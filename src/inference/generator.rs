//! Generation capability
//!
//! [`TextGenerator`] is the seam between the CLI and whatever actually runs
//! the model. [`generate_and_clean`] calls it once and removes the echoed
//! prompt from the result.

use std::error::Error as StdError;

use thiserror::Error;

use crate::types::GenerationParams;

/// Something that maps a prompt to a completion
pub trait TextGenerator {
    type Error: StdError + 'static;

    /// Run one blocking generation.
    ///
    /// The returned text may or may not start with `prompt`.
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String, Self::Error>;
}

/// Any failure of the generation capability, including model loading
#[derive(Debug, Error)]
#[error("generation failed: {source}")]
pub struct GenerationError {
    #[source]
    source: Box<dyn StdError + 'static>,
}

impl GenerationError {
    pub fn new(source: impl StdError + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

impl From<crate::inference::EngineError> for GenerationError {
    fn from(e: crate::inference::EngineError) -> Self {
        Self::new(e)
    }
}

impl From<crate::storage::huggingface::DownloadError> for GenerationError {
    fn from(e: crate::storage::huggingface::DownloadError) -> Self {
        Self::new(e)
    }
}

/// Generate a completion for `prompt` with the fixed sampling policy and
/// strip the echoed prompt from it.
pub fn generate_and_clean<G>(prompt: &str, generator: &mut G) -> Result<String, GenerationError>
where
    G: TextGenerator + ?Sized,
{
    let params = GenerationParams::default();
    let raw = generator
        .generate(prompt, &params)
        .map_err(GenerationError::new)?;

    tracing::debug!(raw_len = raw.len(), "generation returned");
    Ok(strip_prompt(prompt, &raw).to_string())
}

/// Remove `prompt` if `raw` starts with it, then trim surrounding whitespace.
pub fn strip_prompt<'a>(prompt: &str, raw: &'a str) -> &'a str {
    raw.strip_prefix(prompt).unwrap_or(raw).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct OutOfMemory;

    impl fmt::Display for OutOfMemory {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "out of memory")
        }
    }

    impl StdError for OutOfMemory {}

    /// Returns a canned response and remembers what it was asked
    struct Canned {
        response: Result<String, ()>,
        seen: Vec<(String, GenerationParams)>,
    }

    impl Canned {
        fn ok(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
                seen: Vec::new(),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(()),
                seen: Vec::new(),
            }
        }
    }

    impl TextGenerator for Canned {
        type Error = OutOfMemory;

        fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String, OutOfMemory> {
            self.seen.push((prompt.to_string(), *params));
            self.response.clone().map_err(|_| OutOfMemory)
        }
    }

    #[test]
    fn test_strips_echoed_prompt() {
        let prompt = "<s>[INST] <<SYS>>\nBe terse.\n<</SYS>>\n\nSay hi. [/INST]";
        let mut generator = Canned::ok(&format!("{prompt}  Hi there!\n"));
        let cleaned = generate_and_clean(prompt, &mut generator).unwrap();
        assert_eq!(cleaned, "Hi there!");
    }

    #[test]
    fn test_output_without_prompt_is_trimmed() {
        let mut generator = Canned::ok("\n  Hello.  \n");
        let cleaned = generate_and_clean("some prompt", &mut generator).unwrap();
        assert_eq!(cleaned, "Hello.");
    }

    #[test]
    fn test_prompt_only_in_middle_is_kept() {
        assert_eq!(strip_prompt("abc", "xx abc yy"), "xx abc yy");
    }

    #[test]
    fn test_strip_is_idempotent_on_trimmed_text() {
        let once = strip_prompt("p", "  answer ");
        assert_eq!(strip_prompt("p", once), once);
    }

    #[test]
    fn test_called_once_with_fixed_params() {
        let mut generator = Canned::ok("ok");
        generate_and_clean("prompt", &mut generator).unwrap();
        assert_eq!(generator.seen.len(), 1);
        assert_eq!(generator.seen[0].0, "prompt");
        assert_eq!(generator.seen[0].1, GenerationParams::default());
    }

    #[test]
    fn test_failure_carries_cause() {
        let mut generator = Canned::failing();
        let err = generate_and_clean("prompt", &mut generator).unwrap_err();
        assert_eq!(err.to_string(), "generation failed: out of memory");
        assert!(err.source().is_some());
    }
}
