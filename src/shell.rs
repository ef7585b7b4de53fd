//! Command-line shell
//!
//! parse -> format -> load -> generate -> strip -> print, for exactly one
//! request. Kept free of process-global state so it can be driven from tests.

use std::io::Write;

use crate::error::AppError;
use crate::inference::{generate_and_clean, GenerationError, TextGenerator};
use crate::types::Request;

/// Usage line printed when no request argument is given
pub const USAGE: &str = r#"Usage: llama-oneshot [OPTIONS] '{"system_prompt": "...", "query": "..."}'"#;

/// Exit status on success
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status on missing argument, bad input, or failed generation
pub const EXIT_FAILURE: u8 = 1;

/// Run one request and return the process exit status.
///
/// `load` constructs the generation capability. It is only called once the
/// input has parsed, so usage and input errors never pay for a model load.
pub fn run<G, F>(input: Option<&str>, load: F, stdout: &mut dyn Write, stderr: &mut dyn Write) -> u8
where
    G: TextGenerator,
    F: FnOnce() -> Result<G, GenerationError>,
{
    let Some(input) = input else {
        let _ = writeln!(stdout, "{USAGE}");
        return EXIT_FAILURE;
    };

    let output = match execute(input, load) {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(error = ?e, "request failed");
            let _ = writeln!(stderr, "Error: {e}");
            return EXIT_FAILURE;
        }
    };

    match writeln!(stdout, "{output}").and_then(|_| stdout.flush()) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let _ = writeln!(stderr, "Error: failed to write output: {e}");
            EXIT_FAILURE
        }
    }
}

fn execute<G, F>(input: &str, load: F) -> Result<String, AppError>
where
    G: TextGenerator,
    F: FnOnce() -> Result<G, GenerationError>,
{
    let request = Request::parse(input)?;
    let prompt = request.to_prompt();

    let mut generator = load()?;
    Ok(generate_and_clean(&prompt, &mut generator)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerationParams;
    use std::cell::{Cell, RefCell};
    use std::fmt;

    #[derive(Debug)]
    struct FakeFailure(&'static str);

    impl fmt::Display for FakeFailure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for FakeFailure {}

    /// Echoes a fixed reply and records every prompt it receives
    struct Fake<'a> {
        reply: Result<&'static str, &'static str>,
        prompts: &'a RefCell<Vec<String>>,
    }

    impl TextGenerator for Fake<'_> {
        type Error = FakeFailure;

        fn generate(&mut self, prompt: &str, _params: &GenerationParams) -> Result<String, FakeFailure> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.map(str::to_string).map_err(FakeFailure)
        }
    }

    struct Outcome {
        status: u8,
        stdout: String,
        stderr: String,
        loads: usize,
        prompts: Vec<String>,
    }

    fn invoke(input: Option<&str>, reply: Result<&'static str, &'static str>) -> Outcome {
        let loads = Cell::new(0);
        let prompts = RefCell::new(Vec::new());
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let status = run(
            input,
            || {
                loads.set(loads.get() + 1);
                Ok(Fake {
                    reply,
                    prompts: &prompts,
                })
            },
            &mut stdout,
            &mut stderr,
        );

        Outcome {
            status,
            stdout: String::from_utf8(stdout).unwrap(),
            stderr: String::from_utf8(stderr).unwrap(),
            loads: loads.get(),
            prompts: prompts.into_inner(),
        }
    }

    #[test]
    fn test_scenario_be_terse() {
        let outcome = invoke(
            Some(r#"{"system_prompt":"Be terse.","query":"Say hi."}"#),
            Ok("<s>[INST] <<SYS>>\nBe terse.\n<</SYS>>\n\nSay hi. [/INST]Hi there!"),
        );
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.stdout, "Hi there!\n");
        assert_eq!(outcome.stderr, "");
        assert_eq!(
            outcome.prompts,
            vec!["<s>[INST] <<SYS>>\nBe terse.\n<</SYS>>\n\nSay hi. [/INST]".to_string()]
        );
    }

    #[test]
    fn test_no_argument_prints_usage() {
        let outcome = invoke(None, Ok("unused"));
        assert_eq!(outcome.status, 1);
        assert_eq!(outcome.stdout, format!("{USAGE}\n"));
        assert_eq!(outcome.stderr, "");
        assert_eq!(outcome.loads, 0);
        assert!(outcome.prompts.is_empty());
    }

    #[test]
    fn test_malformed_json_never_loads() {
        let outcome = invoke(Some("not json"), Ok("unused"));
        assert_eq!(outcome.status, 1);
        assert_eq!(outcome.stdout, "");
        assert!(outcome.stderr.starts_with("Error: "));
        assert!(outcome.stderr.ends_with('\n'));
        assert_eq!(outcome.stderr.lines().count(), 1);
        assert_eq!(outcome.loads, 0);
        assert!(outcome.prompts.is_empty());
    }

    #[test]
    fn test_missing_keys_match_empty_strings() {
        let missing = invoke(Some("{}"), Ok("reply"));
        let empty = invoke(Some(r#"{"system_prompt":"","query":""}"#), Ok("reply"));
        assert_eq!(missing.prompts, empty.prompts);
        assert_eq!(missing.stdout, empty.stdout);
        assert_eq!(missing.status, 0);
    }

    #[test]
    fn test_reply_without_echo_is_trimmed() {
        let outcome = invoke(Some(r#"{"query":"Hello"}"#), Ok("  \n General Kenobi. \n"));
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.stdout, "General Kenobi.\n");
    }

    #[test]
    fn test_generation_failure() {
        let outcome = invoke(Some(r#"{"query":"Hello"}"#), Err("CUDA out of memory"));
        assert_eq!(outcome.status, 1);
        assert_eq!(outcome.stdout, "");
        assert_eq!(outcome.stderr, "Error: generation failed: CUDA out of memory\n");
        assert_eq!(outcome.loads, 1);
    }

    #[test]
    fn test_load_failure() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status = run(
            Some(r#"{"query":"Hello"}"#),
            || -> Result<Fake<'static>, GenerationError> {
                Err(GenerationError::new(FakeFailure("model file not found")))
            },
            &mut stdout,
            &mut stderr,
        );
        assert_eq!(status, 1);
        assert!(stdout.is_empty());
        assert_eq!(
            String::from_utf8(stderr).unwrap(),
            "Error: generation failed: model file not found\n"
        );
    }
}
