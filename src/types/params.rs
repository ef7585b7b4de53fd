//! Generation parameters
//!
//! The decoding policy is fixed: these values are not read from settings
//! or from the command line.

/// Maximum number of tokens generated after the prompt
pub const MAX_NEW_TOKENS: u32 = 500;
/// Softmax temperature
pub const TEMPERATURE: f32 = 0.7;
/// Nucleus sampling threshold
pub const TOP_P: f32 = 0.9;
/// Number of highest-probability tokens kept before nucleus sampling
pub const TOP_K: i32 = 10;

/// Sampling parameters handed to a [`TextGenerator`](crate::inference::TextGenerator)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    /// Sample from the distribution instead of picking the most likely token
    pub do_sample: bool,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: MAX_NEW_TOKENS,
            do_sample: true,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
        }
    }
}
