//! Llama-2 chat prompt formatting

use crate::types::Request;

/// Build the instruction prompt for a system instruction and a user query.
///
/// Values are substituted verbatim; no escaping or length check is done.
pub fn format_prompt(system_prompt: &str, query: &str) -> String {
    format!("<s>[INST] <<SYS>>\n{system_prompt}\n<</SYS>>\n\n{query} [/INST]")
}

impl Request {
    /// Format this request with [`format_prompt`]
    pub fn to_prompt(&self) -> String {
        format_prompt(&self.system_prompt, &self.query)
    }
}
