//! Request types
//!
//! The JSON payload passed as the single command-line argument.

use serde_json::{Map, Value};
use thiserror::Error;

/// Malformed command-line input
#[derive(Debug, Error)]
pub enum InputError {
    #[error("invalid JSON input: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// A single generation request
///
/// Both fields fall back to an empty string when the key is missing or
/// holds something other than a string. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Instruction placed inside the `<<SYS>>` block
    pub system_prompt: String,
    /// The user's question
    pub query: String,
}

impl Request {
    /// Parse a request from its JSON text
    pub fn parse(input: &str) -> Result<Self, InputError> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(&value)
    }

    /// Extract a request from an already-parsed JSON value
    pub fn from_value(value: &Value) -> Result<Self, InputError> {
        let object = value
            .as_object()
            .ok_or_else(|| InputError::NotAnObject(json_kind(value)))?;

        Ok(Self {
            system_prompt: string_field(object, "system_prompt"),
            query: string_field(object, "query"),
        })
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
