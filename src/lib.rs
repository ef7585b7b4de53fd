//! llama-oneshot library
//!
//! Single-shot local text generation: format a Llama-2 chat prompt from a
//! JSON request, run it through llama.cpp, and print the reply.

pub mod error;
pub mod inference;
pub mod prompt;
pub mod shell;
pub mod storage;
pub mod types;
