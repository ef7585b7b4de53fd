//! Shared type definitions
//!
//! Request payloads and generation parameters used across the crate.

pub mod params;
pub mod request;

pub use params::GenerationParams;
pub use request::{InputError, Request};
