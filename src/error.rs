//! Top-level error type
//!
//! Exactly two kinds reach the user: bad input and failed generation.
//! Both are reported the same way by the shell.

use thiserror::Error;

use crate::inference::GenerationError;
use crate::types::InputError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}
