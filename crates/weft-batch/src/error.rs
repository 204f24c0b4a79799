//! Batch-level errors.

use weft_core::Diagnostic;
use weft_pack::PackError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    /// The pass accumulated errors on the shared channel. Carries every
    /// diagnostic recorded so far, warnings included.
    #[error("batch compilation failed with {} error(s)", errors.len())]
    CompilationFailed {
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    },

    /// Archive construction failed after compilation succeeded.
    #[error(transparent)]
    Pack(#[from] PackError),
}
