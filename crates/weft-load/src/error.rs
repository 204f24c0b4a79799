//! Load-cache errors.

use weft_core::Diagnostic;
use thiserror::Error;

/// Errors from on-demand resolution.
///
/// A name with no owning template is not an error; it surfaces as
/// `Resolution::NotFound` so the host can try other strategies.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The slow path found errors — freshly raised or already present
    /// on the shared channel. All diagnostics recorded so far come
    /// along, warnings included, and no artifact is returned.
    #[error("compilation failed with {} error(s)", errors.len())]
    CompilationFailed {
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    },
}
