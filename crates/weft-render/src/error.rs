//! Render-time errors.

use weft_core::ValueKind;
use thiserror::Error;

/// Errors that can occur while driving a render instance.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no unit named '{name}' is available to this render")]
    MissingUnit { name: String },

    #[error("required parameter '{param}' was not bound")]
    MissingParam { param: String },

    #[error("no such parameter '{param}' on this unit")]
    UnknownParam { param: String },

    #[error("runtime cast failed: expected {expected}, found {found}")]
    CastFailed { expected: ValueKind, found: ValueKind },

    #[error("type error: {detail}")]
    TypeMismatch { detail: String },

    #[error("arithmetic error: {detail}")]
    Arithmetic { detail: String },

    #[error("deferred field '{field}' read before it was awaited")]
    UnresolvedInput { field: String },

    #[error("corrupt unit: {detail}")]
    CorruptUnit { detail: String },
}
