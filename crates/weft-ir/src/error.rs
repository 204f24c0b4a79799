//! IR construction errors.

use weft_core::ValueKind;
use thiserror::Error;

/// Errors raised by IR combinators.
///
/// `TypeMismatch` is a user-visible narrowing failure; everything else
/// indicates a bug in the compiler that built the node.
#[derive(Debug, Error)]
pub enum IrError {
    #[error("cannot narrow {from} to {to}: kinds are never compatible")]
    TypeMismatch { from: ValueKind, to: ValueKind },

    #[error("instruction invariant violated: {detail}")]
    InvariantViolation { detail: String },

    #[error("label {label} was targeted but never bound")]
    UnboundLabel { label: u32 },
}
