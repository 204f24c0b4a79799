//! Compilation errors.
//!
//! User errors carry the template source location that caused them.
//! Internal errors additionally capture the compiler's own execution
//! trace so a compiler bug is never presented as a template author's
//! mistake.

use std::backtrace::Backtrace;

use weft_core::{ErrorReporter, SourceLocation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("call to unknown template '{target}'")]
    UnknownCallee {
        target: String,
        loc: SourceLocation,
    },

    #[error("template '{target}' has no parameter '{arg}'")]
    UnknownArg {
        target: String,
        arg: String,
        loc: SourceLocation,
    },

    #[error("call to '{target}' is missing required parameter '{param}'")]
    MissingArg {
        target: String,
        param: String,
        loc: SourceLocation,
    },

    #[error("internal compiler error: {message}")]
    Internal {
        message: String,
        location: Option<SourceLocation>,
        trace: String,
    },
}

impl CompileError {
    /// Capture an internal invariant violation with the compiler's own
    /// execution trace.
    pub fn internal(location: Option<SourceLocation>, message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
            location,
            trace: Backtrace::force_capture().to_string(),
        }
    }

    /// Record this error on the shared channel, preserving the
    /// user/internal distinction.
    pub fn report(&self, reporter: &ErrorReporter) {
        match self {
            CompileError::UnknownCallee { loc, .. }
            | CompileError::UnknownArg { loc, .. }
            | CompileError::MissingArg { loc, .. } => {
                reporter.error(Some(loc.clone()), self.to_string());
            }
            CompileError::Internal {
                message,
                location,
                trace,
            } => {
                reporter.internal_error(location.clone(), message.clone(), trace.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::Origin;

    #[test]
    fn internal_errors_capture_a_trace() {
        let err = CompileError::internal(None, "broken invariant");
        match &err {
            CompileError::Internal { trace, .. } => assert!(!trace.is_empty()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn reporting_preserves_the_taxonomy() {
        let reporter = ErrorReporter::new();
        CompileError::UnknownCallee {
            target: "app.gone".into(),
            loc: SourceLocation::new("a.weft", 3, 1),
        }
        .report(&reporter);
        CompileError::internal(None, "bug").report(&reporter);

        let errors = reporter.errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0].origin, Origin::User));
        assert!(matches!(errors[1].origin, Origin::Internal { .. }));
    }
}
