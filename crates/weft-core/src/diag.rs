//! Shared diagnostics channel.
//!
//! Append-only and queryable: the core records errors and warnings here
//! and checks "has anything gone wrong since checkpoint X", but never
//! clears it. Internal compiler failures are tagged distinctly from user
//! errors so template authors are not shown compiler internals as their
//! own mistakes.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::location::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// Where a diagnostic originated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Origin {
    /// The template itself is at fault.
    User,
    /// A compiler invariant was violated; carries the compiler's own
    /// execution trace alongside the user-facing location.
    Internal { trace: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub origin: Origin,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match (&self.location, &self.origin) {
            (Some(loc), Origin::Internal { .. }) => {
                write!(f, "{loc}: {sev} (internal): {}", self.message)
            }
            (Some(loc), Origin::User) => write!(f, "{loc}: {sev}: {}", self.message),
            (None, Origin::Internal { .. }) => write!(f, "{sev} (internal): {}", self.message),
            (None, Origin::User) => write!(f, "{sev}: {}", self.message),
        }
    }
}

/// A position in the diagnostics stream, for "anything since?" queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// The shared error/diagnostics channel.
///
/// Safe to append from multiple threads; the batch orchestrator and the
/// on-demand loader share one instance across a compilation session.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    entries: Mutex<Vec<Diagnostic>>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self, location: Option<SourceLocation>, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            location,
            origin: Origin::User,
        });
    }

    pub fn warning(&self, location: Option<SourceLocation>, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            location,
            origin: Origin::User,
        });
    }

    /// Record an internal compiler failure with its execution trace.
    pub fn internal_error(
        &self,
        location: Option<SourceLocation>,
        message: impl Into<String>,
        trace: impl Into<String>,
    ) {
        self.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            location,
            origin: Origin::Internal {
                trace: trace.into(),
            },
        });
    }

    fn push(&self, diagnostic: Diagnostic) {
        self.entries
            .lock()
            .expect("diagnostics lock poisoned")
            .push(diagnostic);
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.entries.lock().expect("diagnostics lock poisoned").len())
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .lock()
            .expect("diagnostics lock poisoned")
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn has_errors_since(&self, checkpoint: Checkpoint) -> bool {
        self.entries
            .lock()
            .expect("diagnostics lock poisoned")
            .iter()
            .skip(checkpoint.0)
            .any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.filtered(Severity::Error)
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.filtered(Severity::Warning)
    }

    fn filtered(&self, severity: Severity) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .expect("diagnostics lock poisoned")
            .iter()
            .filter(|d| d.severity == severity)
            .cloned()
            .collect()
    }

    /// Everything recorded so far, in order.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .expect("diagnostics lock poisoned")
            .clone()
    }
}
