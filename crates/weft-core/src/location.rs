//! Source locations carried from the template source through diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A position in a template source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Path of the source file, as reported by the analysis stage.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// A location for synthesized constructs with no source counterpart.
    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".into(),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let loc = SourceLocation::new("greet.weft", 3, 14);
        assert_eq!(loc.to_string(), "greet.weft:3:14");
    }
}
