//! Value kinds: the static types flowing through templates.
//!
//! The upstream analysis stage resolves every expression to one of these
//! kinds; the compiler core trusts them and never re-infers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The content flavor of sanitized template output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Text,
    Html,
    Attributes,
    Uri,
    Js,
    Css,
}

/// The static type of a template value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Content(ContentKind),
    List,
    Map,
    /// Statically unknown; narrowed with a runtime-checked cast.
    Any,
}

impl ValueKind {
    /// Primitive kinds can never hold null.
    pub fn is_primitive(&self) -> bool {
        matches!(self, ValueKind::Bool | ValueKind::Int | ValueKind::Float)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Float)
    }

    /// Kinds whose values render directly as text.
    pub fn is_stringish(&self) -> bool {
        matches!(self, ValueKind::Str | ValueKind::Content(_))
    }

    /// Number of evaluation-stack slots one value of this kind occupies.
    ///
    /// Always 1 today; the composability contract is stated in terms of
    /// slot counts, so the question is asked through this method.
    pub fn slot_count(&self) -> usize {
        1
    }

    /// Whether a runtime narrowing from `self` to `target` can ever succeed.
    ///
    /// `Any` is compatible with everything, equal kinds trivially so, and
    /// the stringish kinds are mutually narrowable (sanitized content is
    /// observed as a string by consumers that only need text).
    pub fn possibly_compatible(&self, target: &ValueKind) -> bool {
        if self == target || *self == ValueKind::Any || *target == ValueKind::Any {
            return true;
        }
        if self.is_stringish() && target.is_stringish() {
            return true;
        }
        if self.is_numeric() && target.is_numeric() {
            return true;
        }
        // Null narrows into any non-primitive kind.
        *self == ValueKind::Null && !target.is_primitive()
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::Text => "text",
            ContentKind::Html => "html",
            ContentKind::Attributes => "attributes",
            ContentKind::Uri => "uri",
            ContentKind::Js => "js",
            ContentKind::Css => "css",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Str => write!(f, "string"),
            ValueKind::Content(kind) => write!(f, "content<{kind}>"),
            ValueKind::List => write!(f, "list"),
            ValueKind::Map => write!(f, "map"),
            ValueKind::Any => write!(f, "any"),
        }
    }
}
