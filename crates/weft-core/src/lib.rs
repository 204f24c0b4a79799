//! Core data model for the Weft template compiler.
//!
//! Holds the fully analyzed template AST (the narrow interface to the
//! upstream parser/type-checker), the value-kind lattice, the read-only
//! template registry, and the shared append-only diagnostics channel.

pub mod ast;
pub mod diag;
pub mod location;
pub mod registry;
pub mod types;

pub use ast::{
    BinaryOp, CallArg, Escaping, ExprNode, IfArm, LetBinding, ParamDef, TemplateDef,
    TemplateFile, TemplateNode, TemplateSet, TemplateVariant, TypedExpr,
};
pub use diag::{Checkpoint, Diagnostic, ErrorReporter, Origin, Severity};
pub use location::SourceLocation;
pub use registry::{TemplateRegistry, TemplateSignature};
pub use types::{ContentKind, ValueKind};
