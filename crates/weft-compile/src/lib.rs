//! Unit compiler for the Weft template compiler.
//!
//! Transforms one fully analyzed template definition into one or more
//! compiled units: the body renderer, a closure unit per extracted
//! content block, and a factory unit carrying the parameter manifest.
//! Rendering a compiled body is an explicit state machine: any point
//! whose progress depends on data that may not be available yet, or on
//! a sink that may be backpressured, compiles to a suspension point
//! with a saved-locals table.

mod body;
mod context;
pub mod error;
mod expr;
pub mod unit_compiler;

pub use error::CompileError;
pub use unit_compiler::{compile_template, UnitCompiler};
