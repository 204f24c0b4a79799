//! Instruction IR for the Weft template compiler.
//!
//! Expressions and statements are immutable value objects with a strict
//! stack contract: realizing an expression pushes exactly one value of
//! its result type, realizing a statement leaves the stack untouched.
//! The contract holds for every combinator, so nodes compose freely
//! without manual stack bookkeeping; the assembler tracks abstract depth
//! and asserts it.

pub mod assemble;
pub mod error;
pub mod features;
pub mod node;
pub mod op;
pub mod unit;

pub use assemble::{Assembled, Assembler, Label};
pub use error::IrError;
pub use features::{Feature, Features};
pub use node::{Expression, Intrinsic, LabelSide, Statement, UnitArg};
pub use op::{ConstValue, Op};
pub use unit::{
    CompiledUnit, FieldDef, FieldRole, SavedLocal, SuspendReason, SuspensionPoint, UnitKind,
    UnitName, UnitStats,
};
