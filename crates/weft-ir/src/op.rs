//! The op set compiled units are realized into.
//!
//! Ops drive a small stack machine; every op has a statically known
//! stack delta, which is what lets the assembler verify the IR's
//! composability contract mechanically.

use std::fmt;

use serde::{Deserialize, Serialize};

use weft_core::ast::{BinaryOp, Escaping};
use weft_core::ValueKind;

/// A constant-pool entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConstValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConstValue::Null => ValueKind::Null,
            ConstValue::Bool(_) => ValueKind::Bool,
            ConstValue::Int(_) => ValueKind::Int,
            ConstValue::Float(_) => ValueKind::Float,
            ConstValue::Str(_) => ValueKind::Str,
        }
    }
}

/// One instruction.
///
/// Jump targets hold label ids until `Assembler::finish` patches them to
/// instruction indices. Suspension-capable ops reference an entry in the
/// unit's suspension-point table and require an empty operand stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    PushConst(u32),
    LoadLocal(u16),
    StoreLocal(u16),
    LoadField(u16),
    StoreField(u16),
    Binary(BinaryOp),
    Not,
    Neg,
    /// Pop `n` values, push their text concatenation.
    Concat(u16),
    CoerceBool,
    CoerceStr,
    /// Runtime-checked narrowing; fails the render on mismatch.
    CastCheck(ValueKind),
    Escape(Escaping),
    /// Pop index then list, push element.
    GetIndex,
    /// Pop key then map, push value.
    GetKey,
    /// Pop list, push its length.
    ListLen,
    Pop,
    Jump(u32),
    JumpIfFalse(u32),
    /// Pop a value and append its text rendering to the sink.
    Emit,
    /// Append a constant string to the sink.
    EmitConst(u32),
    /// Resolve a deferred field in place, suspending if not yet ready.
    AwaitField { field: u16, point: u16 },
    /// Suspend with `OutputLimited` if the sink reports backpressure.
    SuspendIfLimited { point: u16 },
    /// Construct a child render instance in a frame field. The const
    /// pool entry names the unit.
    NewFrame { unit: u32, frame: u16 },
    /// Pop a value into field `dst` of the child in `frame`.
    BindArg { frame: u16, dst: u16 },
    /// Copy a field slot (value or still-late handle) from this unit
    /// into field `dst` of the child, preserving laziness.
    BindFieldRef { frame: u16, dst: u16, src: u16 },
    /// Advance the child in `frame`, propagating its status.
    AdvanceFrame { frame: u16, point: u16 },
    /// Advance the child in `frame`, buffering its output; on
    /// completion store the captured content into a local.
    AdvanceFrameBuffered { frame: u16, local: u16, point: u16 },
    Return,
}

impl Op {
    /// Net change to the operand stack.
    pub fn stack_delta(&self) -> i32 {
        match self {
            Op::PushConst(_) | Op::LoadLocal(_) | Op::LoadField(_) => 1,
            Op::StoreLocal(_)
            | Op::StoreField(_)
            | Op::Binary(_)
            | Op::GetIndex
            | Op::GetKey
            | Op::Pop
            | Op::JumpIfFalse(_)
            | Op::Emit
            | Op::BindArg { .. } => -1,
            Op::Concat(n) => 1 - i32::from(*n),
            Op::Not
            | Op::Neg
            | Op::CoerceBool
            | Op::CoerceStr
            | Op::CastCheck(_)
            | Op::Escape(_)
            | Op::ListLen
            | Op::Jump(_)
            | Op::EmitConst(_)
            | Op::AwaitField { .. }
            | Op::SuspendIfLimited { .. }
            | Op::NewFrame { .. }
            | Op::BindFieldRef { .. }
            | Op::AdvanceFrame { .. }
            | Op::AdvanceFrameBuffered { .. }
            | Op::Return => 0,
        }
    }

    /// Whether the op may suspend the render.
    pub fn is_suspension(&self) -> bool {
        matches!(
            self,
            Op::AwaitField { .. }
                | Op::SuspendIfLimited { .. }
                | Op::AdvanceFrame { .. }
                | Op::AdvanceFrameBuffered { .. }
        )
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::PushConst(c) => write!(f, "push_const {c}"),
            Op::LoadLocal(s) => write!(f, "load_local {s}"),
            Op::StoreLocal(s) => write!(f, "store_local {s}"),
            Op::LoadField(s) => write!(f, "load_field {s}"),
            Op::StoreField(s) => write!(f, "store_field {s}"),
            Op::Binary(op) => write!(f, "binary {op:?}"),
            Op::Not => write!(f, "not"),
            Op::Neg => write!(f, "neg"),
            Op::Concat(n) => write!(f, "concat {n}"),
            Op::CoerceBool => write!(f, "coerce_bool"),
            Op::CoerceStr => write!(f, "coerce_str"),
            Op::CastCheck(kind) => write!(f, "cast_check {kind}"),
            Op::Escape(e) => write!(f, "escape {e:?}"),
            Op::GetIndex => write!(f, "get_index"),
            Op::GetKey => write!(f, "get_key"),
            Op::ListLen => write!(f, "list_len"),
            Op::Pop => write!(f, "pop"),
            Op::Jump(t) => write!(f, "jump {t}"),
            Op::JumpIfFalse(t) => write!(f, "jump_if_false {t}"),
            Op::Emit => write!(f, "emit"),
            Op::EmitConst(c) => write!(f, "emit_const {c}"),
            Op::AwaitField { field, point } => write!(f, "await_field {field} @{point}"),
            Op::SuspendIfLimited { point } => write!(f, "suspend_if_limited @{point}"),
            Op::NewFrame { unit, frame } => write!(f, "new_frame {unit} -> {frame}"),
            Op::BindArg { frame, dst } => write!(f, "bind_arg {frame}.{dst}"),
            Op::BindFieldRef { frame, dst, src } => {
                write!(f, "bind_field_ref {frame}.{dst} <- {src}")
            }
            Op::AdvanceFrame { frame, point } => write!(f, "advance_frame {frame} @{point}"),
            Op::AdvanceFrameBuffered { frame, local, point } => {
                write!(f, "advance_frame_buffered {frame} -> {local} @{point}")
            }
            Op::Return => write!(f, "return"),
        }
    }
}
