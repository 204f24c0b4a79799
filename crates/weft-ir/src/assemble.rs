//! The assembler: realizes IR nodes into a linear op buffer.
//!
//! Tracks the abstract operand-stack depth across every emitted op and
//! exposes it so the stack contract (expression +1, statement 0) can be
//! checked at each composition boundary. Jump targets are labels until
//! `finish` patches them into instruction indices.

use std::collections::HashMap;

use crate::error::IrError;
use crate::op::{ConstValue, Op};
use crate::unit::{SavedLocal, SuspendReason, SuspensionPoint};

/// A jump target marker. Labels may be bound inside another node's
/// composed realization; this is the one sanctioned way for a node to
/// branch to a position it does not itself own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(pub(crate) u32);

/// Hashable stand-in for a constant, so interning can dedupe floats.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
}

impl ConstKey {
    fn of(value: &ConstValue) -> Self {
        match value {
            ConstValue::Null => ConstKey::Null,
            ConstValue::Bool(b) => ConstKey::Bool(*b),
            ConstValue::Int(i) => ConstKey::Int(*i),
            ConstValue::Float(f) => ConstKey::Float(f.to_bits()),
            ConstValue::Str(s) => ConstKey::Str(s.clone()),
        }
    }
}

/// Output of a finished assembly.
#[derive(Debug)]
pub struct Assembled {
    pub ops: Vec<Op>,
    pub consts: Vec<ConstValue>,
    pub points: Vec<SuspensionPoint>,
    pub max_stack: u16,
}

/// Builds one unit's op buffer, constant pool, and suspension table.
#[derive(Debug, Default)]
pub struct Assembler {
    ops: Vec<Op>,
    consts: Vec<ConstValue>,
    const_index: HashMap<ConstKey, u32>,
    labels: Vec<Option<u32>>,
    unresolved: Vec<usize>,
    points: Vec<SuspensionPoint>,
    depth: i32,
    max_depth: i32,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current abstract stack depth.
    pub fn depth(&self) -> i32 {
        self.depth
    }

    /// Next instruction index.
    pub fn ip(&self) -> u32 {
        self.ops.len() as u32
    }

    /// Intern a constant, reusing an existing pool slot when possible.
    /// Indices are assigned in first-appearance order, keeping output
    /// deterministic.
    pub fn intern(&mut self, value: ConstValue) -> u32 {
        let key = ConstKey::of(&value);
        if let Some(&idx) = self.const_index.get(&key) {
            return idx;
        }
        let idx = self.consts.len() as u32;
        self.consts.push(value);
        self.const_index.insert(key, idx);
        idx
    }

    /// Emit a non-jump op, updating the tracked depth.
    pub fn push(&mut self, op: Op) {
        debug_assert!(
            !matches!(op, Op::Jump(_) | Op::JumpIfFalse(_)),
            "jumps must go through jump()/jump_if_false()"
        );
        if op.is_suspension() {
            debug_assert_eq!(self.depth, 0, "operand stack must be empty at {op}");
        }
        self.depth += op.stack_delta();
        debug_assert!(self.depth >= 0, "stack underflow at {op}");
        self.max_depth = self.max_depth.max(self.depth);
        self.ops.push(op);
    }

    pub fn new_label(&mut self) -> Label {
        let id = self.labels.len() as u32;
        self.labels.push(None);
        Label(id)
    }

    /// Bind a label to the current position.
    pub fn bind(&mut self, label: Label) {
        debug_assert!(
            self.labels[label.0 as usize].is_none(),
            "label bound twice"
        );
        self.labels[label.0 as usize] = Some(self.ip());
    }

    pub fn jump(&mut self, target: Label) {
        self.unresolved.push(self.ops.len());
        self.ops.push(Op::Jump(target.0));
    }

    pub fn jump_if_false(&mut self, target: Label) {
        self.depth -= 1;
        debug_assert!(self.depth >= 0, "stack underflow at jump_if_false");
        self.unresolved.push(self.ops.len());
        self.ops.push(Op::JumpIfFalse(target.0));
    }

    /// Overwrite the tracked depth after a terminal jump, where the
    /// fall-through path resumes at a different depth than the jump
    /// left behind. Only control-flow combinators need this.
    pub(crate) fn reset_depth(&mut self, depth: i32) {
        self.depth = depth;
    }

    /// Register a suspension point with its saved-locals table. The
    /// resume address is patched when the suspending op is emitted.
    pub fn add_point(&mut self, reason: SuspendReason, saved: Vec<SavedLocal>) -> u16 {
        let id = self.points.len() as u16;
        self.points.push(SuspensionPoint {
            id,
            resume_ip: 0,
            reason,
            saved,
        });
        id
    }

    /// Record that the next emitted op is the resume target of `point`.
    /// Suspending ops are re-executed on resume, so they must be free of
    /// side effects up to the moment they suspend.
    pub fn mark_point(&mut self, point: u16) {
        debug_assert_eq!(self.depth, 0, "operand stack must be empty at a suspension point");
        self.points[point as usize].resume_ip = self.ip();
    }

    /// Patch jumps and produce the final buffers.
    pub fn finish(mut self) -> Result<Assembled, IrError> {
        for idx in self.unresolved {
            let label = match self.ops[idx] {
                Op::Jump(l) | Op::JumpIfFalse(l) => l,
                _ => {
                    return Err(IrError::InvariantViolation {
                        detail: format!("unresolved entry {idx} is not a jump"),
                    })
                }
            };
            let target = self.labels[label as usize].ok_or(IrError::UnboundLabel { label })?;
            match &mut self.ops[idx] {
                Op::Jump(t) | Op::JumpIfFalse(t) => *t = target,
                _ => unreachable!(),
            }
        }
        Ok(Assembled {
            ops: self.ops,
            consts: self.consts,
            points: self.points,
            max_stack: self.max_depth.max(0) as u16,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedupes_and_preserves_order() {
        let mut asm = Assembler::new();
        let a = asm.intern(ConstValue::Str("x".into()));
        let b = asm.intern(ConstValue::Int(1));
        let c = asm.intern(ConstValue::Str("x".into()));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(a, c);
    }

    #[test]
    fn depth_tracking_and_max() {
        let mut asm = Assembler::new();
        let one = asm.intern(ConstValue::Int(1));
        asm.push(Op::PushConst(one));
        asm.push(Op::PushConst(one));
        assert_eq!(asm.depth(), 2);
        asm.push(Op::Binary(weft_core::BinaryOp::Add));
        assert_eq!(asm.depth(), 1);
        asm.push(Op::Pop);
        assert_eq!(asm.depth(), 0);
        let out = asm.finish().unwrap();
        assert_eq!(out.max_stack, 2);
    }

    #[test]
    fn labels_patch_to_instruction_indices() {
        let mut asm = Assembler::new();
        let skip = asm.new_label();
        let t = asm.intern(ConstValue::Bool(true));
        asm.push(Op::PushConst(t));
        asm.jump_if_false(skip);
        let msg = asm.intern(ConstValue::Str("yes".into()));
        asm.push(Op::EmitConst(msg));
        asm.bind(skip);
        asm.push(Op::Return);
        let out = asm.finish().unwrap();
        assert_eq!(out.ops[1], Op::JumpIfFalse(3));
    }

    #[test]
    fn unbound_label_is_an_error() {
        let mut asm = Assembler::new();
        let nowhere = asm.new_label();
        asm.jump(nowhere);
        assert!(matches!(
            asm.finish(),
            Err(IrError::UnboundLabel { label: 0 })
        ));
    }

    #[test]
    fn points_record_resume_ip() {
        let mut asm = Assembler::new();
        let point = asm.add_point(SuspendReason::DataUnavailable, vec![]);
        let c = asm.intern(ConstValue::Str("A".into()));
        asm.push(Op::EmitConst(c));
        asm.mark_point(point);
        asm.push(Op::AwaitField { field: 0, point });
        asm.push(Op::Return);
        let out = asm.finish().unwrap();
        assert_eq!(out.points[0].resume_ip, 1);
    }
}
