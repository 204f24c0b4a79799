//! Expression and statement nodes with their combinators.
//!
//! An `Expression` realizes to ops that push exactly one value of its
//! result type; a `Statement` realizes to ops with no net stack effect.
//! Combinators preserve the contract recursively, which is what lets the
//! unit compiler concatenate and nest nodes without tracking the
//! implicit evaluation stack. Nodes never branch outside themselves; the
//! one exception is a label attached with `label_at`, which control-flow
//! combinators may target from elsewhere.

use weft_core::ast::{BinaryOp, Escaping};
use weft_core::ValueKind;

use crate::assemble::{Assembler, Label};
use crate::error::IrError;
use crate::features::{Feature, Features};
use crate::op::{ConstValue, Op};

/// Which edge of a node's realization a label marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSide {
    Start,
    End,
}

/// Built-in operations composed with `invoke`; the receiver is always
/// the implicit first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// Length of a list.
    Len,
    /// Element of a list at an int index.
    Index,
    /// Value of a map at a string key.
    Key,
}

impl Intrinsic {
    pub fn result_type(&self) -> ValueKind {
        match self {
            Intrinsic::Len => ValueKind::Int,
            Intrinsic::Index | Intrinsic::Key => ValueKind::Any,
        }
    }
}

/// An argument bound into a callee frame.
#[derive(Debug, Clone)]
pub enum UnitArg {
    /// Evaluate strictly and bind the value.
    Eval { dst: u16, value: Expression },
    /// Pass this unit's field through unchanged, preserving laziness so
    /// the callee awaits it itself.
    PassField { dst: u16, src: u16 },
}

#[derive(Debug, Clone)]
enum ExprKind {
    Const(ConstValue),
    Local(u16),
    Field(u16),
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Not(Box<Expression>),
    Neg(Box<Expression>),
    Concat(Vec<Expression>),
    Select {
        cond: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    Cast(Box<Expression>),
    CoerceBool(Box<Expression>),
    CoerceStr(Box<Expression>),
    Escape {
        inner: Box<Expression>,
        escaping: Escaping,
    },
    Invoke {
        receiver: Box<Expression>,
        op: Intrinsic,
        args: Vec<Expression>,
    },
    Labeled {
        label: Label,
        side: LabelSide,
        inner: Box<Expression>,
    },
}

/// An immutable expression node: realizes to exactly one pushed value.
#[derive(Debug, Clone)]
pub struct Expression {
    kind: ExprKind,
    result_type: ValueKind,
    features: Features,
}

impl Expression {
    /// Every primitive-typed node is non-nullable by construction; all
    /// other feature changes are explicit.
    fn new(kind: ExprKind, result_type: ValueKind, features: Features) -> Self {
        let features = if result_type.is_primitive() {
            features.with(Feature::NonNullable)
        } else {
            features
        };
        Self {
            kind,
            result_type,
            features,
        }
    }

    pub fn constant(value: ConstValue) -> Self {
        let ty = value.kind();
        let mut features = Features::EMPTY.with(Feature::Cheap);
        if !matches!(value, ConstValue::Null) {
            features = features.with(Feature::NonNullable);
        }
        Self::new(ExprKind::Const(value), ty, features)
    }

    pub fn local(slot: u16, ty: ValueKind) -> Self {
        Self::new(
            ExprKind::Local(slot),
            ty,
            Features::EMPTY.with(Feature::Cheap),
        )
    }

    pub fn field(slot: u16, ty: ValueKind) -> Self {
        Self::new(
            ExprKind::Field(slot),
            ty,
            Features::EMPTY.with(Feature::Cheap),
        )
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression, result_type: ValueKind) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            result_type,
            Features::EMPTY,
        )
    }

    pub fn not(inner: Expression) -> Self {
        Self::new(ExprKind::Not(Box::new(inner)), ValueKind::Bool, Features::EMPTY)
    }

    pub fn neg(inner: Expression) -> Self {
        let ty = inner.result_type;
        Self::new(ExprKind::Neg(Box::new(inner)), ty, Features::EMPTY)
    }

    /// Concatenate one or more stringish values.
    pub fn concat(parts: Vec<Expression>) -> Self {
        debug_assert!(!parts.is_empty(), "concat of zero parts");
        Self::new(
            ExprKind::Concat(parts),
            ValueKind::Str,
            Features::EMPTY.with(Feature::NonNullable),
        )
    }

    /// A value-producing branch. Both branches must agree on the result
    /// type; the merged node keeps only features both branches share.
    pub fn select(cond: Expression, then_branch: Expression, else_branch: Expression) -> Self {
        debug_assert!(
            then_branch
                .result_type
                .possibly_compatible(&else_branch.result_type),
            "select branches disagree on result type"
        );
        let ty = then_branch.result_type;
        let features = then_branch.features.intersect(else_branch.features);
        Self::new(
            ExprKind::Select {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            ty,
            features,
        )
    }

    pub fn coerce_to_bool(self) -> Self {
        Self::new(
            ExprKind::CoerceBool(Box::new(self)),
            ValueKind::Bool,
            Features::EMPTY,
        )
    }

    pub fn coerce_to_string(self) -> Self {
        Self::new(
            ExprKind::CoerceStr(Box::new(self)),
            ValueKind::Str,
            Features::EMPTY.with(Feature::NonNullable),
        )
    }

    pub fn escaped(self, escaping: Escaping) -> Self {
        Self::new(
            ExprKind::Escape {
                inner: Box::new(self),
                escaping,
            },
            ValueKind::Str,
            Features::EMPTY.with(Feature::NonNullable),
        )
    }

    /// Wrap in a runtime-checked narrowing. Under debug assertions the
    /// narrowing is rejected up front when the kinds can never meet;
    /// release builds just emit the check.
    pub fn checked_cast(self, target: ValueKind) -> Result<Expression, IrError> {
        if cfg!(debug_assertions) && !self.result_type.possibly_compatible(&target) {
            return Err(IrError::TypeMismatch {
                from: self.result_type,
                to: target,
            });
        }
        let features = self.features;
        Ok(Self::new(ExprKind::Cast(Box::new(self)), target, features))
    }

    /// Compose a call node with `self` as the implicit first argument.
    pub fn invoke(self, op: Intrinsic, args: Vec<Expression>) -> Expression {
        let ty = op.result_type();
        Self::new(
            ExprKind::Invoke {
                receiver: Box::new(self),
                op,
                args,
            },
            ty,
            Features::EMPTY,
        )
    }

    /// Like `invoke`, but the result is discarded.
    pub fn invoke_discarding(self, op: Intrinsic, args: Vec<Expression>) -> Statement {
        Statement {
            kind: StmtKind::Discard(self.invoke(op, args)),
        }
    }

    /// Evaluate and discard the produced value. Errors if the node's
    /// result would occupy no stack slot, which no expression can —
    /// statements are not expressions.
    pub fn into_statement(self) -> Result<Statement, IrError> {
        if self.result_type.slot_count() == 0 {
            return Err(IrError::InvariantViolation {
                detail: "cannot discard a node that produces no value".into(),
            });
        }
        Ok(Statement {
            kind: StmtKind::Discard(self),
        })
    }

    /// Attach a jump target immediately before or after realization.
    pub fn label_at(self, side: LabelSide, label: Label) -> Expression {
        let ty = self.result_type;
        let features = self.features;
        Self::new(
            ExprKind::Labeled {
                label,
                side,
                inner: Box::new(self),
            },
            ty,
            features,
        )
    }

    /// Equivalent node with one feature added; a no-op clone if already
    /// present.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features = self.features.with(feature);
        self
    }

    /// Equivalent node with one feature removed; a no-op clone if
    /// already absent.
    #[must_use]
    pub fn without_feature(mut self, feature: Feature) -> Self {
        self.features = self.features.without(feature);
        self
    }

    pub fn result_type(&self) -> ValueKind {
        self.result_type
    }

    pub fn features(&self) -> Features {
        self.features
    }

    /// Realize into ops. Pushes exactly one value.
    pub fn realize(&self, asm: &mut Assembler) {
        let before = asm.depth();
        self.realize_inner(asm);
        debug_assert_eq!(
            asm.depth(),
            before + 1,
            "expression changed stack depth by {} instead of +1",
            asm.depth() - before
        );
    }

    fn realize_inner(&self, asm: &mut Assembler) {
        match &self.kind {
            ExprKind::Const(value) => {
                let idx = asm.intern(value.clone());
                asm.push(Op::PushConst(idx));
            }
            ExprKind::Local(slot) => asm.push(Op::LoadLocal(*slot)),
            ExprKind::Field(slot) => asm.push(Op::LoadField(*slot)),
            ExprKind::Binary { op, lhs, rhs } => {
                lhs.realize(asm);
                rhs.realize(asm);
                asm.push(Op::Binary(*op));
            }
            ExprKind::Not(inner) => {
                inner.realize(asm);
                asm.push(Op::Not);
            }
            ExprKind::Neg(inner) => {
                inner.realize(asm);
                asm.push(Op::Neg);
            }
            ExprKind::Concat(parts) => {
                for part in parts {
                    part.realize(asm);
                }
                asm.push(Op::Concat(parts.len() as u16));
            }
            ExprKind::Select {
                cond,
                then_branch,
                else_branch,
            } => {
                let base = asm.depth();
                let on_false = asm.new_label();
                let end = asm.new_label();
                cond.realize(asm);
                asm.jump_if_false(on_false);
                then_branch.realize(asm);
                asm.jump(end);
                asm.reset_depth(base);
                asm.bind(on_false);
                else_branch.realize(asm);
                asm.bind(end);
            }
            ExprKind::Cast(inner) => {
                inner.realize(asm);
                asm.push(Op::CastCheck(self.result_type));
            }
            ExprKind::CoerceBool(inner) => {
                inner.realize(asm);
                asm.push(Op::CoerceBool);
            }
            ExprKind::CoerceStr(inner) => {
                inner.realize(asm);
                asm.push(Op::CoerceStr);
            }
            ExprKind::Escape { inner, escaping } => {
                inner.realize(asm);
                asm.push(Op::Escape(*escaping));
            }
            ExprKind::Invoke { receiver, op, args } => {
                receiver.realize(asm);
                for arg in args {
                    arg.realize(asm);
                }
                match op {
                    Intrinsic::Len => asm.push(Op::ListLen),
                    Intrinsic::Index => asm.push(Op::GetIndex),
                    Intrinsic::Key => asm.push(Op::GetKey),
                }
            }
            ExprKind::Labeled { label, side, inner } => match side {
                LabelSide::Start => {
                    asm.bind(*label);
                    inner.realize(asm);
                }
                LabelSide::End => {
                    inner.realize(asm);
                    asm.bind(*label);
                }
            },
        }
    }
}

#[derive(Debug, Clone)]
enum StmtKind {
    Nop,
    Seq(Vec<Statement>),
    Discard(Expression),
    StoreLocal {
        slot: u16,
        value: Expression,
    },
    StoreField {
        slot: u16,
        value: Expression,
    },
    EmitRaw(String),
    EmitValue(Expression),
    If {
        arms: Vec<(Expression, Statement)>,
        else_branch: Option<Box<Statement>>,
    },
    Repeat {
        list: Expression,
        list_slot: u16,
        idx_slot: u16,
        len_slot: u16,
        item_slot: u16,
        body: Box<Statement>,
    },
    AwaitField {
        field: u16,
        point: u16,
    },
    SuspendIfLimited {
        point: u16,
    },
    CallUnit {
        unit_name: String,
        frame: u16,
        args: Vec<UnitArg>,
        capture: Option<u16>,
        point: u16,
    },
    Labeled {
        label: Label,
        side: LabelSide,
        inner: Box<Statement>,
    },
}

/// An immutable statement node: realizes to ops with no net stack
/// effect.
#[derive(Debug, Clone)]
pub struct Statement {
    kind: StmtKind,
}

impl Statement {
    pub fn nop() -> Self {
        Self { kind: StmtKind::Nop }
    }

    pub fn seq(statements: Vec<Statement>) -> Self {
        Self {
            kind: StmtKind::Seq(statements),
        }
    }

    pub fn store_local(slot: u16, value: Expression) -> Self {
        Self {
            kind: StmtKind::StoreLocal { slot, value },
        }
    }

    pub fn store_field(slot: u16, value: Expression) -> Self {
        Self {
            kind: StmtKind::StoreField { slot, value },
        }
    }

    pub fn emit_raw(text: impl Into<String>) -> Self {
        Self {
            kind: StmtKind::EmitRaw(text.into()),
        }
    }

    pub fn emit_value(value: Expression) -> Self {
        Self {
            kind: StmtKind::EmitValue(value),
        }
    }

    pub fn if_else(arms: Vec<(Expression, Statement)>, else_branch: Option<Statement>) -> Self {
        Self {
            kind: StmtKind::If {
                arms,
                else_branch: else_branch.map(Box::new),
            },
        }
    }

    /// Loop over a list. The caller supplies scratch locals for the
    /// list, the index, the length, and the item binding.
    pub fn repeat(
        list: Expression,
        list_slot: u16,
        idx_slot: u16,
        len_slot: u16,
        item_slot: u16,
        body: Statement,
    ) -> Self {
        Self {
            kind: StmtKind::Repeat {
                list,
                list_slot,
                idx_slot,
                len_slot,
                item_slot,
                body: Box::new(body),
            },
        }
    }

    pub fn await_field(field: u16, point: u16) -> Self {
        Self {
            kind: StmtKind::AwaitField { field, point },
        }
    }

    pub fn suspend_if_limited(point: u16) -> Self {
        Self {
            kind: StmtKind::SuspendIfLimited { point },
        }
    }

    pub fn call_unit(
        unit_name: impl Into<String>,
        frame: u16,
        args: Vec<UnitArg>,
        capture: Option<u16>,
        point: u16,
    ) -> Self {
        Self {
            kind: StmtKind::CallUnit {
                unit_name: unit_name.into(),
                frame,
                args,
                capture,
                point,
            },
        }
    }

    /// Attach a jump target immediately before or after realization.
    pub fn label_at(self, side: LabelSide, label: Label) -> Statement {
        Self {
            kind: StmtKind::Labeled {
                label,
                side,
                inner: Box::new(self),
            },
        }
    }

    /// Realize into ops. Leaves the stack as it found it.
    pub fn realize(&self, asm: &mut Assembler) {
        let before = asm.depth();
        self.realize_inner(asm);
        debug_assert_eq!(
            asm.depth(),
            before,
            "statement changed stack depth by {}",
            asm.depth() - before
        );
    }

    fn realize_inner(&self, asm: &mut Assembler) {
        match &self.kind {
            StmtKind::Nop => {}
            StmtKind::Seq(statements) => {
                for s in statements {
                    s.realize(asm);
                }
            }
            StmtKind::Discard(value) => {
                value.realize(asm);
                asm.push(Op::Pop);
            }
            StmtKind::StoreLocal { slot, value } => {
                value.realize(asm);
                asm.push(Op::StoreLocal(*slot));
            }
            StmtKind::StoreField { slot, value } => {
                value.realize(asm);
                asm.push(Op::StoreField(*slot));
            }
            StmtKind::EmitRaw(text) => {
                let idx = asm.intern(ConstValue::Str(text.clone()));
                asm.push(Op::EmitConst(idx));
            }
            StmtKind::EmitValue(value) => {
                value.realize(asm);
                asm.push(Op::Emit);
            }
            StmtKind::If { arms, else_branch } => {
                let end = asm.new_label();
                for (cond, body) in arms {
                    let next = asm.new_label();
                    cond.realize(asm);
                    asm.jump_if_false(next);
                    body.realize(asm);
                    asm.jump(end);
                    asm.bind(next);
                }
                if let Some(body) = else_branch {
                    body.realize(asm);
                }
                asm.bind(end);
            }
            StmtKind::Repeat {
                list,
                list_slot,
                idx_slot,
                len_slot,
                item_slot,
                body,
            } => {
                list.realize(asm);
                asm.push(Op::StoreLocal(*list_slot));
                let zero = asm.intern(ConstValue::Int(0));
                asm.push(Op::PushConst(zero));
                asm.push(Op::StoreLocal(*idx_slot));
                asm.push(Op::LoadLocal(*list_slot));
                asm.push(Op::ListLen);
                asm.push(Op::StoreLocal(*len_slot));

                let head = asm.new_label();
                let end = asm.new_label();
                asm.bind(head);
                asm.push(Op::LoadLocal(*idx_slot));
                asm.push(Op::LoadLocal(*len_slot));
                asm.push(Op::Binary(BinaryOp::Lt));
                asm.jump_if_false(end);

                asm.push(Op::LoadLocal(*list_slot));
                asm.push(Op::LoadLocal(*idx_slot));
                asm.push(Op::GetIndex);
                asm.push(Op::StoreLocal(*item_slot));
                body.realize(asm);

                let one = asm.intern(ConstValue::Int(1));
                asm.push(Op::LoadLocal(*idx_slot));
                asm.push(Op::PushConst(one));
                asm.push(Op::Binary(BinaryOp::Add));
                asm.push(Op::StoreLocal(*idx_slot));
                asm.jump(head);
                asm.bind(end);
            }
            StmtKind::AwaitField { field, point } => {
                asm.mark_point(*point);
                asm.push(Op::AwaitField {
                    field: *field,
                    point: *point,
                });
            }
            StmtKind::SuspendIfLimited { point } => {
                asm.mark_point(*point);
                asm.push(Op::SuspendIfLimited { point: *point });
            }
            StmtKind::CallUnit {
                unit_name,
                frame,
                args,
                capture,
                point,
            } => {
                let unit = asm.intern(ConstValue::Str(unit_name.clone()));
                asm.push(Op::NewFrame {
                    unit,
                    frame: *frame,
                });
                for arg in args {
                    match arg {
                        UnitArg::Eval { dst, value } => {
                            value.realize(asm);
                            asm.push(Op::BindArg {
                                frame: *frame,
                                dst: *dst,
                            });
                        }
                        UnitArg::PassField { dst, src } => {
                            asm.push(Op::BindFieldRef {
                                frame: *frame,
                                dst: *dst,
                                src: *src,
                            });
                        }
                    }
                }
                asm.mark_point(*point);
                match capture {
                    Some(local) => asm.push(Op::AdvanceFrameBuffered {
                        frame: *frame,
                        local: *local,
                        point: *point,
                    }),
                    None => asm.push(Op::AdvanceFrame {
                        frame: *frame,
                        point: *point,
                    }),
                }
            }
            StmtKind::Labeled { label, side, inner } => match side {
                LabelSide::Start => {
                    asm.bind(*label);
                    inner.realize(asm);
                }
                LabelSide::End => {
                    inner.realize(asm);
                    asm.bind(*label);
                }
            },
        }
    }
}
