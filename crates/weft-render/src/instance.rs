//! The render instance: one unit, one render in progress.
//!
//! Advancing interprets the unit's ops until completion or suspension.
//! All resumable state lives in the instance's fields; abandoning an
//! instance between advances has no side effect, and an instance is
//! never advanced from two threads at once (`&mut self` enforces it).

use std::mem;
use std::sync::Arc;

use tracing::trace;

use weft_ir::{CompiledUnit, ConstValue, FieldRole, Op, UnitKind};

use crate::error::RenderError;
use crate::escape;
use crate::input::{LateValue, Provided};
use crate::sink::OutputSink;
use crate::value::Value;

/// The status an advance returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Rendering finished; the instance should not be advanced again.
    Done,
    /// A deferred input was unavailable; advance again after supplying
    /// it.
    DataUnavailable,
    /// The sink reported backpressure; advance again once it clears.
    OutputLimited,
}

/// Resolves unit names during rendering. Implemented by the in-memory
/// unit set (archive mode) and by the on-demand load cache.
pub trait UnitSource {
    fn lookup(&self, name: &str) -> Option<Arc<CompiledUnit>>;
}

/// One field slot of a live instance.
#[derive(Debug)]
enum Slot {
    /// Required parameter not yet bound.
    Empty,
    Value(Value),
    /// A deferred input that has not been resolved yet.
    Late(LateValue),
    /// A child render held across a call.
    Frame(Box<RenderInstance>),
}

impl Slot {
    fn from_provided(provided: Provided) -> Self {
        match provided {
            Provided::Value(v) => Slot::Value(v),
            Provided::Late(l) => Slot::Late(l),
        }
    }
}

/// Named parameter bindings supplied by the host.
#[derive(Debug, Default)]
pub struct ParamBindings {
    entries: Vec<(String, Provided)>,
}

impl ParamBindings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.push((name.into(), Provided::Value(value)));
        self
    }

    #[must_use]
    pub fn set_late(mut self, name: impl Into<String>, late: LateValue) -> Self {
        self.entries.push((name.into(), Provided::Late(late)));
        self
    }
}

/// A render in progress.
#[derive(Debug)]
pub struct RenderInstance {
    unit: Arc<CompiledUnit>,
    fields: Vec<Slot>,
    locals: Vec<Value>,
    resume: Option<u16>,
    /// Capture buffer used when a parent advances this instance in
    /// buffered mode; persists across suspensions.
    buffer: String,
}

impl RenderInstance {
    /// Instantiate with host-supplied bindings, validating them against
    /// the unit's parameter manifest.
    pub fn new(unit: Arc<CompiledUnit>, bindings: ParamBindings) -> Result<Self, RenderError> {
        let mut instance = Self::for_unit(unit);
        for (name, provided) in bindings.entries {
            let field = instance
                .unit
                .param_field(&name)
                .ok_or_else(|| RenderError::UnknownParam {
                    param: name.clone(),
                })?;
            instance.fields[field as usize] = Slot::from_provided(provided);
        }
        for (idx, field) in instance.unit.fields.iter().enumerate() {
            if let FieldRole::Param { .. } = field.role {
                let required = instance
                    .unit
                    .params
                    .iter()
                    .find(|p| p.name == field.name)
                    .map(|p| p.required)
                    .unwrap_or(false);
                if required && matches!(instance.fields[idx], Slot::Empty) {
                    return Err(RenderError::MissingParam {
                        param: field.name.clone(),
                    });
                }
            }
        }
        Ok(instance)
    }

    /// Bare instantiation used for compiler-constructed child frames,
    /// where the call site already bound every argument.
    fn for_unit(unit: Arc<CompiledUnit>) -> Self {
        let fields = unit
            .fields
            .iter()
            .map(|f| match f.role {
                FieldRole::Param { .. } | FieldRole::Capture { .. } => {
                    let required = unit
                        .params
                        .iter()
                        .find(|p| p.name == f.name)
                        .map(|p| p.required)
                        .unwrap_or(true);
                    if required {
                        Slot::Empty
                    } else {
                        Slot::Value(Value::Null)
                    }
                }
                FieldRole::SavedLocal | FieldRole::ChildFrame => Slot::Empty,
            })
            .collect();
        let locals = vec![Value::Null; unit.local_count as usize];
        Self {
            unit,
            fields,
            locals,
            resume: None,
            buffer: String::new(),
        }
    }

    pub fn unit(&self) -> &CompiledUnit {
        &self.unit
    }

    /// Run until done or suspended. Resumes from the recorded point if
    /// the previous advance suspended.
    pub fn advance(
        &mut self,
        sink: &mut dyn OutputSink,
        units: &dyn UnitSource,
    ) -> Result<RenderStatus, RenderError> {
        if self.unit.kind == UnitKind::Factory {
            return Err(RenderError::CorruptUnit {
                detail: "factory units carry no render logic".into(),
            });
        }
        let unit = Arc::clone(&self.unit);
        let mut ip: usize = 0;
        if let Some(point_id) = self.resume.take() {
            let point = unit.points.get(point_id as usize).ok_or_else(|| {
                RenderError::CorruptUnit {
                    detail: format!("resume point {point_id} out of range"),
                }
            })?;
            for saved in &point.saved {
                let value = match &self.fields[saved.field as usize] {
                    Slot::Value(v) => v.clone(),
                    _ => {
                        return Err(RenderError::CorruptUnit {
                            detail: format!("saved local missing in field {}", saved.field),
                        })
                    }
                };
                self.locals[saved.local as usize] = value;
            }
            ip = point.resume_ip as usize;
            trace!(unit = %unit.name, point = point_id, ip, "resuming render");
        }

        let mut stack: Vec<Value> = Vec::with_capacity(unit.max_stack as usize);

        loop {
            let op = match unit.ops.get(ip) {
                Some(op) => op,
                None => return Ok(RenderStatus::Done),
            };
            match op {
                Op::PushConst(idx) => {
                    stack.push(self.const_value(&unit, *idx)?);
                }
                Op::LoadLocal(slot) => {
                    stack.push(self.locals[*slot as usize].clone());
                }
                Op::StoreLocal(slot) => {
                    self.locals[*slot as usize] = pop(&mut stack)?;
                }
                Op::LoadField(slot) => {
                    let value = match &self.fields[*slot as usize] {
                        Slot::Value(v) => v.clone(),
                        Slot::Late(_) => {
                            return Err(RenderError::UnresolvedInput {
                                field: self.field_name(&unit, *slot),
                            })
                        }
                        Slot::Empty => {
                            return Err(RenderError::MissingParam {
                                param: self.field_name(&unit, *slot),
                            })
                        }
                        Slot::Frame(_) => {
                            return Err(RenderError::CorruptUnit {
                                detail: format!("value read from frame field {slot}"),
                            })
                        }
                    };
                    stack.push(value);
                }
                Op::StoreField(slot) => {
                    self.fields[*slot as usize] = Slot::Value(pop(&mut stack)?);
                }
                Op::Binary(op) => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    stack.push(Value::binary(*op, lhs, rhs)?);
                }
                Op::Not => {
                    let v = pop(&mut stack)?;
                    stack.push(Value::Bool(!v.truthy()));
                }
                Op::Neg => {
                    let v = pop(&mut stack)?;
                    match v {
                        Value::Int(i) => stack.push(Value::Int(i.wrapping_neg())),
                        Value::Float(f) => stack.push(Value::Float(-f)),
                        other => {
                            return Err(RenderError::TypeMismatch {
                                detail: format!("negation of {}", other.kind()),
                            })
                        }
                    }
                }
                Op::Concat(n) => {
                    let n = *n as usize;
                    let start = stack.len().checked_sub(n).ok_or_else(|| {
                        RenderError::CorruptUnit {
                            detail: "concat underflow".into(),
                        }
                    })?;
                    let mut text = String::new();
                    for v in stack.drain(start..) {
                        text.push_str(&v.render_text());
                    }
                    stack.push(Value::Str(text));
                }
                Op::CoerceBool => {
                    let v = pop(&mut stack)?;
                    stack.push(Value::Bool(v.truthy()));
                }
                Op::CoerceStr => {
                    let v = pop(&mut stack)?;
                    stack.push(Value::Str(v.render_text()));
                }
                Op::CastCheck(target) => {
                    let v = stack.last().ok_or_else(|| RenderError::CorruptUnit {
                        detail: "cast on empty stack".into(),
                    })?;
                    if !v.conforms(*target) {
                        return Err(RenderError::CastFailed {
                            expected: *target,
                            found: v.kind(),
                        });
                    }
                }
                Op::Escape(escaping) => {
                    let v = pop(&mut stack)?;
                    stack.push(Value::Str(escape::apply(*escaping, &v.render_text())));
                }
                Op::GetIndex => {
                    let idx = pop(&mut stack)?;
                    let base = pop(&mut stack)?;
                    let value = match (&base, &idx) {
                        (Value::List(items), Value::Int(i)) => {
                            usize::try_from(*i)
                                .ok()
                                .and_then(|i| items.get(i).cloned())
                                .unwrap_or(Value::Null)
                        }
                        _ => {
                            return Err(RenderError::TypeMismatch {
                                detail: format!(
                                    "index {} into {}",
                                    idx.kind(),
                                    base.kind()
                                ),
                            })
                        }
                    };
                    stack.push(value);
                }
                Op::GetKey => {
                    let key = pop(&mut stack)?;
                    let base = pop(&mut stack)?;
                    let value = match (&base, &key) {
                        (Value::Map(entries), Value::Str(k)) => {
                            entries.get(k).cloned().unwrap_or(Value::Null)
                        }
                        _ => {
                            return Err(RenderError::TypeMismatch {
                                detail: format!("key {} into {}", key.kind(), base.kind()),
                            })
                        }
                    };
                    stack.push(value);
                }
                Op::ListLen => {
                    let v = pop(&mut stack)?;
                    match v {
                        Value::List(items) => stack.push(Value::Int(items.len() as i64)),
                        other => {
                            return Err(RenderError::TypeMismatch {
                                detail: format!("length of {}", other.kind()),
                            })
                        }
                    }
                }
                Op::Pop => {
                    pop(&mut stack)?;
                }
                Op::Jump(target) => {
                    ip = *target as usize;
                    continue;
                }
                Op::JumpIfFalse(target) => {
                    let v = pop(&mut stack)?;
                    if !v.truthy() {
                        ip = *target as usize;
                        continue;
                    }
                }
                Op::Emit => {
                    let v = pop(&mut stack)?;
                    sink.push_str(&v.render_text());
                }
                Op::EmitConst(idx) => {
                    match self.const_value(&unit, *idx)? {
                        Value::Str(s) => sink.push_str(&s),
                        other => {
                            return Err(RenderError::CorruptUnit {
                                detail: format!("emit_const of {}", other.kind()),
                            })
                        }
                    }
                }
                Op::AwaitField { field, point } => {
                    match &self.fields[*field as usize] {
                        Slot::Value(_) => {}
                        Slot::Late(late) => match late.get() {
                            Some(value) => {
                                self.fields[*field as usize] = Slot::Value(value);
                            }
                            None => {
                                self.suspend(&unit, *point)?;
                                return Ok(RenderStatus::DataUnavailable);
                            }
                        },
                        _ => {
                            return Err(RenderError::MissingParam {
                                param: self.field_name(&unit, *field),
                            })
                        }
                    }
                }
                Op::SuspendIfLimited { point } => {
                    if sink.is_limited() {
                        self.suspend(&unit, *point)?;
                        return Ok(RenderStatus::OutputLimited);
                    }
                }
                Op::NewFrame { unit: name_idx, frame } => {
                    let name = match self.const_value(&unit, *name_idx)? {
                        Value::Str(s) => s,
                        other => {
                            return Err(RenderError::CorruptUnit {
                                detail: format!("frame unit name of kind {}", other.kind()),
                            })
                        }
                    };
                    let callee = units
                        .lookup(&name)
                        .ok_or(RenderError::MissingUnit { name })?;
                    self.fields[*frame as usize] =
                        Slot::Frame(Box::new(RenderInstance::for_unit(callee)));
                }
                Op::BindArg { frame, dst } => {
                    let value = pop(&mut stack)?;
                    match &mut self.fields[*frame as usize] {
                        Slot::Frame(child) => {
                            child.fields[*dst as usize] = Slot::Value(value);
                        }
                        _ => {
                            return Err(RenderError::CorruptUnit {
                                detail: format!("bind into non-frame field {frame}"),
                            })
                        }
                    }
                }
                Op::BindFieldRef { frame, dst, src } => {
                    let passed = match &self.fields[*src as usize] {
                        Slot::Value(v) => Slot::Value(v.clone()),
                        Slot::Late(l) => Slot::Late(l.clone()),
                        _ => {
                            return Err(RenderError::CorruptUnit {
                                detail: format!("pass-through of field {src}"),
                            })
                        }
                    };
                    match &mut self.fields[*frame as usize] {
                        Slot::Frame(child) => {
                            child.fields[*dst as usize] = passed;
                        }
                        _ => {
                            return Err(RenderError::CorruptUnit {
                                detail: format!("bind into non-frame field {frame}"),
                            })
                        }
                    }
                }
                Op::AdvanceFrame { frame, point } => {
                    let mut child = self.take_frame(*frame)?;
                    let status = child.advance(sink, units)?;
                    match status {
                        RenderStatus::Done => {}
                        pending => {
                            self.fields[*frame as usize] = Slot::Frame(child);
                            self.suspend(&unit, *point)?;
                            return Ok(pending);
                        }
                    }
                }
                Op::AdvanceFrameBuffered { frame, local, point } => {
                    let mut child = self.take_frame(*frame)?;
                    let mut buf = mem::take(&mut child.buffer);
                    let status = child.advance(&mut buf, units)?;
                    child.buffer = buf;
                    match status {
                        RenderStatus::Done => {
                            let text = mem::take(&mut child.buffer);
                            let kind = child.unit.content_kind;
                            self.locals[*local as usize] = Value::Content { kind, text };
                        }
                        pending => {
                            self.fields[*frame as usize] = Slot::Frame(child);
                            self.suspend(&unit, *point)?;
                            return Ok(pending);
                        }
                    }
                }
                Op::Return => return Ok(RenderStatus::Done),
            }
            ip += 1;
        }
    }

    fn take_frame(&mut self, frame: u16) -> Result<Box<RenderInstance>, RenderError> {
        match mem::replace(&mut self.fields[frame as usize], Slot::Empty) {
            Slot::Frame(child) => Ok(child),
            other => {
                self.fields[frame as usize] = other;
                Err(RenderError::CorruptUnit {
                    detail: format!("advance of non-frame field {frame}"),
                })
            }
        }
    }

    fn suspend(&mut self, unit: &CompiledUnit, point: u16) -> Result<(), RenderError> {
        let entry = unit
            .points
            .get(point as usize)
            .ok_or_else(|| RenderError::CorruptUnit {
                detail: format!("suspension point {point} out of range"),
            })?;
        for saved in &entry.saved {
            self.fields[saved.field as usize] =
                Slot::Value(self.locals[saved.local as usize].clone());
        }
        self.resume = Some(point);
        trace!(unit = %unit.name, point, "render suspended");
        Ok(())
    }

    fn const_value(&self, unit: &CompiledUnit, idx: u32) -> Result<Value, RenderError> {
        let c = unit
            .consts
            .get(idx as usize)
            .ok_or_else(|| RenderError::CorruptUnit {
                detail: format!("constant {idx} out of range"),
            })?;
        Ok(match c {
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Int(i) => Value::Int(*i),
            ConstValue::Float(f) => Value::Float(*f),
            ConstValue::Str(s) => Value::Str(s.clone()),
        })
    }

    fn field_name(&self, unit: &CompiledUnit, field: u16) -> String {
        unit.fields
            .get(field as usize)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| format!("#{field}"))
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, RenderError> {
    stack.pop().ok_or_else(|| RenderError::CorruptUnit {
        detail: "operand stack underflow".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::ast::{ParamDef, TemplateVariant};
    use weft_core::{ContentKind, ValueKind};
    use weft_ir::{
        Assembler, CompiledUnit, FieldDef, SavedLocal, SuspendReason, UnitName, UnitStats,
    };

    use crate::sink::LimitedSink;

    struct NoUnits;
    impl UnitSource for NoUnits {
        fn lookup(&self, _name: &str) -> Option<Arc<CompiledUnit>> {
            None
        }
    }

    struct UnitMap(Vec<Arc<CompiledUnit>>);
    impl UnitSource for UnitMap {
        fn lookup(&self, name: &str) -> Option<Arc<CompiledUnit>> {
            self.0.iter().find(|u| u.name.to_string() == name).cloned()
        }
    }

    fn unit_from(asm: Assembler, fields: Vec<FieldDef>, locals: u16) -> CompiledUnit {
        let out = asm.finish().unwrap();
        CompiledUnit {
            name: UnitName::template("test.unit"),
            kind: weft_ir::UnitKind::Template,
            variant: TemplateVariant::Ordinary,
            content_kind: ContentKind::Text,
            params: vec![],
            fields,
            local_count: locals,
            consts: out.consts,
            ops: out.ops,
            points: out.points,
            max_stack: out.max_stack,
        }
    }

    #[test]
    fn arithmetic_and_emit() {
        let mut asm = Assembler::new();
        let a = asm.intern(weft_ir::ConstValue::Int(3));
        let b = asm.intern(weft_ir::ConstValue::Int(4));
        asm.push(Op::PushConst(a));
        asm.push(Op::PushConst(b));
        asm.push(Op::Binary(weft_core::BinaryOp::Add));
        asm.push(Op::Emit);
        asm.push(Op::Return);
        let unit = Arc::new(unit_from(asm, vec![], 0));

        let mut instance = RenderInstance::new(unit, ParamBindings::new()).unwrap();
        let mut out = String::new();
        let status = instance.advance(&mut out, &NoUnits).unwrap();
        assert_eq!(status, RenderStatus::Done);
        assert_eq!(out, "7");
    }

    #[test]
    fn await_suspends_and_resumes_without_repeating_output() {
        let mut asm = Assembler::new();
        let point = asm.add_point(SuspendReason::DataUnavailable, vec![]);
        let a = asm.intern(weft_ir::ConstValue::Str("A".into()));
        asm.push(Op::EmitConst(a));
        asm.mark_point(point);
        asm.push(Op::AwaitField { field: 0, point });
        asm.push(Op::LoadField(0));
        asm.push(Op::Emit);
        asm.push(Op::Return);
        let mut unit = unit_from(
            asm,
            vec![FieldDef {
                name: "msg".into(),
                role: FieldRole::Param {
                    index: 0,
                    deferred: true,
                },
                ty: ValueKind::Str,
            }],
            0,
        );
        unit.params = vec![ParamDef {
            name: "msg".into(),
            ty: ValueKind::Str,
            required: true,
            deferred: true,
        }];
        let unit = Arc::new(unit);

        let late = LateValue::new();
        let mut instance = RenderInstance::new(
            Arc::clone(&unit),
            ParamBindings::new().set_late("msg", late.clone()),
        )
        .unwrap();

        let mut out = String::new();
        let status = instance.advance(&mut out, &NoUnits).unwrap();
        assert_eq!(status, RenderStatus::DataUnavailable);
        assert_eq!(out, "A");

        late.supply(Value::Str("B".into()));
        let status = instance.advance(&mut out, &NoUnits).unwrap();
        assert_eq!(status, RenderStatus::Done);
        assert_eq!(out, "AB");

        // The same template with the input ready up front produces the
        // same concatenated output.
        let mut eager = RenderInstance::new(
            unit,
            ParamBindings::new().set("msg", Value::Str("B".into())),
        )
        .unwrap();
        let mut whole = String::new();
        assert_eq!(
            eager.advance(&mut whole, &NoUnits).unwrap(),
            RenderStatus::Done
        );
        assert_eq!(whole, out);
    }

    #[test]
    fn backpressure_suspends_with_output_limited() {
        let mut asm = Assembler::new();
        let point = asm.add_point(SuspendReason::OutputLimited, vec![]);
        let x = asm.intern(weft_ir::ConstValue::Str("x".into()));
        let y = asm.intern(weft_ir::ConstValue::Str("y".into()));
        asm.push(Op::EmitConst(x));
        asm.mark_point(point);
        asm.push(Op::SuspendIfLimited { point });
        asm.push(Op::EmitConst(y));
        asm.push(Op::Return);
        let unit = Arc::new(unit_from(asm, vec![], 0));

        let mut instance = RenderInstance::new(unit, ParamBindings::new()).unwrap();
        let mut sink = LimitedSink::new();
        sink.set_limited(true);
        let status = instance.advance(&mut sink, &NoUnits).unwrap();
        assert_eq!(status, RenderStatus::OutputLimited);
        assert_eq!(sink.as_str(), "x");

        sink.set_limited(false);
        let status = instance.advance(&mut sink, &NoUnits).unwrap();
        assert_eq!(status, RenderStatus::Done);
        assert_eq!(sink.as_str(), "xy");
    }

    #[test]
    fn saved_locals_survive_suspension() {
        let mut asm = Assembler::new();
        let point = asm.add_point(
            SuspendReason::DataUnavailable,
            vec![SavedLocal { local: 0, field: 1 }],
        );
        let v = asm.intern(weft_ir::ConstValue::Str("kept".into()));
        asm.push(Op::PushConst(v));
        asm.push(Op::StoreLocal(0));
        asm.mark_point(point);
        asm.push(Op::AwaitField { field: 0, point });
        asm.push(Op::LoadLocal(0));
        asm.push(Op::Emit);
        asm.push(Op::Return);
        let mut unit = unit_from(
            asm,
            vec![
                FieldDef {
                    name: "gate".into(),
                    role: FieldRole::Param {
                        index: 0,
                        deferred: true,
                    },
                    ty: ValueKind::Str,
                },
                FieldDef {
                    name: "$saved_0".into(),
                    role: FieldRole::SavedLocal,
                    ty: ValueKind::Any,
                },
            ],
            1,
        );
        unit.params = vec![ParamDef {
            name: "gate".into(),
            ty: ValueKind::Str,
            required: true,
            deferred: true,
        }];
        let unit = Arc::new(unit);

        let late = LateValue::new();
        let mut instance = RenderInstance::new(
            unit,
            ParamBindings::new().set_late("gate", late.clone()),
        )
        .unwrap();
        let mut out = String::new();
        assert_eq!(
            instance.advance(&mut out, &NoUnits).unwrap(),
            RenderStatus::DataUnavailable
        );
        late.supply(Value::Str("open".into()));
        assert_eq!(
            instance.advance(&mut out, &NoUnits).unwrap(),
            RenderStatus::Done
        );
        assert_eq!(out, "kept");
    }

    #[test]
    fn call_frames_render_children_inline() {
        // Child: emits its one parameter.
        let mut child_asm = Assembler::new();
        child_asm.push(Op::LoadField(0));
        child_asm.push(Op::Emit);
        child_asm.push(Op::Return);
        let mut child = unit_from(
            child_asm,
            vec![FieldDef {
                name: "word".into(),
                role: FieldRole::Param {
                    index: 0,
                    deferred: false,
                },
                ty: ValueKind::Str,
            }],
            0,
        );
        child.name = UnitName::template("test.child");
        child.params = vec![ParamDef {
            name: "word".into(),
            ty: ValueKind::Str,
            required: true,
            deferred: false,
        }];

        // Parent: "(" + call child(word: "mid") + ")".
        let mut asm = Assembler::new();
        let point = asm.add_point(SuspendReason::Call, vec![]);
        let open = asm.intern(weft_ir::ConstValue::Str("(".into()));
        let name = asm.intern(weft_ir::ConstValue::Str("test.child".into()));
        let mid = asm.intern(weft_ir::ConstValue::Str("mid".into()));
        let close = asm.intern(weft_ir::ConstValue::Str(")".into()));
        asm.push(Op::EmitConst(open));
        asm.push(Op::NewFrame {
            unit: name,
            frame: 0,
        });
        asm.push(Op::PushConst(mid));
        asm.push(Op::BindArg { frame: 0, dst: 0 });
        asm.mark_point(point);
        asm.push(Op::AdvanceFrame { frame: 0, point });
        asm.push(Op::EmitConst(close));
        asm.push(Op::Return);
        let parent = unit_from(
            asm,
            vec![FieldDef {
                name: "$frame_0".into(),
                role: FieldRole::ChildFrame,
                ty: ValueKind::Any,
            }],
            0,
        );

        let units = UnitMap(vec![Arc::new(child)]);
        let mut instance =
            RenderInstance::new(Arc::new(parent), ParamBindings::new()).unwrap();
        let mut out = String::new();
        assert_eq!(
            instance.advance(&mut out, &units).unwrap(),
            RenderStatus::Done
        );
        assert_eq!(out, "(mid)");
    }

    #[test]
    fn missing_required_param_is_rejected_at_instantiation() {
        let mut asm = Assembler::new();
        asm.push(Op::Return);
        let mut unit = unit_from(
            asm,
            vec![FieldDef {
                name: "needed".into(),
                role: FieldRole::Param {
                    index: 0,
                    deferred: false,
                },
                ty: ValueKind::Str,
            }],
            0,
        );
        unit.params = vec![ParamDef {
            name: "needed".into(),
            ty: ValueKind::Str,
            required: true,
            deferred: false,
        }];
        let err = RenderInstance::new(Arc::new(unit), ParamBindings::new()).unwrap_err();
        assert!(matches!(err, RenderError::MissingParam { .. }));
    }

    #[test]
    fn unknown_param_is_rejected() {
        let mut asm = Assembler::new();
        asm.push(Op::Return);
        let unit = Arc::new(unit_from(asm, vec![], 0));
        let err = RenderInstance::new(
            unit,
            ParamBindings::new().set("mystery", Value::Int(1)),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::UnknownParam { .. }));
    }

    #[test]
    fn stats_are_available_from_the_unit() {
        let mut asm = Assembler::new();
        asm.push(Op::Return);
        let unit = unit_from(asm, vec![], 0);
        let stats: UnitStats = unit.stats();
        assert_eq!(stats.op_count, 1);
    }
}
