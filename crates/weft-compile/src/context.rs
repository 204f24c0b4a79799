//! Per-unit compilation state: field and local allocation, scopes, and
//! suspension-point bookkeeping.

use std::collections::HashMap;

use weft_core::ast::ParamDef;
use weft_core::ValueKind;
use weft_ir::{Assembler, FieldDef, FieldRole, SavedLocal, SuspendReason};

/// How a name in scope is accessed.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Binding {
    /// A parameter or capture stored in a unit field.
    Field {
        field: u16,
        deferred: bool,
        ty: ValueKind,
    },
    /// A local variable slot.
    Local { slot: u16, ty: ValueKind },
}

/// A capture a closure unit takes from its enclosing unit.
#[derive(Debug, Clone)]
pub(crate) struct CaptureSpec {
    pub name: String,
    pub ty: ValueKind,
    pub deferred: bool,
    pub source: CaptureSource,
}

/// Where the capture's value lives in the enclosing unit.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CaptureSource {
    /// A field of the parent; passed through as-is so a still-late
    /// value stays lazy.
    Field(u16),
    /// A parent local, evaluated strictly at frame construction.
    Local(u16),
}

#[derive(Debug, Default)]
struct Scope {
    bindings: Vec<(String, Binding)>,
    locals: Vec<u16>,
}

/// Compilation state for one unit.
pub(crate) struct UnitCx {
    pub asm: Assembler,
    pub fields: Vec<FieldDef>,
    /// Parameters or captures addressable by name.
    named_fields: Vec<(String, Binding)>,
    scopes: Vec<Scope>,
    next_local: u16,
    /// Save-field per local, allocated on first suspension that covers
    /// the local.
    saved_fields: HashMap<u16, u16>,
}

impl UnitCx {
    /// Set up a unit whose leading fields are its parameters.
    pub fn for_params(params: &[ParamDef]) -> Self {
        let mut cx = Self::empty();
        for (index, param) in params.iter().enumerate() {
            let field = cx.fields.len() as u16;
            cx.fields.push(FieldDef {
                name: param.name.clone(),
                role: FieldRole::Param {
                    index: index as u16,
                    deferred: param.deferred,
                },
                ty: param.ty,
            });
            cx.named_fields.push((
                param.name.clone(),
                Binding::Field {
                    field,
                    deferred: param.deferred,
                    ty: param.ty,
                },
            ));
        }
        cx
    }

    /// Set up a closure unit whose leading fields are its captures.
    pub fn for_captures(captures: &[CaptureSpec]) -> Self {
        let mut cx = Self::empty();
        for (index, capture) in captures.iter().enumerate() {
            let field = cx.fields.len() as u16;
            cx.fields.push(FieldDef {
                name: capture.name.clone(),
                role: FieldRole::Capture {
                    index: index as u16,
                },
                ty: capture.ty,
            });
            cx.named_fields.push((
                capture.name.clone(),
                Binding::Field {
                    field,
                    deferred: capture.deferred,
                    ty: capture.ty,
                },
            ));
        }
        cx
    }

    fn empty() -> Self {
        Self {
            asm: Assembler::new(),
            fields: Vec::new(),
            named_fields: Vec::new(),
            scopes: vec![Scope::default()],
            next_local: 0,
            saved_fields: HashMap::new(),
        }
    }

    /// Resolve a name: innermost scope first, then parameters/captures.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        for scope in self.scopes.iter().rev() {
            if let Some((_, binding)) = scope.bindings.iter().rev().find(|(n, _)| n == name) {
                return Some(*binding);
            }
        }
        self.named_fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| *b)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Allocate a local slot, registering it live in the current scope.
    pub fn alloc_local(&mut self) -> u16 {
        let slot = self.next_local;
        self.next_local += 1;
        self.scopes
            .last_mut()
            .expect("scope stack never empty")
            .locals
            .push(slot);
        slot
    }

    /// Bind a name to a local in the current scope.
    pub fn bind_local(&mut self, name: impl Into<String>, slot: u16, ty: ValueKind) {
        self.scopes
            .last_mut()
            .expect("scope stack never empty")
            .bindings
            .push((name.into(), Binding::Local { slot, ty }));
    }

    pub fn local_count(&self) -> u16 {
        self.next_local
    }

    /// Allocate a child-frame field for one call site.
    pub fn frame_field(&mut self) -> u16 {
        let field = self.fields.len() as u16;
        self.fields.push(FieldDef {
            name: format!("$frame_{field}"),
            role: FieldRole::ChildFrame,
            ty: ValueKind::Any,
        });
        field
    }

    /// Register a suspension point saving every local currently in
    /// scope — a sound over-approximation of liveness.
    pub fn point(&mut self, reason: SuspendReason) -> u16 {
        let live: Vec<u16> = self
            .scopes
            .iter()
            .flat_map(|s| s.locals.iter().copied())
            .collect();
        let saved = live
            .into_iter()
            .map(|local| SavedLocal {
                local,
                field: self.saved_field(local),
            })
            .collect();
        self.asm.add_point(reason, saved)
    }

    fn saved_field(&mut self, local: u16) -> u16 {
        if let Some(&field) = self.saved_fields.get(&local) {
            return field;
        }
        let field = self.fields.len() as u16;
        self.fields.push(FieldDef {
            name: format!("$saved_{local}"),
            role: FieldRole::SavedLocal,
            ty: ValueKind::Any,
        });
        self.saved_fields.insert(local, field);
        field
    }
}
