//! The unit compiler: one template definition in, one or more compiled
//! units out.
//!
//! A template always yields its body unit plus a factory unit (the
//! parameter manifest); content blocks add one closure unit each.
//! Output order is deterministic: body, closures in extraction order,
//! factory.

use tracing::debug;

use weft_core::ast::{ParamDef, TemplateDef, TemplateVariant};
use weft_core::registry::TemplateRegistry;
use weft_core::{ContentKind, ErrorReporter};
use weft_ir::{CompiledUnit, Op, Statement, UnitKind, UnitName};

use weft_core::ast::TemplateNode;

use crate::body::{compile_nodes, BodyCx};
use crate::context::{CaptureSpec, UnitCx};
use crate::error::CompileError;

/// Compile one template into its units.
pub fn compile_template(
    def: &TemplateDef,
    registry: &TemplateRegistry,
    reporter: &ErrorReporter,
) -> Result<Vec<CompiledUnit>, CompileError> {
    UnitCompiler::new(registry, reporter).compile(def)
}

/// Compiles template definitions against a fixed registry, reporting
/// warnings on the shared channel.
pub struct UnitCompiler<'r> {
    registry: &'r TemplateRegistry,
    reporter: &'r ErrorReporter,
}

impl<'r> UnitCompiler<'r> {
    pub fn new(registry: &'r TemplateRegistry, reporter: &'r ErrorReporter) -> Self {
        Self { registry, reporter }
    }

    pub(crate) fn registry(&self) -> &TemplateRegistry {
        self.registry
    }

    pub fn compile(&self, def: &TemplateDef) -> Result<Vec<CompiledUnit>, CompileError> {
        debug!(template = %def.name, "compiling template");
        self.warn_unused_params(def);

        let mut aux = Vec::new();
        let mut closure_ix = 0usize;
        let mut cx = UnitCx::for_params(&def.params);
        let stmt = {
            let mut bcx = BodyCx {
                unit: &mut cx,
                compiler: self,
                owner: &def.name,
                variant: def.variant,
                aux: &mut aux,
                closure_ix: &mut closure_ix,
            };
            compile_nodes(&mut bcx, &def.body)?
        };
        let main = finish_unit(
            cx,
            UnitName::template(&def.name),
            UnitKind::Template,
            def.variant,
            def.content_kind,
            def.params.clone(),
            stmt,
        )?;

        let mut units = Vec::with_capacity(2 + aux.len());
        units.push(main);
        units.extend(aux);
        units.push(factory_unit(def));
        debug!(template = %def.name, units = units.len(), "template compiled");
        Ok(units)
    }

    /// Compile one `{let}` content block into a closure unit. Nested
    /// blocks recurse through the shared auxiliary list and index.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn compile_closure(
        &self,
        owner: &str,
        index: usize,
        kind: ContentKind,
        variant: TemplateVariant,
        captures: &[CaptureSpec],
        body: &[TemplateNode],
        aux: &mut Vec<CompiledUnit>,
        closure_ix: &mut usize,
    ) -> Result<CompiledUnit, CompileError> {
        let mut cx = UnitCx::for_captures(captures);
        let stmt = {
            let mut bcx = BodyCx {
                unit: &mut cx,
                compiler: self,
                owner,
                variant,
                aux,
                closure_ix,
            };
            compile_nodes(&mut bcx, body)?
        };
        finish_unit(
            cx,
            UnitName::closure(owner, index),
            UnitKind::Closure,
            variant,
            kind,
            Vec::new(),
            stmt,
        )
    }

    fn warn_unused_params(&self, def: &TemplateDef) {
        let mut referenced = Vec::new();
        collect_param_refs(&def.body, &mut referenced);
        for param in &def.params {
            if !referenced.iter().any(|n| n == &param.name) {
                self.reporter.warning(
                    Some(def.loc.clone()),
                    format!(
                        "parameter '{}' of template '{}' is never referenced",
                        param.name, def.name
                    ),
                );
            }
        }
    }
}

fn collect_param_refs(nodes: &[TemplateNode], out: &mut Vec<String>) {
    use weft_core::ast::LetBinding;
    for node in nodes {
        match node {
            TemplateNode::RawText { .. } => {}
            TemplateNode::Print { expr, .. } => expr.collect_params(out),
            TemplateNode::If {
                arms, else_body, ..
            } => {
                for arm in arms {
                    arm.cond.collect_params(out);
                    collect_param_refs(&arm.body, out);
                }
                if let Some(body) = else_body {
                    collect_param_refs(body, out);
                }
            }
            TemplateNode::For { over, body, .. } => {
                over.collect_params(out);
                collect_param_refs(body, out);
            }
            TemplateNode::Let { binding, .. } => match binding {
                LetBinding::Expr(value) => value.collect_params(out),
                LetBinding::Block { body, .. } => collect_param_refs(body, out),
            },
            TemplateNode::Call { args, .. } => {
                for arg in args {
                    arg.value.collect_params(out);
                }
            }
        }
    }
}

/// Realize the body and seal the unit.
fn finish_unit(
    mut cx: UnitCx,
    name: UnitName,
    kind: UnitKind,
    variant: TemplateVariant,
    content_kind: ContentKind,
    params: Vec<ParamDef>,
    stmt: Statement,
) -> Result<CompiledUnit, CompileError> {
    stmt.realize(&mut cx.asm);
    cx.asm.push(Op::Return);
    let local_count = cx.local_count();
    let fields = std::mem::take(&mut cx.fields);
    let out = cx
        .asm
        .finish()
        .map_err(|e| CompileError::internal(None, e.to_string()))?;
    Ok(CompiledUnit {
        name,
        kind,
        variant,
        content_kind,
        params,
        fields,
        local_count,
        consts: out.consts,
        ops: out.ops,
        points: out.points,
        max_stack: out.max_stack,
    })
}

/// The auxiliary parameter-manifest unit: carries the signature and no
/// render logic.
fn factory_unit(def: &TemplateDef) -> CompiledUnit {
    let fields = UnitCx::for_params(&def.params).fields;
    CompiledUnit {
        name: UnitName::factory(&def.name),
        kind: UnitKind::Factory,
        variant: def.variant,
        content_kind: def.content_kind,
        params: def.params.clone(),
        fields,
        local_count: 0,
        consts: Vec::new(),
        ops: Vec::new(),
        points: Vec::new(),
        max_stack: 0,
    }
}
