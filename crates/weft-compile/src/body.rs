//! Template-body lowering: constructs into IR statements.
//!
//! Reads of deferred parameters are preceded by await points at
//! statement granularity, every emitting statement is followed by an
//! output checkpoint, and `{let}` content blocks are extracted into
//! closure units capturing exactly the bindings they reference.

use weft_core::ast::{
    CallArg, ExprNode, LetBinding, TemplateNode, TypedExpr,
};
use weft_core::ValueKind;
use weft_ir::{Expression, Statement, SuspendReason, UnitArg};

use crate::context::{Binding, CaptureSource, CaptureSpec, UnitCx};
use crate::error::CompileError;
use crate::expr::compile_expr;
use crate::unit_compiler::UnitCompiler;

/// Everything one body compilation needs: the unit under construction
/// plus the shared machinery for extracting auxiliary units.
pub(crate) struct BodyCx<'a, 'r> {
    pub unit: &'a mut UnitCx,
    pub compiler: &'a UnitCompiler<'r>,
    pub owner: &'a str,
    pub variant: weft_core::ast::TemplateVariant,
    pub aux: &'a mut Vec<weft_ir::CompiledUnit>,
    pub closure_ix: &'a mut usize,
}

/// Lower a sequence of template nodes into one statement.
pub(crate) fn compile_nodes(
    bcx: &mut BodyCx<'_, '_>,
    nodes: &[TemplateNode],
) -> Result<Statement, CompileError> {
    let mut stmts = Vec::new();
    for node in nodes {
        compile_node(bcx, node, &mut stmts)?;
    }
    Ok(Statement::seq(stmts))
}

fn compile_node(
    bcx: &mut BodyCx<'_, '_>,
    node: &TemplateNode,
    out: &mut Vec<Statement>,
) -> Result<(), CompileError> {
    match node {
        TemplateNode::RawText { text, .. } => {
            out.push(Statement::emit_raw(text.clone()));
            push_output_checkpoint(bcx, out);
        }
        TemplateNode::Print { expr, escape, .. } => {
            push_awaits(bcx, &[expr], out);
            let mut value = compile_expr(bcx.unit, expr)?;
            if !matches!(escape, weft_core::ast::Escaping::None) {
                value = value.escaped(*escape);
            }
            out.push(Statement::emit_value(value));
            push_output_checkpoint(bcx, out);
        }
        TemplateNode::If {
            arms, else_body, ..
        } => {
            let conds: Vec<&TypedExpr> = arms.iter().map(|a| &a.cond).collect();
            push_awaits(bcx, &conds, out);
            let mut lowered_arms = Vec::with_capacity(arms.len());
            for arm in arms {
                let cond = compile_expr(bcx.unit, &arm.cond)?;
                bcx.unit.push_scope();
                let body = compile_nodes(bcx, &arm.body);
                bcx.unit.pop_scope();
                lowered_arms.push((cond, body?));
            }
            let else_branch = match else_body {
                Some(body) => {
                    bcx.unit.push_scope();
                    let lowered = compile_nodes(bcx, body);
                    bcx.unit.pop_scope();
                    Some(lowered?)
                }
                None => None,
            };
            out.push(Statement::if_else(lowered_arms, else_branch));
        }
        TemplateNode::For {
            var, over, body, ..
        } => {
            push_awaits(bcx, &[over], out);
            let list = narrowed_to(bcx.unit, over, ValueKind::List)?;
            bcx.unit.push_scope();
            let list_slot = bcx.unit.alloc_local();
            let idx_slot = bcx.unit.alloc_local();
            let len_slot = bcx.unit.alloc_local();
            let item_slot = bcx.unit.alloc_local();
            bcx.unit.bind_local(var.clone(), item_slot, ValueKind::Any);
            let lowered_body = compile_nodes(bcx, body);
            bcx.unit.pop_scope();
            out.push(Statement::repeat(
                list,
                list_slot,
                idx_slot,
                len_slot,
                item_slot,
                lowered_body?,
            ));
        }
        TemplateNode::Let {
            var,
            binding: LetBinding::Expr(value),
            ..
        } => {
            push_awaits(bcx, &[value], out);
            let lowered = compile_expr(bcx.unit, value)?;
            let ty = lowered.result_type();
            let slot = bcx.unit.alloc_local();
            out.push(Statement::store_local(slot, lowered));
            bcx.unit.bind_local(var.clone(), slot, ty);
        }
        TemplateNode::Let {
            var,
            binding: LetBinding::Block { kind, body },
            ..
        } => {
            let index = *bcx.closure_ix;
            *bcx.closure_ix += 1;
            let captures = collect_captures(bcx.unit, body)?;
            let closure = bcx.compiler.compile_closure(
                bcx.owner,
                index,
                *kind,
                bcx.variant,
                &captures,
                body,
                bcx.aux,
                bcx.closure_ix,
            )?;
            let unit_name = closure.name.to_string();
            bcx.aux.push(closure);

            let frame = bcx.unit.frame_field();
            let slot = bcx.unit.alloc_local();
            let args = captures
                .iter()
                .enumerate()
                .map(|(i, capture)| match capture.source {
                    CaptureSource::Field(src) => UnitArg::PassField {
                        dst: i as u16,
                        src,
                    },
                    CaptureSource::Local(local) => UnitArg::Eval {
                        dst: i as u16,
                        value: Expression::local(local, capture.ty),
                    },
                })
                .collect();
            let point = bcx.unit.point(SuspendReason::Call);
            out.push(Statement::call_unit(
                unit_name,
                frame,
                args,
                Some(slot),
                point,
            ));
            bcx.unit
                .bind_local(var.clone(), slot, ValueKind::Content(*kind));
        }
        TemplateNode::Call { target, args, loc } => {
            let signature = bcx
                .compiler
                .registry()
                .get(target)
                .ok_or_else(|| CompileError::UnknownCallee {
                    target: target.clone(),
                    loc: loc.clone(),
                })?
                .clone();

            for arg in args {
                if signature.params.iter().all(|p| p.name != arg.name) {
                    return Err(CompileError::UnknownArg {
                        target: target.clone(),
                        arg: arg.name.clone(),
                        loc: loc.clone(),
                    });
                }
            }
            for param in signature.params.iter().filter(|p| p.required) {
                if args.iter().all(|a| a.name != param.name) {
                    return Err(CompileError::MissingArg {
                        target: target.clone(),
                        param: param.name.clone(),
                        loc: loc.clone(),
                    });
                }
            }

            let strict: Vec<&TypedExpr> = args
                .iter()
                .filter(|a| deferred_passthrough(bcx.unit, &a.value).is_none())
                .map(|a| &a.value)
                .collect();
            push_awaits(bcx, &strict, out);

            let mut unit_args = Vec::with_capacity(args.len());
            for arg in args {
                let dst = signature
                    .params
                    .iter()
                    .position(|p| p.name == arg.name)
                    .expect("argument name checked above") as u16;
                match deferred_passthrough(bcx.unit, &arg.value) {
                    Some(src) => unit_args.push(UnitArg::PassField { dst, src }),
                    None => unit_args.push(UnitArg::Eval {
                        dst,
                        value: compile_expr(bcx.unit, &arg.value)?,
                    }),
                }
            }

            let frame = bcx.unit.frame_field();
            let point = bcx.unit.point(SuspendReason::Call);
            out.push(Statement::call_unit(
                target.clone(),
                frame,
                unit_args,
                None,
                point,
            ));
            push_output_checkpoint(bcx, out);
        }
    }
    Ok(())
}

/// Await every deferred parameter the given expressions read, at
/// statement granularity. Re-awaiting an already-resolved field is a
/// no-op at render time, so over-emission is safe.
fn push_awaits(bcx: &mut BodyCx<'_, '_>, exprs: &[&TypedExpr], out: &mut Vec<Statement>) {
    let mut names = Vec::new();
    for expr in exprs {
        expr.collect_params(&mut names);
    }
    for name in names {
        if let Some(Binding::Field {
            field,
            deferred: true,
            ..
        }) = bcx.unit.lookup(&name)
        {
            let point = bcx.unit.point(SuspendReason::DataUnavailable);
            out.push(Statement::await_field(field, point));
        }
    }
}

/// Backpressure checkpoint after an emitting statement.
fn push_output_checkpoint(bcx: &mut BodyCx<'_, '_>, out: &mut Vec<Statement>) {
    let point = bcx.unit.point(SuspendReason::OutputLimited);
    out.push(Statement::suspend_if_limited(point));
}

fn narrowed_to(
    cx: &UnitCx,
    expr: &TypedExpr,
    needed: ValueKind,
) -> Result<Expression, CompileError> {
    let lowered = compile_expr(cx, expr)?;
    if lowered.result_type() == needed {
        return Ok(lowered);
    }
    lowered
        .checked_cast(needed)
        .map_err(|e| CompileError::internal(Some(expr.loc.clone()), e.to_string()))
}

/// A call argument that is a bare reference to a deferred parameter is
/// passed through unevaluated, so laziness (and therefore suspension)
/// composes transitively through call chains.
fn deferred_passthrough(cx: &UnitCx, expr: &TypedExpr) -> Option<u16> {
    if let ExprNode::Param(name) = &expr.node {
        if let Some(Binding::Field {
            field,
            deferred: true,
            ..
        }) = cx.lookup(name)
        {
            return Some(field);
        }
    }
    None
}

/// Resolve the free references of a content block against the enclosing
/// unit, in first-use order.
pub(crate) fn collect_captures(
    cx: &UnitCx,
    body: &[TemplateNode],
) -> Result<Vec<CaptureSpec>, CompileError> {
    let mut bound = Vec::new();
    let mut params = Vec::new();
    let mut locals = Vec::new();
    free_names(body, &mut bound, &mut params, &mut locals);

    let mut captures = Vec::new();
    for name in params.into_iter().chain(locals) {
        match cx.lookup(&name) {
            Some(Binding::Field {
                field,
                deferred,
                ty,
            }) => captures.push(CaptureSpec {
                name,
                ty,
                deferred,
                source: CaptureSource::Field(field),
            }),
            Some(Binding::Local { slot, ty }) => captures.push(CaptureSpec {
                name,
                ty,
                deferred: false,
                source: CaptureSource::Local(slot),
            }),
            None => {
                return Err(CompileError::internal(
                    None,
                    format!("content block captures unresolved name '{name}'"),
                ))
            }
        }
    }
    Ok(captures)
}

fn free_names(
    nodes: &[TemplateNode],
    bound: &mut Vec<String>,
    params: &mut Vec<String>,
    locals: &mut Vec<String>,
) {
    let mark = bound.len();
    for node in nodes {
        match node {
            TemplateNode::RawText { .. } => {}
            TemplateNode::Print { expr, .. } => free_in_expr(expr, bound, params, locals),
            TemplateNode::If {
                arms, else_body, ..
            } => {
                for arm in arms {
                    free_in_expr(&arm.cond, bound, params, locals);
                    free_names(&arm.body, bound, params, locals);
                }
                if let Some(body) = else_body {
                    free_names(body, bound, params, locals);
                }
            }
            TemplateNode::For {
                var, over, body, ..
            } => {
                free_in_expr(over, bound, params, locals);
                let inner_mark = bound.len();
                bound.push(var.clone());
                free_names(body, bound, params, locals);
                bound.truncate(inner_mark);
            }
            TemplateNode::Let { var, binding, .. } => {
                match binding {
                    LetBinding::Expr(value) => free_in_expr(value, bound, params, locals),
                    LetBinding::Block { body, .. } => free_names(body, bound, params, locals),
                }
                bound.push(var.clone());
            }
            TemplateNode::Call { args, .. } => {
                for CallArg { value, .. } in args {
                    free_in_expr(value, bound, params, locals);
                }
            }
        }
    }
    bound.truncate(mark);
}

fn free_in_expr(
    expr: &TypedExpr,
    bound: &[String],
    params: &mut Vec<String>,
    locals: &mut Vec<String>,
) {
    match &expr.node {
        ExprNode::Param(name) => {
            if !params.iter().any(|n| n == name) {
                params.push(name.clone());
            }
        }
        ExprNode::Local(name) => {
            if !bound.iter().any(|n| n == name) && !locals.iter().any(|n| n == name) {
                locals.push(name.clone());
            }
        }
        ExprNode::Binary { lhs, rhs, .. } => {
            free_in_expr(lhs, bound, params, locals);
            free_in_expr(rhs, bound, params, locals);
        }
        ExprNode::Not(inner) | ExprNode::Neg(inner) => {
            free_in_expr(inner, bound, params, locals)
        }
        ExprNode::Conditional {
            cond,
            then,
            otherwise,
        } => {
            free_in_expr(cond, bound, params, locals);
            free_in_expr(then, bound, params, locals);
            free_in_expr(otherwise, bound, params, locals);
        }
        ExprNode::Index { base, index } => {
            free_in_expr(base, bound, params, locals);
            free_in_expr(index, bound, params, locals);
        }
        ExprNode::Key { base, key } => {
            free_in_expr(base, bound, params, locals);
            free_in_expr(key, bound, params, locals);
        }
        _ => {}
    }
}
