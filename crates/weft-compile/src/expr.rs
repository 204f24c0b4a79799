//! Expression lowering: typed AST expressions into IR nodes.

use weft_core::ast::{ExprNode, TypedExpr};
use weft_core::ValueKind;
use weft_ir::{ConstValue, Expression, Intrinsic};

use crate::context::{Binding, UnitCx};
use crate::error::CompileError;

/// Lower one expression. Name resolution goes through the unit context;
/// the result type is whatever the analysis stage resolved.
pub(crate) fn compile_expr(cx: &UnitCx, expr: &TypedExpr) -> Result<Expression, CompileError> {
    match &expr.node {
        ExprNode::NullLit => Ok(Expression::constant(ConstValue::Null)),
        ExprNode::BoolLit(b) => Ok(Expression::constant(ConstValue::Bool(*b))),
        ExprNode::IntLit(i) => Ok(Expression::constant(ConstValue::Int(*i))),
        ExprNode::FloatLit(f) => Ok(Expression::constant(ConstValue::Float(*f))),
        ExprNode::StrLit(s) => Ok(Expression::constant(ConstValue::Str(s.clone()))),
        ExprNode::Param(name) | ExprNode::Local(name) => resolve_name(cx, expr, name),
        ExprNode::Binary { op, lhs, rhs } => {
            let lhs = compile_expr(cx, lhs)?;
            let rhs = compile_expr(cx, rhs)?;
            Ok(Expression::binary(*op, lhs, rhs, expr.ty))
        }
        ExprNode::Not(inner) => Ok(Expression::not(compile_expr(cx, inner)?)),
        ExprNode::Neg(inner) => Ok(Expression::neg(compile_expr(cx, inner)?)),
        ExprNode::Conditional {
            cond,
            then,
            otherwise,
        } => {
            let cond = compile_expr(cx, cond)?;
            let then = compile_expr(cx, then)?;
            let otherwise = compile_expr(cx, otherwise)?;
            Ok(Expression::select(cond, then, otherwise))
        }
        ExprNode::Index { base, index } => {
            let base = narrowed(cx, base, ValueKind::List)?;
            let index = compile_expr(cx, index)?;
            let element = base.invoke(Intrinsic::Index, vec![index]);
            narrow_result(element, expr)
        }
        ExprNode::Key { base, key } => {
            let base = narrowed(cx, base, ValueKind::Map)?;
            let key = compile_expr(cx, key)?;
            let value = base.invoke(Intrinsic::Key, vec![key]);
            narrow_result(value, expr)
        }
    }
}

fn resolve_name(cx: &UnitCx, expr: &TypedExpr, name: &str) -> Result<Expression, CompileError> {
    match cx.lookup(name) {
        Some(Binding::Field { field, .. }) => Ok(Expression::field(field, expr.ty)),
        Some(Binding::Local { slot, .. }) => Ok(Expression::local(slot, expr.ty)),
        None => Err(CompileError::internal(
            Some(expr.loc.clone()),
            format!("reference to unresolved name '{name}'"),
        )),
    }
}

/// Lower a sub-expression, inserting a runtime-checked narrowing when
/// its static type is weaker than what the operation needs.
fn narrowed(
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

/// Narrow an `Any`-producing access down to the type the analysis stage
/// resolved for the whole expression.
fn narrow_result(value: Expression, expr: &TypedExpr) -> Result<Expression, CompileError> {
    if expr.ty == ValueKind::Any {
        return Ok(value);
    }
    value
        .checked_cast(expr.ty)
        .map_err(|e| CompileError::internal(Some(expr.loc.clone()), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::ast::{BinaryOp, ParamDef};
    use weft_core::SourceLocation;
    use weft_ir::Assembler;

    fn loc() -> SourceLocation {
        SourceLocation::unknown()
    }

    fn typed(node: ExprNode, ty: ValueKind) -> TypedExpr {
        TypedExpr {
            node,
            ty,
            loc: loc(),
        }
    }

    fn cx_with_param(name: &str, ty: ValueKind) -> UnitCx {
        UnitCx::for_params(&[ParamDef {
            name: name.into(),
            ty,
            required: true,
            deferred: false,
        }])
    }

    #[test]
    fn lowered_expressions_keep_the_stack_contract() {
        let cx = cx_with_param("items", ValueKind::List);
        let expr = typed(
            ExprNode::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(typed(ExprNode::IntLit(1), ValueKind::Int)),
                rhs: Box::new(typed(
                    ExprNode::Index {
                        base: Box::new(typed(ExprNode::Param("items".into()), ValueKind::List)),
                        index: Box::new(typed(ExprNode::IntLit(0), ValueKind::Int)),
                    },
                    ValueKind::Int,
                )),
            },
            ValueKind::Int,
        );
        let lowered = compile_expr(&cx, &expr).unwrap();
        let mut asm = Assembler::new();
        lowered.realize(&mut asm);
        assert_eq!(asm.depth(), 1);
    }

    #[test]
    fn indexed_access_narrows_to_the_resolved_type() {
        let cx = cx_with_param("items", ValueKind::List);
        let expr = typed(
            ExprNode::Index {
                base: Box::new(typed(ExprNode::Param("items".into()), ValueKind::List)),
                index: Box::new(typed(ExprNode::IntLit(0), ValueKind::Int)),
            },
            ValueKind::Str,
        );
        let lowered = compile_expr(&cx, &expr).unwrap();
        assert_eq!(lowered.result_type(), ValueKind::Str);
    }

    #[test]
    fn unresolved_names_are_internal_errors() {
        let cx = UnitCx::for_params(&[]);
        let expr = typed(ExprNode::Param("ghost".into()), ValueKind::Str);
        let err = compile_expr(&cx, &expr).unwrap_err();
        assert!(matches!(err, CompileError::Internal { .. }));
    }
}
