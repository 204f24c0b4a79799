//! Runtime values and their template coercions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use weft_core::ast::BinaryOp;
use weft_core::{ContentKind, ValueKind};

use crate::error::RenderError;

/// A value flowing through a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Already-sanitized content of a known kind.
    Content { kind: ContentKind, text: String },
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Content { kind, .. } => ValueKind::Content(*kind),
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }

    /// Template truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Content { text, .. } => !text.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    /// Text rendering used by emits and string coercion.
    pub fn render_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Content { text, .. } => text.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.render_text()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.render_text()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// Whether this value satisfies a runtime-checked narrowing to
    /// `target`. Stringish and numeric kinds are mutually acceptable.
    pub fn conforms(&self, target: ValueKind) -> bool {
        let kind = self.kind();
        if target == ValueKind::Any || kind == target {
            return true;
        }
        if kind.is_stringish() && target.is_stringish() {
            return true;
        }
        if kind.is_numeric() && target.is_numeric() {
            return true;
        }
        kind == ValueKind::Null && !target.is_primitive()
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    fn is_stringish(&self) -> bool {
        matches!(self, Value::Str(_) | Value::Content { .. })
    }

    /// Loose equality: numerics compare by value, everything else
    /// structurally.
    fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Apply a binary operator. Operand kinds were checked upstream;
    /// mismatches here indicate data that disagrees with its declared
    /// type and fail the render.
    pub fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RenderError> {
        match op {
            BinaryOp::Add => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
                _ if lhs.is_numeric() && rhs.is_numeric() => Ok(Value::Float(
                    lhs.as_f64().unwrap_or(0.0) + rhs.as_f64().unwrap_or(0.0),
                )),
                _ if lhs.is_stringish() || rhs.is_stringish() => {
                    Ok(Value::Str(lhs.render_text() + &rhs.render_text()))
                }
                _ => Err(type_mismatch("+", &lhs, &rhs)),
            },
            BinaryOp::Sub => numeric_op(&lhs, &rhs, "-", |a, b| a - b, i64::wrapping_sub),
            BinaryOp::Mul => numeric_op(&lhs, &rhs, "*", |a, b| a * b, i64::wrapping_mul),
            BinaryOp::Div => match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => {
                    if b == 0.0 {
                        Err(RenderError::Arithmetic {
                            detail: "division by zero".into(),
                        })
                    } else {
                        Ok(Value::Float(a / b))
                    }
                }
                _ => Err(type_mismatch("/", &lhs, &rhs)),
            },
            BinaryOp::Mod => match (&lhs, &rhs) {
                (Value::Int(_), Value::Int(0)) => Err(RenderError::Arithmetic {
                    detail: "modulo by zero".into(),
                }),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(*b))),
                _ => match (lhs.as_f64(), rhs.as_f64()) {
                    (Some(a), Some(b)) => Ok(Value::Float(a % b)),
                    _ => Err(type_mismatch("%", &lhs, &rhs)),
                },
            },
            BinaryOp::Eq => Ok(Value::Bool(lhs.loose_eq(&rhs))),
            BinaryOp::Ne => Ok(Value::Bool(!lhs.loose_eq(&rhs))),
            BinaryOp::Lt => comparison(&lhs, &rhs, "<", |o| o == std::cmp::Ordering::Less),
            BinaryOp::Le => comparison(&lhs, &rhs, "<=", |o| o != std::cmp::Ordering::Greater),
            BinaryOp::Gt => comparison(&lhs, &rhs, ">", |o| o == std::cmp::Ordering::Greater),
            BinaryOp::Ge => comparison(&lhs, &rhs, ">=", |o| o != std::cmp::Ordering::Less),
            BinaryOp::And => Ok(Value::Bool(lhs.truthy() && rhs.truthy())),
            BinaryOp::Or => Ok(Value::Bool(lhs.truthy() || rhs.truthy())),
        }
    }
}

fn type_mismatch(op: &str, lhs: &Value, rhs: &Value) -> RenderError {
    RenderError::TypeMismatch {
        detail: format!("operator '{op}' on {} and {}", lhs.kind(), rhs.kind()),
    }
}

fn numeric_op(
    lhs: &Value,
    rhs: &Value,
    name: &str,
    float_op: fn(f64, f64) -> f64,
    int_op: fn(i64, i64) -> i64,
) -> Result<Value, RenderError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(*a, *b))),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => Err(type_mismatch(name, lhs, rhs)),
        },
    }
}

fn comparison(
    lhs: &Value,
    rhs: &Value,
    name: &str,
    accept: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, RenderError> {
    let ordering = match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ if lhs.is_stringish() && rhs.is_stringish() => {
            Some(lhs.render_text().cmp(&rhs.render_text()))
        }
        _ => None,
    };
    match ordering {
        Some(o) => Ok(Value::Bool(accept(o))),
        None => Err(type_mismatch(name, lhs, rhs)),
    }
}
