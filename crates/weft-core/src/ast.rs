//! The analyzed template AST.
//!
//! This is the input interface to the compiler core: an ordered set of
//! source files whose templates arrive with resolved types, resolved
//! escaping, and resolved call targets. The core never re-validates any
//! of it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::location::SourceLocation;
use crate::types::{ContentKind, ValueKind};

/// Whether a template is the default implementation of its name or a
/// delegate selected at render time by host policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateVariant {
    Ordinary,
    Delegate,
}

/// A declared template parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub ty: ValueKind,
    /// Required parameters must be bound before rendering starts.
    pub required: bool,
    /// Deferred parameters may arrive after rendering starts; reads of
    /// them compile to suspension points. The analysis stage decides
    /// which parameters qualify.
    #[serde(default)]
    pub deferred: bool,
}

/// Binary operators, with operand types already checked upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// The escaping resolved for a print by the (excluded) autoescape stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Escaping {
    None,
    Html,
    Attribute,
    Uri,
    Js,
    Css,
}

/// A typed expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedExpr {
    pub node: ExprNode,
    pub ty: ValueKind,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprNode {
    NullLit,
    BoolLit(bool),
    IntLit(i64),
    FloatLit(f64),
    StrLit(String),
    /// Reference to a template parameter by name.
    Param(String),
    /// Reference to a `let` or loop variable by name.
    Local(String),
    Binary {
        op: BinaryOp,
        lhs: Box<TypedExpr>,
        rhs: Box<TypedExpr>,
    },
    Not(Box<TypedExpr>),
    Neg(Box<TypedExpr>),
    Conditional {
        cond: Box<TypedExpr>,
        then: Box<TypedExpr>,
        otherwise: Box<TypedExpr>,
    },
    /// `list[index]`
    Index {
        base: Box<TypedExpr>,
        index: Box<TypedExpr>,
    },
    /// `map[key]` / `record.field`
    Key {
        base: Box<TypedExpr>,
        key: Box<TypedExpr>,
    },
}

impl TypedExpr {
    /// Collect the names of deferred parameters referenced anywhere in
    /// this expression, in first-use order.
    pub fn collect_params(&self, out: &mut Vec<String>) {
        match &self.node {
            ExprNode::Param(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            ExprNode::Binary { lhs, rhs, .. } => {
                lhs.collect_params(out);
                rhs.collect_params(out);
            }
            ExprNode::Not(inner) | ExprNode::Neg(inner) => inner.collect_params(out),
            ExprNode::Conditional {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_params(out);
                then.collect_params(out);
                otherwise.collect_params(out);
            }
            ExprNode::Index { base, index } => {
                base.collect_params(out);
                index.collect_params(out);
            }
            ExprNode::Key { base, key } => {
                base.collect_params(out);
                key.collect_params(out);
            }
            _ => {}
        }
    }

    /// Collect local-variable references, in first-use order.
    pub fn collect_locals(&self, out: &mut Vec<String>) {
        match &self.node {
            ExprNode::Local(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            ExprNode::Binary { lhs, rhs, .. } => {
                lhs.collect_locals(out);
                rhs.collect_locals(out);
            }
            ExprNode::Not(inner) | ExprNode::Neg(inner) => inner.collect_locals(out),
            ExprNode::Conditional {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_locals(out);
                then.collect_locals(out);
                otherwise.collect_locals(out);
            }
            ExprNode::Index { base, index } => {
                base.collect_locals(out);
                index.collect_locals(out);
            }
            ExprNode::Key { base, key } => {
                base.collect_locals(out);
                key.collect_locals(out);
            }
            _ => {}
        }
    }
}

/// One `{if}` arm: condition plus body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfArm {
    pub cond: TypedExpr,
    pub body: Vec<TemplateNode>,
}

/// A named call argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallArg {
    pub name: String,
    pub value: TypedExpr,
}

/// The value bound by a `{let}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LetBinding {
    Expr(TypedExpr),
    /// A content block; compiles to its own unit closing over the
    /// enclosing bindings it references.
    Block {
        kind: ContentKind,
        body: Vec<TemplateNode>,
    },
}

/// One construct in a template body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateNode {
    RawText {
        text: String,
        loc: SourceLocation,
    },
    Print {
        expr: TypedExpr,
        escape: Escaping,
        loc: SourceLocation,
    },
    If {
        arms: Vec<IfArm>,
        else_body: Option<Vec<TemplateNode>>,
        loc: SourceLocation,
    },
    For {
        var: String,
        over: TypedExpr,
        body: Vec<TemplateNode>,
        loc: SourceLocation,
    },
    Let {
        var: String,
        binding: LetBinding,
        loc: SourceLocation,
    },
    Call {
        target: String,
        args: Vec<CallArg>,
        loc: SourceLocation,
    },
}

impl TemplateNode {
    pub fn location(&self) -> &SourceLocation {
        match self {
            TemplateNode::RawText { loc, .. }
            | TemplateNode::Print { loc, .. }
            | TemplateNode::If { loc, .. }
            | TemplateNode::For { loc, .. }
            | TemplateNode::Let { loc, .. }
            | TemplateNode::Call { loc, .. } => loc,
        }
    }
}

/// One analyzed template definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDef {
    /// Fully qualified name, e.g. `app.page.header`.
    pub name: String,
    pub variant: TemplateVariant,
    pub content_kind: ContentKind,
    pub params: Vec<ParamDef>,
    pub body: Vec<TemplateNode>,
    pub loc: SourceLocation,
}

impl TemplateDef {
    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// One analyzed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub path: String,
    pub templates: Vec<TemplateDef>,
}

/// An ordered collection of analyzed source files with a by-name index.
///
/// Iteration order is document order: files as supplied, templates as
/// declared. Compilation output ordering depends on it.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    files: Vec<TemplateFile>,
    by_name: HashMap<String, (usize, usize)>,
}

impl TemplateSet {
    pub fn new(files: Vec<TemplateFile>) -> Self {
        let mut by_name = HashMap::new();
        for (fi, file) in files.iter().enumerate() {
            for (ti, template) in file.templates.iter().enumerate() {
                by_name.insert(template.name.clone(), (fi, ti));
            }
        }
        Self { files, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&TemplateDef> {
        let &(fi, ti) = self.by_name.get(name)?;
        Some(&self.files[fi].templates[ti])
    }

    /// All templates in document order.
    pub fn iter(&self) -> impl Iterator<Item = &TemplateDef> {
        self.files.iter().flat_map(|f| f.templates.iter())
    }

    pub fn files(&self) -> &[TemplateFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_lit(v: i64) -> TypedExpr {
        TypedExpr {
            node: ExprNode::IntLit(v),
            ty: ValueKind::Int,
            loc: SourceLocation::unknown(),
        }
    }

    fn param(name: &str, ty: ValueKind) -> TypedExpr {
        TypedExpr {
            node: ExprNode::Param(name.into()),
            ty,
            loc: SourceLocation::unknown(),
        }
    }

    #[test]
    fn collect_params_deduplicates_in_first_use_order() {
        let expr = TypedExpr {
            node: ExprNode::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(param("b", ValueKind::Int)),
                rhs: Box::new(TypedExpr {
                    node: ExprNode::Binary {
                        op: BinaryOp::Add,
                        lhs: Box::new(param("a", ValueKind::Int)),
                        rhs: Box::new(param("b", ValueKind::Int)),
                    },
                    ty: ValueKind::Int,
                    loc: SourceLocation::unknown(),
                }),
            },
            ty: ValueKind::Int,
            loc: SourceLocation::unknown(),
        };
        let mut names = Vec::new();
        expr.collect_params(&mut names);
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn template_set_lookup_and_order() {
        let file = TemplateFile {
            path: "a.weft".into(),
            templates: vec![
                TemplateDef {
                    name: "app.first".into(),
                    variant: TemplateVariant::Ordinary,
                    content_kind: ContentKind::Html,
                    params: vec![],
                    body: vec![],
                    loc: SourceLocation::new("a.weft", 1, 1),
                },
                TemplateDef {
                    name: "app.second".into(),
                    variant: TemplateVariant::Delegate,
                    content_kind: ContentKind::Text,
                    params: vec![],
                    body: vec![],
                    loc: SourceLocation::new("a.weft", 5, 1),
                },
            ],
        };
        let set = TemplateSet::new(vec![file]);
        assert_eq!(set.len(), 2);
        assert!(set.get("app.first").is_some());
        assert!(set.get("app.missing").is_none());
        let names: Vec<_> = set.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["app.first", "app.second"]);
    }

    #[test]
    fn ast_round_trips_through_json() {
        let def = TemplateDef {
            name: "app.greet".into(),
            variant: TemplateVariant::Ordinary,
            content_kind: ContentKind::Html,
            params: vec![ParamDef {
                name: "count".into(),
                ty: ValueKind::Int,
                required: true,
                deferred: false,
            }],
            body: vec![TemplateNode::Print {
                expr: int_lit(7),
                escape: Escaping::Html,
                loc: SourceLocation::unknown(),
            }],
            loc: SourceLocation::new("greet.weft", 1, 1),
        };
        let json = serde_json::to_string(&def).unwrap();
        let back: TemplateDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);
    }
}
