//! Compiled units: the independently loadable artifacts a template
//! compiles into.

use std::fmt;

use serde::{Deserialize, Serialize};

use weft_core::ast::{ParamDef, TemplateVariant};
use weft_core::registry::UNIT_SUFFIX_SEPARATOR;
use weft_core::{ContentKind, ValueKind};

use crate::op::{ConstValue, Op};

/// Suffix of the auxiliary parameter-manifest unit.
pub const FACTORY_SUFFIX: &str = "factory";

/// Globally unique unit identity: owning template name plus an optional
/// disambiguating suffix for auxiliary units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitName {
    pub owner: String,
    pub suffix: Option<String>,
}

impl UnitName {
    pub fn template(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            suffix: None,
        }
    }

    pub fn factory(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            suffix: Some(FACTORY_SUFFIX.into()),
        }
    }

    pub fn closure(owner: impl Into<String>, index: usize) -> Self {
        Self {
            owner: owner.into(),
            suffix: Some(format!("let_{index}")),
        }
    }

    /// Parse a textual unit name, splitting at the suffix separator.
    pub fn parse(name: &str) -> Self {
        match name.find(UNIT_SUFFIX_SEPARATOR) {
            Some(idx) => Self {
                owner: name[..idx].to_string(),
                suffix: Some(name[idx + 1..].to_string()),
            },
            None => Self::template(name),
        }
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suffix {
            Some(suffix) => write!(f, "{}{}{}", self.owner, UNIT_SUFFIX_SEPARATOR, suffix),
            None => write!(f, "{}", self.owner),
        }
    }
}

/// What a unit is, dispatched explicitly rather than by suffix matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// The renderer for a template body.
    Template,
    /// The parameter manifest used to validate bindings without loading
    /// the body.
    Factory,
    /// An extracted content block closing over enclosing bindings.
    Closure,
}

/// Why a suspension point exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspendReason {
    /// A deferred input was not yet available.
    DataUnavailable,
    /// The sink reported backpressure.
    OutputLimited,
    /// A callee suspended; its status propagates.
    Call,
}

/// One entry in a point's saved-locals table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedLocal {
    pub local: u16,
    pub field: u16,
}

/// A place where rendering may pause and later resume.
///
/// On suspension the listed locals are persisted into fields and the
/// point id recorded; on the next advance they are restored and control
/// continues at `resume_ip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspensionPoint {
    pub id: u16,
    pub resume_ip: u32,
    pub reason: SuspendReason,
    pub saved: Vec<SavedLocal>,
}

/// The role a unit field plays in the render state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldRole {
    /// A template parameter, bound at instantiation.
    Param { index: u16, deferred: bool },
    /// A value captured from the enclosing unit at frame construction.
    Capture { index: u16 },
    /// Storage for a local live across a suspension point.
    SavedLocal,
    /// Holds a child render instance across a call.
    ChildFrame,
}

/// An ordered unit field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub role: FieldRole,
    pub ty: ValueKind,
}

/// Advisory per-unit statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub byte_size: usize,
    pub field_count: usize,
    pub suspension_points: usize,
    pub op_count: usize,
}

/// One compiled, independently loadable artifact. Immutable after
/// compilation; instantiated once per render in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub name: UnitName,
    pub kind: UnitKind,
    pub variant: TemplateVariant,
    pub content_kind: ContentKind,
    pub params: Vec<ParamDef>,
    pub fields: Vec<FieldDef>,
    pub local_count: u16,
    pub consts: Vec<ConstValue>,
    pub ops: Vec<Op>,
    pub points: Vec<SuspensionPoint>,
    pub max_stack: u16,
}

impl CompiledUnit {
    /// Deterministic byte encoding used for archive entries and the
    /// cross-mode consistency guarantee.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn stats(&self) -> UnitStats {
        UnitStats {
            byte_size: self.to_bytes().map(|b| b.len()).unwrap_or(0),
            field_count: self.fields.len(),
            suspension_points: self.points.len(),
            op_count: self.ops.len(),
        }
    }

    /// Index of the field backing parameter `name`, if any.
    pub fn param_field(&self, name: &str) -> Option<u16> {
        self.fields.iter().enumerate().find_map(|(i, f)| {
            if matches!(f.role, FieldRole::Param { .. }) && f.name == name {
                Some(i as u16)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_name_display_and_parse() {
        let main = UnitName::template("app.page");
        assert_eq!(main.to_string(), "app.page");
        let factory = UnitName::factory("app.page");
        assert_eq!(factory.to_string(), "app.page$factory");
        let closure = UnitName::closure("app.page", 2);
        assert_eq!(closure.to_string(), "app.page$let_2");

        assert_eq!(UnitName::parse("app.page"), main);
        assert_eq!(UnitName::parse("app.page$factory"), factory);
    }

    #[test]
    fn byte_encoding_round_trips() {
        let unit = CompiledUnit {
            name: UnitName::template("app.t"),
            kind: UnitKind::Template,
            variant: TemplateVariant::Ordinary,
            content_kind: ContentKind::Text,
            params: vec![],
            fields: vec![],
            local_count: 2,
            consts: vec![ConstValue::Str("hi".into()), ConstValue::Int(3)],
            ops: vec![Op::EmitConst(0), Op::Return],
            points: vec![],
            max_stack: 1,
        };
        let bytes = unit.to_bytes().unwrap();
        let back = CompiledUnit::from_bytes(&bytes).unwrap();
        assert_eq!(back, unit);
        // Re-encoding is byte-identical.
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn stats_reflect_shape() {
        let unit = CompiledUnit {
            name: UnitName::template("app.t"),
            kind: UnitKind::Template,
            variant: TemplateVariant::Ordinary,
            content_kind: ContentKind::Text,
            params: vec![],
            fields: vec![FieldDef {
                name: "x".into(),
                role: FieldRole::SavedLocal,
                ty: ValueKind::Int,
            }],
            local_count: 0,
            consts: vec![],
            ops: vec![Op::Return],
            points: vec![SuspensionPoint {
                id: 0,
                resume_ip: 0,
                reason: SuspendReason::DataUnavailable,
                saved: vec![],
            }],
            max_stack: 0,
        };
        let stats = unit.stats();
        assert_eq!(stats.field_count, 1);
        assert_eq!(stats.suspension_points, 1);
        assert_eq!(stats.op_count, 1);
        assert!(stats.byte_size > 0);
    }
}
