//! Template registry: signatures by fully qualified name.
//!
//! Built once from the analyzed template set, read-only afterwards. Also
//! provides the reverse lookup from a unit's structural name back to the
//! template that owns it, which the on-demand loader uses to decide what
//! to compile on a cache miss.

use std::collections::HashMap;

use crate::ast::{ParamDef, TemplateSet, TemplateVariant};
use crate::types::ContentKind;

/// The separator between a template name and an auxiliary-unit suffix.
/// Not a legal character in template names, so stripping is unambiguous.
/// This convention is part of the archive/lookup contract only; internal
/// dispatch goes through the unit-kind discriminant.
pub const UNIT_SUFFIX_SEPARATOR: char = '$';

/// A template's externally visible signature.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSignature {
    pub name: String,
    pub variant: TemplateVariant,
    pub content_kind: ContentKind,
    pub params: Vec<ParamDef>,
}

/// Read-only mapping from template full name to signature.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    by_name: HashMap<String, TemplateSignature>,
    /// Document order, preserved for deterministic iteration.
    order: Vec<String>,
}

impl TemplateRegistry {
    /// Build a registry from an analyzed template set.
    pub fn from_set(set: &TemplateSet) -> Self {
        let mut by_name = HashMap::new();
        let mut order = Vec::new();
        for def in set.iter() {
            by_name.insert(
                def.name.clone(),
                TemplateSignature {
                    name: def.name.clone(),
                    variant: def.variant,
                    content_kind: def.content_kind,
                    params: def.params.clone(),
                },
            );
            order.push(def.name.clone());
        }
        Self { by_name, order }
    }

    pub fn get(&self, name: &str) -> Option<&TemplateSignature> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Template names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Names of delegate templates, in document order.
    pub fn delegate_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|n| {
                matches!(
                    self.by_name.get(*n).map(|s| s.variant),
                    Some(TemplateVariant::Delegate)
                )
            })
            .cloned()
            .collect()
    }

    /// Resolve a unit name (primary or auxiliary) to its owning template.
    ///
    /// Auxiliary units are named `<owner>$<suffix>`; the suffix is
    /// stripped here and nowhere else. Returns `None` when no template
    /// of that name exists, which callers surface as "unknown" rather
    /// than a compile error.
    pub fn owner_of_unit<'a>(&'a self, unit_name: &'a str) -> Option<&'a str> {
        let owner = match unit_name.find(UNIT_SUFFIX_SEPARATOR) {
            Some(idx) => &unit_name[..idx],
            None => unit_name,
        };
        if self.by_name.contains_key(owner) {
            Some(owner)
        } else {
            None
        }
    }
}
