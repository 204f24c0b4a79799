//! An in-memory set of compiled units, used when units were loaded
//! eagerly (e.g. from an archive).

use std::collections::HashMap;
use std::sync::Arc;

use weft_ir::CompiledUnit;

use crate::instance::UnitSource;

/// Immutable once built; lookup by textual unit name.
#[derive(Debug, Default, Clone)]
pub struct UnitSet {
    map: HashMap<String, Arc<CompiledUnit>>,
}

impl UnitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units(units: impl IntoIterator<Item = CompiledUnit>) -> Self {
        let mut set = Self::new();
        for unit in units {
            set.insert(unit);
        }
        set
    }

    pub fn insert(&mut self, unit: CompiledUnit) {
        self.map.insert(unit.name.to_string(), Arc::new(unit));
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledUnit>> {
        self.map.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl UnitSource for UnitSet {
    fn lookup(&self, name: &str) -> Option<Arc<CompiledUnit>> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::ast::TemplateVariant;
    use weft_core::ContentKind;
    use weft_ir::{Op, UnitKind, UnitName};

    fn empty_unit(name: &str) -> CompiledUnit {
        CompiledUnit {
            name: UnitName::parse(name),
            kind: UnitKind::Template,
            variant: TemplateVariant::Ordinary,
            content_kind: ContentKind::Text,
            params: vec![],
            fields: vec![],
            local_count: 0,
            consts: vec![],
            ops: vec![Op::Return],
            points: vec![],
            max_stack: 0,
        }
    }

    #[test]
    fn lookup_by_textual_name() {
        let set = UnitSet::from_units(vec![empty_unit("a.b"), empty_unit("a.b$factory")]);
        assert_eq!(set.len(), 2);
        assert!(set.lookup("a.b").is_some());
        assert!(set.lookup("a.b$factory").is_some());
        assert!(set.lookup("a.c").is_none());
    }
}
