//! Incremental archive construction.
//!
//! Entries are appended in compilation order; the batch orchestrator
//! feeds units through its listener hooks and seals the builder once
//! the pass completes.

use weft_ir::CompiledUnit;

use crate::format::{PackEntry, PackError, PackFile};

/// Collects unit entries and delegate names, in insertion order.
#[derive(Debug, Default)]
pub struct PackBuilder {
    entries: Vec<PackEntry>,
    delegates: Vec<String>,
}

impl PackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one compiled unit as a named entry.
    pub fn add_unit(&mut self, unit: &CompiledUnit) -> Result<(), PackError> {
        let data = unit
            .to_bytes()
            .map_err(|e| PackError::Serialization(e.to_string()))?;
        self.entries.push(PackEntry {
            name: unit.name.to_string(),
            data,
        });
        Ok(())
    }

    /// Record a delegate template for the manifest.
    pub fn add_delegate(&mut self, name: impl Into<String>) {
        self.delegates.push(name.into());
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Seal into a pack file.
    pub fn build(self) -> PackFile {
        PackFile::new(self.entries, self.delegates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::ast::TemplateVariant;
    use weft_core::ContentKind;
    use weft_ir::{Op, UnitKind, UnitName};

    fn unit(name: &str) -> CompiledUnit {
        CompiledUnit {
            name: UnitName::parse(name),
            kind: UnitKind::Template,
            variant: TemplateVariant::Delegate,
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
    fn builds_in_insertion_order() {
        let mut builder = PackBuilder::new();
        builder.add_unit(&unit("z.last")).unwrap();
        builder.add_unit(&unit("a.first")).unwrap();
        builder.add_delegate("z.last");
        assert_eq!(builder.entry_count(), 2);

        let pack = builder.build();
        assert_eq!(pack.entries[0].name, "z.last");
        assert_eq!(pack.entries[1].name, "a.first");
        assert_eq!(pack.delegates, vec!["z.last".to_string()]);
    }
}
