//! Listener hooks decoupling the compile loop from what happens to a
//! finished unit.
//!
//! A closed set of three optional callbacks, passed as function values:
//! one per compiled unit, one per finished ordinary template, one per
//! finished delegate template. The same loop thereby serves archive
//! writing, in-memory loading, and statistics gathering.

use weft_core::ast::TemplateVariant;
use weft_ir::CompiledUnit;

type UnitHook<'a> = Box<dyn FnMut(&CompiledUnit) + 'a>;
type TemplateHook<'a> = Box<dyn FnMut(&str) + 'a>;

#[derive(Default)]
pub struct CompileListener<'a> {
    on_unit: Option<UnitHook<'a>>,
    on_template: Option<TemplateHook<'a>>,
    on_delegate_template: Option<TemplateHook<'a>>,
}

impl<'a> CompileListener<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once for every unit a template compiles into, in
    /// compilation order.
    #[must_use]
    pub fn on_unit(mut self, hook: impl FnMut(&CompiledUnit) + 'a) -> Self {
        self.on_unit = Some(Box::new(hook));
        self
    }

    /// Called once per successfully compiled ordinary template.
    #[must_use]
    pub fn on_template(mut self, hook: impl FnMut(&str) + 'a) -> Self {
        self.on_template = Some(Box::new(hook));
        self
    }

    /// Called once per successfully compiled delegate template.
    #[must_use]
    pub fn on_delegate_template(mut self, hook: impl FnMut(&str) + 'a) -> Self {
        self.on_delegate_template = Some(Box::new(hook));
        self
    }

    pub(crate) fn unit_compiled(&mut self, unit: &CompiledUnit) {
        if let Some(hook) = &mut self.on_unit {
            hook(unit);
        }
    }

    pub(crate) fn template_compiled(&mut self, name: &str, variant: TemplateVariant) {
        let hook = match variant {
            TemplateVariant::Ordinary => &mut self.on_template,
            TemplateVariant::Delegate => &mut self.on_delegate_template,
        };
        if let Some(hook) = hook {
            hook(name);
        }
    }
}

impl std::fmt::Debug for CompileListener<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileListener")
            .field("on_unit", &self.on_unit.is_some())
            .field("on_template", &self.on_template.is_some())
            .field("on_delegate_template", &self.on_delegate_template.is_some())
            .finish()
    }
}
