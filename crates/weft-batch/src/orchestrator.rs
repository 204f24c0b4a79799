//! The compile loop and its two modes.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, info, warn};

use weft_compile::compile_template;
use weft_core::ast::TemplateSet;
use weft_core::registry::TemplateRegistry;
use weft_core::ErrorReporter;
use weft_load::UnitLoader;
use weft_pack::{PackBuilder, PackError, PackFile};

use crate::error::BatchError;
use crate::listener::CompileListener;

/// Counters from one eager pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub templates_compiled: usize,
    pub templates_failed: usize,
    pub units_produced: usize,
    /// True iff the shared reporter accumulated any error during the
    /// pass. Individual failures never stop the loop; they only make
    /// the batch as a whole count as failed.
    pub failed: bool,
}

/// Eagerly compile every template in the set, in document order.
///
/// Each produced unit is handed to the listener as soon as its template
/// finishes. A template that fails to compile is reported on the shared
/// channel, with the user/internal taxonomy preserved, and the loop
/// continues with the next template.
pub fn compile_all(
    set: &TemplateSet,
    registry: &TemplateRegistry,
    reporter: &ErrorReporter,
    listener: &mut CompileListener<'_>,
) -> BatchReport {
    let checkpoint = reporter.checkpoint();
    let mut report = BatchReport::default();
    for def in set.iter() {
        match compile_template(def, registry, reporter) {
            Ok(units) => {
                debug!(template = %def.name, units = units.len(), "template compiled");
                report.templates_compiled += 1;
                report.units_produced += units.len();
                for unit in &units {
                    listener.unit_compiled(unit);
                }
                listener.template_compiled(&def.name, def.variant);
            }
            Err(err) => {
                warn!(template = %def.name, error = %err, "template failed to compile");
                err.report(reporter);
                report.templates_failed += 1;
            }
        }
    }
    report.failed = reporter.has_errors_since(checkpoint);
    info!(
        compiled = report.templates_compiled,
        failed = report.templates_failed,
        units = report.units_produced,
        "batch pass finished"
    );
    report
}

/// Eager packaging mode: compile the whole collection into an archive.
///
/// The archive lists one entry per unit in compilation order plus the
/// delegate-template manifest. If any template failed, the archive is
/// withheld and every diagnostic recorded so far comes back instead.
pub fn pack_collection(
    set: &TemplateSet,
    registry: &TemplateRegistry,
    reporter: &ErrorReporter,
) -> Result<PackFile, BatchError> {
    let builder = RefCell::new(PackBuilder::new());
    let entry_err: RefCell<Option<PackError>> = RefCell::new(None);
    let report = {
        let mut listener = CompileListener::new()
            .on_unit(|unit| {
                if let Err(err) = builder.borrow_mut().add_unit(unit) {
                    entry_err.borrow_mut().get_or_insert(err);
                }
            })
            .on_delegate_template(|name| builder.borrow_mut().add_delegate(name));
        compile_all(set, registry, reporter, &mut listener)
    };
    if let Some(err) = entry_err.into_inner() {
        return Err(BatchError::Pack(err));
    }
    if report.failed {
        return Err(BatchError::CompilationFailed {
            errors: reporter.errors(),
            warnings: reporter.warnings(),
        });
    }
    Ok(builder.into_inner().build())
}

/// Lazy/development mode: no compilation happens here.
///
/// The returned loader compiles each owning template on first use. If
/// the shared channel already holds errors, no loader is constructed at
/// all.
pub fn lazy_loader(
    set: Arc<TemplateSet>,
    registry: Arc<TemplateRegistry>,
    reporter: Arc<ErrorReporter>,
) -> Result<UnitLoader, BatchError> {
    if reporter.has_errors() {
        return Err(BatchError::CompilationFailed {
            errors: reporter.errors(),
            warnings: reporter.warnings(),
        });
    }
    debug!(templates = registry.len(), "wiring on-demand loader");
    Ok(UnitLoader::new(set, registry, reporter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::ast::{
        Escaping, ExprNode, ParamDef, TemplateDef, TemplateFile, TemplateNode, TemplateVariant,
        TypedExpr,
    };
    use weft_core::{ContentKind, SourceLocation, ValueKind};
    use weft_ir::UnitKind;
    use weft_render::{ParamBindings, RenderInstance, RenderStatus, UnitSet, Value};

    fn loc() -> SourceLocation {
        SourceLocation::new("lib.weft", 1, 1)
    }

    fn print_param(name: &str) -> TemplateNode {
        TemplateNode::Print {
            expr: TypedExpr {
                node: ExprNode::Param(name.into()),
                ty: ValueKind::Str,
                loc: loc(),
            },
            escape: Escaping::None,
            loc: loc(),
        }
    }

    fn template(name: &str, variant: TemplateVariant, body: Vec<TemplateNode>) -> TemplateDef {
        TemplateDef {
            name: name.into(),
            variant,
            content_kind: ContentKind::Html,
            params: vec![ParamDef {
                name: "word".into(),
                ty: ValueKind::Str,
                required: false,
                deferred: false,
            }],
            body,
            loc: loc(),
        }
    }

    fn valid(name: &str, variant: TemplateVariant) -> TemplateDef {
        template(
            name,
            variant,
            vec![
                TemplateNode::RawText {
                    text: format!("[{name}:"),
                    loc: loc(),
                },
                print_param("word"),
                TemplateNode::RawText {
                    text: "]".into(),
                    loc: loc(),
                },
            ],
        )
    }

    fn broken(name: &str) -> TemplateDef {
        template(
            name,
            TemplateVariant::Ordinary,
            vec![TemplateNode::Call {
                target: "app.nowhere".into(),
                args: vec![],
                loc: loc(),
            }],
        )
    }

    fn set_of(defs: Vec<TemplateDef>) -> (TemplateSet, TemplateRegistry) {
        let set = TemplateSet::new(vec![TemplateFile {
            path: "lib.weft".into(),
            templates: defs,
        }]);
        let registry = TemplateRegistry::from_set(&set);
        (set, registry)
    }

    #[test]
    fn one_malformed_template_does_not_stop_the_batch() {
        let (set, registry) = set_of(vec![
            valid("app.a", TemplateVariant::Ordinary),
            broken("app.bad"),
            valid("app.c", TemplateVariant::Ordinary),
        ]);
        let reporter = ErrorReporter::new();

        let mut seen = Vec::new();
        let report = {
            let mut listener =
                CompileListener::new().on_unit(|unit| seen.push(unit.name.to_string()));
            compile_all(&set, &registry, &reporter, &mut listener)
        };

        assert_eq!(report.templates_compiled, 2);
        assert_eq!(report.templates_failed, 1);
        assert!(report.failed);
        assert_eq!(reporter.errors().len(), 1);
        // The two valid templates still delivered body + factory each.
        assert_eq!(
            seen,
            vec![
                "app.a".to_string(),
                "app.a$factory".to_string(),
                "app.c".to_string(),
                "app.c$factory".to_string(),
            ]
        );
    }

    #[test]
    fn template_hooks_split_by_variant() {
        let (set, registry) = set_of(vec![
            valid("app.main", TemplateVariant::Ordinary),
            valid("app.alt", TemplateVariant::Delegate),
        ]);
        let reporter = ErrorReporter::new();

        let mut ordinary = Vec::new();
        let mut delegates = Vec::new();
        let report = {
            let mut listener = CompileListener::new()
                .on_template(|name| ordinary.push(name.to_string()))
                .on_delegate_template(|name| delegates.push(name.to_string()));
            compile_all(&set, &registry, &reporter, &mut listener)
        };

        assert!(!report.failed);
        assert_eq!(ordinary, vec!["app.main".to_string()]);
        assert_eq!(delegates, vec!["app.alt".to_string()]);
    }

    #[test]
    fn pack_collection_lists_units_and_delegates() {
        let (set, registry) = set_of(vec![
            valid("app.main", TemplateVariant::Ordinary),
            valid("app.alt", TemplateVariant::Delegate),
        ]);
        let reporter = ErrorReporter::new();

        let pack = pack_collection(&set, &registry, &reporter).unwrap();
        let names: Vec<_> = pack.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "app.main",
                "app.main$factory",
                "app.alt",
                "app.alt$factory"
            ]
        );
        assert_eq!(pack.delegates, vec!["app.alt".to_string()]);

        let units = pack.decode_units().unwrap();
        assert_eq!(units[0].kind, UnitKind::Template);
        assert_eq!(units[1].kind, UnitKind::Factory);
    }

    #[test]
    fn pack_collection_withholds_the_archive_on_failure() {
        let (set, registry) = set_of(vec![
            valid("app.good", TemplateVariant::Ordinary),
            broken("app.bad"),
        ]);
        let reporter = ErrorReporter::new();

        let err = pack_collection(&set, &registry, &reporter).unwrap_err();
        match err {
            BatchError::CompilationFailed { errors, .. } => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lazy_loader_compiles_nothing_up_front() {
        let (set, registry) = set_of(vec![valid("app.main", TemplateVariant::Ordinary)]);
        let loader = lazy_loader(
            Arc::new(set),
            Arc::new(registry),
            Arc::new(ErrorReporter::new()),
        )
        .unwrap();
        assert_eq!(loader.cached_len(), 0);
        assert!(loader.resolve("app.main").unwrap().found().is_some());
        assert_eq!(loader.cached_len(), 2);
    }

    #[test]
    fn lazy_loader_refuses_a_session_with_prior_errors() {
        let (set, registry) = set_of(vec![valid("app.main", TemplateVariant::Ordinary)]);
        let reporter = Arc::new(ErrorReporter::new());
        reporter.error(None, "analysis stage failed");
        let err = lazy_loader(Arc::new(set), Arc::new(registry), reporter).unwrap_err();
        assert!(matches!(err, BatchError::CompilationFailed { .. }));
    }

    /// Cross-mode consistency: a unit loaded from the archive and one
    /// resolved on demand render identically from identical inputs.
    #[test]
    fn archive_and_on_demand_units_are_equivalent() {
        let defs = vec![valid("app.main", TemplateVariant::Ordinary)];
        let (set, registry) = set_of(defs.clone());
        let reporter = ErrorReporter::new();
        let pack = pack_collection(&set, &registry, &reporter).unwrap();
        let archived = UnitSet::from_units(pack.decode_units().unwrap());

        let (set2, registry2) = set_of(defs);
        let loader = lazy_loader(
            Arc::new(set2),
            Arc::new(registry2),
            Arc::new(ErrorReporter::new()),
        )
        .unwrap();

        let from_archive = archived.get("app.main").unwrap();
        let on_demand = loader.resolve("app.main").unwrap().found().unwrap();
        assert_eq!(
            from_archive.to_bytes().unwrap(),
            on_demand.to_bytes().unwrap()
        );

        let render = |unit, source: &dyn weft_render::UnitSource| {
            let mut instance = RenderInstance::new(
                unit,
                ParamBindings::new().set("word", Value::Str("x".into())),
            )
            .unwrap();
            let mut out = String::new();
            assert_eq!(
                instance.advance(&mut out, source).unwrap(),
                RenderStatus::Done
            );
            out
        };
        assert_eq!(render(from_archive, &archived), render(on_demand, &loader));
    }
}
