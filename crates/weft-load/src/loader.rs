//! The on-demand unit loader.
//!
//! `resolve` checks a concurrent table first; on a miss it finds the
//! owning template, compiles it synchronously, inserts every unit the
//! compilation produced, and returns the requested one. Entries are
//! never invalidated: templates are immutable for the lifetime of a
//! compilation session.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use weft_compile::compile_template;
use weft_core::ast::TemplateSet;
use weft_core::registry::TemplateRegistry;
use weft_core::ErrorReporter;
use weft_ir::CompiledUnit;
use weft_render::UnitSource;

use crate::error::LoadError;

/// The outcome of a successful resolution pass.
///
/// `NotFound` means no owning template exists for the name, letting the
/// host fall through to other resolution strategies. Compile failures
/// are an error, not a `NotFound`.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Arc<CompiledUnit>),
    NotFound,
}

impl Resolution {
    pub fn found(self) -> Option<Arc<CompiledUnit>> {
        match self {
            Resolution::Found(unit) => Some(unit),
            Resolution::NotFound => None,
        }
    }
}

/// Lazily populated, concurrency-safe store from unit name to artifact.
///
/// Callers racing on the same miss may both compile the owning template;
/// the artifacts are deterministic, so whichever insertion lands first
/// wins and the results are indistinguishable. Per-entry atomicity comes
/// from the shard map; there is no global lock to contend on.
#[derive(Debug)]
pub struct UnitLoader {
    set: Arc<TemplateSet>,
    registry: Arc<TemplateRegistry>,
    reporter: Arc<ErrorReporter>,
    table: DashMap<String, Arc<CompiledUnit>>,
}

impl UnitLoader {
    pub fn new(
        set: Arc<TemplateSet>,
        registry: Arc<TemplateRegistry>,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        Self {
            set,
            registry,
            reporter,
            table: DashMap::new(),
        }
    }

    /// Resolve a unit name to its compiled artifact.
    ///
    /// Fast path is a table hit with no compilation work. The slow path
    /// is fail-fast: if the shared reporter holds errors before or after
    /// compiling the owning template, resolution aborts with every
    /// diagnostic recorded so far and no artifact is returned.
    pub fn resolve(&self, name: &str) -> Result<Resolution, LoadError> {
        if let Some(unit) = self.table.get(name) {
            return Ok(Resolution::Found(Arc::clone(&unit)));
        }

        let owner = match self.registry.owner_of_unit(name) {
            Some(owner) => owner.to_string(),
            None => {
                debug!(unit = name, "no owning template");
                return Ok(Resolution::NotFound);
            }
        };
        let def = match self.set.get(&owner) {
            Some(def) => def,
            None => return Ok(Resolution::NotFound),
        };

        // A partially broken session must never hand out a
        // loadable-but-incorrect artifact.
        if self.reporter.has_errors() {
            return Err(self.aggregate_failure());
        }

        debug!(unit = name, template = %owner, "cache miss, compiling owner");
        let units = match compile_template(def, &self.registry, &self.reporter) {
            Ok(units) => units,
            Err(err) => {
                err.report(&self.reporter);
                return Err(self.aggregate_failure());
            }
        };
        if self.reporter.has_errors() {
            return Err(self.aggregate_failure());
        }

        // Insert the siblings, then return the requested unit through a
        // single entry write so the common single-artifact path does not
        // store the same value twice.
        let mut requested = None;
        for unit in units {
            let unit_name = unit.name.to_string();
            if unit_name == name {
                requested = Some(Arc::new(unit));
            } else {
                self.table.entry(unit_name).or_insert_with(|| Arc::new(unit));
            }
        }
        match requested {
            Some(unit) => {
                let entry = self
                    .table
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::clone(&unit));
                Ok(Resolution::Found(Arc::clone(&entry)))
            }
            // The owner exists but produced no unit of this exact name
            // (e.g. a closure index that was never allocated).
            None => Ok(Resolution::NotFound),
        }
    }

    /// Number of artifacts currently cached.
    pub fn cached_len(&self) -> usize {
        self.table.len()
    }

    fn aggregate_failure(&self) -> LoadError {
        LoadError::CompilationFailed {
            errors: self.reporter.errors(),
            warnings: self.reporter.warnings(),
        }
    }
}

impl UnitSource for UnitLoader {
    /// On-demand lookup for the render driver. Resolution failures have
    /// already been recorded on the shared reporter, so they surface
    /// here as an absent unit.
    fn lookup(&self, name: &str) -> Option<Arc<CompiledUnit>> {
        match self.resolve(name) {
            Ok(resolution) => resolution.found(),
            Err(err) => {
                warn!(unit = name, error = %err, "on-demand resolution failed");
                None
            }
        }
    }
}
