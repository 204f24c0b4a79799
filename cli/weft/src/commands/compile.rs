//! `weft compile` — analyzed template files in, `.wpk` archive out.

use std::path::Path;

use anyhow::{bail, Context, Result};
use weft_batch::BatchError;
use weft_core::ast::{TemplateFile, TemplateSet};
use weft_core::registry::TemplateRegistry;
use weft_core::ErrorReporter;

use crate::manifest::WeftManifest;

pub fn run(
    project_dir: &Path,
    manifest: Option<&WeftManifest>,
    input: Option<&str>,
    output: Option<&str>,
    stats: bool,
) -> Result<()> {
    let inputs: Vec<String> = match input {
        Some(path) => vec![path.to_string()],
        None => match manifest {
            Some(m) => m.build.inputs.clone(),
            None => vec!["templates/main.json".to_string()],
        },
    };

    let set = load_template_set(project_dir, &inputs)?;
    if set.is_empty() {
        bail!("no templates found in {}", inputs.join(", "));
    }
    let registry = TemplateRegistry::from_set(&set);
    let reporter = ErrorReporter::new();

    let pack = match weft_batch::pack_collection(&set, &registry, &reporter) {
        Ok(pack) => pack,
        Err(BatchError::CompilationFailed { errors, warnings }) => {
            for diagnostic in errors.iter().chain(&warnings) {
                eprintln!("{diagnostic}");
            }
            bail!("compilation failed with {} error(s)", errors.len());
        }
        Err(err) => return Err(err.into()),
    };
    for warning in reporter.warnings() {
        eprintln!("{warning}");
    }

    let output_rel = output
        .map(str::to_string)
        .or_else(|| manifest.map(|m| m.output_path()))
        .unwrap_or_else(|| "out/templates.wpk".to_string());
    let output_path = project_dir.join(&output_rel);
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let bytes = pack.to_bytes().context("serializing archive")?;
    std::fs::write(&output_path, &bytes)
        .with_context(|| format!("writing {}", output_path.display()))?;

    println!(
        "Compiled {} template(s) into {} unit(s)",
        set.len(),
        pack.entries.len()
    );
    println!("  {} ({} bytes)", output_rel, bytes.len());
    if !pack.delegates.is_empty() {
        println!("  delegates: {}", pack.delegates.join(", "));
    }

    if stats {
        let units = pack.decode_units().context("decoding archive entries")?;
        println!("{:<40} {:>8} {:>7} {:>7} {:>6}", "unit", "bytes", "fields", "points", "ops");
        for unit in &units {
            let s = unit.stats();
            println!(
                "{:<40} {:>8} {:>7} {:>7} {:>6}",
                unit.name.to_string(),
                s.byte_size,
                s.field_count,
                s.suspension_points,
                s.op_count
            );
        }
    }

    Ok(())
}

pub(crate) fn load_template_set(project_dir: &Path, inputs: &[String]) -> Result<TemplateSet> {
    let mut files = Vec::with_capacity(inputs.len());
    for input in inputs {
        let path = project_dir.join(input);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let file: TemplateFile = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", path.display()))?;
        files.push(file);
    }
    Ok(TemplateSet::new(files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;

    #[test]
    fn compile_starter_project() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("site");
        init::create_project(&project, "site").unwrap();
        let (manifest, _) = WeftManifest::find_and_load(&project).unwrap().unwrap();

        run(&project, Some(&manifest), None, None, true).unwrap();

        let archive = project.join("out/site.wpk");
        assert!(archive.is_file());
        let pack = weft_pack::PackFile::from_bytes(&std::fs::read(archive).unwrap()).unwrap();
        // Body unit plus factory for the one starter template.
        assert_eq!(pack.entries.len(), 2);
    }

    #[test]
    fn missing_input_is_a_readable_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(dir.path(), None, Some("nope.json"), None, false).unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
