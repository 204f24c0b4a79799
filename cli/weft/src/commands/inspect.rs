//! `weft inspect` — list the contents of a `.wpk` archive.

use std::path::Path;

use anyhow::{Context, Result};
use weft_ir::UnitKind;
use weft_pack::PackFile;

pub fn run(path: &Path) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let pack = PackFile::from_bytes(&data)
        .with_context(|| format!("parsing {}", path.display()))?;
    let units = pack.decode_units().context("decoding archive entries")?;

    println!("{} (format {})", path.display(), pack.version);
    println!("{:<40} {:>9} {:>8} {:>7}", "unit", "kind", "bytes", "points");
    for (entry, unit) in pack.entries.iter().zip(&units) {
        let kind = match unit.kind {
            UnitKind::Template => "template",
            UnitKind::Factory => "factory",
            UnitKind::Closure => "closure",
        };
        println!(
            "{:<40} {:>9} {:>8} {:>7}",
            entry.name,
            kind,
            entry.data.len(),
            unit.points.len()
        );
    }
    if pack.delegates.is_empty() {
        println!("no delegate templates");
    } else {
        println!("delegate templates: {}", pack.delegates.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{compile, init};
    use crate::manifest::WeftManifest;

    #[test]
    fn inspect_a_compiled_archive() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("site");
        init::create_project(&project, "site").unwrap();
        let (manifest, _) = WeftManifest::find_and_load(&project).unwrap().unwrap();
        compile::run(&project, Some(&manifest), None, None, false).unwrap();

        run(&project.join("out/site.wpk")).unwrap();
    }

    #[test]
    fn inspect_rejects_a_non_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.wpk");
        std::fs::write(&path, b"not an archive").unwrap();
        assert!(run(&path).is_err());
    }
}
