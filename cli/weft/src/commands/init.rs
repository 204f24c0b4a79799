//! `weft init` — project scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use weft_core::ast::{
    Escaping, ExprNode, ParamDef, TemplateDef, TemplateFile, TemplateNode, TemplateVariant,
    TypedExpr,
};
use weft_core::{ContentKind, SourceLocation, ValueKind};

use crate::manifest::WeftManifest;

/// Create a new Weft project at the given path.
///
/// `name` is the project name. The directory `name` is created relative
/// to cwd.
pub fn run(name: &str) -> Result<()> {
    let project_dir = Path::new(name);
    create_project(project_dir, name)
}

pub(crate) fn create_project(project_dir: &Path, name: &str) -> Result<()> {
    if project_dir.exists() {
        bail!("directory '{}' already exists", project_dir.display());
    }

    fs::create_dir_all(project_dir.join("templates"))
        .context("creating templates/ directory")?;
    fs::create_dir_all(project_dir.join("out")).context("creating out/ directory")?;

    let manifest_content = WeftManifest::template(name);
    fs::write(project_dir.join("weft.toml"), &manifest_content)
        .context("writing weft.toml")?;

    // A minimal analyzed template file so the project compiles as-is.
    let file = starter_file(name);
    let json = serde_json::to_string_pretty(&file).context("serializing starter template")?;
    fs::write(project_dir.join("templates").join("main.json"), json)
        .context("writing templates/main.json")?;

    fs::write(project_dir.join(".gitignore"), "out/\n").context("writing .gitignore")?;

    println!("Created project '{name}'");
    println!("  {name}/weft.toml");
    println!("  {name}/templates/main.json");
    println!("  {name}/out/");
    println!("  {name}/.gitignore");

    Ok(())
}

/// One greeting template, as the analysis stage would hand it over.
fn starter_file(name: &str) -> TemplateFile {
    let path = "templates/main.weft".to_string();
    let loc = |line| SourceLocation::new(path.clone(), line, 1);
    TemplateFile {
        path: path.clone(),
        templates: vec![TemplateDef {
            name: format!("{name}.hello"),
            variant: TemplateVariant::Ordinary,
            content_kind: ContentKind::Html,
            params: vec![ParamDef {
                name: "who".into(),
                ty: ValueKind::Str,
                required: true,
                deferred: false,
            }],
            body: vec![
                TemplateNode::RawText {
                    text: "<p>Hello, ".into(),
                    loc: loc(2),
                },
                TemplateNode::Print {
                    expr: TypedExpr {
                        node: ExprNode::Param("who".into()),
                        ty: ValueKind::Str,
                        loc: loc(2),
                    },
                    escape: Escaping::Html,
                    loc: loc(2),
                },
                TemplateNode::RawText {
                    text: "!</p>".into(),
                    loc: loc(2),
                },
            ],
            loc: loc(1),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_project_structure() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("test-init-project");

        create_project(&project_path, "test-init-project").unwrap();

        assert!(project_path.join("weft.toml").is_file());
        assert!(project_path.join("templates/main.json").is_file());
        assert!(project_path.join("out").is_dir());
        assert!(project_path.join(".gitignore").is_file());
    }

    #[test]
    fn init_generates_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("valid-manifest");

        create_project(&project_path, "valid-manifest").unwrap();

        let content = fs::read_to_string(project_path.join("weft.toml")).unwrap();
        let manifest = WeftManifest::from_str(&content).unwrap();
        assert_eq!(manifest.project.name, "valid-manifest");
    }

    #[test]
    fn init_generates_a_parseable_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("valid-ast");

        create_project(&project_path, "valid-ast").unwrap();

        let json = fs::read_to_string(project_path.join("templates/main.json")).unwrap();
        let file: TemplateFile = serde_json::from_str(&json).unwrap();
        assert_eq!(file.templates.len(), 1);
        assert_eq!(file.templates[0].name, "valid-ast.hello");
    }

    #[test]
    fn init_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("existing");
        fs::create_dir(&project_path).unwrap();

        let result = create_project(&project_path, "existing");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));
    }
}
