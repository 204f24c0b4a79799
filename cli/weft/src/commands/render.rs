//! `weft render` — drive one archived unit to completion.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use weft_pack::PackFile;
use weft_render::{ParamBindings, RenderInstance, RenderStatus, UnitSet, Value};

pub fn run(path: &Path, unit_name: &str, data: Option<&Path>) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let pack = PackFile::from_bytes(&bytes)
        .with_context(|| format!("parsing {}", path.display()))?;
    let set = UnitSet::from_units(pack.decode_units().context("decoding archive entries")?);

    let unit = match set.get(unit_name) {
        Some(unit) => unit,
        None => bail!("unit '{unit_name}' not found in {}", path.display()),
    };

    let mut bindings = ParamBindings::new();
    if let Some(data_path) = data {
        let json = std::fs::read_to_string(data_path)
            .with_context(|| format!("reading {}", data_path.display()))?;
        let params: serde_json::Value = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", data_path.display()))?;
        let object = params
            .as_object()
            .with_context(|| format!("{} must hold a JSON object", data_path.display()))?;
        for (name, value) in object {
            bindings = bindings.set(name, json_to_value(value));
        }
    }

    let mut instance = RenderInstance::new(unit, bindings)
        .with_context(|| format!("instantiating '{unit_name}'"))?;
    let mut out = String::new();
    match instance
        .advance(&mut out, &set)
        .with_context(|| format!("rendering '{unit_name}'"))?
    {
        RenderStatus::Done => {
            print!("{out}");
            Ok(())
        }
        // Every parameter the CLI supplies is concrete, so a suspension
        // here means a deferred input nobody will ever fill.
        RenderStatus::DataUnavailable => {
            bail!("render suspended waiting for a deferred parameter; supply it via --data")
        }
        RenderStatus::OutputLimited => bail!("render suspended on output backpressure"),
    }
}

/// Host-facing JSON data mapped onto the runtime value model.
fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => {
            Value::List(items.iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{compile, init};
    use crate::manifest::WeftManifest;

    fn compiled_project(dir: &Path) -> std::path::PathBuf {
        let project = dir.join("site");
        init::create_project(&project, "site").unwrap();
        let (manifest, _) = WeftManifest::find_and_load(&project).unwrap().unwrap();
        compile::run(&project, Some(&manifest), None, None, false).unwrap();
        project.join("out/site.wpk")
    }

    #[test]
    fn render_the_starter_template() {
        let dir = tempfile::tempdir().unwrap();
        let archive = compiled_project(dir.path());
        let data = dir.path().join("params.json");
        std::fs::write(&data, r#"{"who": "world"}"#).unwrap();

        run(&archive, "site.hello", Some(&data)).unwrap();
    }

    #[test]
    fn missing_required_param_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = compiled_project(dir.path());
        assert!(run(&archive, "site.hello", None).is_err());
    }

    #[test]
    fn unknown_unit_name_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = compiled_project(dir.path());
        assert!(run(&archive, "site.nope", None).is_err());
    }

    #[test]
    fn json_values_map_onto_the_runtime_model() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"n": 3, "f": 1.5, "s": "x", "b": true, "list": [1, 2], "none": null}"#,
        )
        .unwrap();
        let value = json_to_value(&json);
        match value {
            Value::Map(entries) => {
                assert_eq!(entries["n"], Value::Int(3));
                assert_eq!(entries["f"], Value::Float(1.5));
                assert_eq!(entries["s"], Value::Str("x".into()));
                assert_eq!(entries["b"], Value::Bool(true));
                assert_eq!(
                    entries["list"],
                    Value::List(vec![Value::Int(1), Value::Int(2)])
                );
                assert_eq!(entries["none"], Value::Null);
            }
            other => panic!("expected a map, got {other:?}"),
        }
    }
}
