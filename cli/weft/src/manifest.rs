//! `weft.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The top-level manifest structure for a Weft project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeftManifest {
    /// Project metadata (required).
    pub project: ProjectConfig,
    /// Build configuration.
    #[serde(default)]
    pub build: BuildConfig,
}

/// Project metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required).
    pub name: String,
    /// Project version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Build configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Analyzed template files (JSON) to compile, in document order.
    #[serde(default = "default_inputs")]
    pub inputs: Vec<String>,
    /// Archive path to write.
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            inputs: default_inputs(),
            output: None,
        }
    }
}

fn default_inputs() -> Vec<String> {
    vec!["templates/main.json".to_string()]
}

impl WeftManifest {
    /// Search upward from `start_dir` for a `weft.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join("weft.toml");
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: WeftManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing weft.toml")
    }

    /// The archive path to write, relative to the project directory.
    pub fn output_path(&self) -> String {
        self.build
            .output
            .clone()
            .unwrap_or_else(|| format!("out/{}.wpk", self.project.name))
    }

    /// Generate the default template for `weft init`.
    pub fn template(name: &str) -> String {
        format!(
            r#"[project]
name = "{name}"
version = "0.1.0"

[build]
inputs = ["templates/main.json"]
output = "out/{name}.wpk"
"#
        )
    }
}
