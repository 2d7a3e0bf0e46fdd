//! `scheme.yaml` and `config.yaml` file shapes

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;
use crate::value::{Value, ValueMap};

use super::model::{Macro, Solution, Template, DEFAULT_OUTPUT_EXT, DEFAULT_VERSION};

/// Name of the description file that marks a solution directory
pub const SOLUTION_FILE_NAME: &str = "scheme.yaml";

/// Name of the optional solution-local configuration file
pub const LOCAL_CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Deserialize)]
struct SolutionDocument {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    templates: Vec<TemplateDocument>,
    #[serde(default)]
    referenced_groups: Vec<String>,
    #[serde(default)]
    defaults: ValueMap,
    #[serde(default)]
    macros: Vec<MacroDocument>,
}

#[derive(Debug, Deserialize)]
struct TemplateDocument {
    name: String,
    file: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    output_name: Option<String>,
    #[serde(default = "default_output_ext")]
    output_ext: String,
}

#[derive(Debug, Deserialize)]
struct MacroDocument {
    name: String,
    content: String,
    #[serde(default)]
    description: String,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_output_ext() -> String {
    DEFAULT_OUTPUT_EXT.to_string()
}

/// Build a solution from description-file text. `dir` is the solution
/// directory; its final component becomes the id.
pub(crate) fn parse_solution(text: &str, dir: &Path) -> Result<Solution, CoreError> {
    let file = dir.join(SOLUTION_FILE_NAME);
    let doc: SolutionDocument =
        serde_yaml::from_str(text).map_err(|e| CoreError::malformed(&file, e.to_string()))?;

    let mut seen = HashSet::new();
    for template in &doc.templates {
        if !seen.insert(template.name.as_str()) {
            return Err(CoreError::malformed(
                &file,
                format!("template name '{}' is declared twice", template.name),
            ));
        }
    }

    let id = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CoreError::malformed(&file, "solution directory has no name"))?;

    Ok(Solution {
        id,
        name: doc.name,
        description: doc.description,
        version: doc.version,
        templates: doc
            .templates
            .into_iter()
            .map(|t| Template {
                name: t.name,
                file: t.file,
                description: t.description,
                output_name: t.output_name.filter(|name| !name.is_empty()),
                output_ext: t.output_ext,
            })
            .collect(),
        path: dir.to_path_buf(),
        referenced_groups: doc.referenced_groups,
        defaults: doc.defaults,
        local_defaults: ValueMap::new(),
        config_file: dir.join(LOCAL_CONFIG_FILE_NAME),
        macros: doc
            .macros
            .into_iter()
            .map(|m| Macro {
                name: m.name,
                content: m.content,
                description: m.description,
            })
            .collect(),
    })
}

/// Read the defaults carried by a local configuration file.
///
/// A top-level `defaults` mapping is used on its own when present; otherwise
/// the whole document is the defaults map. An empty file yields no defaults.
pub(crate) fn parse_local_config(text: &str, path: &Path) -> Result<ValueMap, CoreError> {
    if text.trim().is_empty() {
        return Ok(ValueMap::new());
    }
    let doc: Option<ValueMap> =
        serde_yaml::from_str(text).map_err(|e| CoreError::malformed(path, e.to_string()))?;
    let mut doc = doc.unwrap_or_default();

    match doc.remove("defaults") {
        Some(Value::Map(defaults)) => Ok(defaults),
        Some(other) => {
            doc.insert("defaults".to_string(), other);
            Ok(doc)
        }
        None => Ok(doc),
    }
}
