//! On-disk YAML shape of the parameter library

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::error::CoreError;
use crate::value::Value;

use super::model::{GlobalParameter, GlobalParameterGroup, ParameterLibrary, ParameterType, SelectOption};

/// Top-level document: `groups` is mandatory
#[derive(Debug, Serialize, Deserialize)]
struct LibraryDocument {
    groups: Mapping,
}

/// One group: description plus ordered `items`
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GroupDocument {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Mapping,
}

/// One parameter definition. Optional keys are written only when set and
/// `required` only when false.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ParameterDocument {
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default = "default_required", skip_serializing_if = "is_true")]
    pub required: bool,
}

fn default_type() -> String {
    ParameterType::String.as_str().to_string()
}

fn default_required() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

impl ParameterDocument {
    pub fn into_parameter(self, name: impl Into<String>) -> GlobalParameter {
        GlobalParameter {
            name: name.into(),
            kind: ParameterType::parse_lenient(&self.kind),
            default: self.default,
            min: self.min,
            max: self.max,
            unit: self.unit,
            description: self.description,
            required: self.required,
            options: self.options,
        }
    }

    pub fn from_parameter(param: &GlobalParameter) -> Self {
        Self {
            kind: param.kind.as_str().to_string(),
            description: param.description.clone(),
            default: param.default.clone(),
            min: param.min,
            max: param.max,
            unit: param.unit.clone(),
            options: param.options.clone(),
            required: param.required,
        }
    }
}

impl GroupDocument {
    pub fn from_group(group: &GlobalParameterGroup) -> Result<Self, serde_yaml::Error> {
        let mut items = Mapping::new();
        for param in group.parameters() {
            items.insert(
                serde_yaml::Value::String(param.name.clone()),
                serde_yaml::to_value(ParameterDocument::from_parameter(param))?,
            );
        }
        Ok(Self {
            description: group.description.clone(),
            items,
        })
    }

    fn into_group(self, name: String, path: &Path) -> Result<GlobalParameterGroup, CoreError> {
        let mut group = GlobalParameterGroup::new(name, self.description);
        for (key, raw) in self.items {
            let param_name = mapping_key(&key, path)?;
            let doc: ParameterDocument = serde_yaml::from_value(raw).map_err(|e| {
                CoreError::malformed(
                    path,
                    format!("parameter '{}' in group '{}': {}", param_name, group.name, e),
                )
            })?;
            group.insert(doc.into_parameter(param_name)).map_err(|e| {
                CoreError::malformed(path, e.to_string())
            })?;
        }
        Ok(group)
    }
}

fn mapping_key(key: &serde_yaml::Value, path: &Path) -> Result<String, CoreError> {
    key.as_str()
        .map(str::to_string)
        .ok_or_else(|| CoreError::malformed(path, format!("expected a string key, found {:?}", key)))
}

/// Parse library text. Cross-group integrity is not checked here; the caller
/// decides what to do with a loaded-but-invalid library.
pub(crate) fn parse_library(text: &str, path: &Path) -> Result<ParameterLibrary, CoreError> {
    let doc: LibraryDocument =
        serde_yaml::from_str(text).map_err(|e| CoreError::malformed(path, e.to_string()))?;

    let mut library = ParameterLibrary::new();
    for (key, raw) in doc.groups {
        let group_name = mapping_key(&key, path)?;
        let group_doc: GroupDocument = serde_yaml::from_value(raw).map_err(|e| {
            CoreError::malformed(path, format!("group '{}': {}", group_name, e))
        })?;
        library.push_loaded(group_doc.into_group(group_name, path)?);
    }
    Ok(library)
}

pub(crate) fn render_library(library: &ParameterLibrary, path: &Path) -> Result<String, CoreError> {
    let to_malformed = |e: serde_yaml::Error| CoreError::malformed(path, e.to_string());

    let mut groups = Mapping::new();
    for group in library.groups() {
        let doc = GroupDocument::from_group(group).map_err(to_malformed)?;
        groups.insert(
            serde_yaml::Value::String(group.name.clone()),
            serde_yaml::to_value(doc).map_err(to_malformed)?,
        );
    }
    serde_yaml::to_string(&LibraryDocument { groups }).map_err(to_malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
groups:
  drilling:
    description: Drilling cycle parameters
    items:
      depth:
        type: number
        description: Final hole depth
        default: 12.5
        min: 0.5
        max: 80
        unit: mm
      peck:
        type: integer
        default: 3
        required: false
  machine:
    description: ""
    items:
      plane:
        type: select
        default: G17
        options:
          - G17
          - label: XZ plane
            value: G18
      mode:
        type: Mystery
"#;

    #[test]
    fn test_parse_preserves_order_and_fields() {
        let library = parse_library(SAMPLE, Path::new("parameters.yaml")).unwrap();
        assert_eq!(library.group_names(), vec!["drilling", "machine"]);

        let drilling = library.group("drilling").unwrap();
        let depth = drilling.get("depth").unwrap();
        assert_eq!(depth.kind, ParameterType::Number);
        assert_eq!(depth.default, Some(Value::Float(12.5)));
        assert_eq!(depth.max, Some(80.0));
        assert_eq!(depth.unit, "mm");
        assert!(depth.required);
        assert!(!drilling.get("peck").unwrap().required);

        let plane = library.group("machine").unwrap().get("plane").unwrap();
        assert_eq!(plane.option_values(), vec!["G17", "G18"]);
        assert_eq!(plane.options[1].label(), "XZ plane");
    }

    #[test]
    fn test_unknown_type_loads_as_string() {
        let library = parse_library(SAMPLE, Path::new("parameters.yaml")).unwrap();
        let (_, mode) = library.find_parameter("mode").unwrap();
        assert_eq!(mode.kind, ParameterType::String);
    }

    #[test]
    fn test_missing_groups_key_is_malformed() {
        let err = parse_library("items: {}\n", Path::new("parameters.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::MalformedDocument { .. }));
    }

    #[test]
    fn test_render_then_parse_round_trips() {
        let library = parse_library(SAMPLE, Path::new("parameters.yaml")).unwrap();
        let text = render_library(&library, Path::new("parameters.yaml")).unwrap();
        let reparsed = parse_library(&text, Path::new("parameters.yaml")).unwrap();
        assert_eq!(reparsed, library);
    }

    #[test]
    fn test_render_omits_unset_keys() {
        let group = GlobalParameterGroup::new("g", "")
            .with_parameter(GlobalParameter::new("x", ParameterType::String));
        let doc = GroupDocument::from_group(&group).unwrap();
        let text = serde_yaml::to_string(&doc).unwrap();
        assert!(text.contains("type: string"));
        assert!(!text.contains("required"));
        assert!(!text.contains("min"));
    }
}
