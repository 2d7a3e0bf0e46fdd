//! Solutions, their templates and macros

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Violation;
use crate::library::ParameterLibrary;
use crate::value::ValueMap;

/// Extension used when a template does not declare one
pub const DEFAULT_OUTPUT_EXT: &str = "nc";

/// Version assumed when the description file has none
pub const DEFAULT_VERSION: &str = "1.0.0";

/// One renderable template file of a solution
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    /// Path relative to the solution directory
    pub file: String,
    pub description: String,
    /// Output base name; the template name is used when unset
    pub output_name: Option<String>,
    pub output_ext: String,
}

impl Template {
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            description: String::new(),
            output_name: None,
            output_ext: DEFAULT_OUTPUT_EXT.to_string(),
        }
    }

    pub fn with_output_name(mut self, output_name: impl Into<String>) -> Self {
        self.output_name = Some(output_name.into());
        self
    }

    pub fn with_output_ext(mut self, ext: impl Into<String>) -> Self {
        self.output_ext = ext.into();
        self
    }

    /// Absolute location of the template file under `base`
    pub fn path(&self, base: &Path) -> PathBuf {
        base.join(&self.file)
    }

    /// `<base>.<ext>`, where base falls back to the template name
    pub fn output_file_name(&self) -> String {
        let base = self
            .output_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.name);
        let ext = self.output_ext.trim_start_matches('.');
        if ext.is_empty() {
            base.to_string()
        } else {
            format!("{}.{}", base, ext)
        }
    }
}

/// Literal snippet exposed to templates as a plain string variable
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub content: String,
    pub description: String,
}

/// A template set with the parameter groups and defaults it relies on
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Directory name under the solutions root
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub templates: Vec<Template>,
    /// Solution directory; template files are resolved against it
    pub path: PathBuf,
    /// Library group names, in reference order. May name missing groups.
    pub referenced_groups: Vec<String>,
    /// Defaults declared in the description file
    pub defaults: ValueMap,
    /// Defaults read from the local configuration file at activation
    pub local_defaults: ValueMap,
    pub config_file: PathBuf,
    pub macros: Vec<Macro>,
}

impl Solution {
    /// Declared defaults overlaid by local configuration defaults
    pub fn default_overrides(&self) -> ValueMap {
        let mut merged = self.defaults.clone();
        merged.extend(self.local_defaults.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn template_names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn output_file_name(&self, template_name: &str) -> Option<String> {
        self.template(template_name).map(Template::output_file_name)
    }

    /// Append a group reference unless it is already present
    pub fn add_referenced_group(&mut self, group: impl Into<String>) -> bool {
        let group = group.into();
        if self.referenced_groups.contains(&group) {
            return false;
        }
        self.referenced_groups.push(group);
        true
    }

    pub fn remove_referenced_group(&mut self, group: &str) -> bool {
        let before = self.referenced_groups.len();
        self.referenced_groups.retain(|g| g != group);
        self.referenced_groups.len() != before
    }

    /// Structural checks: name, template names, and group references
    /// against `library`. Dangling references are reported, never removed.
    pub fn validate(&self, library: &ParameterLibrary) -> Vec<Violation> {
        let subject = format!("solution '{}'", self.id);
        let mut violations = Vec::new();

        if self.name.trim().is_empty() {
            violations.push(Violation::new(subject.clone(), "name must not be blank"));
        }

        let mut seen = HashSet::new();
        for template in &self.templates {
            if template.name.trim().is_empty() {
                violations.push(Violation::new(subject.clone(), "template name must not be blank"));
            } else if !seen.insert(template.name.as_str()) {
                violations.push(Violation::new(
                    subject.clone(),
                    format!("template name '{}' is not unique", template.name),
                ));
            }
        }

        for group in &self.referenced_groups {
            if !library.contains_group(group) {
                violations.push(Violation::new(
                    subject.clone(),
                    format!("referenced parameter group '{}' does not exist", group),
                ));
            }
        }

        violations
    }
}
