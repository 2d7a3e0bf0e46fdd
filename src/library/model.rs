//! Parameter definitions, groups and the library that owns them

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, EntityKind, Violation};
use crate::value::Value;

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Select,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Select => "select",
        }
    }

    /// Parse a type name, case-insensitively. Unknown names load as `string`.
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "number" => ParameterType::Number,
            "integer" => ParameterType::Integer,
            "boolean" => ParameterType::Boolean,
            "select" => ParameterType::Select,
            _ => ParameterType::String,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ParameterType::Number | ParameterType::Integer)
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One allowed value of a select parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectOption {
    /// `{label, value}` pair; only the value takes part in validation
    Labeled {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        value: Value,
    },
    /// Bare scalar that is both label and value
    Plain(Value),
}

impl SelectOption {
    pub fn value(&self) -> &Value {
        match self {
            SelectOption::Labeled { value, .. } | SelectOption::Plain(value) => value,
        }
    }

    pub fn label(&self) -> String {
        match self {
            SelectOption::Labeled {
                label: Some(label), ..
            } => label.clone(),
            other => other.value().to_string(),
        }
    }
}

/// A library-level parameter definition
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalParameter {
    pub name: String,
    pub kind: ParameterType,
    pub default: Option<Value>,
    /// Lower bound: numeric for number/integer, length for string
    pub min: Option<f64>,
    /// Upper bound: numeric for number/integer, length for string
    pub max: Option<f64>,
    pub unit: String,
    pub description: String,
    pub required: bool,
    pub options: Vec<SelectOption>,
}

impl GlobalParameter {
    /// Create a required parameter with no default
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            min: None,
            max: None,
            unit: String::new(),
            description: String::new(),
            required: true,
            options: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    /// Mark the parameter as optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Canonical forms of every select option value
    pub fn option_values(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|option| option.value().canonical_key())
            .collect()
    }

    /// Check a candidate value against this definition.
    ///
    /// Returns every violated constraint; an empty list means the value is
    /// acceptable. A blank value on an optional parameter always passes.
    pub fn validate_value(&self, value: Option<&Value>) -> Vec<Violation> {
        let mut violations = Vec::new();

        let value = match value {
            Some(v) if !v.is_blank() => v,
            _ => {
                if self.required {
                    violations.push(self.violation("missing required parameter"));
                }
                return violations;
            }
        };

        match self.kind {
            ParameterType::Number => match value.as_f64() {
                Some(n) => self.check_bounds(n, "", &mut violations),
                None => violations.push(
                    self.violation(format!("expected a number, got {} '{}'", value.type_name(), value)),
                ),
            },
            ParameterType::Integer => match value.as_f64() {
                Some(n) if n.fract() != 0.0 => violations.push(
                    self.violation(format!("expected an integer, got '{}'", value)),
                ),
                Some(n) => self.check_bounds(n, "", &mut violations),
                None => violations.push(
                    self.violation(format!("expected an integer, got {} '{}'", value.type_name(), value)),
                ),
            },
            ParameterType::String => {
                let length = value.to_string().chars().count() as f64;
                self.check_bounds(length, "length ", &mut violations);
            }
            ParameterType::Boolean => {
                if value.as_bool().is_none() {
                    violations.push(self.violation(format!("expected a boolean, got '{}'", value)));
                }
            }
            ParameterType::Select => {
                let allowed = self.option_values();
                if allowed.is_empty() {
                    violations.push(self.violation("select parameter declares no options"));
                } else if !allowed.contains(&value.canonical_key()) {
                    violations.push(self.violation(format!(
                        "'{}' is not one of the options: {}",
                        value,
                        allowed.join(", ")
                    )));
                }
            }
        }

        violations
    }

    // Min and max are reported independently.
    fn check_bounds(&self, n: f64, what: &str, violations: &mut Vec<Violation>) {
        if let Some(min) = self.min {
            if n < min {
                violations.push(self.violation(format!("{}must be at least {}", what, min)));
            }
        }
        if let Some(max) = self.max {
            if n > max {
                violations.push(self.violation(format!("{}must be at most {}", what, max)));
            }
        }
    }

    fn violation(&self, message: impl Into<String>) -> Violation {
        Violation::new(format!("parameter '{}'", self.name), message)
    }
}

/// A named, ordered collection of parameter definitions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlobalParameterGroup {
    pub name: String,
    pub description: String,
    parameters: Vec<GlobalParameter>,
}

impl GlobalParameterGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter, replacing any existing one of the same name
    pub fn with_parameter(mut self, param: GlobalParameter) -> Self {
        match self.parameters.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => *existing = param,
            None => self.parameters.push(param),
        }
        self
    }

    /// Add a parameter; fails if the name is already used in this group
    pub fn insert(&mut self, param: GlobalParameter) -> Result<(), CoreError> {
        if self.contains(&param.name) {
            return Err(CoreError::integrity(format!(
                "parameter '{}' already exists in group '{}'",
                param.name, self.name
            )));
        }
        self.parameters.push(param);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<GlobalParameter> {
        let index = self.parameters.iter().position(|p| p.name == name)?;
        Some(self.parameters.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&GlobalParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn parameters(&self) -> impl Iterator<Item = &GlobalParameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    fn replace(&mut self, old_name: &str, param: GlobalParameter) -> bool {
        match self.parameters.iter_mut().find(|p| p.name == old_name) {
            Some(slot) => {
                *slot = param;
                true
            }
            None => false,
        }
    }
}

/// All parameter groups of one installation.
///
/// Parameter names are resolved by bare name, so a name may appear in at most
/// one group across the whole library. The mutation methods below enforce
/// that synchronously and leave `self` untouched when they fail.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterLibrary {
    groups: Vec<GlobalParameterGroup>,
}

impl ParameterLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> impl Iterator<Item = &GlobalParameterGroup> {
        self.groups.iter()
    }

    pub fn group(&self, name: &str) -> Option<&GlobalParameterGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn contains_group(&self, name: &str) -> bool {
        self.group(name).is_some()
    }

    /// Look a parameter up by bare name across all groups
    pub fn find_parameter(&self, name: &str) -> Option<(&GlobalParameterGroup, &GlobalParameter)> {
        self.groups
            .iter()
            .find_map(|g| g.get(name).map(|p| (g, p)))
    }

    /// Every parameter paired with its group name, in library order
    pub fn all_parameters(&self) -> impl Iterator<Item = (&str, &GlobalParameter)> {
        self.groups
            .iter()
            .flat_map(|g| g.parameters().map(move |p| (g.name.as_str(), p)))
    }

    pub fn parameter_count(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Add a group. Fails on a duplicate group name or when one of its
    /// parameters is already defined elsewhere in the library.
    pub fn add_group(&mut self, group: GlobalParameterGroup) -> Result<(), CoreError> {
        if group.name.trim().is_empty() {
            return Err(CoreError::ValidationFailure(vec![Violation::new(
                "parameter group",
                "name must not be blank",
            )]));
        }
        if self.contains_group(&group.name) {
            return Err(CoreError::integrity(format!(
                "parameter group '{}' already exists",
                group.name
            )));
        }
        for param in group.parameters() {
            check_identifier(&param.name)?;
            if let Some((owner, _)) = self.find_parameter(&param.name) {
                return Err(collision(&param.name, &owner.name));
            }
        }
        self.groups.push(group);
        Ok(())
    }

    /// Remove a group and its parameters. Solutions referencing it are not
    /// touched; the dangling reference shows up when they are validated.
    pub fn remove_group(&mut self, name: &str) -> Result<GlobalParameterGroup, CoreError> {
        let index = self
            .groups
            .iter()
            .position(|g| g.name == name)
            .ok_or_else(|| CoreError::not_found(EntityKind::Group, name))?;
        Ok(self.groups.remove(index))
    }

    pub fn add_parameter(&mut self, group_name: &str, param: GlobalParameter) -> Result<(), CoreError> {
        check_identifier(&param.name)?;
        if !self.contains_group(group_name) {
            return Err(CoreError::not_found(EntityKind::Group, group_name));
        }
        if let Some((owner, _)) = self.find_parameter(&param.name) {
            return Err(collision(&param.name, &owner.name));
        }
        self.group_mut(group_name)
            .ok_or_else(|| CoreError::not_found(EntityKind::Group, group_name))?
            .insert(param)
    }

    pub fn remove_parameter(&mut self, group_name: &str, name: &str) -> Result<GlobalParameter, CoreError> {
        let group = self
            .group_mut(group_name)
            .ok_or_else(|| CoreError::not_found(EntityKind::Group, group_name))?;
        group
            .remove(name)
            .ok_or_else(|| CoreError::not_found(EntityKind::Parameter, format!("{}.{}", group_name, name)))
    }

    /// Replace, rename and/or move a parameter in one step.
    ///
    /// `destination` defaults to the source group. All checks run before
    /// anything changes, so a failure never loses the parameter.
    pub fn update_parameter(
        &mut self,
        group_name: &str,
        old_name: &str,
        param: GlobalParameter,
        destination: Option<&str>,
    ) -> Result<(), CoreError> {
        check_identifier(&param.name)?;
        let destination = destination.unwrap_or(group_name);

        let source = self
            .group(group_name)
            .ok_or_else(|| CoreError::not_found(EntityKind::Group, group_name))?;
        if !source.contains(old_name) {
            return Err(CoreError::not_found(
                EntityKind::Parameter,
                format!("{}.{}", group_name, old_name),
            ));
        }
        if !self.contains_group(destination) {
            return Err(CoreError::not_found(EntityKind::Group, destination));
        }
        if let Some((owner, _)) = self.find_parameter(&param.name) {
            let replaces_itself = owner.name == group_name && param.name == old_name;
            if !replaces_itself {
                return Err(collision(&param.name, &owner.name));
            }
        }

        if destination == group_name {
            if let Some(group) = self.group_mut(group_name) {
                group.replace(old_name, param);
            }
            return Ok(());
        }

        if let Some(group) = self.group_mut(group_name) {
            group.remove(old_name);
        }
        self.group_mut(destination)
            .ok_or_else(|| CoreError::not_found(EntityKind::Group, destination))?
            .insert(param)
    }

    /// Check group names, defaults and global name uniqueness.
    ///
    /// Returns all findings; an empty list means the library is valid.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut seen_groups: HashMap<&str, usize> = HashMap::new();
        let mut owners: HashMap<&str, &str> = HashMap::new();

        for group in &self.groups {
            let subject = format!("parameter group '{}'", group.name);
            if group.name.trim().is_empty() {
                violations.push(Violation::new(subject.clone(), "name must not be blank"));
            }
            let count = seen_groups.entry(group.name.as_str()).or_insert(0);
            *count += 1;
            if *count == 2 {
                violations.push(Violation::new(subject, "group name is not unique"));
            }

            for param in group.parameters() {
                if let Some(default) = param.default.as_ref().filter(|d| !d.is_null()) {
                    for v in param.validate_value(Some(default)) {
                        violations.push(Violation::new(
                            format!("default of parameter '{}' in group '{}'", param.name, group.name),
                            v.message,
                        ));
                    }
                }
                match owners.get(param.name.as_str()) {
                    Some(first) => violations.push(Violation::new(
                        format!("parameter '{}'", param.name),
                        format!("defined in both '{}' and '{}'", first, group.name),
                    )),
                    None => {
                        owners.insert(param.name.as_str(), group.name.as_str());
                    }
                }
            }
        }

        violations
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut GlobalParameterGroup> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Append a group as read from disk, without integrity checks
    pub(crate) fn push_loaded(&mut self, group: GlobalParameterGroup) {
        self.groups.push(group);
    }
}

/// Template-referencable parameter name: `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn check_identifier(name: &str) -> Result<(), CoreError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(CoreError::ValidationFailure(vec![Violation::new(
            format!("parameter '{}'", name),
            "name must start with a letter or underscore and contain only letters, digits and underscores",
        )]))
    }
}

fn collision(name: &str, owner: &str) -> CoreError {
    CoreError::integrity(format!(
        "parameter '{}' already exists in group '{}'",
        name, owner
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth() -> GlobalParameter {
        GlobalParameter::new("depth", ParameterType::Number)
            .with_min(0.5)
            .with_max(50.0)
            .with_unit("mm")
    }

    fn library_with(groups: Vec<GlobalParameterGroup>) -> ParameterLibrary {
        let mut library = ParameterLibrary::new();
        for group in groups {
            library.add_group(group).expect("group should be accepted");
        }
        library
    }

    #[test]
    fn test_numeric_bounds_are_inclusive() {
        let param = GlobalParameter::new("depth", ParameterType::Number)
            .with_min(1.0)
            .with_max(10.0);
        for (candidate, ok) in [(0.99, false), (1.0, true), (5.5, true), (10.0, true), (10.01, false)] {
            let violations = param.validate_value(Some(&Value::Float(candidate)));
            assert_eq!(violations.is_empty(), ok, "candidate {}", candidate);
        }
    }

    #[test]
    fn test_min_and_max_fire_independently() {
        let param = GlobalParameter::new("odd", ParameterType::Number)
            .with_min(10.0)
            .with_max(5.0);
        let violations = param.validate_value(Some(&Value::Int(7)));
        assert_eq!(violations.len(), 2);
        assert!(violations[0].message.contains("at least 10"));
        assert!(violations[1].message.contains("at most 5"));
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let param = GlobalParameter::new("count", ParameterType::Integer);
        assert!(param.validate_value(Some(&Value::from("4"))).is_empty());
        assert!(param.validate_value(Some(&Value::Float(4.0))).is_empty());
        let violations = param.validate_value(Some(&Value::Float(4.5)));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("integer"));
    }

    #[test]
    fn test_number_must_parse() {
        let violations = depth().validate_value(Some(&Value::from("deep")));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("expected a number"));
    }

    #[test]
    fn test_required_and_optional_blank_values() {
        let required = GlobalParameter::new("program", ParameterType::String);
        let violations = required.validate_value(Some(&Value::from("")));
        assert_eq!(violations[0].message, "missing required parameter");
        assert_eq!(required.validate_value(None).len(), 1);

        let optional = required.clone().optional();
        assert!(optional.validate_value(None).is_empty());
        assert!(optional.validate_value(Some(&Value::Null)).is_empty());
    }

    #[test]
    fn test_string_length_bounds() {
        let param = GlobalParameter::new("program", ParameterType::String)
            .with_min(2.0)
            .with_max(4.0);
        assert!(param.validate_value(Some(&Value::from("O100"))).is_empty());
        assert_eq!(param.validate_value(Some(&Value::from("O10000"))).len(), 1);
        assert_eq!(param.validate_value(Some(&Value::from("O"))).len(), 1);
    }

    #[test]
    fn test_select_compares_canonical_values() {
        let param = GlobalParameter::new("tool", ParameterType::Select).with_options(vec![
            SelectOption::Plain(Value::Int(5)),
            SelectOption::Labeled {
                label: Some("Spot drill".to_string()),
                value: Value::from("T7"),
            },
        ]);
        assert!(param.validate_value(Some(&Value::from("5"))).is_empty());
        assert!(param.validate_value(Some(&Value::Int(5))).is_empty());
        assert!(param.validate_value(Some(&Value::from("T7"))).is_empty());
        let violations = param.validate_value(Some(&Value::from("Spot drill")));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("5, T7"));
    }

    #[test]
    fn test_boolean_accepts_textual_forms() {
        let param = GlobalParameter::new("coolant", ParameterType::Boolean);
        assert!(param.validate_value(Some(&Value::Bool(false))).is_empty());
        assert!(param.validate_value(Some(&Value::from("yes"))).is_empty());
        assert_eq!(param.validate_value(Some(&Value::from("maybe"))).len(), 1);
    }

    #[test]
    fn test_cross_group_duplicate_rejected_and_library_unchanged() {
        let mut library = library_with(vec![
            GlobalParameterGroup::new("A", ""),
            GlobalParameterGroup::new("B", ""),
        ]);
        library
            .add_parameter("A", GlobalParameter::new("x", ParameterType::Number))
            .unwrap();
        let before = library.clone();

        let err = library
            .add_parameter("B", GlobalParameter::new("x", ParameterType::Number))
            .unwrap_err();
        assert!(matches!(err, CoreError::IntegrityViolation(_)));
        assert_eq!(library, before);
    }

    #[test]
    fn test_add_group_rejects_duplicate_name() {
        let mut library = library_with(vec![GlobalParameterGroup::new("spindle", "")]);
        let err = library
            .add_group(GlobalParameterGroup::new("spindle", "again"))
            .unwrap_err();
        assert!(matches!(err, CoreError::IntegrityViolation(_)));
        assert_eq!(library.groups().count(), 1);
    }

    #[test]
    fn test_add_parameter_rejects_non_identifier() {
        let mut library = library_with(vec![GlobalParameterGroup::new("A", "")]);
        let err = library
            .add_parameter("A", GlobalParameter::new("feed rate", ParameterType::Number))
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailure(_)));
    }

    #[test]
    fn test_update_renames_in_place() {
        let mut library = library_with(vec![GlobalParameterGroup::new("A", "")
            .with_parameter(depth())
            .with_parameter(GlobalParameter::new("feed", ParameterType::Number))]);

        library
            .update_parameter("A", "depth", depth().with_max(80.0), None)
            .unwrap();
        let renamed = GlobalParameter::new("cut_depth", ParameterType::Number);
        library.update_parameter("A", "depth", renamed, None).unwrap();

        let names: Vec<_> = library
            .group("A")
            .unwrap()
            .parameters()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["cut_depth", "feed"]);
    }

    #[test]
    fn test_update_moves_between_groups() {
        let mut library = library_with(vec![
            GlobalParameterGroup::new("A", "").with_parameter(depth()),
            GlobalParameterGroup::new("B", ""),
        ]);
        library
            .update_parameter("A", "depth", depth(), Some("B"))
            .unwrap();
        assert!(library.group("A").unwrap().is_empty());
        assert!(library.group("B").unwrap().contains("depth"));
    }

    #[test]
    fn test_failed_move_keeps_parameter() {
        let mut library = library_with(vec![
            GlobalParameterGroup::new("A", "").with_parameter(depth()),
            GlobalParameterGroup::new("B", "")
                .with_parameter(GlobalParameter::new("feed", ParameterType::Number)),
        ]);
        let before = library.clone();

        let moved = GlobalParameter::new("feed", ParameterType::Number);
        let err = library
            .update_parameter("A", "depth", moved, Some("B"))
            .unwrap_err();
        assert!(matches!(err, CoreError::IntegrityViolation(_)));
        assert_eq!(library, before);
    }

    #[test]
    fn test_validate_reports_bad_default_and_duplicates() {
        let mut library = ParameterLibrary::new();
        library.push_loaded(
            GlobalParameterGroup::new("A", "").with_parameter(depth().with_default(100.0)),
        );
        library.push_loaded(GlobalParameterGroup::new("B", "").with_parameter(depth()));

        let violations = library.validate();
        assert_eq!(violations.len(), 2);
        assert!(violations[0].subject.contains("default of parameter 'depth'"));
        assert!(violations[1].message.contains("defined in both 'A' and 'B'"));
    }

    #[test]
    fn test_missing_default_is_not_a_violation() {
        let library = library_with(vec![GlobalParameterGroup::new("A", "").with_parameter(depth())]);
        assert!(library.validate().is_empty());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("feed_rate"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("feed-rate"));
        assert!(!is_identifier(""));
    }
}
