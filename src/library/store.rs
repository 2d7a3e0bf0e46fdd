//! Persistent parameter library: load, validate-before-write mutations, backups

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CoreError, EntityKind};
use crate::value::{Value, ValueMap};

use super::document::{parse_library, render_library, GroupDocument, ParameterDocument};
use super::model::{GlobalParameter, GlobalParameterGroup, ParameterLibrary, ParameterType};

/// File name of the library inside the configuration directory
pub const LIBRARY_FILE_NAME: &str = "parameters.yaml";

/// Suffix appended to the library path for the pre-overwrite copy
pub const BACKUP_SUFFIX: &str = ".backup";

/// Owner of the parameter library and its backing file.
///
/// Every mutation is applied to a copy, validated, written, and only then
/// committed, so a rejected call leaves both memory and disk untouched.
#[derive(Debug)]
pub struct LibraryStore {
    library: ParameterLibrary,
    path: PathBuf,
}

impl LibraryStore {
    /// Open the library in `config_dir`, creating the directory and an empty
    /// library file when absent. Calling it again on the same directory is
    /// harmless.
    ///
    /// An unreadable library file does not fail initialization: the store
    /// starts empty and the bad file stays on disk until the next save
    /// backs it up and replaces it.
    pub fn initialize(config_dir: &Path) -> Result<Self, CoreError> {
        fs::create_dir_all(config_dir).map_err(|e| CoreError::io(config_dir, e))?;

        let mut store = Self {
            library: ParameterLibrary::new(),
            path: config_dir.join(LIBRARY_FILE_NAME),
        };

        if store.path.exists() {
            if let Err(err) = store.load() {
                warn!(path = %store.path.display(), error = %err, "starting from an empty parameter library");
            }
        } else {
            store.save()?;
            info!(path = %store.path.display(), "created empty parameter library");
        }

        Ok(store)
    }

    /// Reload from disk. On failure the in-memory library is reset to empty
    /// and the error is returned.
    pub fn load(&mut self) -> Result<(), CoreError> {
        let loaded = fs::read_to_string(&self.path)
            .map_err(|e| CoreError::io(&self.path, e))
            .and_then(|text| parse_library(&text, &self.path));

        match loaded {
            Ok(library) => {
                let violations = library.validate();
                if !violations.is_empty() {
                    warn!(
                        path = %self.path.display(),
                        problems = %CoreError::ValidationFailure(violations),
                        "parameter library loaded with problems"
                    );
                }
                debug!(
                    groups = library.groups().count(),
                    parameters = library.parameter_count(),
                    "parameter library loaded"
                );
                self.library = library;
                Ok(())
            }
            Err(err) => {
                self.library = ParameterLibrary::new();
                Err(err)
            }
        }
    }

    /// Validate and write the current library
    pub fn save(&self) -> Result<(), CoreError> {
        self.validate_library()?;
        write_library(&self.path, &self.library)
    }

    pub fn library(&self) -> &ParameterLibrary {
        &self.library
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        backup_path(&self.path)
    }

    pub fn validate_library(&self) -> Result<(), CoreError> {
        let violations = self.library.validate();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ValidationFailure(violations))
        }
    }

    pub fn add_group(&mut self, group: GlobalParameterGroup) -> Result<(), CoreError> {
        self.commit(|library| library.add_group(group))
    }

    /// Delete a group and all of its parameters. Solutions still referring
    /// to it are left alone.
    pub fn remove_group(&mut self, name: &str) -> Result<(), CoreError> {
        self.commit(|library| library.remove_group(name).map(|_| ()))
    }

    pub fn add_parameter_to_group(&mut self, group_name: &str, param: GlobalParameter) -> Result<(), CoreError> {
        self.commit(|library| library.add_parameter(group_name, param))
    }

    pub fn remove_parameter_from_group(&mut self, group_name: &str, name: &str) -> Result<(), CoreError> {
        self.commit(|library| library.remove_parameter(group_name, name).map(|_| ()))
    }

    /// Replace, rename, or move a parameter to `destination` as one transaction
    pub fn update_parameter_in_group(
        &mut self,
        group_name: &str,
        old_name: &str,
        param: GlobalParameter,
        destination: Option<&str>,
    ) -> Result<(), CoreError> {
        self.commit(|library| library.update_parameter(group_name, old_name, param, destination))
    }

    /// Create a group from a map of parameter definitions.
    ///
    /// Map values are full definitions (`{type, default, ...}`); any other
    /// value becomes a string parameter with that value as its default.
    /// Returns the number of imported parameters.
    pub fn import_group(&mut self, group_name: &str, source: &str, definitions: &ValueMap) -> Result<usize, CoreError> {
        let mut group = GlobalParameterGroup::new(group_name, format!("Imported from '{}'", source));

        for (name, definition) in definitions {
            let param = match definition {
                Value::Map(_) => {
                    let doc: ParameterDocument = serde_yaml::to_value(definition)
                        .and_then(serde_yaml::from_value)
                        .map_err(|e| CoreError::malformed(source, format!("parameter '{}': {}", name, e)))?;
                    doc.into_parameter(name.as_str())
                }
                other => GlobalParameter::new(name.as_str(), ParameterType::String)
                    .with_default(other.clone())
                    .with_description(format!("Imported from '{}'", source)),
            };
            group.insert(param)?;
        }

        let count = group.len();
        self.add_group(group)?;
        info!(group = group_name, parameters = count, "imported parameter group");
        Ok(count)
    }

    /// The group's on-disk YAML form
    pub fn export_group(&self, name: &str) -> Result<String, CoreError> {
        let group = self
            .library
            .group(name)
            .ok_or_else(|| CoreError::not_found(EntityKind::Group, name))?;
        GroupDocument::from_group(group)
            .and_then(|doc| serde_yaml::to_string(&doc))
            .map_err(|e| CoreError::malformed(&self.path, e.to_string()))
    }

    /// Summary statistics
    pub fn info(&self) -> LibraryInfo {
        let mut parameter_types = BTreeMap::new();
        for (_, param) in self.library.all_parameters() {
            *parameter_types.entry(param.kind.as_str()).or_insert(0) += 1;
        }
        LibraryInfo {
            path: self.path.clone(),
            total_groups: self.library.groups().count(),
            total_parameters: self.library.parameter_count(),
            parameter_types,
            group_names: self.library.group_names().into_iter().map(str::to_string).collect(),
        }
    }

    fn commit<F>(&mut self, mutate: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut ParameterLibrary) -> Result<(), CoreError>,
    {
        let mut next = self.library.clone();
        mutate(&mut next)?;

        let violations = next.validate();
        if !violations.is_empty() {
            return Err(CoreError::ValidationFailure(violations));
        }

        write_library(&self.path, &next)?;
        self.library = next;
        Ok(())
    }
}

/// Counts describing a library
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryInfo {
    pub path: PathBuf,
    pub total_groups: usize,
    pub total_parameters: usize,
    pub parameter_types: BTreeMap<&'static str, usize>,
    pub group_names: Vec<String>,
}

impl fmt::Display for LibraryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "file:       {}", self.path.display())?;
        writeln!(f, "groups:     {}", self.total_groups)?;
        writeln!(f, "parameters: {}", self.total_parameters)?;
        for (kind, count) in &self.parameter_types {
            writeln!(f, "  {:<9} {}", kind, count)?;
        }
        if !self.group_names.is_empty() {
            write!(f, "group names: {}", self.group_names.join(", "))?;
        }
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

fn write_library(path: &Path, library: &ParameterLibrary) -> Result<(), CoreError> {
    let text = render_library(library, path)?;

    if path.exists() {
        let backup = backup_path(path);
        fs::copy(path, &backup).map_err(|e| CoreError::io(&backup, e))?;
    }
    fs::write(path, text).map_err(|e| CoreError::io(path, e))?;
    debug!(path = %path.display(), "parameter library written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spindle_group() -> GlobalParameterGroup {
        GlobalParameterGroup::new("spindle", "Spindle settings").with_parameter(
            GlobalParameter::new("rpm", ParameterType::Integer)
                .with_default(1200)
                .with_min(100.0)
                .with_max(24000.0),
        )
    }

    #[test]
    fn test_initialize_creates_empty_library() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join("config");

        let store = LibraryStore::initialize(&config_dir).unwrap();
        assert!(store.library().is_empty());
        assert!(config_dir.join(LIBRARY_FILE_NAME).exists());

        let again = LibraryStore::initialize(&config_dir).unwrap();
        assert!(again.library().is_empty());
    }

    #[test]
    fn test_malformed_file_falls_back_to_empty() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(LIBRARY_FILE_NAME), "groups: [not, a, map").unwrap();

        let mut store = LibraryStore::initialize(temp.path()).unwrap();
        assert!(store.library().is_empty());

        store.add_group(spindle_group()).unwrap();
        let backup = fs::read_to_string(store.backup_path()).unwrap();
        assert!(backup.contains("not, a, map"));
    }

    #[test]
    fn test_mutation_writes_backup_of_previous_file() {
        let temp = TempDir::new().unwrap();
        let mut store = LibraryStore::initialize(temp.path()).unwrap();

        store.add_group(spindle_group()).unwrap();
        store
            .add_group(GlobalParameterGroup::new("coolant", ""))
            .unwrap();

        let backup = fs::read_to_string(store.backup_path()).unwrap();
        assert!(backup.contains("spindle"));
        assert!(!backup.contains("coolant"));
    }

    #[test]
    fn test_rejected_mutation_leaves_disk_untouched() {
        let temp = TempDir::new().unwrap();
        let mut store = LibraryStore::initialize(temp.path()).unwrap();
        store.add_group(spindle_group()).unwrap();
        let on_disk = fs::read_to_string(store.path()).unwrap();

        let bad = GlobalParameter::new("feed", ParameterType::Number)
            .with_default(-5.0)
            .with_min(0.0);
        let err = store.add_parameter_to_group("spindle", bad).unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailure(_)));
        assert!(store.library().find_parameter("feed").is_none());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), on_disk);
    }

    #[test]
    fn test_remove_missing_group_is_not_found() {
        let temp = TempDir::new().unwrap();
        let mut store = LibraryStore::initialize(temp.path()).unwrap();
        let err = store.remove_group("ghost").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { kind: EntityKind::Group, .. }));
    }

    #[test]
    fn test_import_group_accepts_definitions_and_bare_values() {
        let temp = TempDir::new().unwrap();
        let mut store = LibraryStore::initialize(temp.path()).unwrap();

        let definitions: ValueMap = serde_yaml::from_str(
            r#"
feed:
  type: number
  default: 250
  unit: mm/min
program: O1000
"#,
        )
        .unwrap();
        let count = store.import_group("legacy", "old-scheme", &definitions).unwrap();
        assert_eq!(count, 2);

        let (_, feed) = store.library().find_parameter("feed").unwrap();
        assert_eq!(feed.kind, ParameterType::Number);
        let (_, program) = store.library().find_parameter("program").unwrap();
        assert_eq!(program.kind, ParameterType::String);
        assert_eq!(program.default, Some(Value::from("O1000")));
    }

    #[test]
    fn test_info_counts_types() {
        let temp = TempDir::new().unwrap();
        let mut store = LibraryStore::initialize(temp.path()).unwrap();
        store.add_group(spindle_group()).unwrap();

        let info = store.info();
        assert_eq!(info.total_groups, 1);
        assert_eq!(info.total_parameters, 1);
        assert_eq!(info.parameter_types.get("integer"), Some(&1));
        assert!(info.to_string().contains("spindle"));
    }

    #[test]
    fn test_export_group_yaml() {
        let temp = TempDir::new().unwrap();
        let mut store = LibraryStore::initialize(temp.path()).unwrap();
        store.add_group(spindle_group()).unwrap();

        let yaml = store.export_group("spindle").unwrap();
        assert!(yaml.contains("description: Spindle settings"));
        assert!(yaml.contains("rpm:"));
    }
}
