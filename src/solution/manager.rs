//! Solution discovery and activation

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CoreError, EntityKind};

use super::document::{parse_local_config, parse_solution, SOLUTION_FILE_NAME};
use super::model::Solution;

/// Catalog of the solutions found under one root directory
#[derive(Debug)]
pub struct SolutionManager {
    root: PathBuf,
    solutions: BTreeMap<String, Solution>,
    active: Option<String>,
}

impl SolutionManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            solutions: BTreeMap::new(),
            active: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rebuild the catalog from disk and clear the active selection.
    ///
    /// Each immediate subdirectory holding a description file becomes one
    /// solution. A malformed description is logged and skipped so the rest
    /// of the catalog still loads. Returns the number of solutions found.
    pub fn scan(&mut self) -> Result<usize, CoreError> {
        self.solutions.clear();
        self.active = None;

        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|e| CoreError::io(&self.root, e))?;
            info!(root = %self.root.display(), "created solutions directory");
            return Ok(0);
        }

        let entries = fs::read_dir(&self.root).map_err(|e| CoreError::io(&self.root, e))?;
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            let file = dir.join(SOLUTION_FILE_NAME);
            if !file.is_file() {
                continue;
            }

            let loaded = fs::read_to_string(&file)
                .map_err(|e| CoreError::io(&file, e))
                .and_then(|text| parse_solution(&text, &dir));
            match loaded {
                Ok(solution) => {
                    debug!(id = %solution.id, templates = solution.templates.len(), "loaded solution");
                    self.solutions.insert(solution.id.clone(), solution);
                }
                Err(err) => warn!(dir = %dir.display(), error = %err, "skipping solution"),
            }
        }

        info!(root = %self.root.display(), count = self.solutions.len(), "scanned solutions");
        Ok(self.solutions.len())
    }

    /// All solutions in id order
    pub fn list(&self) -> impl Iterator<Item = &Solution> {
        self.solutions.values()
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Solution> {
        self.solutions.get(id)
    }

    /// Make `id` the active solution, seeding its local defaults from the
    /// solution's configuration file. A malformed local file is logged and
    /// leaves the local defaults empty.
    pub fn activate(&mut self, id: &str) -> Result<&Solution, CoreError> {
        let solution = self
            .solutions
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Solution, id))?;

        solution.local_defaults.clear();
        if solution.config_file.is_file() {
            let path = solution.config_file.clone();
            let loaded = fs::read_to_string(&path)
                .map_err(|e| CoreError::io(&path, e))
                .and_then(|text| parse_local_config(&text, &path));
            match loaded {
                Ok(defaults) => solution.local_defaults = defaults,
                Err(err) => warn!(path = %path.display(), error = %err, "ignoring local configuration"),
            }
        }

        info!(id, local_defaults = solution.local_defaults.len(), "activated solution");
        self.active = Some(id.to_string());
        Ok(&*solution)
    }

    pub fn active(&self) -> Option<&Solution> {
        self.active.as_deref().and_then(|id| self.solutions.get(id))
    }
}
