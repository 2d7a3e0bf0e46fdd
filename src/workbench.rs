//! Workbench: one installation's library, solution catalog and render engine
//!
//! This is the surface an interactive front end talks to: list solutions,
//! activate one, list its parameters, validate values and render templates.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::AppConfig;
use crate::error::{CoreError, EntityKind};
use crate::library::{GlobalParameter, LibraryStore};
use crate::renderer::{RenderEngine, RenderResult};
use crate::resolver::{ParameterResolver, PresentedGroup};
use crate::solution::{Solution, SolutionManager};
use crate::value::ValueMap;

#[derive(Debug)]
pub struct Workbench {
    config: AppConfig,
    store: LibraryStore,
    solutions: SolutionManager,
    engine: RenderEngine,
}

impl Workbench {
    /// Initialize the library and scan the solutions directory
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        let store = LibraryStore::initialize(&config.config_dir)?;
        let mut solutions = SolutionManager::new(&config.solutions_dir);
        solutions.scan()?;
        let engine = RenderEngine::with_config(config.render.clone());

        Ok(Self {
            config,
            store,
            solutions,
            engine,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn library(&self) -> &LibraryStore {
        &self.store
    }

    pub fn library_mut(&mut self) -> &mut LibraryStore {
        &mut self.store
    }

    /// Rescan the catalog. The active solution and the engine binding are
    /// dropped.
    pub fn scan(&mut self) -> Result<usize, CoreError> {
        self.engine = RenderEngine::with_config(self.config.render.clone());
        self.solutions.scan()
    }

    pub fn solutions(&self) -> impl Iterator<Item = &Solution> {
        self.solutions.list()
    }

    pub fn solution(&self, id: &str) -> Option<&Solution> {
        self.solutions.get(id)
    }

    /// Activate a solution and bind the render engine to it
    pub fn activate(&mut self, id: &str) -> Result<&Solution, CoreError> {
        let solution = self.solutions.activate(id)?;
        self.engine.initialize(solution);
        Ok(solution)
    }

    pub fn active(&self) -> Result<&Solution, CoreError> {
        self.solutions.active().ok_or(CoreError::Unbound)
    }

    fn resolver(&self) -> ParameterResolver<'_> {
        ParameterResolver::new(self.store.library())
    }

    pub fn effective_parameters(&self) -> Result<Vec<&GlobalParameter>, CoreError> {
        Ok(self.resolver().effective_parameters(self.active()?))
    }

    pub fn presentable_parameters(&self) -> Result<Vec<PresentedGroup<'_>>, CoreError> {
        Ok(self.resolver().presentable_parameters(self.active()?))
    }

    /// Values for the active solution with `caller` laid over the defaults
    pub fn resolve(&self, caller: &ValueMap) -> Result<ValueMap, CoreError> {
        Ok(self.resolver().resolve(self.active()?, caller))
    }

    pub fn validate(&self, caller: &ValueMap) -> Result<(), CoreError> {
        let solution = self.active()?;
        let resolver = self.resolver();
        resolver.validate(solution, &resolver.resolve(solution, caller))
    }

    /// Render one template of the active solution
    pub fn render(&mut self, template_name: &str, caller: &ValueMap) -> RenderResult {
        match self.resolve(caller) {
            Ok(values) => self.engine.render(template_name, &values),
            Err(err) => RenderResult {
                template_name: template_name.to_string(),
                outcome: Err(err),
            },
        }
    }

    /// Render every template of the active solution in declaration order
    pub fn render_all(&mut self, caller: &ValueMap) -> Result<Vec<RenderResult>, CoreError> {
        let values = self.resolve(caller)?;
        let names: Vec<String> = self.active()?.templates.iter().map(|t| t.name.clone()).collect();
        Ok(names
            .iter()
            .map(|name| self.engine.render(name, &values))
            .collect())
    }

    /// Write rendered content verbatim. Without `destination` the file goes
    /// to the exports directory under the template's output file name.
    pub fn write_output(&self, result: &RenderResult, destination: Option<&Path>) -> Result<PathBuf, CoreError> {
        let content = match &result.outcome {
            Ok(content) => content,
            Err(err) => return Err(err.clone()),
        };

        let path = match destination {
            Some(path) => path.to_path_buf(),
            None => {
                let file_name = self
                    .active()?
                    .output_file_name(&result.template_name)
                    .ok_or_else(|| CoreError::not_found(EntityKind::Template, &result.template_name))?;
                self.config.exports_dir.join(file_name)
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        fs::write(&path, content).map_err(|e| CoreError::io(&path, e))?;
        info!(template = %result.template_name, path = %path.display(), "wrote program");
        Ok(path)
    }
}
