//! Parameter resolution for a solution
//!
//! Values are layered, later layers winning:
//!
//! 1. the library default of each effective parameter
//! 2. the solution's declared defaults
//! 3. defaults seeded from the solution's local configuration
//! 4. values supplied by the caller

use std::collections::{BTreeSet, HashSet};
use std::fs;

use tracing::{debug, warn};

use crate::error::{CoreError, Violation};
use crate::library::{GlobalParameter, GlobalParameterGroup, ParameterLibrary};
use crate::solution::Solution;
use crate::template::scan_variables;
use crate::value::ValueMap;

/// Parameters of one referenced group selected for presentation
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedGroup<'a> {
    pub group: &'a GlobalParameterGroup,
    pub parameters: Vec<&'a GlobalParameter>,
}

/// Resolves solution parameters against a library
#[derive(Debug, Clone, Copy)]
pub struct ParameterResolver<'a> {
    library: &'a ParameterLibrary,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(library: &'a ParameterLibrary) -> Self {
        Self { library }
    }

    /// Referenced groups that exist, in reference order, each once
    fn referenced_groups(&self, solution: &Solution) -> Vec<&'a GlobalParameterGroup> {
        let mut seen = HashSet::new();
        solution
            .referenced_groups
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| {
                let group = self.library.group(name);
                if group.is_none() {
                    debug!(solution = %solution.id, group = %name, "skipping dangling group reference");
                }
                group
            })
            .collect()
    }

    /// Union of the definitions in the groups `solution` references
    pub fn effective_parameters(&self, solution: &Solution) -> Vec<&'a GlobalParameter> {
        self.referenced_groups(solution)
            .into_iter()
            .flat_map(|group| group.parameters())
            .collect()
    }

    /// Layers 1 to 3
    pub fn resolve_defaults(&self, solution: &Solution) -> ValueMap {
        let mut values: ValueMap = self
            .effective_parameters(solution)
            .into_iter()
            .filter_map(|param| {
                let default = param.default.as_ref().filter(|v| !v.is_null())?;
                Some((param.name.clone(), default.clone()))
            })
            .collect();
        values.extend(solution.default_overrides());
        values
    }

    /// All four layers, `caller` winning
    pub fn resolve(&self, solution: &Solution, caller: &ValueMap) -> ValueMap {
        let mut values = self.resolve_defaults(solution);
        values.extend(caller.iter().map(|(k, v)| (k.clone(), v.clone())));
        values
    }

    /// Effective parameters worth surfacing to a form or listing: those a
    /// template of the solution refers to, plus any with an explicit override.
    /// Groups are kept in reference order; groups left empty are dropped.
    pub fn presentable_parameters(&self, solution: &Solution) -> Vec<PresentedGroup<'a>> {
        let mut wanted: BTreeSet<String> = solution.default_overrides().into_keys().collect();
        for template in &solution.templates {
            let path = template.path(&solution.path);
            match fs::read_to_string(&path) {
                Ok(source) => wanted.extend(scan_variables(&source)),
                Err(err) => {
                    warn!(template = %template.name, path = %path.display(), error = %err, "cannot scan template")
                }
            }
        }

        self.referenced_groups(solution)
            .into_iter()
            .filter_map(|group| {
                let parameters: Vec<_> = group.parameters().filter(|p| wanted.contains(&p.name)).collect();
                (!parameters.is_empty()).then_some(PresentedGroup { group, parameters })
            })
            .collect()
    }

    /// Check `values` against every effective parameter and the solution's
    /// own structure, reporting all failures together
    pub fn validate(&self, solution: &Solution, values: &ValueMap) -> Result<(), CoreError> {
        let mut violations: Vec<Violation> = solution.validate(self.library);
        for param in self.effective_parameters(solution) {
            violations.extend(param.validate_value(values.get(&param.name)));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            debug!(solution = %solution.id, count = violations.len(), "validation failed");
            Err(CoreError::ValidationFailure(violations))
        }
    }
}
