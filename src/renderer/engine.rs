//! Render engine bound to one solution at a time

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{CoreError, EntityKind};
use crate::solution::Solution;
use crate::template::{self, Program};
use crate::value::{Value, ValueMap};

use super::config::RenderConfig;

/// Outcome of rendering one template. Failures are carried as data.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub template_name: String,
    pub outcome: Result<String, CoreError>,
}

impl RenderResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Rendered text, if rendering succeeded
    pub fn content(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&CoreError> {
        self.outcome.as_ref().err()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(|e| e.to_string())
    }
}

#[derive(Debug)]
struct Binding {
    solution: Solution,
    macros: ValueMap,
    /// Parsed templates by template name, valid for this binding only
    cache: HashMap<String, Program>,
}

#[derive(Debug, Default)]
pub struct RenderEngine {
    binding: Option<Binding>,
    config: RenderConfig,
}

impl RenderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RenderConfig) -> Self {
        Self {
            binding: None,
            config,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Bind to `solution`, replacing any previous binding and its cache
    pub fn initialize(&mut self, solution: &Solution) {
        let macros: ValueMap = solution
            .macros
            .iter()
            .map(|m| (m.name.clone(), Value::Str(m.content.clone())))
            .collect();
        info!(solution = %solution.id, macros = macros.len(), "render engine bound");
        self.binding = Some(Binding {
            solution: solution.clone(),
            macros,
            cache: HashMap::new(),
        });
    }

    /// Id of the bound solution
    pub fn bound_solution(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.solution.id.as_str())
    }

    /// Render a template of the bound solution with `params` laid over the
    /// macro context
    pub fn render(&mut self, template_name: &str, params: &ValueMap) -> RenderResult {
        let outcome = self.try_render(template_name, params);
        finish(template_name, outcome)
    }

    /// Render in-memory template text with the same context rules
    pub fn render_source(&self, name: &str, source: &str, params: &ValueMap) -> RenderResult {
        let outcome = template::parse(source, &self.config.whitespace)
            .map_err(|e| e.into_core(name, Path::new(name)))
            .and_then(|program| {
                let macros = self.binding.as_ref().map(|b| &b.macros);
                evaluate(name, Path::new(name), &program, macros, params)
            });
        finish(name, outcome)
    }

    fn try_render(&mut self, template_name: &str, params: &ValueMap) -> Result<String, CoreError> {
        let whitespace = self.config.whitespace;
        let binding = self.binding.as_mut().ok_or(CoreError::Unbound)?;
        let template = binding
            .solution
            .template(template_name)
            .ok_or_else(|| CoreError::not_found(EntityKind::Template, template_name))?;
        let path = template.path(&binding.solution.path);

        if !binding.cache.contains_key(template_name) {
            let source = fs::read_to_string(&path).map_err(|e| CoreError::io(&path, e))?;
            let program = template::parse(&source, &whitespace).map_err(|e| e.into_core(template_name, &path))?;
            debug!(template = template_name, path = %path.display(), "parsed template");
            binding.cache.insert(template_name.to_string(), program);
        }

        let program = binding
            .cache
            .get(template_name)
            .ok_or_else(|| CoreError::not_found(EntityKind::Template, template_name))?;
        evaluate(template_name, &path, program, Some(&binding.macros), params)
    }
}

fn evaluate(
    name: &str,
    path: &Path,
    program: &Program,
    macros: Option<&ValueMap>,
    params: &ValueMap,
) -> Result<String, CoreError> {
    let mut context = macros.cloned().unwrap_or_default();
    context.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    template::render(program, &context).map_err(|e| e.into_core(name, path))
}

fn finish(template_name: &str, outcome: Result<String, CoreError>) -> RenderResult {
    match &outcome {
        Ok(text) => info!(template = template_name, bytes = text.len(), "rendered template"),
        Err(err) => warn!(template = template_name, error = %err, "render failed"),
    }
    RenderResult {
        template_name: template_name.to_string(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::{Macro, Template};
    use tempfile::TempDir;

    fn bound_engine(dir: &TempDir, body: &str) -> RenderEngine {
        fs::write(dir.path().join("main.nc.j2"), body).unwrap();
        let mut solution = crate::solution::tests::solution("drill");
        solution.path = dir.path().to_path_buf();
        solution.templates = vec![Template::new("main", "main.nc.j2")];
        solution.macros = vec![Macro {
            name: "safe_start".to_string(),
            content: "G21 G90 G17".to_string(),
            description: String::new(),
        }];

        let mut engine = RenderEngine::new();
        engine.initialize(&solution);
        engine
    }

    fn params(pairs: &[(&str, Value)]) -> ValueMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_render_with_macros_and_params() {
        let dir = TempDir::new().unwrap();
        let mut engine = bound_engine(&dir, "{{ safe_start }}\nG0 Z{{ clearance | format_number }}\n");
        let result = engine.render("main", &params(&[("clearance", Value::Float(5.0))]));
        assert_eq!(result.content(), Some("G21 G90 G17\nG0 Z5\n"));
        assert_eq!(result.template_name, "main");
    }

    #[test]
    fn test_params_override_macros() {
        let dir = TempDir::new().unwrap();
        let mut engine = bound_engine(&dir, "{{ safe_start }}");
        let result = engine.render("main", &params(&[("safe_start", Value::from("G20"))]));
        assert_eq!(result.content(), Some("G20"));
    }

    #[test]
    fn test_undefined_name_is_failure_not_empty_text() {
        let dir = TempDir::new().unwrap();
        let mut engine = bound_engine(&dir, "S{{ spindle_speed }}");
        let result = engine.render("main", &ValueMap::new());
        assert!(!result.is_success());
        assert!(matches!(
            result.error(),
            Some(CoreError::UndefinedReference { name, template, .. }) if name == "spindle_speed" && template == "main"
        ));
    }

    #[test]
    fn test_unbound_and_unknown_template() {
        let mut engine = RenderEngine::new();
        assert!(matches!(engine.render("main", &ValueMap::new()).error(), Some(CoreError::Unbound)));

        let dir = TempDir::new().unwrap();
        let mut engine = bound_engine(&dir, "");
        assert!(matches!(
            engine.render("finish", &ValueMap::new()).error(),
            Some(CoreError::NotFound { kind: EntityKind::Template, .. })
        ));
    }

    #[test]
    fn test_syntax_error_is_malformed_document() {
        let dir = TempDir::new().unwrap();
        let mut engine = bound_engine(&dir, "{% if x %}G0");
        let result = engine.render("main", &params(&[("x", Value::Bool(true))]));
        assert!(matches!(
            result.error(),
            Some(CoreError::MalformedDocument { span: Some(_), .. })
        ));
    }

    #[test]
    fn test_rebinding_drops_cache() {
        let dir = TempDir::new().unwrap();
        let mut engine = bound_engine(&dir, "first");
        assert_eq!(engine.render("main", &ValueMap::new()).content(), Some("first"));

        fs::write(dir.path().join("main.nc.j2"), "second").unwrap();
        assert_eq!(engine.render("main", &ValueMap::new()).content(), Some("first"));

        let mut solution = crate::solution::tests::solution("drill");
        solution.path = dir.path().to_path_buf();
        solution.templates = vec![Template::new("main", "main.nc.j2")];
        engine.initialize(&solution);
        assert_eq!(engine.render("main", &ValueMap::new()).content(), Some("second"));
    }

    #[test]
    fn test_render_source() {
        let engine = RenderEngine::new();
        let result = engine.render_source("inline", "T{{ tool | pad_zero(2) }}", &params(&[("tool", Value::Int(3))]));
        assert_eq!(result.content(), Some("T03"));
    }
}
