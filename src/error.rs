//! Error taxonomy shared by every component

use std::fmt;
use std::path::{Path, PathBuf};

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Kind of entity a lookup failed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Solution,
    Template,
    Group,
    Parameter,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Solution => "solution",
            EntityKind::Template => "template",
            EntityKind::Group => "parameter group",
            EntityKind::Parameter => "parameter",
        })
    }
}

/// One failed constraint, naming the entity it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub subject: String,
    pub message: String,
}

impl Violation {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Errors surfaced by the library, catalog, resolver and render engine
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Missing solution, template, group or parameter
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    /// Constraint violations, aggregated rather than first-only
    #[error("validation failed: {}", format_violations(.0))]
    ValidationFailure(Vec<Violation>),

    /// Template referenced a name that is not bound in the render context
    #[error("undefined variable '{name}' in template '{template}'{}", format_suggestions(suggestions))]
    UndefinedReference {
        template: String,
        name: String,
        suggestions: Vec<String>,
    },

    /// Unparseable or structurally incomplete file
    #[error("malformed document {}: {reason}", path.display())]
    MalformedDocument {
        path: PathBuf,
        reason: String,
        span: Option<Span>,
    },

    /// Mutation would create a duplicate or a cross-group name collision
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Runtime type error while evaluating a template expression
    #[error("cannot evaluate template '{template}': {message}")]
    Evaluation { template: String, message: String },

    /// Render requested before a solution was bound
    #[error("render engine is not bound to a solution")]
    Unbound,

    #[error("i/o error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl CoreError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            path: path.into(),
            reason: reason.into(),
            span: None,
        }
    }

    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::IntegrityViolation(message.into())
    }

    /// The aggregated violations of a validation failure
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::ValidationFailure(violations) => violations,
            _ => &[],
        }
    }

    /// Format a malformed-template error with source context using ariadne.
    ///
    /// Returns `None` for errors that carry no source location.
    pub fn report(&self, source: &str) -> Option<String> {
        let Self::MalformedDocument {
            path,
            reason,
            span: Some(span),
        } = self
        else {
            return None;
        };

        let filename = path.display().to_string();
        let filename = filename.as_str();
        let mut buf = Vec::new();
        Report::build(ReportKind::Error, filename, span.start)
            .with_message(reason)
            .with_label(
                Label::new((filename, span.clone()))
                    .with_message(reason)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf)
            .ok()?;
        Some(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failure_lists_every_violation() {
        let err = CoreError::ValidationFailure(vec![
            Violation::new("depth", "must be at least 1"),
            Violation::new("feed", "missing required parameter"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: depth: must be at least 1; feed: missing required parameter"
        );
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_undefined_reference_display_includes_suggestions() {
        let err = CoreError::UndefinedReference {
            template: "drill".to_string(),
            name: "dept".to_string(),
            suggestions: vec!["depth".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "undefined variable 'dept' in template 'drill' (did you mean: depth?)"
        );
    }

    #[test]
    fn test_not_found_names_the_entity() {
        let err = CoreError::not_found(EntityKind::Group, "tooling");
        assert_eq!(err.to_string(), "parameter group 'tooling' not found");
    }

    #[test]
    fn test_report_requires_span() {
        let err = CoreError::malformed("scheme.yaml", "bad");
        assert!(err.report("").is_none());

        let err = CoreError::MalformedDocument {
            path: PathBuf::from("main.nc.j2"),
            reason: "unexpected '}}'".to_string(),
            span: Some(3..5),
        };
        let report = err.report("G0 }} X1").expect("should format");
        assert!(report.contains("unexpected"));
    }
}
