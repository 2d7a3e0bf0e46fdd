//! nc-forge - parameterized NC program generation
//!
//! A shared library of typed machining parameters, a catalog of solutions
//! (template sets on disk), layered parameter resolution and a strict template
//! renderer that refuses to emit a program with an unbound name in it.
//!
//! # Example
//!
//! ```rust
//! use nc_forge::renderer::RenderEngine;
//! use nc_forge::value::{Value, ValueMap};
//!
//! let engine = RenderEngine::new();
//! let mut params = ValueMap::new();
//! params.insert("depth".to_string(), Value::Float(1.250));
//!
//! let result = engine.render_source("peck", "G83 Z-{{ depth | format_number }}", &params);
//! assert_eq!(result.content(), Some("G83 Z-1.25"));
//!
//! let result = engine.render_source("peck", "G83 Z-{{ dept }}", &params);
//! assert!(!result.is_success());
//! ```

pub mod config;
pub mod error;
pub mod library;
pub mod renderer;
pub mod resolver;
pub mod solution;
pub mod template;
pub mod value;
pub mod workbench;

pub use config::{AppConfig, ConfigError};
pub use error::{CoreError, EntityKind, Span, Violation};
pub use library::{GlobalParameter, GlobalParameterGroup, LibraryStore, ParameterLibrary, ParameterType, SelectOption};
pub use renderer::{RenderConfig, RenderEngine, RenderResult};
pub use resolver::{ParameterResolver, PresentedGroup};
pub use solution::{Macro, Solution, SolutionManager, Template};
pub use template::{format_number, pad_zero, scan_variables};
pub use value::{Value, ValueMap};
pub use workbench::Workbench;
