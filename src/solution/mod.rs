//! Solutions: template sets discovered on disk
//!
//! Every directory under the solutions root that holds a `scheme.yaml`
//! description is one solution. The description lists templates, the
//! library groups the solution draws parameters from, default overrides and
//! literal macros. An optional `config.yaml` beside it carries
//! installation-local defaults that are read each time the solution is
//! activated.

mod document;
mod manager;
mod model;

pub use document::{LOCAL_CONFIG_FILE_NAME, SOLUTION_FILE_NAME};
pub use manager::SolutionManager;
pub use model::{Macro, Solution, Template, DEFAULT_OUTPUT_EXT, DEFAULT_VERSION};

#[cfg(test)]
pub(crate) use model::tests;
