//! Render engine producing NC program text from a solution's templates
//!
//! The engine binds to one solution, exposes its macros as plain string
//! variables and evaluates templates against the caller's resolved values.
//! Every render returns a [`RenderResult`]; failures never escape as `Err`.

pub mod config;
pub mod engine;

pub use config::RenderConfig;
pub use engine::{RenderEngine, RenderResult};
