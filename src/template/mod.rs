//! Template language for NC programs
//!
//! A small Jinja-style language: `{{ expr }}` interpolations, `{% if %}`,
//! `{% for %}` and `{% set %}` blocks, and `{# comments #}`. Names are strict:
//! referencing a variable that is not in the context is an error, never an
//! empty substitution.
//!
//! # Output text
//!
//! Values print the way NC programs want them, not the way Python prints
//! them: null prints as nothing, booleans as `true`/`false`, and integral
//! floats keep a `.0`. Booleans are not numbers, so `format_number` and
//! `pad_zero` pass them through as `true`/`false` rather than `1`/`0`.
//!
//! Oversized arguments stay inside the error channel. `format_number` and
//! `pad_zero` pass the value through unchanged when `decimals`/`width`
//! exceeds [`MAX_FORMAT_WIDTH`], and `'ab' * n` fails with an evaluation
//! error once the result would exceed [`MAX_REPEAT_LEN`] bytes.
//!
//! # Example
//!
//! ```
//! use nc_forge::template::{parse, render, WhitespaceControl};
//! use nc_forge::value::{Value, ValueMap};
//!
//! let program = parse("G1 Z-{{ depth | format_number }} F{{ feed | pad_zero(4) }}", &WhitespaceControl::default()).unwrap();
//!
//! let mut context = ValueMap::new();
//! context.insert("depth".to_string(), Value::Float(2.500));
//! context.insert("feed".to_string(), Value::Int(300));
//!
//! assert_eq!(render(&program, &context).unwrap(), "G1 Z-2.5 F0300");
//! ```

mod ast;
mod error;
mod eval;
mod filters;
mod grammar;
mod lexer;
mod scanner;

pub use ast::Program;
pub use error::TemplateError;
pub use eval::{render, MAX_RANGE, MAX_REPEAT_LEN};
pub use filters::{format_number, pad_zero, FILTER_NAMES, MAX_FORMAT_WIDTH};
pub use grammar::{parse, WhitespaceControl};
pub use scanner::scan_variables;
