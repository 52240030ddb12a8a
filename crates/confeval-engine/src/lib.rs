//! Confeval Engine - Jinja2 evaluation of configuration fields
//!
//! This crate provides a MiniJinja-based evaluation engine with:
//! - Path and dictionary filters (basename, dirname, splitext, combine, as_dict)
//! - Literal recovery: rendered text such as `[1, 2]` comes back as a value
//! - An `Engine` trait so hosts can swap in other engines
//! - Human-readable error messages with suggestions

pub mod engine;
pub mod error;
pub mod filters;
pub mod jinja;
pub mod literal;
pub mod paths;
pub mod registry;
pub mod suggestions;

pub use engine::{Engine, Evaluated, Evaluator, PassthroughEngine};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use jinja::{JinjaEngine, JinjaEngineBuilder};
pub use literal::{LiteralError, decode, parse_literal};
pub use registry::{FilterRegistry, FilterRegistryBuilder};
