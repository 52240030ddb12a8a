//! Confeval Core - variable scopes for configuration evaluation
//!
//! This crate provides the foundational types shared by evaluation engines:
//! - `Scope`: layered name/value bindings, loadable from YAML or JSON
//! - `parse_bindings`: `key=value` overrides with scalar typing

pub mod error;
pub mod scope;

pub use error::{CoreError, Result};
pub use scope::{Frame, Scope, parse_bindings};
