//! Evaluation engine abstraction

use confeval_core::{Frame, Scope};
use serde_json::Value as JsonValue;

use crate::error::Result;

/// Outcome of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    /// The rendered text was a literal and has been decoded
    Literal(JsonValue),

    /// The rendered text is not a literal and is kept verbatim
    Raw(String),
}

impl Evaluated {
    /// Convert into a plain value; raw text becomes a string
    pub fn into_value(self) -> JsonValue {
        match self {
            Self::Literal(value) => value,
            Self::Raw(text) => JsonValue::String(text),
        }
    }

    /// Check whether literal decoding succeeded
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Borrow the raw text, if decoding fell back to it
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text),
            Self::Literal(_) => None,
        }
    }
}

/// An engine that resolves dynamic fields against a scope
pub trait Engine {
    /// Evaluate a single expression
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<Evaluated>;

    /// Evaluate a value from a configuration document
    ///
    /// Strings are evaluated. With `recursive`, sequences and mappings are
    /// walked and every nested string is evaluated; mapping keys are left
    /// untouched. Everything else is returned unchanged.
    fn evaluate_value(&self, value: &JsonValue, scope: &Scope, recursive: bool) -> Result<JsonValue> {
        match value {
            JsonValue::String(expression) => Ok(self.evaluate(expression, scope)?.into_value()),
            JsonValue::Array(items) if recursive => items
                .iter()
                .map(|item| self.evaluate_value(item, scope, true))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            JsonValue::Object(map) if recursive => {
                let mut evaluated = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    evaluated.insert(key.clone(), self.evaluate_value(item, scope, true)?);
                }
                Ok(JsonValue::Object(evaluated))
            }
            other => Ok(other.clone()),
        }
    }
}

/// Engine that performs no templating at all
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughEngine;

impl Engine for PassthroughEngine {
    fn evaluate(&self, expression: &str, _scope: &Scope) -> Result<Evaluated> {
        Ok(Evaluated::Raw(expression.to_string()))
    }
}

/// An engine bundled with the scope it evaluates against
#[derive(Debug)]
pub struct Evaluator<E> {
    engine: E,
    scope: Scope,
}

impl<E: Engine> Evaluator<E> {
    pub fn new(engine: E, scope: Scope) -> Self {
        Self { engine, scope }
    }

    /// Evaluate an expression in the current scope
    pub fn evaluate(&self, expression: &str) -> Result<Evaluated> {
        self.engine.evaluate(expression, &self.scope)
    }

    /// Evaluate a document value in the current scope
    pub fn evaluate_value(&self, value: &JsonValue, recursive: bool) -> Result<JsonValue> {
        self.engine.evaluate_value(value, &self.scope, recursive)
    }

    /// Run `f` with an extra frame pushed; the frame is popped afterwards
    pub fn with_frame<T>(&mut self, frame: Frame, f: impl FnOnce(&mut Self) -> T) -> T {
        let depth = self.scope.depth();
        self.scope.push(frame);
        let result = f(self);
        while self.scope.depth() > depth {
            self.scope.pop();
        }
        result
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    pub fn into_scope(self) -> Scope {
        self.scope
    }
}
