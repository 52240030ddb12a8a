//! Filter registry
//!
//! The set of custom filters is fixed before an engine is built. A registry is
//! assembled once through [`FilterRegistryBuilder`], then handed to the engine
//! which installs it into its environment.

use indexmap::IndexMap;
use minijinja::functions::Function;
use minijinja::value::{FunctionArgs, FunctionResult, Rest};
use minijinja::{Environment, State, Value};

use crate::error::{EngineError, Result};
use crate::filters;

/// Immutable mapping from filter name to callable
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    filters: IndexMap<String, Value>,
}

impl FilterRegistry {
    /// The filters every engine ships with: `basename`, `dirname`,
    /// `splitext`, `combine` and `as_dict`
    pub fn standard() -> Self {
        let mut table = IndexMap::new();
        table.insert("basename".to_string(), Value::from_function(filters::basename));
        table.insert("dirname".to_string(), Value::from_function(filters::dirname));
        table.insert("splitext".to_string(), Value::from_function(filters::splitext));
        table.insert("combine".to_string(), Value::from_function(filters::combine));
        table.insert("as_dict".to_string(), Value::from_function(filters::as_dict));
        Self { filters: table }
    }

    /// A registry with no custom filters
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> FilterRegistryBuilder {
        FilterRegistryBuilder::default()
    }

    /// Start a builder pre-populated with this registry's filters
    pub fn into_builder(self) -> FilterRegistryBuilder {
        FilterRegistryBuilder {
            filters: self.filters,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.filters.get(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(|name| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Install every filter into an environment
    pub fn install(&self, env: &mut Environment<'_>) {
        for (name, callable) in &self.filters {
            tracing::trace!(filter = %name, "installing filter");
            let callable = callable.clone();
            env.add_filter(name.clone(), move |state: &State, args: Rest<Value>| {
                callable.call(state, &args)
            });
        }
    }
}

/// Builder for [`FilterRegistry`]
///
/// Names must be unique; registering a name twice is an error.
#[derive(Debug, Default)]
pub struct FilterRegistryBuilder {
    filters: IndexMap<String, Value>,
}

impl FilterRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter function
    pub fn add<F, Rv, Args>(self, name: impl Into<String>, f: F) -> Result<Self>
    where
        F: Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.add_callable(name, Value::from_function::<F, Rv, Args>(f))
    }

    /// Register an already-callable value
    pub fn add_callable(mut self, name: impl Into<String>, callable: Value) -> Result<Self> {
        let name = name.into();
        if self.filters.contains_key(&name) {
            return Err(EngineError::DuplicateFilter { name });
        }
        self.filters.insert(name, callable);
        Ok(self)
    }

    pub fn build(self) -> FilterRegistry {
        FilterRegistry {
            filters: self.filters,
        }
    }
}
