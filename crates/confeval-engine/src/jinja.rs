//! Evaluation engine based on MiniJinja

use confeval_core::Scope;
use minijinja::{Environment, UndefinedBehavior};

use crate::engine::{Engine, Evaluated};
use crate::error::{EngineError, Result, TemplateError};
use crate::literal;
use crate::registry::FilterRegistry;

/// Source name used in diagnostics for inline expressions
const EXPRESSION_NAME: &str = "<expression>";

/// Jinja engine builder
pub struct JinjaEngineBuilder {
    strict_mode: bool,
    filters: FilterRegistry,
}

impl Default for JinjaEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JinjaEngineBuilder {
    pub fn new() -> Self {
        Self {
            strict_mode: true,
            filters: FilterRegistry::standard(),
        }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Replace the custom filters installed into the environment
    pub fn filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    /// Build the engine
    pub fn build(self) -> JinjaEngine {
        JinjaEngine::with_registry(self.strict_mode, &self.filters)
    }
}

/// Renders expressions with Jinja syntax and recovers literal values
///
/// The environment is created once and never reconfigured, so an engine can be
/// shared by reference across threads.
#[derive(Debug)]
pub struct JinjaEngine {
    env: Environment<'static>,
    filter_names: Vec<String>,
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl JinjaEngine {
    /// Create a strict engine with the standard filters
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder
    pub fn builder() -> JinjaEngineBuilder {
        JinjaEngineBuilder::new()
    }

    fn with_registry(strict_mode: bool, filters: &FilterRegistry) -> Self {
        let mut env = Environment::new();

        if strict_mode {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(UndefinedBehavior::Lenient);
        }

        filters.install(&mut env);

        Self {
            env,
            filter_names: filters.names().map(str::to_string).collect(),
        }
    }

    /// Render an expression to text with the scope's bindings as variables
    pub fn render(&self, expression: &str, scope: &Scope) -> Result<String> {
        tracing::debug!(expression, "rendering expression");

        self.env
            .render_str(expression, scope.bindings())
            .map_err(|e| {
                EngineError::Template(TemplateError::from_minijinja_enhanced(
                    e,
                    EXPRESSION_NAME,
                    expression,
                    Some(scope),
                    &self.filter_names,
                ))
            })
    }

    /// Names of the custom filters installed in this engine
    pub fn filter_names(&self) -> &[String] {
        &self.filter_names
    }

    /// The underlying environment
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }
}

impl Engine for JinjaEngine {
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<Evaluated> {
        let rendered = self.render(expression, scope)?;
        Ok(literal::decode(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateErrorKind;
    use serde_json::json;

    fn scope() -> Scope {
        Scope::from_yaml(
            r#"
name: world
path: /a/b/c.txt
model:
  layers: [64, 32]
  activation: relu
"#,
        )
        .unwrap()
    }

    fn template_kind(result: Result<Evaluated>) -> TemplateErrorKind {
        match result {
            Err(EngineError::Template(e)) => e.kind(),
            other => panic!("expected template error, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_is_literal() {
        let engine = JinjaEngine::new();
        let result = engine.evaluate("{{ 1 + 2 }}", &Scope::new()).unwrap();
        assert_eq!(result, Evaluated::Literal(json!(3)));
    }

    #[test]
    fn test_text_falls_back_to_raw() {
        let engine = JinjaEngine::new();
        let result = engine.evaluate("hello {{ name }}", &scope()).unwrap();
        assert_eq!(result, Evaluated::Raw("hello world".to_string()));
    }

    #[test]
    fn test_container_is_decoded() {
        let engine = JinjaEngine::new();
        let result = engine.evaluate("{{ model.layers }}", &scope()).unwrap();
        assert_eq!(result, Evaluated::Literal(json!([64, 32])));
    }

    #[test]
    fn test_constants_are_decoded() {
        let engine = JinjaEngine::new();
        let scope = Scope::new();
        assert_eq!(
            engine.evaluate("{{ true }}", &scope).unwrap(),
            Evaluated::Literal(json!(true))
        );
        assert_eq!(
            engine.evaluate("{{ none }}", &scope).unwrap(),
            Evaluated::Literal(serde_json::Value::Null)
        );
        assert_eq!(
            engine.evaluate("{{ 0.5 * 3 }}", &scope).unwrap(),
            Evaluated::Literal(json!(1.5))
        );
    }

    #[test]
    fn test_plain_string_stays_raw() {
        let engine = JinjaEngine::new();
        let result = engine.evaluate("{{ model.activation }}", &scope()).unwrap();
        assert_eq!(result, Evaluated::Raw("relu".to_string()));
    }

    #[test]
    fn test_path_filters() {
        let engine = JinjaEngine::new();
        let scope = scope();

        assert_eq!(
            engine.evaluate("{{ path | basename }}", &scope).unwrap(),
            Evaluated::Raw("c.txt".to_string())
        );
        assert_eq!(
            engine.evaluate("{{ path | dirname }}", &scope).unwrap(),
            Evaluated::Raw("/a/b".to_string())
        );
        assert_eq!(
            engine.evaluate("{{ path | splitext }}", &scope).unwrap(),
            Evaluated::Literal(json!(["/a/b/c", ".txt"]))
        );
    }

    #[test]
    fn test_dictionary_filters() {
        let engine = JinjaEngine::new();
        let scope = Scope::new();

        assert_eq!(
            engine
                .evaluate(r#"{{ {"a": 1} | combine({"b": 2}) }}"#, &scope)
                .unwrap(),
            Evaluated::Literal(json!({"a": 1, "b": 2}))
        );
        assert_eq!(
            engine
                .evaluate(r#"{{ {"a": 1} | combine({"a": 2}) }}"#, &scope)
                .unwrap(),
            Evaluated::Literal(json!({"a": 2}))
        );
        assert_eq!(
            engine.evaluate("{{ {} | combine }}", &scope).unwrap(),
            Evaluated::Literal(json!({}))
        );
        assert_eq!(
            engine.evaluate(r#"{{ 5 | as_dict("x") }}"#, &scope).unwrap(),
            Evaluated::Literal(json!({"x": 5}))
        );
    }

    #[test]
    fn test_dictionary_filters_keyword_arguments() {
        let engine = JinjaEngine::new();
        let scope = Scope::new();

        assert_eq!(
            engine
                .evaluate(r#"{{ {"a": 1} | combine(new={"b": 2}) }}"#, &scope)
                .unwrap(),
            Evaluated::Literal(json!({"a": 1, "b": 2}))
        );
        assert_eq!(
            engine.evaluate(r#"{{ 5 | as_dict(key="x") }}"#, &scope).unwrap(),
            Evaluated::Literal(json!({"x": 5}))
        );
        assert!(engine
            .evaluate(r#"{{ {} | combine(extra={"b": 2}) }}"#, &scope)
            .is_err());
    }

    #[test]
    fn test_combine_treats_falsy_new_as_empty() {
        let engine = JinjaEngine::new();
        let scope = Scope::new();

        for template in [
            r#"{{ {"a": 1} | combine([]) }}"#,
            r#"{{ {"a": 1} | combine("") }}"#,
            r#"{{ {"a": 1} | combine(none) }}"#,
        ] {
            assert_eq!(
                engine.evaluate(template, &scope).unwrap(),
                Evaluated::Literal(json!({"a": 1})),
                "template {template}"
            );
        }
    }

    #[test]
    fn test_path_filters_reject_non_strings() {
        let engine = JinjaEngine::new();
        let kind = template_kind(engine.evaluate("{{ 5 | basename }}", &Scope::new()));
        assert_eq!(kind, TemplateErrorKind::InvalidOperation);
    }

    #[test]
    fn test_rendered_null_word_stays_text() {
        let engine = JinjaEngine::new();
        assert_eq!(
            engine.evaluate("{{ 'null' }}", &Scope::new()).unwrap(),
            Evaluated::Raw("null".to_string())
        );
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let engine = JinjaEngine::new();
        let kind = template_kind(engine.evaluate("{{ missing }}", &scope()));
        assert_eq!(kind, TemplateErrorKind::UndefinedVariable);
    }

    #[test]
    fn test_undefined_variable_carries_suggestion() {
        let engine = JinjaEngine::new();
        match engine.evaluate("{{ nme }}", &scope()) {
            Err(EngineError::Template(e)) => assert!(e.suggestion.is_some()),
            other => panic!("expected template error, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_mode_renders_empty() {
        let engine = JinjaEngine::builder().strict(false).build();
        let result = engine.evaluate("x{{ missing }}", &Scope::new()).unwrap();
        assert_eq!(result, Evaluated::Raw("x".to_string()));
    }

    #[test]
    fn test_syntax_error() {
        let engine = JinjaEngine::new();
        let kind = template_kind(engine.evaluate("{{ 1 + }}", &Scope::new()));
        assert_eq!(kind, TemplateErrorKind::SyntaxError);
    }

    #[test]
    fn test_unknown_filter() {
        let engine = JinjaEngine::new();
        let kind = template_kind(engine.evaluate("{{ path | basenme }}", &scope()));
        assert_eq!(kind, TemplateErrorKind::UnknownFilter);
    }

    #[test]
    fn test_filter_error_propagates() {
        let engine = JinjaEngine::new();
        let kind = template_kind(engine.evaluate("{{ 5 | combine }}", &Scope::new()));
        assert_eq!(kind, TemplateErrorKind::InvalidOperation);
    }

    #[test]
    fn test_custom_registry() {
        let filters = FilterRegistry::standard()
            .into_builder()
            .add("double", |v: i64| v * 2)
            .unwrap()
            .build();
        let engine = JinjaEngine::builder().filters(filters).build();

        assert_eq!(
            engine.evaluate("{{ 4 | double }}", &Scope::new()).unwrap(),
            Evaluated::Literal(json!(8))
        );
        assert!(engine.filter_names().iter().any(|n| n == "double"));
    }

    #[test]
    fn test_empty_registry_has_no_custom_filters() {
        let engine = JinjaEngine::builder()
            .filters(FilterRegistry::empty())
            .build();
        let kind = template_kind(engine.evaluate("{{ 'a' | basename }}", &Scope::new()));
        assert_eq!(kind, TemplateErrorKind::UnknownFilter);
    }

    #[test]
    fn test_render_stage_alone() {
        let engine = JinjaEngine::new();
        let text = engine.render("{{ model.layers }}", &scope()).unwrap();
        assert_eq!(text, "[64, 32]");
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JinjaEngine>();
    }
}
