//! Engine error types with diagnostic formatting

use confeval_core::{CoreError, Scope};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::suggestions::{
    extract_quoted_name, suggest_for_scope, suggest_unknown_filter, suggest_unknown_function,
};

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Filter `{name}` is already registered")]
    DuplicateFilter { name: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Error kind for categorizing template errors
///
/// Note: This enum is non-exhaustive - new variants may be added in future versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

impl TemplateErrorKind {
    /// Convert to a code string for diagnostics
    pub fn to_code_string(&self) -> &'static str {
        match self {
            Self::UndefinedVariable => "undefined_variable",
            Self::UnknownFilter => "unknown_filter",
            Self::UnknownFunction => "unknown_function",
            Self::SyntaxError => "syntax",
            Self::TypeError => "type",
            Self::InvalidOperation => "invalid_operation",
            Self::Other => "render",
        }
    }
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(confeval::template::render))]
pub struct TemplateError {
    /// Error message
    pub message: String,

    /// Error kind for categorization
    pub kind: TemplateErrorKind,

    /// Expression source
    #[source_code]
    pub src: NamedSource<String>,

    /// Error location in source
    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    /// Suggestion for fixing the error
    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a new template error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, name: &str, source: &str) -> Self {
        Self::from_minijinja_enhanced(err, name, source, None, &[])
    }

    /// Create a template error with suggestions drawn from the scope and the
    /// registered filter names
    pub fn from_minijinja_enhanced(
        err: minijinja::Error,
        name: &str,
        source: &str,
        scope: Option<&Scope>,
        filters: &[String],
    ) -> Self {
        let (kind, message) = categorize_minijinja_error(&err);
        let span = err
            .line()
            .and_then(|line_num| calculate_span(source, line_num));
        let suggestion = generate_suggestion(&err, kind, scope, filters);

        Self {
            message,
            kind,
            src: NamedSource::new(name, source.to_string()),
            span,
            suggestion,
        }
    }

    /// Create a simple error without source mapping
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TemplateErrorKind::Other,
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

/// Categorize a MiniJinja error into our error kinds
fn categorize_minijinja_error(err: &minijinja::Error) -> (TemplateErrorKind, String) {
    let msg = err.to_string();
    let msg_lower = msg.to_lowercase();
    let detailed = format!("{:#}", err);

    let kind = match err.kind() {
        minijinja::ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        minijinja::ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        minijinja::ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => {
            TemplateErrorKind::TypeError
        }
        _ => {
            if msg_lower.contains("undefined") {
                TemplateErrorKind::UndefinedVariable
            } else if msg_lower.contains("not iterable") || msg_lower.contains("cannot") {
                TemplateErrorKind::TypeError
            } else {
                TemplateErrorKind::Other
            }
        }
    };

    // MiniJinja's alternate display shows the failing line marked with `>`:
    //    1 >   {{ model.lyers }}
    //      i      ^^^^^^^^^^^ undefined value
    let message = match kind {
        TemplateErrorKind::UndefinedVariable => match extract_expression_from_display(&detailed) {
            Some(expr) => format!("undefined variable `{}`", expr),
            None => msg.replace("undefined value", "undefined variable"),
        },
        TemplateErrorKind::UnknownFilter => match extract_filter_from_display(&detailed) {
            Some(filter) => format!("unknown filter `{}`", filter),
            None => msg,
        },
        _ => msg
            .replace("invalid operation: ", "")
            .replace("syntax error: ", ""),
    };

    (kind, message)
}

/// Return the `{{ ... }}` body on the line MiniJinja marked as failing
fn marked_expression(display: &str) -> Option<&str> {
    let lines: Vec<&str> = display.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let candidate = if trimmed.contains(" > ") || trimmed.starts_with("> ") {
            Some(*line)
        } else if line.contains("^^^") && i > 0 {
            Some(lines[i - 1])
        } else {
            None
        };

        if let Some(expr) = candidate.and_then(expression_body) {
            return Some(expr);
        }
    }

    None
}

fn expression_body(line: &str) -> Option<&str> {
    let start = line.find("{{")?;
    let end = line[start..].find("}}")?;
    Some(&line[start + 2..start + end])
}

/// Extract the problematic expression from MiniJinja's detailed display
fn extract_expression_from_display(display: &str) -> Option<String> {
    let expr = marked_expression(display)?;
    let head = expr.split('|').next().unwrap_or(expr).trim();
    if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    }
}

/// Extract the filter name from MiniJinja's detailed display
fn extract_filter_from_display(display: &str) -> Option<String> {
    let expr = marked_expression(display)?;
    let (_, filter_part) = expr.rsplit_once('|')?;
    filter_part
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Calculate the source span for a given line number
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (index, raw) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line_num {
            let line = raw.trim_end_matches(['\n', '\r']);
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += raw.len();
    }

    None
}

/// Generate suggestions based on error kind
fn generate_suggestion(
    err: &minijinja::Error,
    kind: TemplateErrorKind,
    scope: Option<&Scope>,
    filters: &[String],
) -> Option<String> {
    let msg = err.to_string();
    let detailed = format!("{:#}", err);

    match kind {
        TemplateErrorKind::UndefinedVariable => {
            let name = extract_expression_from_display(&detailed)
                .or_else(|| extract_quoted_name(&msg));

            match name {
                Some(name) => scope
                    .and_then(|scope| suggest_for_scope(&name, scope))
                    .or_else(|| {
                        Some(format!(
                            "`{}` is not bound in the current scope. Check spelling or use `| default(...)`.",
                            name
                        ))
                    }),
                None => Some(
                    "Variable is not defined. Check spelling or use the `default` filter."
                        .to_string(),
                ),
            }
        }

        TemplateErrorKind::UnknownFilter => {
            match extract_filter_from_display(&detailed).or_else(|| extract_quoted_name(&msg)) {
                Some(filter) => suggest_unknown_filter(&filter, filters),
                None => Some(format!("Unknown filter. Registered: {}", filters.join(", "))),
            }
        }

        TemplateErrorKind::UnknownFunction => match extract_quoted_name(&msg) {
            Some(func) => suggest_unknown_function(&func),
            None => Some("Unknown function. Check the function name and arguments.".to_string()),
        },

        TemplateErrorKind::SyntaxError => Some(
            "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements, `{# #}` for comments"
                .to_string(),
        ),

        TemplateErrorKind::TypeError if msg.to_lowercase().contains("not iterable") => Some(
            "Mappings iterate over their keys; use `| items` to get key/value pairs".to_string(),
        ),

        _ => None,
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
