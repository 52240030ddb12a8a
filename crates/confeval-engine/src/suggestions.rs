//! Fuzzy matching and scope-aware suggestions for template errors
//!
//! When an expression references an unknown name or filter, the closest
//! candidates by Levenshtein distance are offered as a hint.

use confeval_core::Scope;
use serde_json::Value as JsonValue;

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Filters that ship with MiniJinja itself
pub const BUILTIN_FILTERS: &[&str] = &[
    "abs",
    "attr",
    "batch",
    "bool",
    "capitalize",
    "count",
    "d",
    "default",
    "dictsort",
    "e",
    "escape",
    "first",
    "float",
    "groupby",
    "indent",
    "int",
    "items",
    "join",
    "last",
    "length",
    "lines",
    "list",
    "lower",
    "map",
    "max",
    "min",
    "reject",
    "rejectattr",
    "replace",
    "reverse",
    "round",
    "safe",
    "select",
    "selectattr",
    "slice",
    "sort",
    "split",
    "string",
    "sum",
    "title",
    "trim",
    "unique",
    "upper",
    "urlencode",
];

/// Global functions that ship with MiniJinja itself
pub const BUILTIN_FUNCTIONS: &[&str] = &["range", "dict", "debug", "namespace"];

/// Suggestion result with confidence scoring
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggested correction
    pub text: String,
    /// Levenshtein distance (lower = better match)
    pub distance: usize,
    /// Category of suggestion
    pub category: SuggestionCategory,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SuggestionCategory {
    Variable,
    Filter,
    Function,
    Property,
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Find closest matches from a list of candidates
pub fn find_closest_matches(
    input: &str,
    candidates: &[&str],
    max_results: usize,
    category: SuggestionCategory,
) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = levenshtein(input, candidate);
            if distance <= MAX_SUGGESTION_DISTANCE && distance > 0 {
                Some(Suggestion {
                    text: candidate.to_string(),
                    distance,
                    category,
                })
            } else {
                None
            }
        })
        .collect();

    // Sort by distance (best matches first)
    suggestions.sort_by_key(|s| s.distance);
    suggestions.truncate(max_results);
    suggestions
}

fn format_choices(matches: &[Suggestion], prefix: &str) -> String {
    matches
        .iter()
        .map(|s| format!("`{}{}`", prefix, s.text))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Suggest corrections for an undefined variable
pub fn suggest_undefined_variable(
    variable_name: &str,
    available_variables: &[String],
) -> Option<String> {
    let candidates: Vec<&str> = available_variables.iter().map(|s| s.as_str()).collect();
    let matches =
        find_closest_matches(variable_name, &candidates, 3, SuggestionCategory::Variable);

    if matches.is_empty() {
        None
    } else {
        Some(format!("Did you mean {}?", format_choices(&matches, "")))
    }
}

/// Suggest a fix for an undefined, possibly dotted, name against a scope
///
/// For `model.lyers`, the path is walked until it breaks and the keys
/// available at that point are offered.
pub fn suggest_for_scope(name: &str, scope: &Scope) -> Option<String> {
    let mut parts = name.split('.');
    let head = parts.next()?;

    let Some(mut current) = scope.get(head) else {
        return suggest_undefined_variable(head, &scope.names());
    };

    let mut valid = vec![head];
    for part in parts {
        match current.get(part) {
            Some(next) => {
                valid.push(part);
                current = next;
            }
            None => {
                let prefix = valid.join(".");
                return suggest_available_properties(&prefix, part, current);
            }
        }
    }

    None
}

/// Suggest available properties when accessing an undefined key
pub fn suggest_available_properties(
    parent_path: &str,
    attempted_key: &str,
    parent: &JsonValue,
) -> Option<String> {
    let available: Vec<&str> = parent.as_object()?.keys().map(|k| k.as_str()).collect();

    if available.is_empty() {
        return Some(format!("`{}` is an empty mapping", parent_path));
    }

    let matches =
        find_closest_matches(attempted_key, &available, 3, SuggestionCategory::Property);

    if !matches.is_empty() {
        Some(format!(
            "Did you mean {}? Available: {}",
            format_choices(&matches, &format!("{}.", parent_path)),
            available.join(", ")
        ))
    } else {
        Some(format!(
            "Key `{}` not found in `{}`. Available keys: {}",
            attempted_key,
            parent_path,
            available.join(", ")
        ))
    }
}

/// Suggest corrections for an unknown filter
///
/// `registered` holds the filters installed on top of the builtins.
pub fn suggest_unknown_filter(filter_name: &str, registered: &[String]) -> Option<String> {
    let mut candidates: Vec<&str> = registered.iter().map(|s| s.as_str()).collect();
    candidates.extend_from_slice(BUILTIN_FILTERS);

    let matches = find_closest_matches(filter_name, &candidates, 3, SuggestionCategory::Filter);

    if !matches.is_empty() {
        Some(format!("Did you mean {}?", format_choices(&matches, "")))
    } else if registered.is_empty() {
        Some(format!("Unknown filter `{}`.", filter_name))
    } else {
        Some(format!(
            "Unknown filter `{}`. Custom filters: {}",
            filter_name,
            registered.join(", ")
        ))
    }
}

/// Suggest corrections for an unknown function
pub fn suggest_unknown_function(func_name: &str) -> Option<String> {
    let matches = find_closest_matches(
        func_name,
        BUILTIN_FUNCTIONS,
        3,
        SuggestionCategory::Function,
    );

    if !matches.is_empty() {
        Some(format!("Did you mean {}?", format_choices(&matches, "")))
    } else {
        Some(format!(
            "Unknown function `{}`. Available functions: {}",
            func_name,
            BUILTIN_FUNCTIONS.join(", ")
        ))
    }
}

/// Extract a quoted name from an error message
pub fn extract_quoted_name(msg: &str) -> Option<String> {
    // Pattern: "undefined variable `foo`" or "variable 'foo' is undefined"
    let patterns = [("`", "`"), ("'", "'"), ("\"", "\"")];

    for (start, end) in patterns {
        if let Some(start_idx) = msg.find(start) {
            let rest = &msg[start_idx + start.len()..];
            if let Some(end_idx) = rest.find(end) {
                return Some(rest[..end_idx].to_string());
            }
        }
    }
    None
}
