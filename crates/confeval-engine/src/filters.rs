//! Custom template filters
//!
//! These extend MiniJinja with path helpers and dictionary construction.

use indexmap::IndexMap;
use minijinja::value::{Kwargs, ValueKind};
use minijinja::{Error, ErrorKind, Value};

use crate::paths;

/// Final path component
///
/// Usage: {{ "/data/train.csv" | basename }}
pub fn basename(value: Value) -> Result<String, Error> {
    let path = path_str("basename", &value)?;
    Ok(paths::basename(path).to_string())
}

/// Path without its final component
///
/// Usage: {{ checkpoint | dirname }}
pub fn dirname(value: Value) -> Result<String, Error> {
    let path = path_str("dirname", &value)?;
    Ok(paths::dirname(path).to_string())
}

/// Split a path into `[root, ext]`
///
/// Usage: {{ (weights | splitext)[0] ~ ".bak" }}
pub fn splitext(value: Value) -> Result<Vec<String>, Error> {
    let (root, ext) = paths::splitext(path_str("splitext", &value)?);
    Ok(vec![root.to_string(), ext.to_string()])
}

/// Merge two mappings; keys of `new` win
///
/// `new` may be passed positionally or as `new=`. Neither input is modified.
/// A missing or falsy `new` (none, empty mapping, empty string, ...) leaves
/// `value` as is.
///
/// Usage: {{ defaults | combine(overrides) }}
pub fn combine(value: Value, new: Option<Value>, kwargs: Kwargs) -> Result<Value, Error> {
    let keyword: Option<Value> = kwargs.get("new")?;
    kwargs.assert_all_used()?;
    let new = match (new, keyword) {
        (Some(_), Some(_)) => {
            return Err(Error::new(
                ErrorKind::TooManyArguments,
                "combine got `new` both positionally and as a keyword",
            ));
        }
        (positional, keyword) => positional.or(keyword),
    };

    let mut merged = mapping_entries(&value)?;
    if let Some(new) = new.filter(|v| v.is_true()) {
        merged.extend(mapping_entries(&new)?);
    }

    Ok(Value::from_iter(merged))
}

/// Wrap a value in a single-entry mapping
///
/// Usage: {{ 5 | as_dict("x") }} or {{ 5 | as_dict(key="x") }}
pub fn as_dict(value: Value, key: Option<Value>, kwargs: Kwargs) -> Result<Value, Error> {
    let keyword: Option<Value> = kwargs.get("key")?;
    kwargs.assert_all_used()?;
    let key = match (key, keyword) {
        (Some(key), None) | (None, Some(key)) => key,
        (Some(_), Some(_)) => {
            return Err(Error::new(
                ErrorKind::TooManyArguments,
                "as_dict got `key` both positionally and as a keyword",
            ));
        }
        (None, None) => {
            return Err(Error::new(
                ErrorKind::MissingArgument,
                "as_dict requires a key",
            ));
        }
    };
    Ok(Value::from_iter([(key, value)]))
}

fn path_str<'a>(filter: &str, value: &'a Value) -> Result<&'a str, Error> {
    value.as_str().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("{filter} expects a string path, got {}", value.kind()),
        )
    })
}

fn mapping_entries(value: &Value) -> Result<IndexMap<Value, Value>, Error> {
    if value.kind() != ValueKind::Map {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("combine expects a mapping, got {}", value.kind()),
        ));
    }

    let mut entries = IndexMap::new();
    for key in value.try_iter()? {
        let item = value.get_item(&key)?;
        entries.insert(key, item);
    }
    Ok(entries)
}
