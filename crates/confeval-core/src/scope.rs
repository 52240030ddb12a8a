//! Variable scopes with layered frames

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

use crate::error::{CoreError, Result};

/// A single frame of name/value bindings
pub type Frame = Map<String, JsonValue>;

/// Variable bindings visible to an evaluation engine
///
/// A scope is a stack of frames. The root frame is always present; nested
/// frames are pushed for the duration of a sub-evaluation and shadow the
/// bindings of the frames beneath them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Create a scope with an empty root frame
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new()],
        }
    }

    /// Create a scope whose root frame holds the given bindings
    pub fn from_map(root: Frame) -> Self {
        Self { frames: vec![root] }
    }

    /// Create a scope from a JSON object
    ///
    /// `null` is accepted as an empty document.
    pub fn from_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(map) => Ok(Self::from_map(map)),
            JsonValue::Null => Ok(Self::new()),
            other => Err(CoreError::InvalidScope {
                message: format!("expected a mapping at the root, found {}", type_name(&other)),
            }),
        }
    }

    /// Load bindings from a YAML (or JSON) file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse bindings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse bindings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Push a new innermost frame
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Pop the innermost frame
    ///
    /// Returns `None` when only the root frame is left; the root is never removed.
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Number of frames, including the root
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Clone this scope with an extra frame on top
    pub fn layered(&self, frame: Frame) -> Self {
        let mut scope = self.clone();
        scope.push(frame);
        scope
    }

    /// Look up a name, innermost frame first
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Look up a dotted path (e.g., "model.layers")
    pub fn get_path(&self, path: &str) -> Option<&JsonValue> {
        let mut parts = path.split('.');
        let head = parts.next()?;
        let rest: Vec<&str> = parts.collect();
        self.get(head).and_then(|v| get_nested(v, &rest))
    }

    /// Check whether a name is bound in any frame
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bind a name in the innermost frame
    pub fn set(&mut self, name: impl Into<String>, value: JsonValue) {
        self.innermost_mut().insert(name.into(), value);
    }

    /// Bind a dotted path in the innermost frame, creating objects on the way
    ///
    /// If the head of the path is only bound in an outer frame, its value is
    /// copied into the innermost frame first so sibling keys stay visible.
    pub fn set_path(&mut self, path: &str, value: JsonValue) {
        let parts: Vec<&str> = path.split('.').collect();
        let head = parts[0];

        if parts.len() == 1 {
            self.set(head, value);
            return;
        }

        let inherited = if self.innermost().contains_key(head) {
            None
        } else {
            self.get(head).cloned()
        };

        let frame = self.innermost_mut();
        let entry = frame
            .entry(head.to_string())
            .or_insert_with(|| inherited.unwrap_or_else(|| JsonValue::Object(Map::new())));
        set_nested(entry, &parts[1..], value);
    }

    /// Deep merge overrides into the innermost frame
    ///
    /// Unlike [`Scope::push`], nested mappings are merged with whatever the
    /// scope already binds, so `model.width=4` keeps `model.depth` visible.
    /// Scalars and sequences in the overlay replace existing values.
    pub fn merge(&mut self, overlay: Frame) {
        for (name, value) in overlay {
            let mut merged = self.get(&name).cloned().unwrap_or(JsonValue::Null);
            deep_merge(&mut merged, &value);
            self.innermost_mut().insert(name, merged);
        }
    }

    /// Flattened view of all frames; inner frames shadow outer ones
    pub fn bindings(&self) -> Frame {
        let mut merged = Frame::new();
        for frame in &self.frames {
            for (name, value) in frame {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    /// Names visible from the innermost frame
    pub fn names(&self) -> Vec<String> {
        self.bindings().keys().cloned().collect()
    }

    fn innermost(&self) -> &Frame {
        // `frames` always holds the root frame
        &self.frames[self.frames.len() - 1]
    }

    fn innermost_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Set a nested value by path
fn set_nested(value: &mut JsonValue, path: &[&str], new_value: JsonValue) {
    let Some((key, remaining)) = path.split_first() else {
        *value = new_value;
        return;
    };

    if !value.is_object() {
        *value = JsonValue::Object(Map::new());
    }

    if let JsonValue::Object(map) = value {
        if remaining.is_empty() {
            map.insert(key.to_string(), new_value);
        } else {
            let entry = map
                .entry(key.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            set_nested(entry, remaining, new_value);
        }
    }
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    match path.split_first() {
        None => Some(value),
        Some((key, remaining)) => match value {
            JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
            _ => None,
        },
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "sequence",
        JsonValue::Object(_) => "mapping",
    }
}

/// Parse `key=value` overrides into a frame
///
/// Keys may be dotted paths. Values are typed: `true`, `false`, `null`,
/// integers, floats and JSON containers are recognized, anything else is a
/// string.
pub fn parse_bindings<S: AsRef<str>>(bindings: &[S]) -> Result<Frame> {
    let mut root = JsonValue::Object(Map::new());

    for binding in bindings {
        let binding = binding.as_ref();
        let (key, val) = binding
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| CoreError::InvalidBinding {
                binding: binding.to_string(),
            })?;

        let parts: Vec<&str> = key.split('.').collect();
        set_nested(&mut root, &parts, parse_scalar(val));
    }

    match root {
        JsonValue::Object(map) => Ok(map),
        _ => Ok(Frame::new()),
    }
}

fn parse_scalar(val: &str) -> JsonValue {
    if val == "true" {
        JsonValue::Bool(true)
    } else if val == "false" {
        JsonValue::Bool(false)
    } else if val == "null" {
        JsonValue::Null
    } else if let Ok(num) = val.parse::<i64>() {
        JsonValue::Number(num.into())
    } else if let Some(num) = val
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
    {
        JsonValue::Number(num)
    } else if val.starts_with('[') || val.starts_with('{') {
        serde_json::from_str(val).unwrap_or_else(|_| JsonValue::String(val.to_string()))
    } else {
        JsonValue::String(val.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_yaml() {
        let scope = Scope::from_yaml(
            r#"
model:
  name: resnet
  layers: 50
epochs: 10
"#,
        )
        .unwrap();

        assert_eq!(scope.get("epochs").unwrap(), 10);
        assert_eq!(scope.get_path("model.name").unwrap(), "resnet");
        assert_eq!(scope.get_path("model.layers").unwrap(), 50);
        assert!(scope.get_path("model.missing").is_none());
    }

    #[test]
    fn test_from_yaml_empty_document() {
        let scope = Scope::from_yaml("").unwrap();
        assert!(scope.bindings().is_empty());
    }

    #[test]
    fn test_from_value_rejects_non_mapping() {
        let err = Scope::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidScope { .. }));
        assert!(err.to_string().contains("sequence"));
    }

    #[test]
    fn test_frames_shadow_outer_bindings() {
        let mut scope = Scope::from_json(r#"{"a": 1, "b": 2}"#).unwrap();

        let mut frame = Frame::new();
        frame.insert("a".into(), json!(10));
        scope.push(frame);

        assert_eq!(scope.depth(), 2);
        assert_eq!(scope.get("a").unwrap(), 10);
        assert_eq!(scope.get("b").unwrap(), 2);
        assert_eq!(scope.bindings()["a"], 10);

        let popped = scope.pop().unwrap();
        assert_eq!(popped["a"], 10);
        assert_eq!(scope.get("a").unwrap(), 1);
    }

    #[test]
    fn test_root_frame_is_never_popped() {
        let mut scope = Scope::new();
        scope.set("x", json!(1));

        assert!(scope.pop().is_none());
        assert_eq!(scope.depth(), 1);
        assert!(scope.contains("x"));
    }

    #[test]
    fn test_set_path_copies_outer_value() {
        let mut scope = Scope::from_json(r#"{"model": {"name": "resnet"}}"#).unwrap();
        scope.push(Frame::new());
        scope.set_path("model.layers", json!(18));

        assert_eq!(scope.get_path("model.name").unwrap(), "resnet");
        assert_eq!(scope.get_path("model.layers").unwrap(), 18);

        scope.pop();
        assert!(scope.get_path("model.layers").is_none());
    }

    #[test]
    fn test_layered_leaves_source_untouched() {
        let scope = Scope::from_json(r#"{"a": 1}"#).unwrap();
        let mut frame = Frame::new();
        frame.insert("b".into(), json!(2));

        let layered = scope.layered(frame);

        assert_eq!(layered.depth(), 2);
        assert!(layered.contains("b"));
        assert!(!scope.contains("b"));
    }

    #[test]
    fn test_parse_bindings() {
        let frame = parse_bindings(&[
            "model.name=resnet",
            "epochs=5",
            "rate=0.5",
            "debug=true",
            "tags=[\"a\", \"b\"]",
        ])
        .unwrap();

        assert_eq!(frame["model"]["name"], "resnet");
        assert_eq!(frame["epochs"], 5);
        assert_eq!(frame["rate"], 0.5);
        assert_eq!(frame["debug"], true);
        assert_eq!(frame["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_merge_keeps_sibling_keys() {
        let mut scope = Scope::from_json(r#"{"model": {"depth": 18, "act": "relu"}}"#).unwrap();
        scope.push(Frame::new());
        scope.merge(parse_bindings(&["model.width=4", "model.act=gelu", "run=baseline"]).unwrap());

        assert_eq!(scope.get_path("model.depth").unwrap(), 18);
        assert_eq!(scope.get_path("model.width").unwrap(), 4);
        assert_eq!(scope.get_path("model.act").unwrap(), "gelu");
        assert_eq!(scope.get("run").unwrap(), "baseline");

        scope.pop();
        assert!(scope.get_path("model.width").is_none());
        assert_eq!(scope.get_path("model.act").unwrap(), "relu");
    }

    #[test]
    fn test_merge_replaces_sequences() {
        let mut scope = Scope::from_json(r#"{"tags": ["a", "b"]}"#).unwrap();
        scope.merge(parse_bindings(&[r#"tags=["c"]"#]).unwrap());
        assert_eq!(scope.get("tags").unwrap(), &json!(["c"]));
    }

    #[test]
    fn test_parse_bindings_rejects_malformed() {
        assert!(matches!(
            parse_bindings(&["novalue"]),
            Err(CoreError::InvalidBinding { .. })
        ));
        assert!(parse_bindings(&["=5"]).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.yaml");
        std::fs::write(&path, "dataset: mnist\nbatch: 32\n").unwrap();

        let scope = Scope::from_file(&path).unwrap();
        assert_eq!(scope.get("dataset").unwrap(), "mnist");
        assert_eq!(scope.names().len(), 2);
    }
}
