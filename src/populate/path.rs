//! Reading reference values out of documents and splicing resolved documents
//! back in. Paths are dotted object paths, optionally with one `.$.` marker
//! meaning "for each element of this array".

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::node::EACH_MARKER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldPath<'a> {
    Plain(&'a str),
    Each { array: &'a str, inner: &'a str },
}

impl<'a> FieldPath<'a> {
    pub(crate) fn parse(path: &'a str) -> Self {
        match path.split_once(EACH_MARKER) {
            Some((array, inner)) => FieldPath::Each { array, inner },
            None => FieldPath::Plain(path),
        }
    }
}

/// Value at a dotted object path.
pub(crate) fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, segment| current.as_object()?.get(segment))
}

/// Write `value` at a dotted object path, creating missing intermediate
/// objects. Paths crossing a non-object are left untouched.
pub(crate) fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = doc;
    while let Some(segment) = segments.next() {
        let Some(map) = current.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Remove the value at a dotted object path.
pub(crate) fn remove_path(doc: &mut Value, path: &str) {
    match path.rsplit_once('.') {
        Some((parent, leaf)) => {
            let mut current = doc;
            for segment in parent.split('.') {
                match current.as_object_mut().and_then(|m| m.get_mut(segment)) {
                    Some(next) => current = next,
                    None => return,
                }
            }
            if let Some(map) = current.as_object_mut() {
                map.remove(leaf);
            }
        }
        None => {
            if let Some(map) = doc.as_object_mut() {
                map.remove(path);
            }
        }
    }
}

/// Index key of a reference value. Only scalars can reference documents.
/// Keys carry the JSON type so `1` and `"1"` never meet.
pub(crate) fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("s:{s}")),
        Value::Number(n) => Some(format!("n:{n}")),
        Value::Bool(b) => Some(format!("b:{b}")),
        _ => None,
    }
}

/// Every reference value found at `source` in `doc`.
pub(crate) fn reference_values(doc: &Value, source: &str) -> Vec<Value> {
    match FieldPath::parse(source) {
        FieldPath::Plain(path) => get_path(doc, path).map(references).unwrap_or_default(),
        FieldPath::Each { array, inner } => get_path(doc, array)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| get_path(item, inner))
                    .flat_map(references)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn references(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().filter(|v| key_of(v).is_some()).cloned().collect(),
        other if key_of(other).is_some() => vec![other.clone()],
        _ => Vec::new(),
    }
}

/// Replace the references read at `source` with their resolved documents,
/// writing the result at `target`. References missing from `index` are kept.
pub(crate) fn splice(doc: &mut Value, source: &str, target: &str, index: &HashMap<String, Value>) {
    match (FieldPath::parse(source), FieldPath::parse(target)) {
        (
            FieldPath::Each { array, inner },
            FieldPath::Each {
                array: target_array,
                inner: target_inner,
            },
        ) if array == target_array => {
            let Some(items) = get_path_mut(doc, array).and_then(Value::as_array_mut) else {
                return;
            };
            for item in items {
                let resolved = get_path(item, inner).map(|v| substitute(v, index));
                if let Some(resolved) = resolved {
                    set_path(item, target_inner, resolved);
                }
            }
        }
        (FieldPath::Each { array, inner }, _) => {
            let resolved: Option<Vec<Value>> = get_path(doc, array).and_then(Value::as_array).map(|items| {
                items
                    .iter()
                    .map(|item| get_path(item, inner).map_or(Value::Null, |v| substitute(v, index)))
                    .collect()
            });
            if let Some(resolved) = resolved {
                set_path(doc, &target.replace(EACH_MARKER, "."), Value::Array(resolved));
            }
        }
        (FieldPath::Plain(path), _) => {
            let resolved = get_path(doc, path).map(|v| substitute(v, index));
            if let Some(resolved) = resolved {
                set_path(doc, &target.replace(EACH_MARKER, "."), resolved);
            }
        }
    }
}

fn get_path_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(doc, |current, segment| current.as_object_mut()?.get_mut(segment))
}

fn substitute(value: &Value, index: &HashMap<String, Value>) -> Value {
    let lookup = |v: &Value| {
        key_of(v)
            .and_then(|key| index.get(&key))
            .cloned()
            .unwrap_or_else(|| v.clone())
    };
    match value {
        Value::Array(items) => Value::Array(items.iter().map(lookup).collect()),
        other => lookup(other),
    }
}
