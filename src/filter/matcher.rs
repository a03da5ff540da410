//! In-process evaluation of a `FilterSet` against a JSON document.
//!
//! Follows document-store semantics closely enough for development stores
//! and tests: dotted paths descend into objects and fan out over arrays, and
//! scalar comparisons also match array fields that contain the value.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::Value;

use super::{BoolTag, Filter, FilterSet, Operator};

/// Whether `doc` satisfies every filter of `set`.
pub fn matches(doc: &Value, set: &FilterSet) -> bool {
    set.iter().all(|filter| matches_filter(doc, filter))
}

fn matches_filter(doc: &Value, filter: &Filter) -> bool {
    if filter.op == Operator::Text && filter.key.is_empty() {
        return filter
            .value
            .as_json()
            .is_some_and(|needle| contains_text(doc, &text_of(needle)));
    }

    let found = values_at(doc, &filter.key);

    match filter.op {
        Operator::Eq => filter.value.as_json().is_some_and(|v| equals_any(&found, v)),
        Operator::Ne => !filter.value.as_json().is_some_and(|v| equals_any(&found, v)),
        Operator::In | Operator::Or => filter
            .value
            .as_list()
            .iter()
            .any(|v| equals_any(&found, v)),
        Operator::Nin => !filter
            .value
            .as_list()
            .iter()
            .any(|v| equals_any(&found, v)),
        Operator::And => filter
            .value
            .as_list()
            .iter()
            .all(|v| equals_any(&found, v)),
        Operator::Regex(mode) => {
            let Some(pattern) = filter.value.as_json().and_then(Value::as_str) else {
                return false;
            };
            let Ok(re) = RegexBuilder::new(pattern)
                .case_insensitive(mode.is_case_insensitive())
                .build()
            else {
                return false;
            };
            flatten(&found)
                .into_iter()
                .filter_map(Value::as_str)
                .any(|s| re.is_match(s))
        }
        Operator::Exists => {
            let expected = filter.value.as_json().is_some_and(|v| v.as_bool() != Some(false));
            found.is_empty() != expected
        }
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let Some(bound) = filter.value.as_json() else {
                return false;
            };
            flatten(&found).into_iter().any(|v| {
                compare(v, bound).is_some_and(|ord| match filter.op {
                    Operator::Gt => ord == Ordering::Greater,
                    Operator::Gte => ord != Ordering::Less,
                    Operator::Lt => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                })
            })
        }
        Operator::ElemMatch => {
            let Some(sub) = filter.value.sets().first() else {
                return false;
            };
            found.iter().any(|v| match v {
                Value::Array(items) => items.iter().any(|item| matches(item, sub)),
                Value::Object(_) => matches(v, sub),
                _ => false,
            })
        }
        Operator::Text => filter.value.as_json().is_some_and(|needle| {
            let needle = text_of(needle);
            found.iter().any(|v| contains_text(v, &needle))
        }),
        Operator::Bool(tag) => {
            let sets = filter.value.sets();
            match tag {
                BoolTag::And => sets.iter().all(|set| matches(doc, set)),
                BoolTag::Or => sets.iter().any(|set| matches(doc, set)),
                BoolTag::Not => !sets.iter().any(|set| matches(doc, set)),
            }
        }
    }
}

/// Every value addressed by a dotted `path`, fanning out over arrays.
pub fn values_at<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(v) = map.get(segment) {
                        next.push(v);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(v) = item.as_object().and_then(|m| m.get(segment)) {
                            next.push(v);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

fn flatten<'a>(values: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for value in values {
        match value {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(*other),
        }
    }
    out
}

fn equals_any(found: &[&Value], expected: &Value) -> bool {
    if found.is_empty() {
        return expected.is_null();
    }
    found.iter().any(|v| {
        loose_eq(v, expected)
            || matches!(v, Value::Array(items) if items.iter().any(|item| loose_eq(item, expected)))
    })
}

/// Request values arrive as strings, so `"3"` equals `3`.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.parse::<f64>().ok() == n.as_f64()
        }
        (Value::Bool(flag), Value::String(s)) | (Value::String(s), Value::Bool(flag)) => {
            s == if *flag { "true" } else { "false" }
        }
        _ => false,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    }
}

fn contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| contains_text(v, needle)),
        Value::Object(map) => map.values().any(|v| contains_text(v, needle)),
        _ => false,
    }
}
