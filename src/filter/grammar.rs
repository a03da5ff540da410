//! Filter grammar - decodes prefixed request keys into typed filters.
//!
//! Decoding is prefix-longest-match over [`RULES`]. Keys no rule claims are
//! equality filters when they look like a field name (`word` char or `$`
//! first), and are dropped otherwise: request query strings carry plenty of
//! non-filter noise.
//!
//! | Prefix | Operator |
//! |--------|----------|
//! | `!!`   | `$nin` (`a\|b`) |
//! | `!`    | `$ne` |
//! | `\|\|` | `$or` (`a\|b`) |
//! | `&&`   | `$and` (`a\|b`) |
//! | `@`    | `$in` (`a\|b`) |
//! | `%%%`  | `$regex` substring, case-insensitive |
//! | `%%`   | `$regex` anchored, case-sensitive |
//! | `%`    | `$regex` anchored, case-insensitive |
//! | `>=` `>` `<=` `<` | range |
//! | `))`   | `$elemMatch` (JSON object of sub-filters) |
//! | `)`    | `$bool` group, key is `and`/`or`/`not` (JSON object or array) |
//! | `?`    | `$exists` |
//! | `~`    | `$text` |

use serde_json::{Map, Number, Value};
use tracing::trace;

use super::{BoolTag, Filter, FilterSet, FilterValue, Operator, RegexMode};

#[derive(Debug, Clone, Copy)]
enum Decode {
    List(Operator),
    Scalar(Operator),
    Regex(RegexMode),
    Range(Operator),
    ElemMatch,
    Group,
    Exists,
    Text,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    prefix: &'static str,
    decode: Decode,
}

/// Longer prefixes must precede the shorter prefixes they extend.
const RULES: &[Rule] = &[
    Rule { prefix: "!!", decode: Decode::List(Operator::Nin) },
    Rule { prefix: "!", decode: Decode::Scalar(Operator::Ne) },
    Rule { prefix: "||", decode: Decode::List(Operator::Or) },
    Rule { prefix: "&&", decode: Decode::List(Operator::And) },
    Rule { prefix: "@", decode: Decode::List(Operator::In) },
    Rule { prefix: "%%%", decode: Decode::Regex(RegexMode::Contains) },
    Rule { prefix: "%%", decode: Decode::Regex(RegexMode::AnchoredSensitive) },
    Rule { prefix: "%", decode: Decode::Regex(RegexMode::AnchoredInsensitive) },
    Rule { prefix: ">=", decode: Decode::Range(Operator::Gte) },
    Rule { prefix: ">", decode: Decode::Range(Operator::Gt) },
    Rule { prefix: "<=", decode: Decode::Range(Operator::Lte) },
    Rule { prefix: "<", decode: Decode::Range(Operator::Lt) },
    Rule { prefix: "))", decode: Decode::ElemMatch },
    Rule { prefix: ")", decode: Decode::Group },
    Rule { prefix: "?", decode: Decode::Exists },
    Rule { prefix: "~", decode: Decode::Text },
];

const LIST_SEPARATOR: char = '|';

/// Decode one request pair into a filter. Returns `None` for keys that are
/// not filters.
pub fn parse(key: &str, value: &Value) -> Option<Filter> {
    for rule in RULES {
        if let Some(field) = key.strip_prefix(rule.prefix) {
            return decode(rule.decode, field, value);
        }
    }

    if is_field_name(key) {
        return Some(equality(key, value));
    }

    trace!(key, "dropping unrecognized filter key");
    None
}

fn decode(decode: Decode, field: &str, value: &Value) -> Option<Filter> {
    // Only free-text and boolean groups may omit the field.
    if field.is_empty() && !matches!(decode, Decode::Text | Decode::Group) {
        return None;
    }

    let filter = match decode {
        Decode::List(op) => Filter::new(field, op, Value::Array(split_list(value))),
        Decode::Scalar(op) => Filter::new(field, op, value.clone()),
        Decode::Regex(mode) => {
            let escaped = regex::escape(&value_text(value));
            let pattern = match mode {
                RegexMode::Contains => escaped,
                RegexMode::AnchoredInsensitive | RegexMode::AnchoredSensitive => {
                    format!("^{escaped}")
                }
            };
            Filter::new(field, Operator::Regex(mode), Value::String(pattern))
        }
        Decode::Range(op) => Filter::new(field, op, coerce_number(value)),
        Decode::ElemMatch => match nested_json(value) {
            Some(Value::Object(map)) => Filter::new(field, Operator::ElemMatch, sub_filters(&map)),
            _ => Filter::new(field, Operator::Eq, value.clone()),
        },
        Decode::Group => {
            let tag = BoolTag::parse(field)?;
            let sets = match nested_json(value) {
                Some(Value::Object(map)) => vec![sub_filters(&map)],
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(sub_filters)
                    .collect(),
                _ if !field.is_empty() => {
                    return Some(Filter::new(field, Operator::Eq, value.clone()));
                }
                _ => return None,
            };
            Filter::new(tag.as_str(), Operator::Bool(tag), FilterValue::Sets(sets))
        }
        Decode::Exists => Filter::new(field, Operator::Exists, Value::Bool(coerce_bool(value))),
        Decode::Text => Filter::new(field, Operator::Text, Value::String(value_text(value))),
    };
    Some(filter)
}

fn equality(key: &str, value: &Value) -> Filter {
    match value {
        Value::String(s) if s.contains(LIST_SEPARATOR) => {
            Filter::new(key, Operator::In, Value::Array(split_list(value)))
        }
        _ => Filter::new(key, Operator::Eq, value.clone()),
    }
}

fn sub_filters(map: &Map<String, Value>) -> FilterSet {
    FilterSet::from_request(map.iter().map(|(k, v)| (k.as_str(), v)))
}

/// Nested filter values arrive either as JSON or as a JSON-encoded string.
fn nested_json(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) | Value::Array(_) => Some(value.clone()),
        Value::String(raw) => serde_json::from_str(raw).ok(),
        _ => None,
    }
}

fn is_field_name(key: &str) -> bool {
    key.chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn split_list(value: &Value) -> Vec<Value> {
    match value {
        Value::String(s) => s
            .split(LIST_SEPARATOR)
            .map(|part| Value::String(part.to_string()))
            .collect(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_number(value: &Value) -> Value {
    let Value::String(raw) = value else {
        return value.clone();
    };
    let trimmed = raw.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| value.clone())
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(s.trim(), "" | "0" | "false" | "no" | "off"),
        Value::Array(_) | Value::Object(_) => true,
    }
}
