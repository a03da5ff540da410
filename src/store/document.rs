//! Document-store query builder.
//!
//! Mechanical format conversion: filters become a native filter document,
//! projection/sort/paging/locale become find options.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::filter::{BoolTag, Filter, FilterSet, Operator};
use crate::query::QueryDescriptor;

/// A filter document plus find options, ready for a driver's `find`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentQuery {
    pub filter: Map<String, Value>,
    pub options: FindOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindOptions {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub projection: Map<String, Value>,
    #[serde(skip_serializing_if = "Sort::is_empty")]
    pub sort: Sort,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<Collation>,
}

/// Ordered sort specification, serialized as `{field: 1 | -1, ...}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sort(pub Vec<(String, i32)>);

impl Sort {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Sort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, direction) in &self.0 {
            map.serialize_entry(field, direction)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collation {
    pub locale: String,
}

/// Translate a descriptor. Raw filter overrides are merged last.
pub fn build(query: &QueryDescriptor) -> DocumentQuery {
    let mut filter = filter_document(query.filters());
    if let Some(raw) = query.raw_filter() {
        filter.extend(raw.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    let projection = query
        .projection()
        .iter()
        .map(|(field, include)| (field.clone(), json!(i32::from(*include))))
        .collect();

    let sort = Sort(
        query
            .sort()
            .into_iter()
            .map(|(field, direction)| (field, direction.as_i32()))
            .collect(),
    );

    let skip = Some(query.offset()).filter(|skip| *skip > 0);

    DocumentQuery {
        filter,
        options: FindOptions {
            projection,
            sort,
            skip,
            limit: query.limit(),
            collation: Some(Collation {
                locale: query.locale().to_string(),
            }),
        },
    }
}

/// Translate a filter set into a native filter document.
///
/// Conditions on the same field share one operator document; top-level
/// clauses (`$or`, boolean groups, `$text`) stand alone. When two clauses
/// claim the same top-level key they are combined with `$and`.
pub fn filter_document(set: &FilterSet) -> Map<String, Value> {
    let mut clauses: Vec<Map<String, Value>> = Vec::new();

    for (key, filters) in set.by_key() {
        let mut conditions = Map::new();
        let mut equals: Option<Value> = None;

        for filter in filters {
            match field_condition(filter) {
                Condition::Equals(value) => equals = Some(value),
                Condition::Operators(ops) => {
                    for (op, value) in ops {
                        conditions.insert(op.to_string(), value);
                    }
                }
                Condition::Clause(clause) => clauses.push(clause),
            }
        }

        let value = match (equals, conditions.is_empty()) {
            (None, true) => continue,
            (Some(value), true) => value,
            (Some(value), false) => {
                conditions.insert("$eq".to_string(), value);
                Value::Object(conditions)
            }
            (None, false) => Value::Object(conditions),
        };
        let mut clause = Map::new();
        clause.insert(key.to_string(), value);
        clauses.push(clause);
    }

    combine(clauses)
}

enum Condition {
    Equals(Value),
    Operators(Vec<(&'static str, Value)>),
    Clause(Map<String, Value>),
}

impl Condition {
    fn operator(op: &'static str, value: Value) -> Self {
        Condition::Operators(vec![(op, value)])
    }
}

fn field_condition(filter: &Filter) -> Condition {
    let json = || filter.value.as_json().cloned().unwrap_or(Value::Null);
    let list = || Value::Array(filter.value.as_list());

    match filter.op {
        Operator::Eq => Condition::Equals(json()),
        Operator::Ne => Condition::operator("$ne", json()),
        Operator::In => Condition::operator("$in", list()),
        Operator::Nin => Condition::operator("$nin", list()),
        Operator::And => Condition::operator("$all", list()),
        Operator::Or => {
            let branches = filter
                .value
                .as_list()
                .into_iter()
                .map(|value| Value::Object(single(&filter.key, value)))
                .collect();
            Condition::Clause(single("$or", Value::Array(branches)))
        }
        Operator::Regex(mode) => Condition::Operators(vec![
            ("$regex", json()),
            ("$options", Value::String(mode.options().to_string())),
        ]),
        Operator::Exists => Condition::operator("$exists", json()),
        Operator::Gt => Condition::operator("$gt", json()),
        Operator::Gte => Condition::operator("$gte", json()),
        Operator::Lt => Condition::operator("$lt", json()),
        Operator::Lte => Condition::operator("$lte", json()),
        Operator::ElemMatch => {
            let sub = filter
                .value
                .sets()
                .first()
                .map(filter_document)
                .unwrap_or_default();
            Condition::operator("$elemMatch", Value::Object(sub))
        }
        Operator::Bool(tag) => {
            let op = match tag {
                BoolTag::And => "$and",
                BoolTag::Or => "$or",
                BoolTag::Not => "$nor",
            };
            let branches = filter
                .value
                .sets()
                .iter()
                .map(|set| Value::Object(filter_document(set)))
                .collect();
            Condition::Clause(single(op, Value::Array(branches)))
        }
        Operator::Text if filter.key.is_empty() => {
            Condition::Clause(single("$text", json!({ "$search": json() })))
        }
        Operator::Text => {
            let needle = match json() {
                Value::String(s) => s,
                other => other.to_string(),
            };
            Condition::Operators(vec![
                ("$regex", Value::String(regex::escape(&needle))),
                ("$options", Value::String("i".to_string())),
            ])
        }
    }
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

fn combine(clauses: Vec<Map<String, Value>>) -> Map<String, Value> {
    let mut merged = Map::new();
    for clause in &clauses {
        for (key, value) in clause {
            if merged.contains_key(key) {
                return single(
                    "$and",
                    Value::Array(clauses.into_iter().map(Value::Object).collect()),
                );
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
