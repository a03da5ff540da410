//! Filters - Typed (key, operator, value) query conditions.
//!
//! Filters are usually decoded from flat request pairs by the [`grammar`],
//! but can be built directly with [`Filter::new`]. A [`FilterSet`] keeps the
//! ordered filter list of a query; the keyed `field -> operator -> value` view
//! used by document stores is derived from that list.
//!
//! ## Example
//!
//! ```ignore
//! use sifted_rust::filter::{grammar, Filter, Operator};
//! use serde_json::json;
//!
//! let filter = grammar::parse("!!status", &json!("draft|archived")).unwrap();
//! assert_eq!(filter, Filter::new("status", Operator::Nin, json!(["draft", "archived"])));
//! ```

pub mod grammar;
pub mod matcher;

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Case and anchoring variants of the `$regex` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegexMode {
    /// `^value`, case-insensitive.
    AnchoredInsensitive,
    /// `^value`, case-sensitive.
    AnchoredSensitive,
    /// `value` anywhere, case-insensitive.
    Contains,
}

impl RegexMode {
    pub fn is_case_insensitive(self) -> bool {
        !matches!(self, RegexMode::AnchoredSensitive)
    }

    /// Regex options in document-store notation.
    pub fn options(self) -> &'static str {
        if self.is_case_insensitive() {
            "i"
        } else {
            ""
        }
    }
}

/// How the sub-filter sets of a boolean group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolTag {
    And,
    Or,
    Not,
}

impl BoolTag {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "" | "and" => Some(BoolTag::And),
            "or" => Some(BoolTag::Or),
            "not" => Some(BoolTag::Not),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BoolTag::And => "and",
            BoolTag::Or => "or",
            BoolTag::Not => "not",
        }
    }
}

/// Filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    In,
    Nin,
    Or,
    And,
    Regex(RegexMode),
    Exists,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Match array elements (or a nested object) against a sub-filter set.
    ElemMatch,
    /// Boolean group of sub-filter sets. Groups accumulate instead of replacing.
    Bool(BoolTag),
    /// Free-text search.
    Text,
}

impl Operator {
    /// Operator name in `$op` notation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::Or => "$or",
            Operator::And => "$and",
            Operator::Regex(_) => "$regex",
            Operator::Exists => "$exists",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::ElemMatch => "$elemMatch",
            Operator::Bool(_) => "$bool",
            Operator::Text => "$text",
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The value side of a filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Json(Value),
    /// Sub-filter sets of `$elemMatch` (exactly one) and `$bool` filters.
    Sets(Vec<FilterSet>),
}

impl FilterValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FilterValue::Json(v) => Some(v),
            FilterValue::Sets(_) => None,
        }
    }

    pub fn sets(&self) -> &[FilterSet] {
        match self {
            FilterValue::Sets(sets) => sets,
            FilterValue::Json(_) => &[],
        }
    }

    /// Scalar values as a list: arrays are returned as-is, anything else as one item.
    pub fn as_list(&self) -> Vec<Value> {
        match self {
            FilterValue::Json(Value::Array(items)) => items.clone(),
            FilterValue::Json(v) => vec![v.clone()],
            FilterValue::Sets(_) => Vec::new(),
        }
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        FilterValue::Json(value)
    }
}

impl From<FilterSet> for FilterValue {
    fn from(set: FilterSet) -> Self {
        FilterValue::Sets(vec![set])
    }
}

impl From<Vec<FilterSet>> for FilterValue {
    fn from(sets: Vec<FilterSet>) -> Self {
        FilterValue::Sets(sets)
    }
}

/// One query condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub key: String,
    pub op: Operator,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(key: impl Into<String>, op: Operator, value: impl Into<FilterValue>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    /// Whether `other` occupies the same (key, operator) slot.
    fn same_slot(&self, other: &Filter) -> bool {
        self.key == other.key && self.op.as_str() == other.op.as_str()
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = match self.op {
            Operator::Regex(_) | Operator::Bool(_) => 1,
            _ => 0,
        };
        let mut state = serializer.serialize_struct("Filter", 3 + extra)?;
        state.serialize_field("key", &self.key)?;
        state.serialize_field("op", &self.op)?;
        state.serialize_field("value", &self.value)?;
        match self.op {
            Operator::Regex(mode) => state.serialize_field("options", mode.options())?,
            Operator::Bool(tag) => state.serialize_field("tag", tag.as_str())?,
            _ => {}
        }
        state.end()
    }
}

/// Ordered list of filters with at most one filter per (key, operator),
/// except boolean groups which accumulate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode request-encoded pairs through the grammar. Pairs the grammar
    /// does not recognize are dropped.
    pub fn from_request<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut set = Self::new();
        for (key, value) in pairs {
            if let Some(filter) = grammar::parse(key, value) {
                set.insert(filter);
            }
        }
        set
    }

    /// Insert a filter, replacing the one in the same (key, operator) slot
    /// in place. Boolean groups are appended.
    pub fn insert(&mut self, filter: Filter) {
        if !matches!(filter.op, Operator::Bool(_)) {
            if let Some(existing) = self.filters.iter_mut().find(|f| f.same_slot(&filter)) {
                *existing = filter;
                return;
            }
        }
        self.filters.push(filter);
    }

    /// Remove every filter on `key`. Returns how many were removed.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.filters.len();
        self.filters.retain(|f| f.key != key);
        before - self.filters.len()
    }

    pub fn get(&self, key: &str, op: Operator) -> Option<&Filter> {
        self.filters
            .iter()
            .find(|f| f.key == key && f.op.as_str() == op.as_str())
    }

    /// Filters grouped by key, keys in first-seen order.
    pub fn by_key(&self) -> Vec<(&str, Vec<&Filter>)> {
        let mut groups: Vec<(&str, Vec<&Filter>)> = Vec::new();
        for filter in &self.filters {
            match groups.iter_mut().find(|(key, _)| *key == filter.key) {
                Some((_, group)) => group.push(filter),
                None => groups.push((filter.key.as_str(), vec![filter])),
            }
        }
        groups
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<'a> IntoIterator for &'a FilterSet {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.filters.iter()
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<T: IntoIterator<Item = Filter>>(iter: T) -> Self {
        let mut set = Self::new();
        for filter in iter {
            set.insert(filter);
        }
        set
    }
}
