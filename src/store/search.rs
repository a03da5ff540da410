//! Search-engine query builder.
//!
//! Walks the descriptor's ordered filter list and emits one clause per filter
//! into an incrementally built boolean query. Nested (`$elemMatch`) filters and
//! boolean groups are built by independent sub-builders, so clauses never leak
//! across nesting levels.
//!
//! ## Example
//!
//! ```ignore
//! use sifted_rust::{store::search, QueryDescriptor};
//!
//! let query = QueryDescriptor::new()
//!     .set_filter("@_id", "a1|b2")
//!     .set_filter("%%%title", "rust")
//!     .set_paging(2, 10);
//!
//! let request = search::build(&query);
//! client.search(index, request.body).await?;
//! ```

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::filter::{BoolTag, Filter, FilterSet, Operator};
use crate::query::projection::is_inclusion;
use crate::query::QueryDescriptor;

/// Result window of a search request.
///
/// Offset paging and scroll cursors are mutually exclusive upstream; only the
/// offset variant carries a `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Window {
    Offset { from: u64, size: Option<u64> },
    Scroll { size: Option<u64>, keep_alive: String },
}

impl Window {
    fn apply(&self, body: &mut Map<String, Value>) {
        let size = match self {
            Window::Offset { from, size } => {
                body.insert("from".to_string(), json!(from));
                size
            }
            Window::Scroll { size, .. } => size,
        };
        if let Some(size) = size {
            body.insert("size".to_string(), json!(size));
        }
    }
}

/// A search body plus the window it was built for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub body: Map<String, Value>,
    pub window: Window,
}

impl SearchRequest {
    /// Scroll keep-alive to pass alongside the body, if scrolling.
    pub fn scroll(&self) -> Option<&str> {
        match &self.window {
            Window::Scroll { keep_alive, .. } => Some(keep_alive),
            Window::Offset { .. } => None,
        }
    }
}

/// Incremental builder of one boolean query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchBodyBuilder {
    id_fields: Vec<String>,
    /// Set on sub-builders of a `nested` clause; keys are resolved under it
    /// and id clauses are not available.
    nested_path: Option<String>,
    must: Vec<Value>,
    filter: Vec<Value>,
    should: Vec<Value>,
    must_not: Vec<Value>,
}

impl SearchBodyBuilder {
    pub fn new(id_fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id_fields: id_fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A fresh builder scoped to a nested path. Shares nothing with `self`
    /// except the id field names.
    fn scoped(&self, nested_path: Option<String>) -> Self {
        Self {
            id_fields: self.id_fields.clone(),
            nested_path,
            ..Self::default()
        }
    }

    pub fn must(&mut self, clause: Value) -> &mut Self {
        self.must.push(clause);
        self
    }

    pub fn filter(&mut self, clause: Value) -> &mut Self {
        self.filter.push(clause);
        self
    }

    pub fn should(&mut self, clause: Value) -> &mut Self {
        self.should.push(clause);
        self
    }

    pub fn must_not(&mut self, clause: Value) -> &mut Self {
        self.must_not.push(clause);
        self
    }

    /// Clauses of the `filter` occasion, in insertion order.
    pub fn filter_clauses(&self) -> &[Value] {
        &self.filter
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.filter.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
    }

    pub fn add_filters(&mut self, set: &FilterSet) -> &mut Self {
        for filter in set {
            self.add_filter(filter);
        }
        self
    }

    /// Emit the clause(s) for one filter.
    pub fn add_filter(&mut self, filter: &Filter) -> &mut Self {
        let field = self.field(&filter.key);
        let is_id = self.is_id(&filter.key);
        let json = || filter.value.as_json().cloned().unwrap_or(Value::Null);

        match filter.op {
            Operator::Eq if is_id => self.filter(ids(vec![json()])),
            Operator::Eq => self.filter(json!({ "term": { field: json() } })),
            Operator::In if is_id => self.filter(ids(filter.value.as_list())),
            Operator::In | Operator::Or => {
                self.filter(json!({ "terms": { field: filter.value.as_list() } }))
            }
            Operator::Ne if is_id => self.must_not(ids(vec![json()])),
            Operator::Ne => self.must_not(json!({ "term": { field: json() } })),
            Operator::Nin if is_id => self.must_not(ids(filter.value.as_list())),
            Operator::Nin => {
                self.must_not(json!({ "terms": { field: filter.value.as_list() } }))
            }
            Operator::And => {
                for value in filter.value.as_list() {
                    self.filter(json!({ "term": { field.as_str(): value } }));
                }
                self
            }
            Operator::Regex(mode) => {
                let raw = match json() {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                let (pattern, flagged) = strip_delimiters(&raw);
                self.filter(json!({
                    "regexp": {
                        field: {
                            "value": whole_value_pattern(pattern),
                            "case_insensitive": flagged || mode.is_case_insensitive()
                        }
                    }
                }))
            }
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let bound = filter.op.as_str().trim_start_matches('$');
                self.filter(json!({ "range": { field: { bound: json() } } }))
            }
            Operator::Exists => {
                let clause = json!({ "exists": { "field": field } });
                if json().as_bool() == Some(false) {
                    self.must_not(clause)
                } else {
                    self.filter(clause)
                }
            }
            Operator::ElemMatch => {
                let mut nested = self.scoped(Some(field.clone()));
                if let Some(sub) = filter.value.sets().first() {
                    nested.add_filters(sub);
                }
                self.filter(json!({
                    "nested": { "path": field, "query": nested.query() }
                }))
            }
            Operator::Bool(tag) => {
                let branches: Vec<Value> = filter
                    .value
                    .sets()
                    .iter()
                    .map(|set| {
                        let mut branch = self.scoped(self.nested_path.clone());
                        branch.add_filters(set);
                        branch.query()
                    })
                    .collect();
                let group = match tag {
                    BoolTag::And => json!({ "bool": { "filter": branches } }),
                    BoolTag::Or => {
                        json!({ "bool": { "should": branches, "minimum_should_match": 1 } })
                    }
                    BoolTag::Not => json!({ "bool": { "must_not": branches } }),
                };
                self.filter(group)
            }
            Operator::Text => {
                let mut clause = Map::new();
                clause.insert("query".to_string(), json());
                clause.insert("default_operator".to_string(), json!("and"));
                if !filter.key.is_empty() {
                    clause.insert("fields".to_string(), json!([field]));
                }
                self.must(json!({ "simple_query_string": clause }))
            }
        }
    }

    /// The boolean query built so far. Empty builders match everything.
    pub fn query(self) -> Value {
        if self.is_empty() {
            return json!({ "match_all": {} });
        }

        let mut bool_query = Map::new();
        for (occasion, clauses) in [
            ("must", self.must),
            ("filter", self.filter),
            ("must_not", self.must_not),
        ] {
            if !clauses.is_empty() {
                bool_query.insert(occasion.to_string(), Value::Array(clauses));
            }
        }
        if !self.should.is_empty() {
            bool_query.insert("should".to_string(), Value::Array(self.should));
            bool_query.insert("minimum_should_match".to_string(), json!(1));
        }
        json!({ "bool": bool_query })
    }

    fn field(&self, key: &str) -> String {
        match &self.nested_path {
            Some(path) if !key.is_empty() => format!("{path}.{key}"),
            _ => key.to_string(),
        }
    }

    fn is_id(&self, key: &str) -> bool {
        self.nested_path.is_none() && self.id_fields.iter().any(|id| id == key)
    }
}

/// Translate a descriptor into a search request.
pub fn build(query: &QueryDescriptor) -> SearchRequest {
    let mut builder = SearchBodyBuilder::new(query.config().id_fields.iter().cloned());
    builder.add_filters(query.filters());

    let mut body = Map::new();
    body.insert("query".to_string(), builder.query());
    body.insert("track_total_hits".to_string(), Value::Bool(true));

    let window = match query.scroll_context() {
        Some(scroll) => Window::Scroll {
            size: query.limit(),
            keep_alive: scroll.keep_alive.clone(),
        },
        None => Window::Offset {
            from: query.offset(),
            size: query.limit(),
        },
    };
    window.apply(&mut body);

    let projection = query.projection();
    if !projection.is_empty() {
        let (occasion, include) = if is_inclusion(projection) {
            ("includes", true)
        } else {
            ("excludes", false)
        };
        let fields: Vec<&str> = projection
            .iter()
            .filter(|(_, v)| **v == include)
            .map(|(k, _)| k.as_str())
            .collect();
        body.insert("_source".to_string(), json!({ occasion: fields }));
    }

    let sort: Vec<Value> = query
        .sort()
        .into_iter()
        .map(|(field, direction)| json!({ field: { "order": direction.as_str() } }))
        .collect();
    if !sort.is_empty() {
        body.insert("sort".to_string(), Value::Array(sort));
    }

    if let Some(slice) = query.slice_context() {
        body.insert("slice".to_string(), json!({ "id": slice.id, "max": slice.max }));
    }

    if let Some(raw) = query.raw_search_body() {
        body.extend(raw.iter().map(|(k, v)| (k.clone(), v.clone())));
        // Exact totals and the scroll window survive raw overrides.
        body.insert("track_total_hits".to_string(), Value::Bool(true));
        if matches!(window, Window::Scroll { .. }) {
            body.remove("from");
        }
    }

    if query.is_debug() {
        let rendered = Value::Object(body.clone());
        debug!(body = %rendered, "built search body");
    }

    SearchRequest { body, window }
}

fn ids(values: Vec<Value>) -> Value {
    json!({ "ids": { "values": values } })
}

/// Strip `/pattern/flags` delimiters. Returns the pattern and whether the
/// flags ask for case-insensitive matching.
fn strip_delimiters(raw: &str) -> (&str, bool) {
    if let Some(rest) = raw.strip_prefix('/') {
        if let Some((pattern, flags)) = rest.rsplit_once('/') {
            if flags.chars().all(|c| c.is_ascii_alphabetic()) {
                return (pattern, flags.contains('i'));
            }
        }
    }
    (raw, false)
}

/// Search-engine regexps always match the whole value: anchors become
/// implicit, unanchored ends become `.*`.
fn whole_value_pattern(pattern: &str) -> String {
    let (head, body) = match pattern.strip_prefix('^') {
        Some(rest) => ("", rest),
        None => (".*", pattern),
    };
    let anchored_end = body.ends_with('$') && !body.ends_with("\\$");
    let (body, tail) = if anchored_end {
        (&body[..body.len() - 1], "")
    } else {
        (body, ".*")
    };
    format!("{head}{body}{tail}")
}
