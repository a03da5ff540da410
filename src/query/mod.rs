//! QueryDescriptor - Store-agnostic description of one query.
//!
//! A descriptor is built per request (usually with
//! [`QueryDescriptor::from_request`]), refined through its fluent setters,
//! and consumed once by a store query builder. It is never shared between
//! requests.
//!
//! ## Example
//!
//! ```ignore
//! use sifted_rust::{PopulateNode, QueryDescriptor};
//!
//! let query = QueryDescriptor::new()
//!     .set_filter("!!status", "draft|archived")
//!     .set_filter(">=publishedAt", "2024-01-01")
//!     .set_sort("-publishedAt,title")
//!     .set_paging(2, 20)
//!     .select("title publishedAt")
//!     .populate([PopulateNode::new("author").with_select("name")]);
//!
//! let mongo = sifted_rust::store::document::build(&query);
//! let elastic = sifted_rust::store::search::build(&query);
//! ```

pub mod projection;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::QueryConfig;
use crate::filter::{grammar, Filter, FilterSet, FilterValue, Operator};
use crate::populate::{merge, PopulateNode};

use projection::Projection;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `1` / `-1`, as document stores expect.
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct SortField {
    field: String,
    direction: SortDirection,
    /// Resolved against the descriptor's locale when read.
    localized: bool,
}

/// Search-engine scroll context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scroll {
    pub keep_alive: String,
}

/// Search-engine sliced scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slice {
    pub id: u32,
    pub max: u32,
}

/// Request keys that configure the query rather than filter it.
const RESERVED_KEYS: &[&str] = &[
    "page", "limit", "sort", "select", "fields", "populate", "locale", "debug", "q", "id",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    #[serde(skip)]
    config: Arc<QueryConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    locale: String,
    filters: FilterSet,
    #[serde(skip_serializing_if = "Projection::is_empty")]
    projection: Projection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sort: Vec<SortField>,
    page: u64,
    /// `None` means every matching document.
    limit: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    populate: Vec<PopulateNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_search: Option<Map<String, Value>>,
    debug: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    scroll: Option<Scroll>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slice: Option<Slice>,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryDescriptor {
    /// Create a descriptor with the default config.
    pub fn new() -> Self {
        Self::with_config(Arc::new(QueryConfig::default()))
    }

    pub fn with_config(config: Arc<QueryConfig>) -> Self {
        Self {
            locale: config.default_locale.clone(),
            limit: Some(config.default_page_size),
            config,
            id: None,
            filters: FilterSet::new(),
            projection: Projection::new(),
            sort: Vec::new(),
            page: 1,
            populate: Vec::new(),
            raw: None,
            raw_search: None,
            debug: false,
            scroll: None,
            slice: None,
        }
    }

    /// Decode a whole request (query string or body pairs).
    ///
    /// `page`, `limit`, `sort`, `select`/`fields`, `populate`, `locale`,
    /// `debug`, `q` and `id` configure the query; every other pair goes
    /// through the filter grammar.
    pub fn from_request<I, K, V>(config: Arc<QueryConfig>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut query = Self::with_config(config);
        let mut page: Option<i64> = None;
        let mut limit: Option<i64> = None;

        for (key, value) in pairs {
            let key = key.as_ref();
            let value: Value = value.into();
            if !RESERVED_KEYS.contains(&key) {
                query = query.set_filter(key, value);
                continue;
            }

            let text = match &value {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            query = match key {
                "page" => {
                    page = text.parse().ok();
                    query
                }
                "limit" => {
                    limit = text.parse().ok();
                    query
                }
                "sort" => query.set_sort(&text),
                "select" | "fields" => query.select(&text),
                "populate" => {
                    let tree = match &value {
                        Value::String(s) => serde_json::from_str(s).unwrap_or(value.clone()),
                        _ => value.clone(),
                    };
                    query.populate(PopulateNode::normalize(&tree))
                }
                "locale" if !text.is_empty() => query.set_locale(text),
                "debug" => query.debug(matches!(text.as_str(), "true" | "1" | "yes")),
                "q" if !text.is_empty() => query.search(text),
                "id" if !text.is_empty() => query.set_id(text),
                _ => query,
            };
        }

        if page.is_some() || limit.is_some() {
            let default_limit = query.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
            query = query.set_paging(page.unwrap_or(1), limit.unwrap_or(default_limit));
        }
        query
    }

    pub fn set_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Decode `key` through the filter grammar and store the filter,
    /// replacing any filter in the same (key, operator) slot. Keys the
    /// grammar does not recognize are ignored.
    pub fn set_filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(filter) = grammar::parse(key, &value.into()) {
            self.filters.insert(filter);
        }
        self
    }

    /// `set_filter` for every pair.
    pub fn set_filters<I, K, V>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in filters {
            self = self.set_filter(key.as_ref(), value);
        }
        self
    }

    /// Store a typed filter without going through the grammar.
    pub fn filter_op(
        mut self,
        key: impl Into<String>,
        op: Operator,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.filters.insert(Filter::new(key, op, value));
        self
    }

    pub fn add_filter(mut self, filter: Filter) -> Self {
        self.filters.insert(filter);
        self
    }

    pub fn remove_filter(mut self, key: &str) -> Self {
        self.filters.remove(key);
        self
    }

    /// Free-text search across all indexed fields.
    pub fn search(self, text: impl Into<String>) -> Self {
        self.filter_op("", Operator::Text, Value::String(text.into()))
    }

    /// Parse a comma separated sort list: `-createdAt,+title,name`.
    /// Sorting again on a field replaces its direction in place.
    pub fn set_sort(mut self, sorts: &str) -> Self {
        for token in sorts.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (field, direction) = if let Some(rest) = token.strip_prefix('-') {
                (rest, SortDirection::Desc)
            } else {
                (token.strip_prefix('+').unwrap_or(token), SortDirection::Asc)
            };
            if !field.is_empty() {
                self = self.sort_by(field, direction);
            }
        }
        self
    }

    pub fn sort_by(mut self, field: &str, direction: SortDirection) -> Self {
        let entry = SortField {
            field: field.to_string(),
            direction,
            localized: self.config.is_multilingual(field),
        };
        match self.sort.iter_mut().find(|s| s.field == field) {
            Some(existing) => *existing = entry,
            None => self.sort.push(entry),
        }
        self
    }

    /// `page < 1` clamps to 1. `limit == -1` removes the bound; any other
    /// non-positive limit falls back to the default page size.
    pub fn set_paging(mut self, page: i64, limit: i64) -> Self {
        self.page = u64::try_from(page.max(1)).unwrap_or(1);
        self.limit = match limit {
            -1 => None,
            l if l <= 0 => Some(self.config.default_page_size),
            l => Some(l.unsigned_abs()),
        };
        self
    }

    /// Merge a select string (`"title -body"`) into the projection.
    pub fn select(mut self, select: &str) -> Self {
        let mut projection = std::mem::take(&mut self.projection);
        projection.extend(projection::parse_select(select));
        self.projection = projection::fix(projection);
        self.include_populate_paths();
        self
    }

    /// Add populate nodes. The whole tree is rebuilt: existing and new nodes
    /// are merged, the active locale is applied, and relation paths are added
    /// to an inclusion projection.
    pub fn populate(mut self, nodes: impl IntoIterator<Item = PopulateNode>) -> Self {
        let mut all = std::mem::take(&mut self.populate);
        all.extend(nodes);
        self.populate = merge(all);
        for node in &mut self.populate {
            node.apply_locale(&self.locale);
        }
        self.include_populate_paths();
        self
    }

    /// Change the locale, cascading into every populate node.
    pub fn set_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        for node in &mut self.populate {
            node.apply_locale(&self.locale);
        }
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Raw document-store filter entries, merged over the built filter.
    pub fn raw(mut self, raw: Map<String, Value>) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Raw search body entries, merged over the built body.
    pub fn raw_search(mut self, raw: Map<String, Value>) -> Self {
        self.raw_search = Some(raw);
        self
    }

    /// Stream search results with a scroll cursor. Offset paging is
    /// disabled while scrolling.
    pub fn scroll(mut self, keep_alive: impl Into<String>) -> Self {
        self.scroll = Some(Scroll {
            keep_alive: keep_alive.into(),
        });
        self
    }

    pub fn slice(mut self, id: u32, max: u32) -> Self {
        self.slice = Some(Slice { id, max });
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Sort fields in order, multilingual fields suffixed with the locale.
    pub fn sort(&self) -> Vec<(String, SortDirection)> {
        self.sort
            .iter()
            .map(|s| {
                let field = if s.localized {
                    format!("{}.{}", s.field, self.locale)
                } else {
                    s.field.clone()
                };
                (field, s.direction)
            })
            .collect()
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Documents skipped before the current page.
    pub fn offset(&self) -> u64 {
        self.limit.map_or(0, |limit| (self.page - 1).saturating_mul(limit))
    }

    pub fn populate_nodes(&self) -> &[PopulateNode] {
        &self.populate
    }

    pub fn raw_filter(&self) -> Option<&Map<String, Value>> {
        self.raw.as_ref()
    }

    pub fn raw_search_body(&self) -> Option<&Map<String, Value>> {
        self.raw_search.as_ref()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn scroll_context(&self) -> Option<&Scroll> {
        self.scroll.as_ref()
    }

    pub fn slice_context(&self) -> Option<Slice> {
        self.slice
    }

    /// Relation fields must survive the projection, or the references are
    /// gone before they can be resolved.
    fn include_populate_paths(&mut self) {
        if !projection::is_inclusion(&self.projection) {
            return;
        }
        for node in &self.populate {
            let field = node.source_field();
            if self.projection.contains_key(&field)
                || projection::has_ancestor(&self.projection, &field)
            {
                continue;
            }
            self.projection.insert(field, true);
        }
        self.projection = projection::fix(std::mem::take(&mut self.projection));
    }
}
