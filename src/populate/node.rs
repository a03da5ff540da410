//! PopulateNode - A request to resolve a foreign-entity reference.
//!
//! Populate input arrives in many shapes: a space/comma separated string of
//! paths, an array of strings or objects, or a single object whose nested
//! `populate` can again be any of those. [`PopulateNode::normalize`] turns all
//! of them into one canonical node list at the boundary.

use serde::Serialize;
use serde_json::{Map, Value};

/// Lookup property used when a node does not name one.
pub const DEFAULT_PROP: &str = "_id";

/// Marker for "each element of this array": `items.$.product`.
pub const EACH_MARKER: &str = ".$.";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateNode {
    /// Field the resolved document(s) are written to.
    pub path: String,
    /// Field the reference value is read from, when it differs from `path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub populate: Vec<PopulateNode>,
    /// Registered entity type resolving this node. Defaults to `path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Property of the target entity the reference is matched against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prop: Option<String>,
    /// Request-encoded filters applied to the batched lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Map<String, Value>>,
    /// Set by hosts that resolve this path themselves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_for_skip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl PopulateNode {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_path_prop(mut self, path_prop: impl Into<String>) -> Self {
        self.path_prop = Some(path_prop.into());
        self
    }

    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    pub fn with_populate(mut self, nodes: impl IntoIterator<Item = PopulateNode>) -> Self {
        self.populate.extend(nodes);
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_prop(mut self, prop: impl Into<String>) -> Self {
        self.prop = Some(prop.into());
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn skipped(mut self) -> Self {
        self.mark_for_skip = Some(true);
        self
    }

    /// Entity type name used for registry lookup.
    pub fn entity_name(&self) -> &str {
        match self.entity.as_deref() {
            Some(entity) if !entity.is_empty() => entity,
            _ => &self.path,
        }
    }

    /// Property of the target entity matched against the reference values.
    pub fn lookup_prop(&self) -> &str {
        self.prop.as_deref().unwrap_or(DEFAULT_PROP)
    }

    /// Path the reference values are read from.
    pub fn source_path(&self) -> &str {
        self.path_prop.as_deref().unwrap_or(&self.path)
    }

    /// Source path as a plain dotted field (array marker flattened), as
    /// document stores address it in projections.
    pub fn source_field(&self) -> String {
        self.source_path().replace(EACH_MARKER, ".")
    }

    pub fn is_marked_for_skip(&self) -> bool {
        self.mark_for_skip.unwrap_or(false)
    }

    /// Set `locale` on this node and every nested node.
    pub fn apply_locale(&mut self, locale: &str) {
        self.locale = Some(locale.to_string());
        for child in &mut self.populate {
            child.apply_locale(locale);
        }
    }

    /// Parse populate input of any accepted shape. Unusable entries are skipped.
    pub fn normalize(value: &Value) -> Vec<PopulateNode> {
        match value {
            Value::String(paths) => Self::parse_paths(paths),
            Value::Array(items) => items.iter().flat_map(Self::normalize).collect(),
            Value::Object(map) => Self::from_object(map).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Parse a space/comma separated path list: `"author comments.user"`.
    pub fn parse_paths(paths: &str) -> Vec<PopulateNode> {
        paths
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty())
            .map(PopulateNode::new)
            .collect()
    }

    fn from_object(map: &Map<String, Value>) -> Option<PopulateNode> {
        let path = map.get("path")?.as_str()?.trim();
        if path.is_empty() {
            return None;
        }

        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let select = match map.get("select") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Array(fields)) => {
                let joined = fields
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                (!joined.is_empty()).then_some(joined)
            }
            _ => None,
        };

        Some(PopulateNode {
            path: path.to_string(),
            path_prop: text("pathProp"),
            select,
            populate: map.get("populate").map(Self::normalize).unwrap_or_default(),
            entity: text("entity").or_else(|| text("business")),
            prop: text("prop"),
            filters: map.get("filters").and_then(Value::as_object).cloned(),
            mark_for_skip: map.get("markForSkip").and_then(Value::as_bool),
            locale: text("locale"),
        })
    }
}

impl From<&str> for PopulateNode {
    fn from(path: &str) -> Self {
        PopulateNode::new(path)
    }
}
