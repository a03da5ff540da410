//! Populate-tree merger.
//!
//! Several populate requests may target the same path (a request parameter
//! plus a default populate of the entity, or two relations of a batch sharing
//! one entity type). Merging keeps one node per path at every level.

use crate::query::projection::normalize_select;

use super::PopulateNode;

/// Merge nodes sharing a `path`, keeping first-seen order, recursively.
pub fn merge(nodes: Vec<PopulateNode>) -> Vec<PopulateNode> {
    let mut merged: Vec<PopulateNode> = Vec::new();
    for node in nodes {
        match merged.iter_mut().find(|m| m.path == node.path) {
            Some(existing) => absorb(existing, node),
            None => merged.push(node),
        }
    }

    for node in &mut merged {
        node.select = node
            .select
            .take()
            .map(|select| normalize_select(&select))
            .filter(|select| !select.is_empty());
        node.populate = merge(std::mem::take(&mut node.populate));
    }
    merged
}

fn absorb(into: &mut PopulateNode, from: PopulateNode) {
    into.select = match (into.select.take(), from.select) {
        (Some(a), Some(b)) => Some(format!("{a} {b}")),
        (a, b) => a.or(b),
    };
    into.populate.extend(from.populate);

    if from.entity.as_deref().is_some_and(|e| !e.is_empty()) {
        into.entity = from.entity;
    }
    if into.path_prop.is_none() {
        into.path_prop = from.path_prop;
    }
    if into.prop.is_none() {
        into.prop = from.prop;
    }
    if let Some(filters) = from.filters {
        into.filters.get_or_insert_with(Default::default).extend(filters);
    }
    if into.mark_for_skip.is_none() {
        into.mark_for_skip = from.mark_for_skip;
    }
    if into.locale.is_none() {
        into.locale = from.locale;
    }
}
